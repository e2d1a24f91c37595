//! Edge identifier scheme.
//!
//! `edge_uid(s, t) = s + "_to_" + t`. The scheme is order-sensitive, so a
//! directed edge and its reverse have distinct keys. It is only collision-free
//! because node uids may not contain the delimiter, nor start with `to_` or
//! end with `_to` (either would let the delimiter straddle the join), which
//! [`validate_uid`] enforces at every entry point.

use crate::error::{Error, Result};

/// Separator between source and target uid in an edge uid.
pub const EDGE_UID_DELIMITER: &str = "_to_";

/// Checks that a node uid is usable as a document key and as half of an edge uid.
///
/// # Errors
///
/// Returns `Error::InvalidArgument` if the uid is empty, contains
/// [`EDGE_UID_DELIMITER`], starts with `to_` or ends with `_to`.
pub fn validate_uid(uid: &str) -> Result<()> {
    if uid.is_empty() {
        return Err(Error::InvalidArgument(
            "node uid cannot be empty".to_string(),
        ));
    }
    if uid.contains(EDGE_UID_DELIMITER) {
        return Err(Error::InvalidArgument(format!(
            "node uid '{uid}' contains the reserved delimiter '{EDGE_UID_DELIMITER}'"
        )));
    }
    if uid.starts_with("to_") || uid.ends_with("_to") {
        return Err(Error::InvalidArgument(format!(
            "node uid '{uid}' would make edge uids ambiguous (starts with 'to_' or ends with '_to')"
        )));
    }
    Ok(())
}

/// Derives the edge collection key for the ordered pair `(source, target)`.
///
/// # Example
///
/// ```rust
/// use kgstore_core::graph::edge_uid;
///
/// assert_eq!(edge_uid("A", "B").unwrap(), "A_to_B");
/// assert_ne!(edge_uid("A", "B").unwrap(), edge_uid("B", "A").unwrap());
/// assert!(edge_uid("A_to_C", "B").is_err());
/// ```
pub fn edge_uid(source_uid: &str, target_uid: &str) -> Result<String> {
    validate_uid(source_uid)?;
    validate_uid(target_uid)?;
    Ok(format!("{source_uid}{EDGE_UID_DELIMITER}{target_uid}"))
}
