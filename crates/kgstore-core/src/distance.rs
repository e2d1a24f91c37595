//! Distance measures for nearest-neighbor queries.
//!
//! The graph engine only names a metric; the document store's vector index
//! does the ranking. The scalar kernels here back the in-memory store.

use serde::{Deserialize, Serialize};

/// Distance measure used to rank neighbors (lower is closer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// L2 distance.
    #[default]
    Euclidean,
    /// `1 - cosine similarity`.
    Cosine,
    /// Negated dot product.
    DotProduct,
}

impl DistanceMetric {
    /// Computes the distance between two vectors of equal length.
    ///
    /// Callers are responsible for checking dimensions; extra components of
    /// the longer slice are ignored.
    #[must_use]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Euclidean => euclidean_distance_scalar(a, b),
            Self::Cosine => cosine_distance_scalar(a, b),
            Self::DotProduct => dot_product_scalar(a, b),
        }
    }
}

#[inline]
fn euclidean_distance_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

#[inline]
fn cosine_distance_scalar(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = (norm_a * norm_b).sqrt();
    if denom == 0.0 {
        1.0
    } else {
        1.0 - (dot / denom)
    }
}

#[inline]
fn dot_product_scalar(a: &[f32], b: &[f32]) -> f32 {
    -a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>()
}
