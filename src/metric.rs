//! Similarity and distance kernels.
//!
//! Both metrics are folded into a single **ranking score** so the search
//! layer always sorts descending: cosine keeps its similarity, euclidean
//! negates its distance. Ties are broken by chunk id ascending, which is
//! stable and reproducible across runs.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Similarity metric for a compiled index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Euclidean,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
        }
    }

    /// Parse a metric name as it appears in config and API payloads.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" => Ok(Metric::Euclidean),
            other => Err(Error::InvalidArgument(format!("unknown metric: {other}"))),
        }
    }

    /// Ranking score between two equal-length vectors: higher is closer.
    ///
    /// Callers are responsible for rejecting zero-norm vectors under cosine
    /// before reaching this kernel.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine(a, b),
            Metric::Euclidean => -euclidean(a, b),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// L2 norm of a vector.
#[inline]
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity in [-1, 1]. Undefined for zero-norm inputs; callers
/// must reject those first.
#[inline]
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    dot(a, b) / (l2_norm(a) * l2_norm(b))
}

/// Squared euclidean distance. Shared by the linear and kd-tree indices so
/// both produce bit-identical sums for identical inputs.
#[inline]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Euclidean distance.
#[inline]
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    squared_euclidean(a, b).sqrt()
}

/// True if the vector has zero norm (cannot participate in cosine scoring).
#[inline]
pub fn is_zero_norm(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}
