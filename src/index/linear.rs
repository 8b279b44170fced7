//! Exact linear-scan index.
//!
//! Stores the full vector matrix and scores every row against the query.
//! The top-k is maintained in a bounded min-heap, so a scan is O(N log k)
//! and fully deterministic.

use crate::error::Result;
use crate::metric::Metric;

use super::{select_top_k, Hit, VectorSet};

#[derive(Debug)]
pub struct LinearIndex {
    set: VectorSet,
    metric: Metric,
}

impl LinearIndex {
    pub fn build(set: VectorSet, metric: Metric) -> Self {
        Self { set, metric }
    }

    pub fn query(&self, q: &[f32], k: usize) -> Result<Vec<Hit>> {
        self.set.check_query(q)?;
        let scored = self.set.rows().map(|(row, vector)| Hit {
            id: self.set.id(row),
            score: self.metric.score(q, vector),
        });
        Ok(select_top_k(scored, k))
    }

    pub fn set(&self) -> &VectorSet {
        &self.set
    }
}
