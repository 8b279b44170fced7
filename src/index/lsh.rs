//! Random-hyperplane LSH index (cosine only).
//!
//! Each of the `num_tables` tables projects a vector onto `num_planes`
//! standard-normal hyperplanes and packs the projection signs into a u32
//! signature; colliding signatures land in the same bucket. Queries collect
//! bucket members across tables, widen by multi-probing signatures at
//! Hamming distance 1 and then 2 while the candidate set is short, and
//! re-rank candidates by exact cosine similarity. Only the candidate set is
//! approximate; every returned score is exact.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

use crate::constants::{LSH_CANDIDATE_FACTOR, MAX_LSH_PLANES};
use crate::error::{Error, Result};
use crate::metric;

use super::{select_top_k, Hit, LshParams, VectorSet};

#[derive(Debug)]
pub struct LshIndex {
    set: VectorSet,
    params: LshParams,
    /// One hyperplane matrix per table, `num_planes * dim` floats row-major.
    planes: Vec<Vec<f32>>,
    /// Signature → member rows, one map per table.
    tables: Vec<HashMap<u32, Vec<usize>>>,
}

impl LshIndex {
    pub fn build(set: VectorSet, params: LshParams, seed: u64) -> Result<Self> {
        if params.num_tables == 0 {
            return Err(Error::InvalidArgument(
                "lsh num_tables must be positive".into(),
            ));
        }
        if params.num_planes == 0 || params.num_planes > MAX_LSH_PLANES {
            return Err(Error::InvalidArgument(format!(
                "lsh num_planes must be in 1..={MAX_LSH_PLANES}, got {}",
                params.num_planes
            )));
        }

        let dim = set.dim();
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = StandardNormal;
        let planes: Vec<Vec<f32>> = (0..params.num_tables)
            .map(|_| {
                (0..params.num_planes * dim)
                    .map(|_| normal.sample(&mut rng))
                    .collect()
            })
            .collect();

        let mut tables: Vec<HashMap<u32, Vec<usize>>> =
            vec![HashMap::new(); params.num_tables];
        for (row, vector) in set.rows() {
            for (table, table_planes) in planes.iter().enumerate() {
                let sig = signature(table_planes, params.num_planes, vector);
                tables[table].entry(sig).or_default().push(row);
            }
        }

        Ok(Self {
            set,
            params,
            planes,
            tables,
        })
    }

    pub fn query(&self, q: &[f32], k: usize) -> Result<Vec<Hit>> {
        self.set.check_query(q)?;
        if self.set.is_empty() {
            return Ok(Vec::new());
        }

        let sigs: Vec<u32> = self
            .planes
            .iter()
            .map(|planes| signature(planes, self.params.num_planes, q))
            .collect();

        let target = k.saturating_mul(LSH_CANDIDATE_FACTOR).max(k);
        let mut candidates: HashSet<usize> = HashSet::new();

        // Exact buckets first, then Hamming distance 1, then 2. Every probe
        // level runs across all tables before widening further.
        self.collect(&sigs, 0, &mut candidates);
        if candidates.len() < target {
            self.collect(&sigs, 1, &mut candidates);
        }
        if candidates.len() < target {
            self.collect(&sigs, 2, &mut candidates);
        }

        let scored = candidates.into_iter().map(|row| Hit {
            id: self.set.id(row),
            score: metric::cosine(q, self.set.vector(row)),
        });
        Ok(select_top_k(scored, k))
    }

    /// Drain every bucket whose signature lies at exactly `distance` bit
    /// flips from the query signature, in each table.
    fn collect(&self, sigs: &[u32], distance: u32, candidates: &mut HashSet<usize>) {
        let bits = self.params.num_planes;
        for (table, sig) in sigs.iter().enumerate() {
            match distance {
                0 => self.drain_bucket(table, *sig, candidates),
                1 => {
                    for i in 0..bits {
                        self.drain_bucket(table, sig ^ (1 << i), candidates);
                    }
                }
                2 => {
                    for i in 0..bits {
                        for j in (i + 1)..bits {
                            self.drain_bucket(table, sig ^ (1 << i) ^ (1 << j), candidates);
                        }
                    }
                }
                _ => unreachable!("probe depth is capped at 2"),
            }
        }
    }

    fn drain_bucket(&self, table: usize, sig: u32, candidates: &mut HashSet<usize>) {
        if let Some(rows) = self.tables[table].get(&sig) {
            candidates.extend(rows.iter().copied());
        }
    }

    pub fn set(&self) -> &VectorSet {
        &self.set
    }
}

/// P-bit sign signature of a vector's projections onto the table's planes.
fn signature(planes: &[f32], num_planes: usize, v: &[f32]) -> u32 {
    let dim = v.len();
    let mut sig = 0u32;
    for p in 0..num_planes {
        let projection = metric::dot(&planes[p * dim..(p + 1) * dim], v);
        if projection >= 0.0 {
            sig |= 1 << p;
        }
    }
    sig
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::index::test_set;

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn clustered_points() -> Vec<(Vec<f32>, Uuid)> {
        // Two tight angular clusters around +x and +y in 8 dims.
        let mut points = Vec::new();
        for i in 0..20u128 {
            let wobble = (i as f32) * 0.001;
            let mut a = vec![1.0, wobble, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
            let mut b = vec![wobble, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
            a[2] = wobble;
            b[3] = wobble;
            points.push((a, uuid(i + 1)));
            points.push((b, uuid(i + 101)));
        }
        points
    }

    #[test]
    fn scores_are_exact_cosine() {
        let points = clustered_points();
        let index = LshIndex::build(test_set(&points), LshParams::default(), 7).unwrap();
        let q = vec![1.0, 0.05, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        for hit in index.query(&q, 10).unwrap() {
            let row = points.iter().position(|(_, id)| *id == hit.id).unwrap();
            let exact = metric::cosine(&q, &points[row].0);
            assert_eq!(hit.score.to_bits(), exact.to_bits());
        }
    }

    #[test]
    fn same_seed_builds_identical_indices() {
        let points = clustered_points();
        let a = LshIndex::build(test_set(&points), LshParams::default(), 42).unwrap();
        let b = LshIndex::build(test_set(&points), LshParams::default(), 42).unwrap();
        let q = vec![0.2, 0.9, 0.0, 0.1, 0.0, 0.0, 0.0, 0.0];
        let hits_a = a.query(&q, 5).unwrap();
        let hits_b = b.query(&q, 5).unwrap();
        assert_eq!(hits_a, hits_b);
    }

    #[test]
    fn near_duplicate_of_query_is_found() {
        let points = clustered_points();
        let index = LshIndex::build(test_set(&points), LshParams::default(), 3).unwrap();
        // Essentially the +y cluster centroid; its nearest member must appear.
        let q = vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let hits = index.query(&q, 5).unwrap();
        assert!(!hits.is_empty());
        assert!(hits[0].score > 0.99, "top score {}", hits[0].score);
    }

    #[test]
    fn multi_probe_fills_short_candidate_sets() {
        // Well-spread points and narrow 4-bit signatures: with k close to N
        // the exact buckets rarely hold enough members, so probing at
        // Hamming distance 1 and 2 must widen the candidate set.
        let points: Vec<(Vec<f32>, Uuid)> = (0..8u128)
            .map(|i| {
                let angle = (i as f32) * 0.7;
                (vec![angle.cos(), angle.sin(), 0.3, -0.2], uuid(i + 1))
            })
            .collect();
        let params = LshParams {
            num_tables: 4,
            num_planes: 4,
        };
        let index = LshIndex::build(test_set(&points), params, 11).unwrap();
        let hits = index.query(&[1.0, 0.0, 0.0, 0.0], 6).unwrap();
        assert!(hits.len() >= 4, "expected a widened candidate set, got {}", hits.len());
    }

    #[test]
    fn plane_count_is_validated() {
        let err = LshIndex::build(
            test_set(&[(vec![1.0], uuid(1))]),
            LshParams {
                num_tables: 4,
                num_planes: 64,
            },
            0,
        )
        .unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }

    #[test]
    fn empty_index_returns_no_hits() {
        let index = LshIndex::build(test_set(&[]), LshParams::default(), 0).unwrap();
        assert!(index.query(&[1.0, 0.0], 3).unwrap().is_empty());
    }
}
