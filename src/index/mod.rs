//! Index implementations and the compiled-index abstraction.
//!
//! An index is built from a frozen set of (vector, chunk id) pairs and
//! answers top-k queries with ranking scores per [`crate::metric`]. The
//! three kinds are tagged variants behind [`CompiledIndex`]; adding a kind
//! means extending the enum and the (metric × kind) support table.

pub mod kdtree;
pub mod linear;
pub mod lsh;
pub mod registry;

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::metric::{self, Metric};

use kdtree::KdTreeIndex;
use linear::LinearIndex;
use lsh::LshIndex;

/// Index algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Linear,
    KdTree,
    Lsh,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Linear => "linear",
            IndexKind::KdTree => "kdtree",
            IndexKind::Lsh => "lsh",
        }
    }

    /// Parse an algorithm name as it appears in config and API payloads.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(IndexKind::Linear),
            "kdtree" => Ok(IndexKind::KdTree),
            "lsh" => Ok(IndexKind::Lsh),
            other => Err(Error::InvalidArgument(format!(
                "unknown index algorithm: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// (metric × kind) support table. Linear handles both metrics, the kd-tree
/// prunes on euclidean geometry only, and random-hyperplane LSH approximates
/// angular similarity only.
pub fn supports(kind: IndexKind, metric: Metric) -> bool {
    matches!(
        (kind, metric),
        (IndexKind::Linear, _)
            | (IndexKind::KdTree, Metric::Euclidean)
            | (IndexKind::Lsh, Metric::Cosine)
    )
}

/// Ensure the pairing is supported, or fail with the typed error.
pub fn check_supported(kind: IndexKind, metric: Metric) -> Result<()> {
    if supports(kind, metric) {
        Ok(())
    } else {
        Err(Error::UnsupportedMetric {
            algorithm: kind.as_str(),
            metric: metric.as_str(),
        })
    }
}

/// Tunables for the LSH index, taken from config at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LshParams {
    /// Number of hash tables (`L` in the literature).
    pub num_tables: usize,
    /// Number of hyperplanes per table (`K` in the literature, signature bits).
    pub num_planes: usize,
}

impl Default for LshParams {
    fn default() -> Self {
        Self {
            num_tables: crate::constants::DEFAULT_LSH_NUM_TABLES,
            num_planes: crate::constants::DEFAULT_LSH_NUM_PLANES,
        }
    }
}

/// A frozen set of vectors in a flat buffer: vector `i` occupies
/// `data[i * dim .. (i + 1) * dim]`, with `ids[i]` its chunk id. The flat
/// layout keeps the scan loop walking contiguous memory.
#[derive(Debug, Clone)]
pub struct VectorSet {
    dim: usize,
    data: Vec<f32>,
    ids: Vec<Uuid>,
}

impl VectorSet {
    /// Assemble a set from parallel (embedding, id) sequences.
    ///
    /// Fails with `DimensionMismatch` if any vector disagrees with the
    /// first one's length. An empty input yields a set with `dim == 0`.
    pub fn new(vectors: &[(&[f32], Uuid)]) -> Result<Self> {
        let dim = vectors.first().map(|(v, _)| v.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(dim * vectors.len());
        let mut ids = Vec::with_capacity(vectors.len());
        for (vector, id) in vectors {
            if vector.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    got: vector.len(),
                });
            }
            data.extend_from_slice(vector);
            ids.push(*id);
        }
        Ok(Self { dim, data, ids })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn id(&self, row: usize) -> Uuid {
        self.ids[row]
    }

    pub fn vector(&self, row: usize) -> &[f32] {
        &self.data[row * self.dim..(row + 1) * self.dim]
    }

    pub fn rows(&self) -> impl Iterator<Item = (usize, &[f32])> {
        self.data.chunks_exact(self.dim.max(1)).enumerate()
    }

    /// Reject the query vector if its length disagrees with the set.
    /// Empty sets accept any query (there is no established dimension).
    pub fn check_query(&self, q: &[f32]) -> Result<()> {
        if !self.is_empty() && q.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                got: q.len(),
            });
        }
        Ok(())
    }

    /// Row index of every zero-norm vector, used to reject cosine builds.
    pub fn first_zero_norm(&self) -> Option<usize> {
        (0..self.len()).find(|row| metric::is_zero_norm(self.vector(*row)))
    }
}

/// One scored result: ranking score (higher is closer) plus the chunk id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub id: Uuid,
    pub score: f32,
}

/// Total order for hits: by score, then by id *descending*, so that the
/// "greater" hit is the one ranked earlier (higher score, or equal score
/// and lexicographically smaller id).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Ranked(Hit);

impl Eq for Ranked {}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .score
            .total_cmp(&other.0.score)
            .then_with(|| other.0.id.cmp(&self.0.id))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Select the top-k hits from a scored stream using a bounded min-heap:
/// O(N log k), and the returned vector is in final ranking order.
pub(crate) fn select_top_k(hits: impl Iterator<Item = Hit>, k: usize) -> Vec<Hit> {
    use std::cmp::Reverse;

    let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(k + 1);
    for hit in hits {
        if heap.len() < k {
            heap.push(Reverse(Ranked(hit)));
        } else if let Some(Reverse(worst)) = heap.peek() {
            if Ranked(hit) > *worst {
                heap.pop();
                heap.push(Reverse(Ranked(hit)));
            }
        }
    }
    let mut out: Vec<Hit> = heap.into_iter().map(|Reverse(r)| r.0).collect();
    out.sort_by(|a, b| Ranked(*b).cmp(&Ranked(*a)));
    out
}

/// A built index for one library: the algorithm-specific structure plus the
/// frozen position → chunk id mapping inside its [`VectorSet`].
#[derive(Debug)]
pub struct CompiledIndex {
    kind: IndexKind,
    metric: Metric,
    backend: Backend,
}

#[derive(Debug)]
enum Backend {
    Linear(LinearIndex),
    KdTree(KdTreeIndex),
    Lsh(LshIndex),
}

impl CompiledIndex {
    /// Build an index over the given vectors.
    ///
    /// Fails with `UnsupportedMetric` for pairings outside the support
    /// table, `DimensionMismatch` for ragged input, and `InvalidVector`
    /// when a zero-norm vector shows up under cosine.
    pub fn build(
        kind: IndexKind,
        metric: Metric,
        set: VectorSet,
        lsh_params: LshParams,
        seed: u64,
    ) -> Result<Self> {
        check_supported(kind, metric)?;
        if metric == Metric::Cosine {
            if let Some(row) = set.first_zero_norm() {
                return Err(Error::InvalidVector(format!(
                    "chunk {} has a zero-norm embedding, which cosine cannot rank",
                    set.id(row)
                )));
            }
        }
        let backend = match kind {
            IndexKind::Linear => Backend::Linear(LinearIndex::build(set, metric)),
            IndexKind::KdTree => Backend::KdTree(KdTreeIndex::build(set)),
            IndexKind::Lsh => Backend::Lsh(LshIndex::build(set, lsh_params, seed)?),
        };
        Ok(Self {
            kind,
            metric,
            backend,
        })
    }

    /// Top-k query. Results are in ranking order, at most min(k, N) long.
    pub fn query(&self, q: &[f32], k: usize) -> Result<Vec<Hit>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be positive".into()));
        }
        if self.metric == Metric::Cosine && metric::is_zero_norm(q) {
            return Err(Error::InvalidVector(
                "query vector has zero norm, which cosine cannot rank".into(),
            ));
        }
        match &self.backend {
            Backend::Linear(index) => index.query(q, k),
            Backend::KdTree(index) => index.query(q, k),
            Backend::Lsh(index) => index.query(q, k),
        }
    }

    /// Number of indexed vectors.
    pub fn size(&self) -> usize {
        self.set().len()
    }

    /// Dimensionality of the indexed vectors (0 when empty).
    pub fn dimension(&self) -> usize {
        self.set().dim()
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    fn set(&self) -> &VectorSet {
        match &self.backend {
            Backend::Linear(index) => index.set(),
            Backend::KdTree(index) => index.set(),
            Backend::Lsh(index) => index.set(),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_set(vectors: &[(Vec<f32>, Uuid)]) -> VectorSet {
    let borrowed: Vec<(&[f32], Uuid)> = vectors
        .iter()
        .map(|(v, id)| (v.as_slice(), *id))
        .collect();
    VectorSet::new(&borrowed).unwrap()
}
