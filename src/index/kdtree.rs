//! Median-split KD-tree index (euclidean only).
//!
//! Build partitions rows by the lower median along `axis = depth % dim`,
//! sorting equal keys by chunk id so the earlier id lands in the left
//! subtree. The tree is balanced by construction, and the node arena keeps
//! all structure in two flat vectors.
//!
//! Query is a best-first bounded search over a size-k max-heap of the
//! current nearest rows. Worst case degenerates to O(N) under adversarial
//! distributions, which is acceptable for this store's collection sizes.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use uuid::Uuid;

use crate::error::Result;
use crate::metric::squared_euclidean;

use super::{Hit, VectorSet};

#[derive(Debug)]
struct Node {
    row: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

#[derive(Debug)]
pub struct KdTreeIndex {
    set: VectorSet,
    nodes: Vec<Node>,
    root: Option<usize>,
}

/// Heap entry during search. Orders by distance, then id, so the heap's
/// maximum is the worst of the current k nearest and equal-distance ties
/// resolve toward the smaller chunk id.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Neighbor {
    dist2: f32,
    id: Uuid,
}

impl Eq for Neighbor {}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist2
            .total_cmp(&other.dist2)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl KdTreeIndex {
    pub fn build(set: VectorSet) -> Self {
        let mut nodes = Vec::with_capacity(set.len());
        let mut rows: Vec<usize> = (0..set.len()).collect();
        let root = Self::build_subtree(&set, &mut rows, 0, &mut nodes);
        Self { set, nodes, root }
    }

    fn build_subtree(
        set: &VectorSet,
        rows: &mut [usize],
        depth: usize,
        nodes: &mut Vec<Node>,
    ) -> Option<usize> {
        if rows.is_empty() {
            return None;
        }
        let axis = depth % set.dim().max(1);
        // Lower median; equal keys sort by id so the earlier id goes left.
        rows.sort_by(|a, b| {
            set.vector(*a)[axis]
                .total_cmp(&set.vector(*b)[axis])
                .then_with(|| set.id(*a).cmp(&set.id(*b)))
        });
        let mid = (rows.len() - 1) / 2;
        let row = rows[mid];
        let (left_rows, rest) = rows.split_at_mut(mid);
        let right_rows = &mut rest[1..];
        let left = Self::build_subtree(set, left_rows, depth + 1, nodes);
        let right = Self::build_subtree(set, right_rows, depth + 1, nodes);
        nodes.push(Node {
            row,
            axis,
            left,
            right,
        });
        Some(nodes.len() - 1)
    }

    pub fn query(&self, q: &[f32], k: usize) -> Result<Vec<Hit>> {
        self.set.check_query(q)?;
        let mut heap: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(k + 1);
        if let Some(root) = self.root {
            self.search(root, q, k, &mut heap);
        }
        let mut nearest: Vec<Neighbor> = heap.into_vec();
        nearest.sort();
        Ok(nearest
            .into_iter()
            .map(|n| Hit {
                id: n.id,
                score: -n.dist2.sqrt(),
            })
            .collect())
    }

    fn search(&self, node_idx: usize, q: &[f32], k: usize, heap: &mut BinaryHeap<Neighbor>) {
        let node = &self.nodes[node_idx];
        let point = self.set.vector(node.row);
        let candidate = Neighbor {
            dist2: squared_euclidean(q, point),
            id: self.set.id(node.row),
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if let Some(worst) = heap.peek() {
            if candidate < *worst {
                heap.pop();
                heap.push(candidate);
            }
        }

        let diff = q[node.axis] - point[node.axis];
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };
        if let Some(near) = near {
            self.search(near, q, k, heap);
        }
        // The far side only holds points at least `diff²` away. `<=` rather
        // than `<` keeps an equal-distance point with a smaller id eligible,
        // so results match the linear scan exactly even on ties.
        let plane_dist2 = diff * diff;
        let must_visit = heap.len() < k
            || heap
                .peek()
                .map(|worst| plane_dist2 <= worst.dist2)
                .unwrap_or(true);
        if must_visit {
            if let Some(far) = far {
                self.search(far, q, k, heap);
            }
        }
    }

    pub fn set(&self) -> &VectorSet {
        &self.set
    }
}
