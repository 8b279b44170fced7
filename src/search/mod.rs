//! Search pipeline: compiled index → chunk resolution → metadata filter.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::constants::SEARCH_OVERFETCH;
use crate::error::{Error, Result};
use crate::index::registry::IndexRegistry;
use crate::model::{Chunk, Metadata};
use crate::store::Repository;

/// Metadata predicate: every key must be present on the chunk, with the
/// chunk's value equal to the expected scalar or contained in the expected
/// array.
pub type MetadataFilter = Metadata;

/// One search result, carrying a snapshot of the chunk as it was when the
/// query ran.
#[derive(Debug, Clone)]
pub struct SearchMatch {
    pub chunk_id: Uuid,
    pub score: f32,
    pub chunk: Chunk,
}

pub struct SearchService {
    repo: Arc<Repository>,
    registry: Arc<IndexRegistry>,
}

impl SearchService {
    pub fn new(repo: Arc<Repository>, registry: Arc<IndexRegistry>) -> Self {
        Self { repo, registry }
    }

    /// Top-k search over one library.
    ///
    /// With a filter present the index is overfetched by
    /// [`SEARCH_OVERFETCH`] so the predicate has slack; if fewer than k
    /// candidates survive, the result is simply shorter — there is no
    /// escalation to a full scan.
    pub fn search(
        &self,
        library_id: Uuid,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchMatch>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be positive".into()));
        }
        if let Some(filter) = filter {
            validate_filter(filter)?;
        }
        self.repo.with_library_read(library_id, |state| {
            let index = self.registry.get_or_build(library_id, state)?;
            let fetch = match filter {
                None => k,
                Some(_) => k
                    .saturating_mul(SEARCH_OVERFETCH)
                    .min(state.chunks.len())
                    .max(k),
            };
            let hits = index.query(query, fetch)?;
            let mut matches = Vec::with_capacity(k.min(hits.len()));
            for hit in hits {
                // Under the lock discipline every returned id resolves, but
                // a missing id must not take the whole query down.
                let Some(chunk) = state.chunks.get(&hit.id) else {
                    continue;
                };
                if let Some(filter) = filter {
                    if !metadata_matches(&chunk.metadata, filter) {
                        continue;
                    }
                }
                matches.push(SearchMatch {
                    chunk_id: hit.id,
                    score: hit.score,
                    chunk: chunk.clone(),
                });
                if matches.len() == k {
                    break;
                }
            }
            Ok(matches)
        })
    }
}

/// Filters accept scalars and arrays; nested objects have no defined
/// matching semantics and are rejected up front.
fn validate_filter(filter: &MetadataFilter) -> Result<()> {
    for (key, expected) in filter {
        if expected.is_object() {
            return Err(Error::InvalidArgument(format!(
                "metadata filter value for {key:?} must be a scalar or an array"
            )));
        }
    }
    Ok(())
}

fn metadata_matches(metadata: &Metadata, filter: &MetadataFilter) -> bool {
    filter.iter().all(|(key, expected)| {
        metadata.get(key).is_some_and(|actual| match expected {
            Value::Array(set) => set.contains(actual),
            scalar => actual == scalar,
        })
    })
}
