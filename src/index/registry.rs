//! Per-library compiled index cache.
//!
//! The registry holds derived state only: every entry can be rebuilt from
//! the repository, and any mutation to a library's chunk set evicts its
//! entry (via the repository's invalidation sink) before the mutation
//! returns. Builds are single-flight per library: the first caller installs
//! a latch and builds, later callers wait on the latch and then re-check
//! the cache.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::metric::Metric;
use crate::store::LibraryState;

use super::{check_supported, CompiledIndex, IndexKind, LshParams, VectorSet};

/// Desired (algorithm, metric) pairing for one library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub algorithm: IndexKind,
    pub metric: Metric,
}

/// Introspection view of a library's index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexDescription {
    pub algorithm: IndexKind,
    pub metric: Metric,
    pub size: usize,
    pub dimension: usize,
    pub built: bool,
}

/// Latch tracking one in-flight build. Followers block on `wait` until the
/// leader releases, then re-check the registry.
struct BuildLatch {
    done: Mutex<bool>,
    cv: Condvar,
}

impl BuildLatch {
    fn new() -> Self {
        Self {
            done: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        while !*done {
            done = self.cv.wait(done).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn release(&self) {
        *self.done.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cv.notify_all();
    }
}

enum Role {
    Leader(Arc<BuildLatch>),
    Follower(Arc<BuildLatch>),
}

pub struct IndexRegistry {
    /// Explicitly configured pairings. Libraries absent here fall back to
    /// the process defaults.
    configs: DashMap<Uuid, IndexConfig>,
    entries: DashMap<Uuid, Arc<CompiledIndex>>,
    builds: Mutex<HashMap<Uuid, Arc<BuildLatch>>>,
    defaults: IndexConfig,
    lsh_params: LshParams,
}

impl IndexRegistry {
    pub fn new(defaults: IndexConfig, lsh_params: LshParams) -> Self {
        Self {
            configs: DashMap::new(),
            entries: DashMap::new(),
            builds: Mutex::new(HashMap::new()),
            defaults,
            lsh_params,
        }
    }

    /// Record the desired pairing for a library, evicting any compiled
    /// entry. The pairing is validated eagerly so a broken choice is
    /// reported at configure time, not at the next search.
    pub fn configure(&self, library_id: Uuid, config: IndexConfig) -> Result<()> {
        check_supported(config.algorithm, config.metric)?;
        self.configs.insert(library_id, config);
        self.entries.remove(&library_id);
        debug!(library = %library_id, algorithm = %config.algorithm, metric = %config.metric, "index configured");
        Ok(())
    }

    /// The pairing in effect for a library.
    pub fn config_for(&self, library_id: Uuid) -> IndexConfig {
        self.configs
            .get(&library_id)
            .map(|entry| *entry.value())
            .unwrap_or(self.defaults)
    }

    /// The explicitly configured pairing, if any (snapshots persist only
    /// explicit choices).
    pub fn configured(&self, library_id: Uuid) -> Option<IndexConfig> {
        self.configs.get(&library_id).map(|entry| *entry.value())
    }

    /// Drop a library's compiled entry. Idempotent.
    pub fn invalidate(&self, library_id: Uuid) {
        if self.entries.remove(&library_id).is_some() {
            debug!(library = %library_id, "index invalidated");
        }
    }

    /// Forget a library entirely (entry and configuration).
    pub fn forget(&self, library_id: Uuid) {
        self.configs.remove(&library_id);
        self.entries.remove(&library_id);
    }

    /// Fetch the library's compiled index, building it on demand.
    ///
    /// Callers hold the library's read lock (the registry reads the chunk
    /// map through `state`), which also means no invalidation can interleave
    /// between the vector snapshot and the publish below: invalidations only
    /// fire under the library's write lock.
    pub(crate) fn get_or_build(
        &self,
        library_id: Uuid,
        state: &LibraryState,
    ) -> Result<Arc<CompiledIndex>> {
        loop {
            if let Some(entry) = self.entries.get(&library_id) {
                return Ok(entry.value().clone());
            }
            let role = {
                let mut builds = self.builds.lock().unwrap_or_else(PoisonError::into_inner);
                match builds.get(&library_id) {
                    Some(latch) => Role::Follower(latch.clone()),
                    None => {
                        let latch = Arc::new(BuildLatch::new());
                        builds.insert(library_id, latch.clone());
                        Role::Leader(latch)
                    }
                }
            };
            match role {
                Role::Leader(latch) => {
                    let result = self.build_for(library_id, state);
                    if let Ok(index) = &result {
                        self.entries.insert(library_id, index.clone());
                    }
                    self.builds
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&library_id);
                    latch.release();
                    return result;
                }
                Role::Follower(latch) => latch.wait(),
            }
        }
    }

    /// Introspection: compiled figures when an entry exists, configured
    /// figures plus repository counts otherwise.
    pub(crate) fn describe(&self, library_id: Uuid, state: &LibraryState) -> IndexDescription {
        if let Some(entry) = self.entries.get(&library_id) {
            let index = entry.value();
            return IndexDescription {
                algorithm: index.kind(),
                metric: index.metric(),
                size: index.size(),
                dimension: index.dimension(),
                built: true,
            };
        }
        let config = self.config_for(library_id);
        IndexDescription {
            algorithm: config.algorithm,
            metric: config.metric,
            size: state.chunks.len(),
            dimension: state.dimension.unwrap_or(0),
            built: false,
        }
    }

    /// Replace all registry contents at once (snapshot restore).
    pub(crate) fn replace_all(
        &self,
        configs: Vec<(Uuid, IndexConfig)>,
        entries: Vec<(Uuid, Arc<CompiledIndex>)>,
    ) {
        self.configs.clear();
        self.entries.clear();
        for (library_id, config) in configs {
            self.configs.insert(library_id, config);
        }
        for (library_id, entry) in entries {
            self.entries.insert(library_id, entry);
        }
    }

    fn build_for(&self, library_id: Uuid, state: &LibraryState) -> Result<Arc<CompiledIndex>> {
        let config = self.config_for(library_id);
        let index = build_index(library_id, config, self.lsh_params, state)?;
        debug!(
            library = %library_id,
            algorithm = %config.algorithm,
            size = index.size(),
            "index built"
        );
        Ok(Arc::new(index))
    }
}

/// Build a compiled index for a library's current chunks. Rows enter the
/// index in chunk-id order so rebuilds are deterministic.
pub(crate) fn build_index(
    library_id: Uuid,
    config: IndexConfig,
    lsh_params: LshParams,
    state: &LibraryState,
) -> Result<CompiledIndex> {
    let mut chunks: Vec<_> = state.chunks.values().collect();
    chunks.sort_by_key(|c| c.id);
    let vectors: Vec<(&[f32], Uuid)> = chunks
        .iter()
        .map(|c| (c.embedding.as_slice(), c.id))
        .collect();
    let set = VectorSet::new(&vectors)?;
    let seed = derive_seed(library_id, config, lsh_params);
    CompiledIndex::build(config.algorithm, config.metric, set, lsh_params, seed)
}

/// Deterministic build seed from the library id and configuration, so a
/// rebuild over unchanged inputs reproduces the same LSH tables.
fn derive_seed(library_id: Uuid, config: IndexConfig, lsh_params: LshParams) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(library_id.as_bytes());
    hasher.update(config.algorithm.as_str().as_bytes());
    hasher.update(config.metric.as_str().as_bytes());
    hasher.update((lsh_params.num_tables as u64).to_le_bytes());
    hasher.update((lsh_params.num_planes as u64).to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
