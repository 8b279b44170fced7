//! Snapshot persistence: point-in-time JSON copies of the repository.
//!
//! One file per snapshot under the data directory, written with the
//! write-then-rename pattern (`{id}.tmp` → fsync → `{id}.json`) so a crash
//! can never leave a half-written snapshot behind. Restore stages the
//! loaded state, pre-builds every configured index from the staged data,
//! and only then swaps it in — a corrupt file leaves the process untouched.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::constants::{SNAPSHOT_FILE_EXT, SNAPSHOT_FORMAT_VERSION, SNAPSHOT_TMP_EXT};
use crate::error::{Error, Result};
use crate::index::registry::{build_index, IndexConfig, IndexRegistry};
use crate::index::{CompiledIndex, LshParams};
use crate::model::{Chunk, Document, Library, Metadata};
use crate::store::{Catalog, LibraryContents, Repository};

/// Header metadata for a stored snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    format_version: u32,
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    libraries: Vec<SnapshotLibrary>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotLibrary {
    id: Uuid,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    metadata: Metadata,
    documents: Vec<SnapshotDocument>,
    /// Index configuration (algorithm + metric only); internals are
    /// recomputed on restore.
    index: Option<IndexConfig>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotDocument {
    id: Uuid,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    metadata: Metadata,
    chunks: Vec<SnapshotChunk>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotChunk {
    id: Uuid,
    text: String,
    embedding: Vec<f32>,
    #[serde(default)]
    metadata: Metadata,
}

pub struct SnapshotStore {
    data_dir: PathBuf,
    lsh_params: LshParams,
    /// Serializes snapshot operations so two creates cannot race the name
    /// uniqueness check and restore cannot overlap with create.
    ops: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(data_dir: impl Into<PathBuf>, lsh_params: LshParams) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            lsh_params,
            ops: Mutex::new(()),
        })
    }

    /// Persist a point-in-time copy of every library, document, and chunk,
    /// plus each library's explicit index configuration.
    pub fn create(
        &self,
        name: &str,
        repo: &Repository,
        registry: &IndexRegistry,
    ) -> Result<SnapshotInfo> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("snapshot name must not be empty".into()));
        }
        let _ops = self.ops.lock().unwrap_or_else(PoisonError::into_inner);
        if self.list()?.iter().any(|info| info.name == name) {
            return Err(Error::AlreadyExists(format!("snapshot named {name:?}")));
        }

        // export_contents holds the global read lock plus every library's
        // read lock while cloning, which is the point-in-time view; the
        // serialization below works on the clone.
        let contents = repo.export_contents();
        let libraries = contents
            .into_iter()
            .map(|entry| to_snapshot_library(entry, registry))
            .collect();

        let file = SnapshotFile {
            format_version: SNAPSHOT_FORMAT_VERSION,
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
            libraries,
        };

        let bytes = serde_json::to_vec(&file)
            .map_err(|e| Error::Internal(format!("snapshot serialization failed: {e}")))?;
        let tmp_path = self.tmp_path(file.id);
        let final_path = self.snapshot_path(file.id);
        {
            let mut out = File::create(&tmp_path)?;
            out.write_all(&bytes)?;
            out.sync_all()?;
        }
        fs::rename(&tmp_path, &final_path)?;

        info!(snapshot = %file.id, name = %file.name, bytes = bytes.len(), "📦 snapshot created");
        Ok(SnapshotInfo {
            id: file.id,
            name: file.name,
            created_at: file.created_at,
            size_bytes: bytes.len() as u64,
        })
    }

    /// Enumerate stored snapshots, oldest first. Files that fail to parse
    /// are skipped with a warning rather than failing the listing.
    pub fn list(&self) -> Result<Vec<SnapshotInfo>> {
        let mut infos = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_FILE_EXT) {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            else {
                continue;
            };
            match self.load_file(id, &path) {
                Ok((file, size_bytes)) => infos.push(SnapshotInfo {
                    id: file.id,
                    name: file.name,
                    created_at: file.created_at,
                    size_bytes,
                }),
                Err(e) => warn!(path = %path.display(), "skipping unreadable snapshot: {e}"),
            }
        }
        infos.sort_by_key(|info| info.created_at);
        Ok(infos)
    }

    /// Header metadata for one snapshot.
    pub fn get(&self, id: Uuid) -> Result<SnapshotInfo> {
        let path = self.snapshot_path(id);
        let (file, size_bytes) = self.load_file(id, &path)?;
        Ok(SnapshotInfo {
            id: file.id,
            name: file.name,
            created_at: file.created_at,
            size_bytes,
        })
    }

    /// Replace the entire repository and registry state with a snapshot's
    /// contents. All-or-nothing: the staged catalog and every configured
    /// index are built before the swap, so failure leaves the previous
    /// state intact.
    pub fn restore(
        &self,
        id: Uuid,
        repo: &Repository,
        registry: &IndexRegistry,
    ) -> Result<()> {
        let _ops = self.ops.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.snapshot_path(id);
        let (file, _) = self.load_file(id, &path)?;

        let mut contents = Vec::with_capacity(file.libraries.len());
        let mut index_configs = Vec::new();
        for library in file.libraries {
            if let Some(config) = library.index {
                index_configs.push((library.id, config));
            }
            contents.push(from_snapshot_library(library));
        }
        let staged = Catalog::from_contents(contents)?;

        let mut prebuilt: Vec<(Uuid, Arc<CompiledIndex>)> = Vec::new();
        for (library_id, config) in &index_configs {
            let built = staged
                .with_state(*library_id, |state| {
                    build_index(*library_id, *config, self.lsh_params, state)
                })
                .ok_or_else(|| {
                    Error::Internal(format!("staged library {library_id} vanished"))
                })?
                .map_err(|e| {
                    Error::SnapshotCorrupt(format!(
                        "index for library {library_id} cannot be built: {e}"
                    ))
                })?;
            prebuilt.push((*library_id, Arc::new(built)));
        }

        repo.install(staged, || registry.replace_all(index_configs, prebuilt));
        info!(snapshot = %id, "✅ snapshot restored");
        Ok(())
    }

    /// Remove a snapshot file. Idempotent on missing files.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        let _ops = self.ops.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(self.snapshot_path(id)) {
            Ok(()) => {
                debug!(snapshot = %id, "snapshot deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load_file(&self, id: Uuid, path: &Path) -> Result<(SnapshotFile, u64)> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("snapshot {id}")));
            }
            Err(e) => return Err(e.into()),
        };
        let file: SnapshotFile = serde_json::from_slice(&bytes)
            .map_err(|e| Error::SnapshotCorrupt(format!("snapshot {id} failed to parse: {e}")))?;
        if file.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(Error::SnapshotCorrupt(format!(
                "snapshot {id} has format_version {}, expected {SNAPSHOT_FORMAT_VERSION}",
                file.format_version
            )));
        }
        Ok((file, bytes.len() as u64))
    }

    fn snapshot_path(&self, id: Uuid) -> PathBuf {
        self.data_dir.join(format!("{id}.{SNAPSHOT_FILE_EXT}"))
    }

    fn tmp_path(&self, id: Uuid) -> PathBuf {
        self.data_dir.join(format!("{id}.{SNAPSHOT_TMP_EXT}"))
    }
}

fn to_snapshot_library(entry: LibraryContents, registry: &IndexRegistry) -> SnapshotLibrary {
    let LibraryContents {
        library,
        documents,
        chunks,
    } = entry;
    let documents = documents
        .into_iter()
        .map(|document| {
            let chunks = chunks
                .iter()
                .filter(|chunk| chunk.document_id == document.id)
                .map(|chunk| SnapshotChunk {
                    id: chunk.id,
                    text: chunk.text.clone(),
                    embedding: chunk.embedding.clone(),
                    metadata: chunk.metadata.clone(),
                })
                .collect();
            SnapshotDocument {
                id: document.id,
                title: document.title,
                description: document.description,
                metadata: document.metadata,
                chunks,
            }
        })
        .collect();
    SnapshotLibrary {
        index: registry.configured(library.id),
        id: library.id,
        name: library.name,
        description: library.description,
        metadata: library.metadata,
        documents,
    }
}

fn from_snapshot_library(library: SnapshotLibrary) -> LibraryContents {
    let mut documents = Vec::with_capacity(library.documents.len());
    let mut chunks = Vec::new();
    for document in library.documents {
        for chunk in document.chunks {
            chunks.push(Chunk {
                id: chunk.id,
                document_id: document.id,
                library_id: library.id,
                text: chunk.text,
                embedding: chunk.embedding,
                metadata: chunk.metadata,
            });
        }
        documents.push(Document {
            id: document.id,
            library_id: library.id,
            title: document.title,
            description: document.description,
            metadata: document.metadata,
        });
    }
    LibraryContents {
        library: Library {
            id: library.id,
            name: library.name,
            description: library.description,
            metadata: library.metadata,
        },
        documents,
        chunks,
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::index::IndexKind;
    use crate::metric::Metric;

    fn wired() -> (Arc<Repository>, Arc<IndexRegistry>) {
        let registry = Arc::new(IndexRegistry::new(
            IndexConfig {
                algorithm: IndexKind::Linear,
                metric: Metric::Cosine,
            },
            LshParams::default(),
        ));
        let sink = registry.clone();
        let repo = Arc::new(Repository::new(Arc::new(move |id| sink.invalidate(id))));
        (repo, registry)
    }

    fn seeded(repo: &Repository) -> (Uuid, Uuid) {
        let lib = repo.create_library("lib", None, Metadata::new()).unwrap();
        let doc = repo
            .create_document(lib.id, "doc", None, Metadata::new())
            .unwrap();
        repo.create_chunk(lib.id, doc.id, "alpha".into(), vec![1.0, 0.0], Metadata::new())
            .unwrap();
        repo.create_chunk(lib.id, doc.id, "beta".into(), vec![0.0, 1.0], Metadata::new())
            .unwrap();
        (lib.id, doc.id)
    }

    #[test]
    fn create_restore_round_trip() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), LshParams::default()).unwrap();
        let (repo, registry) = wired();
        let (lib_id, doc_id) = seeded(&repo);
        registry
            .configure(
                lib_id,
                IndexConfig {
                    algorithm: IndexKind::Linear,
                    metric: Metric::Cosine,
                },
            )
            .unwrap();

        let before_chunks = repo.list_chunks(lib_id, None).unwrap();
        let info = store.create("baseline", &repo, &registry).unwrap();
        assert!(info.size_bytes > 0);

        // Mutate after the snapshot: add a chunk and drop the document.
        repo.create_chunk(lib_id, doc_id, "gamma".into(), vec![0.5, 0.5], Metadata::new())
            .unwrap();
        repo.delete_document(lib_id, doc_id).unwrap();
        assert!(repo.list_chunks(lib_id, None).unwrap().is_empty());

        store.restore(info.id, &repo, &registry).unwrap();
        assert_eq!(repo.list_chunks(lib_id, None).unwrap(), before_chunks);
        assert_eq!(
            registry.configured(lib_id).unwrap().algorithm,
            IndexKind::Linear
        );
        // The configured index was rebuilt eagerly during restore.
        repo.with_library_read(lib_id, |state| {
            let description = registry.describe(lib_id, state);
            assert!(description.built);
            assert_eq!(description.size, 2);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn snapshot_names_are_unique() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), LshParams::default()).unwrap();
        let (repo, registry) = wired();
        store.create("baseline", &repo, &registry).unwrap();
        assert_eq!(
            store
                .create("baseline", &repo, &registry)
                .unwrap_err()
                .code(),
            "already_exists"
        );
    }

    #[test]
    fn restore_of_corrupt_file_leaves_state_intact() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), LshParams::default()).unwrap();
        let (repo, registry) = wired();
        let (lib_id, _) = seeded(&repo);
        let info = store.create("baseline", &repo, &registry).unwrap();

        fs::write(
            dir.path().join(format!("{}.json", info.id)),
            b"{\"format_version\":1,",
        )
        .unwrap();

        let err = store.restore(info.id, &repo, &registry).unwrap_err();
        assert_eq!(err.code(), "snapshot_corrupt");
        assert_eq!(repo.list_chunks(lib_id, None).unwrap().len(), 2);
    }

    #[test]
    fn unknown_format_version_is_corrupt() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), LshParams::default()).unwrap();
        let id = Uuid::new_v4();
        fs::write(
            dir.path().join(format!("{id}.json")),
            serde_json::json!({
                "format_version": 99,
                "id": id,
                "name": "future",
                "created_at": Utc::now(),
                "libraries": []
            })
            .to_string(),
        )
        .unwrap();
        assert_eq!(store.get(id).unwrap_err().code(), "snapshot_corrupt");
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), LshParams::default()).unwrap();
        let id = Uuid::new_v4();
        store.delete(id).unwrap();
        store.delete(id).unwrap();
    }

    #[test]
    fn list_skips_foreign_files() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), LshParams::default()).unwrap();
        let (repo, registry) = wired();
        fs::write(dir.path().join("notes.txt"), "not a snapshot").unwrap();
        fs::write(dir.path().join("broken.json"), "not json").unwrap();
        store.create("baseline", &repo, &registry).unwrap();
        let infos = store.list().unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].name, "baseline");
    }

    #[test]
    fn missing_snapshot_is_not_found() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), LshParams::default()).unwrap();
        assert_eq!(store.get(Uuid::new_v4()).unwrap_err().code(), "not_found");
    }
}
