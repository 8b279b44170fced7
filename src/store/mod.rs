//! In-memory repository for the library → document → chunk hierarchy.
//!
//! All state lives in a catalog guarded by a process-wide writer-priority
//! lock, with one more lock per library. Every operation acquires the
//! global lock first (read for everything except library create/delete and
//! full-state replacement) and then at most one per-library lock, which
//! keeps the discipline deadlock-free.
//!
//! Mutations that change a library's chunk set (or an embedding) emit an
//! invalidation event through the sink installed at construction, inside
//! the write-lock scope, so the index cache is never visible stale.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{
    Chunk, ChunkPatch, Document, DocumentPatch, Library, LibraryPatch, Metadata,
};
use crate::sync::RwLock;

/// Callback fired (under the library's write lock) whenever a library's
/// chunk set or an embedding changes. The index registry hangs off this.
pub type InvalidationSink = Arc<dyn Fn(Uuid) + Send + Sync>;

/// Per-library state: the record itself plus its documents and chunks.
/// Chunks are keyed directly by id for O(1) lookup and grouped per
/// document for cascading deletes and scoped listings.
pub(crate) struct LibraryState {
    pub library: Library,
    pub documents: HashMap<Uuid, Document>,
    pub chunks: HashMap<Uuid, Chunk>,
    pub doc_chunks: HashMap<Uuid, BTreeSet<Uuid>>,
    /// Embedding dimension, fixed by the first chunk and cleared when the
    /// last chunk is deleted.
    pub dimension: Option<usize>,
}

impl LibraryState {
    fn new(library: Library) -> Self {
        Self {
            library,
            documents: HashMap::new(),
            chunks: HashMap::new(),
            doc_chunks: HashMap::new(),
            dimension: None,
        }
    }
}

pub(crate) struct LibraryCell {
    pub id: Uuid,
    pub state: RwLock<LibraryState>,
}

/// The set of libraries, plus a name → id map enforcing name uniqueness.
#[derive(Default)]
pub(crate) struct Catalog {
    cells: HashMap<Uuid, Arc<LibraryCell>>,
    names: HashMap<String, Uuid>,
}

impl Catalog {
    fn cell(&self, id: Uuid) -> Result<Arc<LibraryCell>> {
        self.cells
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("library {id}")))
    }

    /// Read one staged library's state. The catalog is private to the
    /// caller at this point, so the lock is uncontended.
    pub(crate) fn with_state<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&LibraryState) -> R,
    ) -> Option<R> {
        let cell = self.cells.get(&id)?;
        let state = cell.state.read();
        Some(f(&state))
    }

    /// Rebuild a catalog from exported contents, re-checking every
    /// hierarchical invariant. Used by snapshot restore to stage state.
    pub(crate) fn from_contents(contents: Vec<LibraryContents>) -> Result<Self> {
        let mut catalog = Catalog::default();
        for entry in contents {
            let lib_id = entry.library.id;
            if entry.library.name.is_empty() {
                return Err(Error::SnapshotCorrupt(format!(
                    "library {lib_id} has an empty name"
                )));
            }
            if catalog
                .names
                .insert(entry.library.name.clone(), lib_id)
                .is_some()
            {
                return Err(Error::SnapshotCorrupt(format!(
                    "duplicate library name {:?}",
                    entry.library.name
                )));
            }
            let mut state = LibraryState::new(entry.library);
            for document in entry.documents {
                if document.library_id != lib_id {
                    return Err(Error::SnapshotCorrupt(format!(
                        "document {} does not belong to library {lib_id}",
                        document.id
                    )));
                }
                state.doc_chunks.insert(document.id, BTreeSet::new());
                state.documents.insert(document.id, document);
            }
            for chunk in entry.chunks {
                if chunk.library_id != lib_id {
                    return Err(Error::SnapshotCorrupt(format!(
                        "chunk {} does not belong to library {lib_id}",
                        chunk.id
                    )));
                }
                let members = state.doc_chunks.get_mut(&chunk.document_id).ok_or_else(|| {
                    Error::SnapshotCorrupt(format!(
                        "chunk {} references missing document {}",
                        chunk.id, chunk.document_id
                    ))
                })?;
                match state.dimension {
                    None => state.dimension = Some(chunk.embedding.len()),
                    Some(d) if d != chunk.embedding.len() => {
                        return Err(Error::SnapshotCorrupt(format!(
                            "chunk {} has dimension {}, library {lib_id} established {d}",
                            chunk.id,
                            chunk.embedding.len()
                        )));
                    }
                    Some(_) => {}
                }
                members.insert(chunk.id);
                state.chunks.insert(chunk.id, chunk);
            }
            catalog.cells.insert(
                lib_id,
                Arc::new(LibraryCell {
                    id: lib_id,
                    state: RwLock::new(state),
                }),
            );
        }
        Ok(catalog)
    }
}

/// A library with all of its documents and chunks, as moved in and out of
/// snapshots. Documents and chunks are sorted by id for stable output.
pub struct LibraryContents {
    pub library: Library,
    pub documents: Vec<Document>,
    pub chunks: Vec<Chunk>,
}

pub struct Repository {
    catalog: RwLock<Catalog>,
    invalidations: InvalidationSink,
}

impl Repository {
    pub fn new(invalidations: InvalidationSink) -> Self {
        Self {
            catalog: RwLock::new(Catalog::default()),
            invalidations,
        }
    }

    // === Libraries ===

    pub fn create_library(
        &self,
        name: &str,
        description: Option<String>,
        metadata: Metadata,
    ) -> Result<Library> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("library name must not be empty".into()));
        }
        let mut catalog = self.catalog.write();
        if catalog.names.contains_key(name) {
            return Err(Error::AlreadyExists(format!("library named {name:?}")));
        }
        let library = Library {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description,
            metadata,
        };
        catalog.names.insert(library.name.clone(), library.id);
        catalog.cells.insert(
            library.id,
            Arc::new(LibraryCell {
                id: library.id,
                state: RwLock::new(LibraryState::new(library.clone())),
            }),
        );
        debug!(library = %library.id, name = %library.name, "library created");
        Ok(library)
    }

    pub fn get_library(&self, id: Uuid) -> Result<Library> {
        self.with_library_read(id, |state| Ok(state.library.clone()))
    }

    /// All libraries, sorted by name.
    pub fn list_libraries(&self) -> Vec<Library> {
        let catalog = self.catalog.read();
        let mut libraries: Vec<Library> = catalog
            .cells
            .values()
            .map(|cell| cell.state.read().library.clone())
            .collect();
        libraries.sort_by(|a, b| a.name.cmp(&b.name));
        libraries
    }

    pub fn update_library(&self, id: Uuid, patch: LibraryPatch) -> Result<Library> {
        // Renames touch the global name map, so the whole update runs under
        // the global write lock.
        let mut catalog = self.catalog.write();
        let cell = catalog.cell(id)?;
        let mut state = cell.state.write();
        if let Some(name) = patch.name {
            if name.is_empty() {
                return Err(Error::InvalidArgument("library name must not be empty".into()));
            }
            if catalog.names.get(&name).is_some_and(|owner| *owner != id) {
                return Err(Error::AlreadyExists(format!("library named {name:?}")));
            }
            catalog.names.remove(&state.library.name);
            catalog.names.insert(name.clone(), id);
            state.library.name = name;
        }
        if let Some(description) = patch.description {
            state.library.description = Some(description);
        }
        if let Some(metadata) = patch.metadata {
            state.library.metadata = metadata;
        }
        Ok(state.library.clone())
    }

    pub fn delete_library(&self, id: Uuid) -> Result<()> {
        let mut catalog = self.catalog.write();
        let cell = catalog.cell(id)?;
        // No other holder can exist here: per-library locks are only taken
        // while holding the global lock, which we hold exclusively.
        let name = cell.state.read().library.name.clone();
        catalog.names.remove(&name);
        catalog.cells.remove(&id);
        (self.invalidations)(id);
        debug!(library = %id, "library deleted");
        Ok(())
    }

    // === Documents ===

    pub fn create_document(
        &self,
        library_id: Uuid,
        title: &str,
        description: Option<String>,
        metadata: Metadata,
    ) -> Result<Document> {
        if title.is_empty() {
            return Err(Error::InvalidArgument("document title must not be empty".into()));
        }
        let document = Document {
            id: Uuid::new_v4(),
            library_id,
            title: title.to_string(),
            description,
            metadata,
        };
        let created = document.clone();
        self.with_library_write(library_id, |state| {
            state.doc_chunks.insert(document.id, BTreeSet::new());
            state.documents.insert(document.id, document);
            // Creating an empty document leaves the chunk set untouched.
            Ok(((), false))
        })?;
        Ok(created)
    }

    pub fn get_document(&self, library_id: Uuid, document_id: Uuid) -> Result<Document> {
        self.with_library_read(library_id, |state| {
            state
                .documents
                .get(&document_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("document {document_id}")))
        })
    }

    /// Documents of a library, sorted by id.
    pub fn list_documents(&self, library_id: Uuid) -> Result<Vec<Document>> {
        self.with_library_read(library_id, |state| {
            let mut documents: Vec<Document> = state.documents.values().cloned().collect();
            documents.sort_by_key(|d| d.id);
            Ok(documents)
        })
    }

    pub fn update_document(
        &self,
        library_id: Uuid,
        document_id: Uuid,
        patch: DocumentPatch,
    ) -> Result<Document> {
        self.with_library_write(library_id, |state| {
            let document = state
                .documents
                .get_mut(&document_id)
                .ok_or_else(|| Error::NotFound(format!("document {document_id}")))?;
            if let Some(title) = patch.title {
                if title.is_empty() {
                    return Err(Error::InvalidArgument(
                        "document title must not be empty".into(),
                    ));
                }
                document.title = title;
            }
            if let Some(description) = patch.description {
                document.description = Some(description);
            }
            if let Some(metadata) = patch.metadata {
                document.metadata = metadata;
            }
            Ok((document.clone(), false))
        })
    }

    /// Delete a document and every chunk it owns.
    pub fn delete_document(&self, library_id: Uuid, document_id: Uuid) -> Result<()> {
        self.with_library_write(library_id, |state| {
            if state.documents.remove(&document_id).is_none() {
                return Err(Error::NotFound(format!("document {document_id}")));
            }
            let members = state.doc_chunks.remove(&document_id).unwrap_or_default();
            let cascaded = !members.is_empty();
            for chunk_id in &members {
                state.chunks.remove(chunk_id);
            }
            if state.chunks.is_empty() {
                state.dimension = None;
            }
            Ok(((), cascaded))
        })
    }

    // === Chunks ===

    pub fn create_chunk(
        &self,
        library_id: Uuid,
        document_id: Uuid,
        text: String,
        embedding: Vec<f32>,
        metadata: Metadata,
    ) -> Result<Chunk> {
        if embedding.is_empty() {
            return Err(Error::InvalidArgument("embedding must not be empty".into()));
        }
        self.with_library_write(library_id, |state| {
            if !state.documents.contains_key(&document_id) {
                return Err(Error::NotFound(format!("document {document_id}")));
            }
            match state.dimension {
                Some(d) if d != embedding.len() => {
                    return Err(Error::DimensionMismatch {
                        expected: d,
                        got: embedding.len(),
                    });
                }
                Some(_) => {}
                None => state.dimension = Some(embedding.len()),
            }
            let chunk = Chunk {
                id: Uuid::new_v4(),
                document_id,
                library_id,
                text,
                embedding,
                metadata,
            };
            state
                .doc_chunks
                .entry(document_id)
                .or_default()
                .insert(chunk.id);
            state.chunks.insert(chunk.id, chunk.clone());
            Ok((chunk, true))
        })
    }

    pub fn get_chunk(&self, library_id: Uuid, chunk_id: Uuid) -> Result<Chunk> {
        self.with_library_read(library_id, |state| {
            state
                .chunks
                .get(&chunk_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("chunk {chunk_id}")))
        })
    }

    /// Chunks of a library, optionally scoped to one document, sorted by id.
    pub fn list_chunks(&self, library_id: Uuid, document_id: Option<Uuid>) -> Result<Vec<Chunk>> {
        self.with_library_read(library_id, |state| match document_id {
            Some(doc_id) => {
                let members = state
                    .doc_chunks
                    .get(&doc_id)
                    .ok_or_else(|| Error::NotFound(format!("document {doc_id}")))?;
                Ok(members
                    .iter()
                    .filter_map(|id| state.chunks.get(id).cloned())
                    .collect())
            }
            None => {
                let mut chunks: Vec<Chunk> = state.chunks.values().cloned().collect();
                chunks.sort_by_key(|c| c.id);
                Ok(chunks)
            }
        })
    }

    pub fn update_chunk(
        &self,
        library_id: Uuid,
        chunk_id: Uuid,
        patch: ChunkPatch,
    ) -> Result<Chunk> {
        if patch.embedding.as_ref().is_some_and(|e| e.is_empty()) {
            return Err(Error::InvalidArgument("embedding must not be empty".into()));
        }
        self.with_library_write(library_id, |state| {
            if let Some(embedding) = &patch.embedding {
                if let Some(d) = state.dimension {
                    if embedding.len() != d {
                        return Err(Error::DimensionMismatch {
                            expected: d,
                            got: embedding.len(),
                        });
                    }
                }
            }
            let chunk = state
                .chunks
                .get_mut(&chunk_id)
                .ok_or_else(|| Error::NotFound(format!("chunk {chunk_id}")))?;
            // Only an embedding change touches the compiled index; text and
            // metadata are resolved from the repository at search time.
            let invalidates = patch.embedding.is_some();
            if let Some(text) = patch.text {
                chunk.text = text;
            }
            if let Some(embedding) = patch.embedding {
                chunk.embedding = embedding;
            }
            if let Some(metadata) = patch.metadata {
                chunk.metadata = metadata;
            }
            Ok((chunk.clone(), invalidates))
        })
    }

    pub fn delete_chunk(&self, library_id: Uuid, chunk_id: Uuid) -> Result<()> {
        self.with_library_write(library_id, |state| {
            let chunk = state
                .chunks
                .remove(&chunk_id)
                .ok_or_else(|| Error::NotFound(format!("chunk {chunk_id}")))?;
            if let Some(members) = state.doc_chunks.get_mut(&chunk.document_id) {
                members.remove(&chunk_id);
            }
            if state.chunks.is_empty() {
                state.dimension = None;
            }
            Ok(((), true))
        })
    }

    // === Scoped access for the search, index, and snapshot layers ===

    /// Run `f` under the global read lock plus the library's read lock.
    pub(crate) fn with_library_read<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&LibraryState) -> Result<R>,
    ) -> Result<R> {
        let catalog = self.catalog.read();
        let cell = catalog.cell(id)?;
        let state = cell.state.read();
        f(&state)
    }

    /// Run `f` under the global read lock plus the library's write lock.
    /// `f` returns its result plus a flag marking a chunk-set mutation; the
    /// invalidation sink fires before any lock is released.
    fn with_library_write<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut LibraryState) -> Result<(R, bool)>,
    ) -> Result<R> {
        let catalog = self.catalog.read();
        let cell = catalog.cell(id)?;
        let mut state = cell.state.write();
        let (out, chunk_set_changed) = f(&mut state)?;
        if chunk_set_changed {
            (self.invalidations)(id);
        }
        Ok(out)
    }

    /// Clone the full contents of every library, holding the global read
    /// lock and every per-library read lock (taken in sorted id order) for
    /// the duration. This is the snapshot's point-in-time view.
    pub(crate) fn export_contents(&self) -> Vec<LibraryContents> {
        let catalog = self.catalog.read();
        let mut cells: Vec<Arc<LibraryCell>> = catalog.cells.values().cloned().collect();
        cells.sort_by_key(|cell| cell.id);
        let guards: Vec<_> = cells.iter().map(|cell| cell.state.read()).collect();
        guards
            .iter()
            .map(|state| {
                let mut documents: Vec<Document> = state.documents.values().cloned().collect();
                documents.sort_by_key(|d| d.id);
                let mut chunks: Vec<Chunk> = state.chunks.values().cloned().collect();
                chunks.sort_by_key(|c| c.id);
                LibraryContents {
                    library: state.library.clone(),
                    documents,
                    chunks,
                }
            })
            .collect()
    }

    /// Swap the entire repository state under the global write lock.
    /// The staged catalog has already been validated. `after` runs before
    /// the lock is released, so registry replacement lands in the same
    /// critical section and no reader can observe a half-restored process.
    pub(crate) fn install(&self, staged: Catalog, after: impl FnOnce()) {
        let mut catalog = self.catalog.write();
        *catalog = staged;
        after();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn tracked_repo() -> (Repository, Arc<Mutex<Vec<Uuid>>>) {
        let events: Arc<Mutex<Vec<Uuid>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let repo = Repository::new(Arc::new(move |id| sink.lock().unwrap().push(id)));
        (repo, events)
    }

    fn seeded(repo: &Repository) -> (Library, Document) {
        let lib = repo
            .create_library("docs", None, Metadata::new())
            .unwrap();
        let doc = repo
            .create_document(lib.id, "guide", None, Metadata::new())
            .unwrap();
        (lib, doc)
    }

    #[test]
    fn library_names_are_unique() {
        let (repo, _) = tracked_repo();
        repo.create_library("docs", None, Metadata::new()).unwrap();
        let err = repo.create_library("docs", None, Metadata::new()).unwrap_err();
        assert_eq!(err.code(), "already_exists");
    }

    #[test]
    fn empty_names_are_rejected() {
        let (repo, _) = tracked_repo();
        assert_eq!(
            repo.create_library("", None, Metadata::new())
                .unwrap_err()
                .code(),
            "invalid_argument"
        );
    }

    #[test]
    fn rename_respects_uniqueness() {
        let (repo, _) = tracked_repo();
        let a = repo.create_library("a", None, Metadata::new()).unwrap();
        repo.create_library("b", None, Metadata::new()).unwrap();
        let patch = LibraryPatch {
            name: Some("b".into()),
            ..Default::default()
        };
        assert_eq!(
            repo.update_library(a.id, patch).unwrap_err().code(),
            "already_exists"
        );
        // Renaming to itself is a no-op collision-wise.
        let patch = LibraryPatch {
            name: Some("a".into()),
            ..Default::default()
        };
        repo.update_library(a.id, patch).unwrap();
        // The old name is freed by a real rename.
        let patch = LibraryPatch {
            name: Some("c".into()),
            ..Default::default()
        };
        repo.update_library(a.id, patch).unwrap();
        repo.create_library("a", None, Metadata::new()).unwrap();
    }

    #[test]
    fn first_chunk_fixes_dimension() {
        let (repo, _) = tracked_repo();
        let (lib, doc) = seeded(&repo);
        repo.create_chunk(lib.id, doc.id, "a".into(), vec![1.0, 0.0, 0.0, 0.0], Metadata::new())
            .unwrap();
        let err = repo
            .create_chunk(lib.id, doc.id, "b".into(), vec![1.0, 0.0, 0.0], Metadata::new())
            .unwrap_err();
        assert_eq!(err.code(), "dimension_mismatch");
        // The failed insert left no trace.
        assert_eq!(repo.list_chunks(lib.id, None).unwrap().len(), 1);
    }

    #[test]
    fn deleting_last_chunk_resets_dimension() {
        let (repo, _) = tracked_repo();
        let (lib, doc) = seeded(&repo);
        let chunk = repo
            .create_chunk(lib.id, doc.id, "a".into(), vec![1.0, 2.0], Metadata::new())
            .unwrap();
        repo.delete_chunk(lib.id, chunk.id).unwrap();
        // A different dimension is accepted again.
        repo.create_chunk(lib.id, doc.id, "b".into(), vec![1.0, 2.0, 3.0], Metadata::new())
            .unwrap();
    }

    #[test]
    fn document_delete_cascades_to_chunks() {
        let (repo, _) = tracked_repo();
        let (lib, doc) = seeded(&repo);
        let chunk = repo
            .create_chunk(lib.id, doc.id, "a".into(), vec![1.0], Metadata::new())
            .unwrap();
        repo.delete_document(lib.id, doc.id).unwrap();
        assert_eq!(
            repo.get_chunk(lib.id, chunk.id).unwrap_err().code(),
            "not_found"
        );
        assert!(repo.list_chunks(lib.id, None).unwrap().is_empty());
    }

    #[test]
    fn library_delete_removes_everything() {
        let (repo, _) = tracked_repo();
        let (lib, doc) = seeded(&repo);
        repo.create_chunk(lib.id, doc.id, "a".into(), vec![1.0], Metadata::new())
            .unwrap();
        repo.delete_library(lib.id).unwrap();
        assert_eq!(repo.get_library(lib.id).unwrap_err().code(), "not_found");
        assert!(repo.list_libraries().is_empty());
    }

    #[test]
    fn chunk_mutations_fire_invalidation() {
        let (repo, events) = tracked_repo();
        let (lib, doc) = seeded(&repo);
        let chunk = repo
            .create_chunk(lib.id, doc.id, "a".into(), vec![1.0, 0.0], Metadata::new())
            .unwrap();
        let patch = ChunkPatch {
            embedding: Some(vec![0.0, 1.0]),
            ..Default::default()
        };
        repo.update_chunk(lib.id, chunk.id, patch).unwrap();
        repo.delete_chunk(lib.id, chunk.id).unwrap();
        assert_eq!(events.lock().unwrap().as_slice(), &[lib.id, lib.id, lib.id]);
    }

    #[test]
    fn metadata_only_update_does_not_invalidate() {
        let (repo, events) = tracked_repo();
        let (lib, doc) = seeded(&repo);
        let chunk = repo
            .create_chunk(lib.id, doc.id, "a".into(), vec![1.0], Metadata::new())
            .unwrap();
        events.lock().unwrap().clear();
        let mut metadata = Metadata::new();
        metadata.insert("lang".into(), serde_json::json!("en"));
        let patch = ChunkPatch {
            text: Some("b".into()),
            metadata: Some(metadata),
            ..Default::default()
        };
        repo.update_chunk(lib.id, chunk.id, patch).unwrap();
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn chunk_requires_existing_document() {
        let (repo, _) = tracked_repo();
        let (lib, _) = seeded(&repo);
        let err = repo
            .create_chunk(lib.id, Uuid::new_v4(), "a".into(), vec![1.0], Metadata::new())
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn list_chunks_scoped_by_document() {
        let (repo, _) = tracked_repo();
        let (lib, doc_a) = seeded(&repo);
        let doc_b = repo
            .create_document(lib.id, "appendix", None, Metadata::new())
            .unwrap();
        repo.create_chunk(lib.id, doc_a.id, "a".into(), vec![1.0], Metadata::new())
            .unwrap();
        repo.create_chunk(lib.id, doc_b.id, "b".into(), vec![2.0], Metadata::new())
            .unwrap();
        assert_eq!(repo.list_chunks(lib.id, Some(doc_a.id)).unwrap().len(), 1);
        assert_eq!(repo.list_chunks(lib.id, None).unwrap().len(), 2);
        assert_eq!(
            repo.list_chunks(lib.id, Some(Uuid::new_v4()))
                .unwrap_err()
                .code(),
            "not_found"
        );
    }

    #[test]
    fn export_round_trips_through_catalog() {
        let (repo, _) = tracked_repo();
        let (lib, doc) = seeded(&repo);
        repo.create_chunk(lib.id, doc.id, "a".into(), vec![1.0, 2.0], Metadata::new())
            .unwrap();
        let contents = repo.export_contents();
        let staged = Catalog::from_contents(contents).unwrap();
        let (other, _) = tracked_repo();
        other.install(staged, || {});
        assert_eq!(other.get_library(lib.id).unwrap(), repo.get_library(lib.id).unwrap());
        assert_eq!(
            other.list_chunks(lib.id, None).unwrap(),
            repo.list_chunks(lib.id, None).unwrap()
        );
    }

    #[test]
    fn corrupt_contents_are_rejected() {
        let (repo, _) = tracked_repo();
        let (lib, doc) = seeded(&repo);
        repo.create_chunk(lib.id, doc.id, "a".into(), vec![1.0, 2.0], Metadata::new())
            .unwrap();
        let mut contents = repo.export_contents();
        contents[0].chunks[0].document_id = Uuid::new_v4();
        assert_eq!(
            Catalog::from_contents(contents).unwrap_err().code(),
            "snapshot_corrupt"
        );
    }
}
