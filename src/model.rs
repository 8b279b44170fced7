//! Entity records for the library → document → chunk hierarchy.
//!
//! These are plain serde records; all integrity rules (parent existence,
//! dimension agreement, name uniqueness) live in the repository, which is
//! the only place they are mutated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form metadata attached to every entity: string keys mapping to
/// JSON-like scalar or array values. BTreeMap keeps serialization stable.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Top level of the hierarchy. Owns documents; its name is unique across
/// the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Middle level. The parent library id is immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub library_id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// The unit that carries an embedding. `library_id` is denormalized so the
/// index layer can resolve chunks without walking the document map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub library_id: Uuid,
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Partial update for a library. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Partial update for a document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Partial update for a chunk. Only an `embedding` change invalidates the
/// library's compiled index; text and metadata are resolved from the
/// repository at search time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkPatch {
    pub text: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub metadata: Option<Metadata>,
}
