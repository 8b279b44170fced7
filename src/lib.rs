//! vecstore — an in-memory vector database.
//!
//! Data is organized as libraries → documents → chunks, where a chunk
//! carries a fixed-length f32 embedding and free-form metadata. Each
//! library gets a compiled index (exact linear scan, KD-tree, or
//! random-hyperplane LSH) rebuilt on demand after mutations, with cosine
//! or euclidean scoring folded into one descending ranking order. State is
//! process-local; JSON snapshots are the only persistence boundary.
//!
//! The crate splits into the indexing core (`store`, `index`, `search`,
//! `snapshot`, `sync`, `metric`) and thin outer layers (`api` for HTTP,
//! `embed` for the outbound embedding proxy).

pub mod api;
pub mod config;
pub mod constants;
pub mod embed;
pub mod error;
pub mod index;
pub mod metric;
pub mod model;
pub mod search;
pub mod snapshot;
pub mod store;
pub mod sync;

pub use config::Config;
pub use error::{Error, Result};
pub use index::registry::{IndexConfig, IndexRegistry};
pub use index::IndexKind;
pub use metric::Metric;
pub use model::{Chunk, Document, Library, Metadata};
pub use search::{SearchMatch, SearchService};
pub use snapshot::{SnapshotInfo, SnapshotStore};
pub use store::Repository;
