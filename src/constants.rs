//! Central constants for vecstore configuration
//!
//! All string literals for environment keys, defaults, and tuning parameters
//! are defined here to avoid duplication and ensure consistency across the
//! codebase.

/// Environment variable naming the snapshot directory.
pub const ENV_DATA_DIR: &str = "DATA_DIR";

/// Environment variable selecting the default similarity metric.
pub const ENV_DEFAULT_METRIC: &str = "DEFAULT_METRIC";

/// Environment variable selecting the default index algorithm.
pub const ENV_DEFAULT_INDEX: &str = "DEFAULT_INDEX";

/// Environment variable for the number of LSH hyperplanes per table.
pub const ENV_LSH_NUM_PLANES: &str = "LSH_NUM_PLANES";

/// Environment variable for the number of LSH hash tables.
pub const ENV_LSH_NUM_TABLES: &str = "LSH_NUM_TABLES";

/// Environment variable for logger verbosity (tracing EnvFilter syntax).
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Environment variable holding the Cohere API key.
/// When unset, the embeddings endpoint reports `EmbeddingUnavailable`.
pub const ENV_COHERE_API_KEY: &str = "COHERE_API_KEY";

/// Default directory for snapshot files, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default logger verbosity.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default number of random hyperplanes per LSH table (signature width in bits).
///
/// Wider signatures give smaller, purer buckets; 16 bits keeps buckets
/// populated for collections in the thousands. Capped at
/// [`MAX_LSH_PLANES`] because signatures are stored in a u32.
pub const DEFAULT_LSH_NUM_PLANES: usize = 16;

/// Default number of LSH hash tables. More tables trade memory for recall.
pub const DEFAULT_LSH_NUM_TABLES: usize = 4;

/// Hard upper bound on LSH signature width (signatures are packed in a u32).
pub const MAX_LSH_PLANES: usize = 32;

/// Candidate-set target for LSH multi-probe expansion, as a multiple of k.
/// Probing stops once the candidate set reaches `k * LSH_CANDIDATE_FACTOR`
/// or every reachable bucket has been drained.
pub const LSH_CANDIDATE_FACTOR: usize = 3;

/// Overfetch multiplier applied to k when a metadata filter is present.
/// The index is asked for `k * SEARCH_OVERFETCH` candidates (capped at N)
/// so the filter has slack to discard non-matching chunks.
pub const SEARCH_OVERFETCH: usize = 4;

/// File extension for snapshot files in the data directory.
pub const SNAPSHOT_FILE_EXT: &str = "json";

/// Suffix for in-progress snapshot files before the atomic rename.
pub const SNAPSHOT_TMP_EXT: &str = "tmp";

/// Snapshot file format version. Bump when the layout changes shape.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Cohere embeddings endpoint.
pub const COHERE_EMBED_URL: &str = "https://api.cohere.com/v1/embed";

/// Embedding model requested from Cohere.
pub const COHERE_EMBED_MODEL: &str = "embed-english-v3.0";

/// Maximum attempts for one outbound embedding call.
pub const EMBED_RETRY_ATTEMPTS: u32 = 3;

/// Base delay before the first embedding retry, in milliseconds.
pub const EMBED_RETRY_BASE_MS: u64 = 500;

/// Multiplier applied to the retry delay after each failed attempt.
pub const EMBED_RETRY_FACTOR: f64 = 2.0;

/// Jitter applied to each retry delay, as a fraction of the delay (±20%).
pub const EMBED_RETRY_JITTER: f64 = 0.2;
