//! Environment-derived configuration, read once at startup.

use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_LOG_LEVEL, DEFAULT_LSH_NUM_PLANES, DEFAULT_LSH_NUM_TABLES,
    ENV_COHERE_API_KEY, ENV_DATA_DIR, ENV_DEFAULT_INDEX, ENV_DEFAULT_METRIC, ENV_LOG_LEVEL,
    ENV_LSH_NUM_PLANES, ENV_LSH_NUM_TABLES, MAX_LSH_PLANES,
};
use crate::index::{IndexKind, LshParams};
use crate::metric::Metric;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for snapshot files.
    pub data_dir: PathBuf,
    /// Metric applied when a library has no explicit index configuration.
    pub default_metric: Metric,
    /// Algorithm applied when a library has no explicit index configuration.
    pub default_index: IndexKind,
    /// LSH tunables, applied to every LSH build.
    pub lsh: LshParams,
    /// Logger verbosity (tracing EnvFilter syntax).
    pub log_level: String,
    /// Cohere credential; `None` disables the embeddings endpoint.
    pub cohere_api_key: Option<String>,
}

impl Config {
    /// Read configuration from the environment. Unparsable values fall back
    /// to their defaults with a warning rather than aborting startup.
    pub fn from_env() -> Self {
        let data_dir = env::var(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));

        let default_metric = parse_or_default(ENV_DEFAULT_METRIC, Metric::Cosine, Metric::parse);
        let default_index = parse_or_default(ENV_DEFAULT_INDEX, IndexKind::Linear, IndexKind::parse);

        let num_planes = numeric_or_default(ENV_LSH_NUM_PLANES, DEFAULT_LSH_NUM_PLANES);
        let num_planes = if num_planes == 0 || num_planes > MAX_LSH_PLANES {
            warn!(
                "{ENV_LSH_NUM_PLANES}={num_planes} outside 1..={MAX_LSH_PLANES}, using {DEFAULT_LSH_NUM_PLANES}"
            );
            DEFAULT_LSH_NUM_PLANES
        } else {
            num_planes
        };
        let num_tables = numeric_or_default(ENV_LSH_NUM_TABLES, DEFAULT_LSH_NUM_TABLES).max(1);

        let log_level = env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
        let cohere_api_key = env::var(ENV_COHERE_API_KEY).ok().filter(|k| !k.is_empty());

        Self {
            data_dir,
            default_metric,
            default_index,
            lsh: LshParams {
                num_tables,
                num_planes,
            },
            log_level,
            cohere_api_key,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            default_metric: Metric::Cosine,
            default_index: IndexKind::Linear,
            lsh: LshParams::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            cohere_api_key: None,
        }
    }
}

fn parse_or_default<T: Copy>(
    key: &str,
    default: T,
    parse: impl Fn(&str) -> crate::error::Result<T>,
) -> T {
    match env::var(key) {
        Ok(raw) => match parse(&raw) {
            Ok(value) => value,
            Err(_) => {
                warn!("{key}={raw:?} is not a valid value, using the default");
                default
            }
        },
        Err(_) => default,
    }
}

fn numeric_or_default(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let config = Config::default();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.default_metric, Metric::Cosine);
        assert_eq!(config.default_index, IndexKind::Linear);
        assert_eq!(config.lsh.num_planes, 16);
        assert_eq!(config.lsh.num_tables, 4);
        assert!(config.cohere_api_key.is_none());
    }
}
