//! Configuration error taxonomy.

use std::path::PathBuf;

/// Errors raised while loading or validating the settings document.
///
/// Configuration problems are the only fatal class of error in the
/// converter: everything downstream degrades to sentinels or empty output.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("settings file missing: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read settings {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("rule '{rule}' names a map_file but is missing '{key}'")]
    IncompleteRule { rule: String, key: &'static str },
}
