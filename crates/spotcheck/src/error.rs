//! Error types for spotcheck.

use std::path::PathBuf;

use thiserror::Error;

/// The round's task list could not be obtained. Fatal for a run.
#[derive(Debug, Error)]
pub enum TaskerError {
    #[error("round source {url} unavailable: {reason}")]
    SourceUnavailable { url: String, reason: String },
}

/// A provider's peer id could not be resolved. Fatal for one task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The node answered, but with a JSON-RPC error or without a peer id.
    #[error("Filecoin RPC error resolving {miner_id}: {message}")]
    Rpc { miner_id: String, message: String },

    /// The node could not be reached, even after retrying.
    #[error("Filecoin RPC unavailable resolving {miner_id} after {attempts} attempt(s): {reason}")]
    Unavailable {
        miner_id: String,
        attempts: u32,
        reason:   String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path:   PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
