//! TOML configuration.
//!
//! Every field has a default, so an empty file is a valid configuration.
//!
//! ```toml
//! max_tasks = 10
//! dag_scope = "entity"
//! entity_bytes_range = "0:200"
//!
//! [endpoints]
//! ipfs_gateway = "http://127.0.0.1:41443"
//!
//! [retrieval]
//! idle_timeout_ms = 60000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use spotcheck_fetch::{Backoff, DagScope, EntityBytesRange, FetchOptions};
use spotcheck_fetch::data::{DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_CAR_SIZE};

use crate::checker::CheckOptions;
use crate::error::ConfigError;
use crate::tasker::{DEFAULT_ROUND_TIMEOUT, RetrievalTask, TaskQuery};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Historical round to check. Non-positive or absent selects the current
    /// round.
    pub round_id:           Option<i64>,
    /// Non-positive or absent means every selected task.
    pub max_tasks:          Option<i64>,
    pub miner_id:           Option<String>,
    /// Soft cutoff for full retrievals.
    pub max_byte_length:    Option<u64>,
    pub dag_scope:          DagScope,
    pub entity_bytes_range: EntityBytesRange,
    /// When non-empty, checked instead of the round's tasks.
    pub retrieval_tasks:    Vec<RetrievalTask>,
    pub endpoints:          Endpoints,
    pub retrieval:          RetrievalSettings,
    pub resolver:           ResolverSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Endpoints {
    pub rounds_api:        String,
    pub meridian_contract: String,
    pub ipni:              String,
    /// Filecoin JSON-RPC endpoint.
    pub rpc:               String,
    pub rpc_auth:          Option<String>,
    /// Base URL of a daemon serving `ipfs://` indirection URLs over HTTP.
    pub ipfs_gateway:      Option<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            rounds_api:        "https://api.filspark.com".to_string(),
            meridian_contract: "0x8460766edc62b525fc1fa4d628fc79229dc73031".to_string(),
            ipni:              "https://cid.contact".to_string(),
            rpc:               "https://api.node.glif.io/rpc/v1".to_string(),
            rpc_auth:          None,
            ipfs_gateway:      None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalSettings {
    pub idle_timeout_ms:  u64,
    /// Absolute cap on a buffered archive, in bytes.
    pub max_car_size:     u64,
    pub round_timeout_ms: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            idle_timeout_ms:  DEFAULT_IDLE_TIMEOUT.as_millis() as u64,
            max_car_size:     DEFAULT_MAX_CAR_SIZE,
            round_timeout_ms: DEFAULT_ROUND_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverSettings {
    pub max_attempts: u32,
    pub min_delay_ms: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        let backoff = Backoff::default();
        Self {
            max_attempts: backoff.max_attempts,
            min_delay_ms: backoff.min_delay.as_millis() as u64,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };

        if self.retrieval.idle_timeout_ms == 0 {
            return invalid("retrieval.idle_timeout_ms", "must be positive");
        }
        if self.retrieval.max_car_size == 0 {
            return invalid("retrieval.max_car_size", "must be positive");
        }
        if self.retrieval.round_timeout_ms == 0 {
            return invalid("retrieval.round_timeout_ms", "must be positive");
        }
        if self.resolver.max_attempts == 0 {
            return invalid("resolver.max_attempts", "at least one attempt is required");
        }
        if let Some(task) = self.retrieval_tasks.iter().find(|t| t.cid.is_empty() || t.miner_id.is_empty()) {
            return invalid("retrieval_tasks", &format!("incomplete task {task:?}"));
        }
        Ok(())
    }

    pub fn round_id(&self) -> Option<u64> { self.round_id.and_then(|id| u64::try_from(id).ok()).filter(|id| *id > 0) }

    pub fn task_query(&self) -> TaskQuery {
        TaskQuery {
            round_id:  self.round_id(),
            miner_id:  self.miner_id.clone(),
            max_tasks: self.max_tasks,
        }
    }

    pub fn round_timeout(&self) -> Duration { Duration::from_millis(self.retrieval.round_timeout_ms) }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            self.resolver.max_attempts,
            Duration::from_millis(self.resolver.min_delay_ms),
        )
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::default()
            .idle_timeout(Duration::from_millis(self.retrieval.idle_timeout_ms))
            .max_car_size(self.retrieval.max_car_size)
    }

    pub fn check_options(&self) -> CheckOptions {
        CheckOptions {
            dag_scope:          self.dag_scope,
            entity_bytes_range: Some(self.entity_bytes_range),
            max_byte_length:    self.max_byte_length,
            fetch:              self.fetch_options(),
        }
    }
}
