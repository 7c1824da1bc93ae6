//! Spot checks for storage provider retrievals.
//!
//! A run takes the tasks of a round (a CID and the miner that is supposed to
//! serve it), resolves each miner's peer id, asks the content index how the
//! provider advertises the CID, then retrieves it twice: once as a single
//! root block and once as a bounded full retrieval. Every outcome becomes a
//! [`Measurement`].
//!
//! # Modules
//!
//! - [`tasker`] - round documents and task selection
//! - [`resolver`] - miner id to peer id resolution over Filecoin JSON-RPC
//! - [`ipni`] - retrieval candidates from an IPNI indexer
//! - [`checker`] - the per-task state machine and the run loop
//! - [`config`] - TOML configuration
//! - [`telemetry`] - log subscriber setup

pub mod checker;
pub mod config;
pub mod ipni;
pub mod resolver;
pub mod tasker;
pub mod telemetry;

mod error;

pub use self::checker::{CheckOptions, CheckOutcome, Measurement, SpotChecker};
pub use self::config::{Config, Endpoints, ResolverSettings, RetrievalSettings};
pub use self::error::{ConfigError, ResolveError, TaskerError};
pub use self::ipni::{IndexQuery, IndexResponse, IndexerResult, IpniClient, RetrievalCandidate};
pub use self::resolver::{FixedPeerId, PeerIdResolver, RpcPeerIdResolver};
pub use self::tasker::{HttpRoundSource, RetrievalTask, Round, RoundSource, TaskQuery, Tasker, select_tasks};
