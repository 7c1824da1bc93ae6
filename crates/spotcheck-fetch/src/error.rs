//! Error types for spotcheck-fetch.

use std::time::Duration;

use spotcheck_verify::VerifyError;
use thiserror::Error;

/// A provider address that cannot be turned into an HTTP URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MultiaddrError {
    #[error("Cannot parse \"{addr}\": unsupported host type \"{host_type}\"")]
    UnsupportedHostType { addr: String, host_type: String },

    #[error("Cannot parse \"{addr}\": unsupported protocol \"{protocol}\"")]
    UnsupportedProto { addr: String, protocol: String },

    #[error("Cannot parse \"{addr}\": unsupported scheme \"{scheme}\"")]
    UnsupportedScheme { addr: String, scheme: String },

    #[error("Cannot parse \"{addr}\": too many parts")]
    TooManyParts { addr: String },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Multiaddr(#[from] MultiaddrError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("no progress for {0:?}, transfer aborted")]
    Timeout(Duration),

    #[error("{0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid dag scope \"{0}\", expected one of: all, block, entity")]
    DagScope(String),

    #[error("invalid retrieval protocol \"{0}\", expected one of: http, graphsync, bitswap")]
    Protocol(String),

    #[error("invalid entity-bytes range \"{0}\", expected <start>:<end|*>")]
    EntityBytes(String),
}
