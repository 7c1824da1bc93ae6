//! CAR retrieval with streaming watchdog and block verification.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable request, option and measurement types
//! - [`core`] - Pure transformations: multiaddr validation, URL building,
//!   error classification, retry backoff
//! - [`effects`] - I/O operations behind the [`HttpClient`] trait
//!
//! # Key Features
//!
//! - **Idle watchdog**: a transfer that makes no progress for the idle window
//!   is cancelled and recorded as a timeout
//! - **Bounded memory**: the archive buffer has a hard cap and an optional
//!   soft cutoff
//! - **Verified**: every received block is checked against its CID before a
//!   checksum is recorded
//! - **Measurement-only**: failures become numeric status codes, never panics
//!   or propagated errors

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use self::core::{
    Backoff, HostType, HttpMultiaddr, Scheme, build_url, classify, classify_message, codes,
    retry_delay, validate_http_multiaddr,
};
pub use self::data::{
    Append, CarBuffer, ChunkProgress, DagScope, EntityBytesRange, FetchOptions, Protocol,
    RetrievalRequest, SubMeasurement,
};
pub use self::effects::{BoxStream, CarFetcher, HttpClient, HttpResponse, collect_body, error_chain};

#[cfg(feature = "reqwest")]
pub use self::effects::ReqwestClient;

pub use self::error::{FetchError, MultiaddrError, ParseError, Result};
