//! Core layer: pure transformations without I/O.

mod classify;
mod multiaddr;
mod retry;
mod url;

pub use self::classify::{classify, classify_message, codes};
pub use self::multiaddr::{HostType, HttpMultiaddr, Scheme, validate_http_multiaddr};
pub use self::retry::{Backoff, retry_delay};
pub use self::url::build_url;
