//! Effects layer: I/O operations with trait abstraction.

mod fetcher;
mod http;

pub use self::fetcher::CarFetcher;
pub use self::http::{BoxStream, HttpClient, HttpResponse, collect_body, error_chain};

#[cfg(feature = "reqwest")]
pub use self::http::ReqwestClient;
