use spotcheck_verify::VerifyError;

use crate::error::{FetchError, MultiaddrError};

/// Numeric status codes reported for failed retrievals.
///
/// Codes below 600 are raw HTTP statuses and are never produced here.
pub mod codes {
    pub const UNKNOWN_ERROR: u16 = 600;

    pub const UNSUPPORTED_MULTIADDR_HOST_TYPE: u16 = 701;
    pub const UNSUPPORTED_MULTIADDR_PROTO: u16 = 702;
    pub const UNSUPPORTED_MULTIADDR_SCHEME: u16 = 703;
    pub const MULTIADDR_HAS_TOO_MANY_PARTS: u16 = 704;

    pub const DNS_ERROR: u16 = 801;
    pub const TCP_CONNECT_ERROR: u16 = 802;

    pub const UNSUPPORTED_HASH: u16 = 901;
    pub const HASH_MISMATCH: u16 = 902;
    pub const UNEXPECTED_CAR_BLOCK: u16 = 903;
    pub const CANNOT_PARSE_CAR_BYTES: u16 = 904;
}

/// Map a retrieval failure to its status code.
///
/// Structured kinds (multiaddr, content integrity) are matched first. Only
/// errors without a structured kind fall back to matching the message text.
pub fn classify(err: &FetchError) -> u16 {
    match err {
        FetchError::Multiaddr(err) => match err {
            MultiaddrError::UnsupportedHostType { .. } => codes::UNSUPPORTED_MULTIADDR_HOST_TYPE,
            MultiaddrError::UnsupportedProto { .. } => codes::UNSUPPORTED_MULTIADDR_PROTO,
            MultiaddrError::UnsupportedScheme { .. } => codes::UNSUPPORTED_MULTIADDR_SCHEME,
            MultiaddrError::TooManyParts { .. } => codes::MULTIADDR_HAS_TOO_MANY_PARTS,
        },
        FetchError::Verify(err) => match err {
            VerifyError::UnsupportedHash { .. } => codes::UNSUPPORTED_HASH,
            VerifyError::HashMismatch { .. } => codes::HASH_MISMATCH,
            VerifyError::UnexpectedBlock { .. } | VerifyError::MissingRoot { .. } => {
                codes::UNEXPECTED_CAR_BLOCK
            }
            VerifyError::CannotParse(_) => codes::CANNOT_PARSE_CAR_BYTES,
        },
        FetchError::Timeout(_) | FetchError::Transport(_) => classify_message(&err.to_string()),
    }
}

/// Fallback for transports that only expose error text.
pub fn classify_message(message: &str) -> u16 {
    if message.contains("dns error") {
        codes::DNS_ERROR
    } else if message.contains("tcp connect error") {
        codes::TCP_CONNECT_ERROR
    } else {
        codes::UNKNOWN_ERROR
    }
}
