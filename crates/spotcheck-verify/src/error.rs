#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("unsupported hash algorithm 0x{code:x} in block {cid}")]
    UnsupportedHash { cid: String, code: u64 },

    #[error("hash mismatch for block {cid}")]
    HashMismatch { cid: String },

    #[error("Unexpected block CID {actual}. Expected: {expected}")]
    UnexpectedBlock { expected: String, actual: String },

    #[error("archive contains no blocks, expected root {expected}")]
    MissingRoot { expected: String },

    #[error("cannot parse CAR bytes: {0}")]
    CannotParse(String),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
