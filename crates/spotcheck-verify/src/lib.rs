//! Block-level verification of content-addressed archives (CAR).
//!
//! A retrieved CAR is only trusted once every block in it has been checked
//! against the identifier it claims. This crate provides that check plus the
//! incremental hashing used to fingerprint the raw archive bytes.
//!
//! # Key Features
//!
//! - **Root identity**: the first block must be the requested root CID
//! - **Per-block digests**: every block is re-hashed against its multihash
//! - **Partial archives**: a deliberately cut-off archive can be verified up to
//!   its last complete block
//! - **Incremental**: `Hasher` computes the archive checksum as bytes stream in
//!
//! # Example
//!
//! ```
//! use spotcheck_verify::{Hasher, Sha256Hasher, multihash_hex};
//!
//! let mut hasher = Sha256Hasher::new();
//! hasher.update(b"hello world");
//! assert_eq!(
//!     multihash_hex(&hasher.finalize()),
//!     "1220b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
//! );
//! ```

pub use self::car::{CarSummary, Completeness, SHA2_256, verify_block, verify_car};
pub use self::error::{Result, VerifyError};
pub use self::hasher::{Hasher, Sha256Hasher, multihash_hex};

pub use cid::Cid;

#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures;

mod car;
mod error;
mod hasher;
