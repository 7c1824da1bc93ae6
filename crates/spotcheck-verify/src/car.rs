use cid::Cid;
use iroh_car::CarReader;

use crate::{Result, Sha256Hasher, VerifyError};

/// Multihash code for sha2-256, the only digest blocks are checked against.
pub const SHA2_256: u64 = 0x12;

/// Whether the archive bytes are everything the provider sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Completeness {
    /// The transfer ran to the end of the response body.
    #[default]
    Complete,
    /// Reading stopped early on purpose (byte cutoff or buffer cap). A
    /// trailing block cut off by the end of the bytes is dropped once the
    /// root block is whole. Every whole block is still verified.
    Truncated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarSummary {
    pub blocks:         usize,
    pub truncated_tail: bool,
}

/// Decode `bytes` as a CAR and verify every block in it.
///
/// The first block must carry exactly the `expected_root` identifier, and
/// each block's bytes must hash to the digest embedded in its CID.
pub async fn verify_car(
    bytes: &[u8],
    expected_root: &str,
    completeness: Completeness,
) -> Result<CarSummary> {
    let (bytes, truncated_tail) = match completeness {
        Completeness::Complete => (bytes, false),
        Completeness::Truncated => match whole_sections_prefix(bytes)? {
            Some(end) => {
                tracing::debug!(end, received = bytes.len(), "verifying up to the last whole block");
                (&bytes[..end], true)
            }
            None => (bytes, false),
        },
    };

    let mut reader = CarReader::new(bytes)
        .await
        .map_err(|e| VerifyError::CannotParse(e.to_string()))?;

    let mut blocks = 0usize;

    loop {
        let (cid, data) = match reader.next_block().await {
            Ok(Some(block)) => block,
            Ok(None) => break,
            Err(err) => return Err(VerifyError::CannotParse(err.to_string())),
        };

        if blocks == 0 {
            let actual = cid.to_string();
            if actual != expected_root {
                return Err(VerifyError::UnexpectedBlock {
                    expected: expected_root.to_string(),
                    actual,
                });
            }
        }

        verify_block(&cid, &data)?;
        blocks += 1;
    }

    if blocks == 0 {
        return Err(VerifyError::MissingRoot {
            expected: expected_root.to_string(),
        });
    }

    Ok(CarSummary {
        blocks,
        truncated_tail,
    })
}

/// Check that `data` hashes to the multihash carried by `cid`.
pub fn verify_block(cid: &Cid, data: &[u8]) -> Result<()> {
    let multihash = cid.hash();
    match multihash.code() {
        SHA2_256 => {
            if Sha256Hasher::digest(data).as_slice() == multihash.digest() {
                Ok(())
            } else {
                Err(VerifyError::HashMismatch {
                    cid: cid.to_string(),
                })
            }
        }
        code => Err(VerifyError::UnsupportedHash {
            cid: cid.to_string(),
            code,
        }),
    }
}

enum Varint {
    Value { value: u64, width: usize },
    Incomplete,
    Invalid,
}

/// Unsigned LEB128, at most ten bytes.
fn read_varint(bytes: &[u8]) -> Varint {
    let mut value = 0u64;
    for (i, byte) in bytes.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Varint::Value { value, width: i + 1 };
        }
    }
    if bytes.len() < 10 { Varint::Incomplete } else { Varint::Invalid }
}

/// Length of the leading prefix of `bytes` that ends on a section boundary,
/// when a partial section follows it and at least the header and the root
/// block are whole.
///
/// A partial section whose CID already arrived in full must carry a valid
/// CID; only the block data may be missing.
fn whole_sections_prefix(bytes: &[u8]) -> Result<Option<usize>> {
    let mut offset = 0usize;
    let mut sections = 0usize;

    while offset < bytes.len() {
        let (len, width) = match read_varint(&bytes[offset..]) {
            Varint::Value { value, width } => (value, width),
            Varint::Incomplete => break,
            Varint::Invalid => return Ok(None),
        };
        let body = offset + width;
        let end = usize::try_from(len).ok().and_then(|len| body.checked_add(len));
        match end {
            Some(end) if end <= bytes.len() => {
                offset = end;
                sections += 1;
            }
            _ => {
                if sections > 0 {
                    check_partial_cid(&bytes[body..])?;
                }
                break;
            }
        }
    }

    Ok((offset < bytes.len() && sections >= 2).then_some(offset))
}

/// Byte length of the CID at the start of `section`, or `None` when the
/// section ends before the CID does.
fn cid_extent(section: &[u8]) -> Option<usize> {
    if section.starts_with(&[0x12, 0x20]) {
        return (section.len() >= 34).then_some(34);
    }

    let mut pos = 0usize;
    let mut digest_len = 0u64;
    // version, codec, multihash code, digest size
    for _ in 0..4 {
        match read_varint(&section[pos..]) {
            Varint::Value { value, width } => {
                pos += width;
                digest_len = value;
            }
            Varint::Incomplete => return None,
            Varint::Invalid => return Some(section.len()),
        }
    }
    let end = usize::try_from(digest_len).ok()?.checked_add(pos)?;
    (end <= section.len()).then_some(end)
}

fn check_partial_cid(section: &[u8]) -> Result<()> {
    let Some(len) = cid_extent(section) else {
        return Ok(());
    };
    Cid::read_bytes(&section[..len])
        .map(|_| ())
        .map_err(|err| VerifyError::CannotParse(format!("invalid CID in trailing block: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn verifies_single_block_archive() {
        let summary = verify_car(&fixtures::hello_car(), fixtures::HELLO_CID, Completeness::Complete)
            .await
            .unwrap();
        assert_eq!(summary.blocks, 1);
        assert!(!summary.truncated_tail);
    }

    #[tokio::test]
    async fn verifies_every_block_of_multi_block_archive() {
        let summary = verify_car(
            &fixtures::two_block_car(),
            fixtures::HELLO_CID,
            Completeness::Complete,
        )
        .await
        .unwrap();
        assert_eq!(summary.blocks, 2);
    }

    #[tokio::test]
    async fn tampered_last_byte_is_hash_mismatch() {
        let mut bytes = fixtures::hello_car();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        let err = verify_car(&bytes, fixtures::HELLO_CID, Completeness::Complete)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            VerifyError::HashMismatch {
                cid: fixtures::HELLO_CID.to_string()
            }
        );
    }

    #[tokio::test]
    async fn swapped_root_is_unexpected_block() {
        let err = verify_car(&fixtures::other_car(), fixtures::HELLO_CID, Completeness::Complete)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            VerifyError::UnexpectedBlock {
                expected: fixtures::HELLO_CID.to_string(),
                actual:   fixtures::OTHER_CID.to_string(),
            }
        );
        assert_eq!(
            err.to_string(),
            format!(
                "Unexpected block CID {}. Expected: {}",
                fixtures::OTHER_CID,
                fixtures::HELLO_CID
            )
        );
    }

    #[tokio::test]
    async fn garbage_bytes_cannot_be_parsed() {
        let err = verify_car(&[1, 2, 3], fixtures::HELLO_CID, Completeness::Complete)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::CannotParse(_)), "{err:?}");
    }

    #[tokio::test]
    async fn blake2b_block_is_unsupported() {
        let err = verify_car(&fixtures::blake_car(), fixtures::BLAKE_CID, Completeness::Complete)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            VerifyError::UnsupportedHash {
                cid:  fixtures::BLAKE_CID.to_string(),
                code: 0xb220,
            }
        );
    }

    #[tokio::test]
    async fn truncated_tail_is_tolerated_only_when_cut_off() {
        let bytes = fixtures::two_block_car();
        let partial = &bytes[..130];

        let summary = verify_car(partial, fixtures::HELLO_CID, Completeness::Truncated)
            .await
            .unwrap();
        assert_eq!(summary.blocks, 1);
        assert!(summary.truncated_tail);

        let err = verify_car(partial, fixtures::HELLO_CID, Completeness::Complete)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::CannotParse(_)), "{err:?}");
    }

    fn corrupt_second_cid() -> Vec<u8> {
        let mut bytes = fixtures::two_block_car();
        // CID version byte of the second block.
        bytes[113] = 0x05;
        bytes
    }

    #[tokio::test]
    async fn corrupt_whole_block_fails_even_when_cut_off() {
        let bytes = corrupt_second_cid();
        for completeness in [Completeness::Complete, Completeness::Truncated] {
            let err = verify_car(&bytes, fixtures::HELLO_CID, completeness)
                .await
                .unwrap_err();
            assert!(matches!(err, VerifyError::CannotParse(_)), "{completeness:?}: {err:?}");
        }
    }

    #[tokio::test]
    async fn corrupt_cid_of_partial_block_fails() {
        let bytes = corrupt_second_cid();
        let err = verify_car(&bytes[..160], fixtures::HELLO_CID, Completeness::Truncated)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::CannotParse(_)), "{err:?}");

        // The intact archive cut at the same point is fine.
        let bytes = fixtures::two_block_car();
        let summary = verify_car(&bytes[..160], fixtures::HELLO_CID, Completeness::Truncated)
            .await
            .unwrap();
        assert_eq!(summary.blocks, 1);
        assert!(summary.truncated_tail);
    }

    #[tokio::test]
    async fn cut_inside_length_prefix_is_tolerated() {
        let bytes = fixtures::two_block_car();
        let mut partial = bytes[..112].to_vec();
        // Continuation bit set: the length varint is unfinished.
        partial.push(0x80);

        let summary = verify_car(&partial, fixtures::HELLO_CID, Completeness::Truncated)
            .await
            .unwrap();
        assert_eq!(summary.blocks, 1);
        assert!(summary.truncated_tail);
    }

    #[tokio::test]
    async fn whole_archive_marked_truncated_has_no_tail() {
        let summary = verify_car(
            &fixtures::two_block_car(),
            fixtures::HELLO_CID,
            Completeness::Truncated,
        )
        .await
        .unwrap();
        assert_eq!(summary.blocks, 2);
        assert!(!summary.truncated_tail);
    }

    #[test]
    fn varints() {
        assert!(matches!(read_varint(&[0x32]), Varint::Value { value: 0x32, width: 1 }));
        assert!(matches!(read_varint(&[0xac, 0x02]), Varint::Value { value: 300, width: 2 }));
        assert!(matches!(read_varint(&[0x80]), Varint::Incomplete));
        assert!(matches!(read_varint(&[0xff; 10]), Varint::Invalid));
    }

    #[tokio::test]
    async fn truncated_root_block_is_still_a_parse_error() {
        let bytes = fixtures::hello_car();
        let err = verify_car(&bytes[..80], fixtures::HELLO_CID, Completeness::Truncated)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::CannotParse(_)), "{err:?}");
    }
}
