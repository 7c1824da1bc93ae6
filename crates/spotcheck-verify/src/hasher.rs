use sha2::Digest;

/// Multihash code of sha2-256 followed by its 32-byte digest length.
const SHA2_256_PREFIX: &str = "1220";

pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> Vec<u8>;
}

pub struct Sha256Hasher(sha2::Sha256);

impl Hasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) { self.0.update(data); }
    fn finalize(self) -> Vec<u8> { self.0.finalize().to_vec() }
}

impl Default for Sha256Hasher {
    fn default() -> Self { Self::new() }
}

impl Sha256Hasher {
    pub fn new() -> Self { Self(sha2::Sha256::new()) }

    pub fn digest(data: &[u8]) -> Vec<u8> { sha2::Sha256::digest(data).to_vec() }
}

/// Render a sha2-256 digest as a hex multihash string (`1220<digest>`).
pub fn multihash_hex(digest: &[u8]) -> String {
    format!("{SHA2_256_PREFIX}{}", hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hasher() {
        let mut hasher = Sha256Hasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        let hash = hasher.finalize();

        let expected =
            hex::decode("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
                .unwrap();
        assert_eq!(hash, expected);
        assert_eq!(Sha256Hasher::digest(b"hello world"), expected);
    }

    #[test]
    fn test_multihash_hex_prefix() {
        let digest = [0xabu8; 32];
        let rendered = multihash_hex(&digest);
        assert!(rendered.starts_with("1220"));
        assert_eq!(rendered.len(), 4 + 64);
    }
}
