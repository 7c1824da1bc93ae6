//! Fixed CAR archives shared by the workspace's tests.
//!
//! Each archive is CARv1 with a single root. Checksums are the sha2-256
//! multihash of the exact archive bytes.

/// Raw block `hello spotcheck\n`.
pub const HELLO_CID: &str = "bafkreiefxumq2mlemurqua6odvjjkewklkm3huxdrzf4kwjxh2k6mvkmae";
pub const HELLO_CAR_HEX: &str = "3aa265726f6f747381d82a5825000155122085bd190d316465230a03ce1d529512ca5a99b3d2e38e4bc559373e95e6554c016776657273696f6e01340155122085bd190d316465230a03ce1d529512ca5a99b3d2e38e4bc559373e95e6554c0168656c6c6f2073706f74636865636b0a";
pub const HELLO_CAR_LEN: usize = 112;
pub const HELLO_CAR_CHECKSUM: &str =
    "1220b3352087f25fb432c620851b20bd2cd07cb1be2b8d56b0138963257819da9492";

/// Raw block `another block\n`.
pub const OTHER_CID: &str = "bafkreifaa4kdroxkehcd4z4spc3lie5kcbbl3jubfgxhc6x67m7qce6qjm";
pub const OTHER_CAR_HEX: &str = "3aa265726f6f747381d82a58250001551220a0071438baea21c43e679278b6b413aa1042bda68129ae717afefb3f0113d04b6776657273696f6e013201551220a0071438baea21c43e679278b6b413aa1042bda68129ae717afefb3f0113d04b616e6f7468657220626c6f636b0a";

/// `hello spotcheck\n` addressed with a blake2b-256 multihash.
pub const BLAKE_CID: &str = "bafk2bzacead6b5scb7bkhnxmtuxvvo2swzpikm7e2twxsv3jipfw4ynje5nao";
pub const BLAKE_CAR_HEX: &str = "3ca265726f6f747381d82a5827000155a0e4022007e0f6420fc2a3b6ec9d2f5abb52b65e8533e4d4ed79576943cb6e61a9275a076776657273696f6e01360155a0e4022007e0f6420fc2a3b6ec9d2f5abb52b65e8533e4d4ed79576943cb6e61a9275a0768656c6c6f2073706f74636865636b0a";

/// Root `HELLO_CID` followed by the `OTHER_CID` block.
pub const TWO_BLOCK_CAR_HEX: &str = "3aa265726f6f747381d82a5825000155122085bd190d316465230a03ce1d529512ca5a99b3d2e38e4bc559373e95e6554c016776657273696f6e01340155122085bd190d316465230a03ce1d529512ca5a99b3d2e38e4bc559373e95e6554c0168656c6c6f2073706f74636865636b0a3201551220a0071438baea21c43e679278b6b413aa1042bda68129ae717afefb3f0113d04b616e6f7468657220626c6f636b0a";
pub const TWO_BLOCK_CAR_LEN: usize = 163;
/// Checksum of the first 130 bytes of the two-block archive.
pub const TWO_BLOCK_CAR_PREFIX_130_CHECKSUM: &str =
    "1220da4d19a24f72c9cf2424d18238aaf6bd1f2b55fdb99dfb52ab2af0f68d8b9587";

pub fn hello_car() -> Vec<u8> { decode(HELLO_CAR_HEX) }

pub fn other_car() -> Vec<u8> { decode(OTHER_CAR_HEX) }

pub fn blake_car() -> Vec<u8> { decode(BLAKE_CAR_HEX) }

pub fn two_block_car() -> Vec<u8> { decode(TWO_BLOCK_CAR_HEX) }

fn decode(fixture: &str) -> Vec<u8> { hex::decode(fixture).expect("fixture is valid hex") }
