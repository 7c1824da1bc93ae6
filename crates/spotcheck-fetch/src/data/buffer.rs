/// Result of appending a chunk to a [`CarBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    /// The whole chunk was stored.
    Fit,
    /// Only the first `kept` bytes fit under the cap.
    Overflow { kept: usize },
}

/// Growable byte buffer with a hard capacity.
///
/// Storage grows with the data actually received; the cap only bounds how
/// far it may grow.
#[derive(Debug, Default)]
pub struct CarBuffer {
    bytes: Vec<u8>,
    limit: usize,
}

impl CarBuffer {
    pub fn new(limit: u64) -> Self {
        Self {
            bytes: Vec::new(),
            limit: usize::try_from(limit).unwrap_or(usize::MAX),
        }
    }

    pub fn append(&mut self, chunk: &[u8]) -> Append {
        let remaining = self.remaining();
        if chunk.len() <= remaining {
            self.bytes.extend_from_slice(chunk);
            Append::Fit
        } else {
            self.bytes.extend_from_slice(&chunk[..remaining]);
            Append::Overflow { kept: remaining }
        }
    }

    pub fn remaining(&self) -> usize { self.limit - self.bytes.len() }

    pub fn limit(&self) -> usize { self.limit }

    pub fn len(&self) -> usize { self.bytes.len() }

    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }

    pub fn as_slice(&self) -> &[u8] { &self.bytes }
}
