//! Deterministic hash helpers for datasets and schemas, plus artifact id generation.

/// 64-bit FNV-1a hash used for dataset and schema fingerprints.
#[derive(Copy, Clone, Debug)]
pub struct SimpleHash(u64);

impl SimpleHash {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    /// Create a new hash state with the FNV offset basis.
    pub fn new() -> Self {
        Self(Self::OFFSET)
    }

    /// Feed bytes into the hash function.
    pub fn update(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 = (self.0 ^ u64::from(*b)).wrapping_mul(Self::PRIME);
        }
    }

    /// Feed a field separator so that `["ab", "c"]` and `["a", "bc"]` differ.
    pub fn separator(&mut self) {
        self.update(&[0x1f]);
    }

    pub fn finish64(&self) -> u64 {
        self.0
    }

    /// Finalise the hash and return a 16-character lowercase hex string.
    pub fn finish_hex(&self) -> String {
        format!("{:016x}", self.0)
    }
}

impl Default for SimpleHash {
    fn default() -> Self {
        Self::new()
    }
}

/// Fresh, globally unique artifact identifier (`art-<uuid>`).
pub fn new_artifact_id() -> String {
    format!("art-{}", uuid::Uuid::new_v4().simple())
}
