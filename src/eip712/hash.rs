//! Keccak-256 plumbing for the typed-data session.

use sha3::{Digest, Keccak256};

/// One-shot Keccak-256.
pub(crate) fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Chained extension of a 32-byte accumulator: `acc = keccak(acc ‖ chunk)`.
///
/// The extended-type hashes are built from many small chunks; chaining
/// keeps the per-frame state at a fixed 32 bytes instead of a full
/// hasher context per accumulator.
pub(crate) fn extend_hash(acc: &mut [u8; 32], chunk: &[u8]) {
    let mut hasher = Keccak256::new();
    hasher.update(acc.as_ref());
    hasher.update(chunk);
    *acc = hasher.finalize().into();
}

/// A running Keccak context or its finished digest, in one slot.
#[derive(Clone)]
pub(crate) enum HashSlot {
    Running(Keccak256),
    Digest([u8; 32]),
}

impl HashSlot {
    pub fn new() -> Self {
        Self::Running(Keccak256::new())
    }

    /// Feeds data into the running context. Fails after finalization.
    pub fn update(&mut self, data: &[u8]) -> bool {
        match self {
            Self::Running(hasher) => {
                hasher.update(data);
                true
            }
            Self::Digest(_) => false,
        }
    }

    /// Replaces the running context with its digest.
    pub fn finalize(&mut self) -> bool {
        match self {
            Self::Running(hasher) => {
                let digest: [u8; 32] = hasher.clone().finalize().into();
                *self = Self::Digest(digest);
                true
            }
            Self::Digest(_) => false,
        }
    }

    /// The digest, once finalized.
    pub fn digest(&self) -> Option<&[u8; 32]> {
        match self {
            Self::Running(_) => None,
            Self::Digest(digest) => Some(digest),
        }
    }
}

impl Default for HashSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        // well-known Keccak-256 of the empty string
        let digest = keccak256(b"");
        assert_eq!(
            digest[..4],
            [0xc5, 0xd2, 0x46, 0x01],
        );
    }

    #[test]
    fn test_hash_slot_lifecycle() {
        let mut slot = HashSlot::new();
        assert!(slot.digest().is_none());
        assert!(slot.update(b"abc"));
        assert!(slot.finalize());

        let digest = *slot.digest().expect("finalized");
        assert_eq!(digest, keccak256(b"abc"));

        // further updates and finalizations are rejected
        assert!(!slot.update(b"more"));
        assert!(!slot.finalize());
        assert_eq!(slot.digest(), Some(&digest));
    }

    #[test]
    fn test_extend_hash_chains() {
        let mut acc = [0u8; 32];
        extend_hash(&mut acc, b"Person");

        let mut manual = [0u8; 32];
        let mut hasher = sha3::Keccak256::new();
        hasher.update([0u8; 32]);
        hasher.update(b"Person");
        manual.copy_from_slice(&hasher.finalize());

        assert_eq!(acc, manual);
    }
}
