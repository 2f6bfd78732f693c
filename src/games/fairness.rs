//! Round seed commitment
//!
//! Every round draws its cards and call order from a 32-byte seed. The SHA-256
//! commitment is published before the first call and the seed is revealed with
//! the result, so anyone holding both can replay the round.

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};

const COMMITMENT_CONTEXT: &[u8] = b"bingo-round-commitment";
const CARD_STREAM: &[u8] = b"bingo-cards";
const CALL_STREAM: &[u8] = b"bingo-calls";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SeedError {
    #[error("Invalid seed hex: {0}")]
    InvalidHex(String),

    #[error("Seed must be 32 bytes, got {0}")]
    InvalidLength(usize),
}

#[derive(Clone, PartialEq, Eq)]
pub struct RoundSeed([u8; 32]);

impl RoundSeed {
    /// Fresh seed from the operating system
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Deterministic seed for tests and simulations
    pub fn from_u64(value: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(value.to_le_bytes());
        Self(hasher.finalize().into())
    }

    pub fn from_hex(input: &str) -> Result<Self, SeedError> {
        let bytes = hex::decode(input.trim()).map_err(|e| SeedError::InvalidHex(e.to_string()))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| SeedError::InvalidLength(b.len()))?;
        Ok(Self(array))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Hex SHA-256 commitment published before calling starts
    pub fn commitment(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(COMMITMENT_CONTEXT);
        hasher.update(self.0);
        hex::encode(hasher.finalize())
    }

    /// RNG used for card generation
    pub fn card_rng(&self) -> StdRng {
        StdRng::from_seed(self.derive(CARD_STREAM))
    }

    /// RNG used for the call sequence
    pub fn call_rng(&self) -> StdRng {
        StdRng::from_seed(self.derive(CALL_STREAM))
    }

    fn derive(&self, stream: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.0);
        hasher.update(stream);
        hasher.finalize().into()
    }

    /// Check a revealed seed against a published commitment
    pub fn verify_commitment(seed_hex: &str, commitment: &str) -> Result<bool, SeedError> {
        let seed = Self::from_hex(seed_hex)?;
        Ok(seed.commitment().eq_ignore_ascii_case(commitment.trim()))
    }
}

// Seeds stay out of debug logs until revealed
impl std::fmt::Debug for RoundSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RoundSeed({})", self.commitment())
    }
}
