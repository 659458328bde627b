use blake3::Hasher;
use rand::rngs::OsRng;
use rand::RngCore;

/// Hex characters in a challenge seed.
pub const SEED_HEX_LEN: usize = 16;

/// Pluggable source of the unguessable part of a challenge.
pub trait SeedSource: Send + Sync {
    /// Return a fresh seed of `SEED_HEX_LEN` lowercase hex characters.
    fn seed(&self) -> String;
}

/// Default source: OS randomness mixed through domain-separated BLAKE3.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSeedSource;

impl SeedSource for OsSeedSource {
    fn seed(&self) -> String {
        let mut entropy = [0u8; 32];
        OsRng.fill_bytes(&mut entropy);
        mix_seed(&entropy)
    }
}

/// Hash arbitrary entropy down to a challenge seed.
pub fn mix_seed(entropy: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(b"powgate:seed:v1");
    hasher.update(entropy);
    let digest = hasher.finalize();
    hex::encode(&digest.as_bytes()[..SEED_HEX_LEN / 2])
}

/// Always returns the same seed. For tests and reproducible demos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedSeedSource(pub String);

impl SeedSource for FixedSeedSource {
    fn seed(&self) -> String {
        self.0.clone()
    }
}
