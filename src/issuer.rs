use std::sync::Arc;

use crate::config::GateConfig;
use crate::crypto::sign_hex;
use crate::error::Error;
use crate::secrets::{SecretMaterial, SecretSource};
use crate::seed::SeedSource;
use crate::time::TimeProvider;
use crate::types::{Challenge, ChallengeEnvelope};

/// Build a signed challenge from already-loaded secrets.
pub fn sign_challenge(
    secrets: &SecretMaterial,
    issued_at_ms: u64,
    seed: String,
    difficulty: u32,
) -> ChallengeEnvelope {
    let challenge = Challenge::new(issued_at_ms, seed).to_string();
    let hmac = sign_hex(secrets.current.as_bytes(), &challenge);
    ChallengeEnvelope {
        challenge,
        hmac,
        difficulty,
    }
}

/// Issues fresh signed challenges. Keeps no record of what it issued.
pub struct ChallengeIssuer<S: SecretSource, T: TimeProvider, R: SeedSource> {
    config: GateConfig,
    secrets: Arc<S>,
    time_provider: Arc<T>,
    seed_source: Arc<R>,
}

impl<S, T, R> ChallengeIssuer<S, T, R>
where
    S: SecretSource,
    T: TimeProvider,
    R: SeedSource,
{
    pub fn new(
        config: GateConfig,
        secrets: Arc<S>,
        time_provider: Arc<T>,
        seed_source: Arc<R>,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            secrets,
            time_provider,
            seed_source,
        })
    }

    pub fn issue(&self) -> Result<ChallengeEnvelope, Error> {
        let secrets = self.secrets.load()?;
        let now = self.time_provider.now_millis();
        let seed = self.seed_source.seed();
        Ok(sign_challenge(&secrets, now, seed, self.config.difficulty))
    }
}
