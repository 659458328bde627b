//! Solution verification and session-token minting.
//!
//! Checks run in a fixed order and stop at the first failure: input shape,
//! secret availability, challenge signature, freshness, then proof of work.

use std::sync::Arc;

use crate::config::GateConfig;
use crate::crypto::{sign_hex, verify_hex, work_hash_hex};
use crate::difficulty::meets_difficulty;
use crate::error::{Error, Rejection};
use crate::secrets::{SecretMaterial, SecretSource};
use crate::time::TimeProvider;
use crate::types::{Challenge, SessionToken, Solution};

/// A freshly minted session and how long its cookie should live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub token: SessionToken,
    pub max_age_secs: u64,
    pub cookie_name: String,
}

impl SessionGrant {
    /// `Set-Cookie` header value for this grant.
    pub fn set_cookie(&self) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age={}",
            self.cookie_name, self.token, self.max_age_secs
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Accepted(SessionGrant),
    Rejected(Rejection),
}

impl Verification {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verification::Accepted(_))
    }
}

/// Mint a session token for `client_ip` at `now_ms`.
pub fn mint_token(secrets: &SecretMaterial, client_ip: &str, now_ms: u64) -> SessionToken {
    let message = SessionToken::signed_message(now_ms, client_ip);
    SessionToken {
        signature: sign_hex(secrets.current.as_bytes(), &message),
        issued_at_ms: now_ms,
    }
}

/// Signature, freshness and work checks for an already parsed solution.
///
/// Returns the minted token on success.
pub fn verify_solution(
    solution: &Solution,
    secrets: &SecretMaterial,
    difficulty: u32,
    client_ip: &str,
    now_ms: u64,
    ttl_ms: u64,
) -> Result<SessionToken, Rejection> {
    if !verify_hex(
        secrets.current.as_bytes(),
        &solution.challenge,
        &solution.hmac,
    ) {
        return Err(Rejection::BadSignature);
    }

    let issued_at = Challenge::issued_at_of(&solution.challenge).ok_or(Rejection::Expired)?;
    if now_ms.saturating_sub(issued_at) > ttl_ms {
        return Err(Rejection::Expired);
    }

    let hash = work_hash_hex(&solution.challenge, &solution.nonce.to_string());
    if !meets_difficulty(&hash, difficulty) {
        return Err(Rejection::InsufficientWork);
    }

    Ok(mint_token(secrets, client_ip, now_ms))
}

/// Verifies submitted solutions against freshly loaded secrets.
pub struct SolutionVerifier<S: SecretSource, T: TimeProvider> {
    config: GateConfig,
    secrets: Arc<S>,
    time_provider: Arc<T>,
}

impl<S, T> SolutionVerifier<S, T>
where
    S: SecretSource,
    T: TimeProvider,
{
    pub fn new(config: GateConfig, secrets: Arc<S>, time_provider: Arc<T>) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            secrets,
            time_provider,
        })
    }

    /// Verify a raw JSON submission from `client_ip`.
    pub fn verify(&self, body: &[u8], client_ip: &str) -> Verification {
        match self.try_verify(body, client_ip) {
            Ok(grant) => Verification::Accepted(grant),
            Err(rejection) => Verification::Rejected(rejection),
        }
    }

    fn try_verify(&self, body: &[u8], client_ip: &str) -> Result<SessionGrant, Rejection> {
        let solution = Solution::from_json(body)?;
        let secrets = self.secrets.load()?;
        let now = self.time_provider.now_millis();
        let token = verify_solution(
            &solution,
            &secrets,
            self.config.difficulty,
            client_ip,
            now,
            self.config.challenge_ttl_ms,
        )?;
        Ok(SessionGrant {
            token,
            max_age_secs: self.config.cookie_duration_secs,
            cookie_name: self.config.cookie_name.clone(),
        })
    }
}
