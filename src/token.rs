use std::sync::Arc;

use crate::config::GateConfig;
use crate::crypto::verify_hex;
use crate::error::Error;
use crate::secrets::{SecretMaterial, SecretSource};
use crate::time::TimeProvider;
use crate::types::SessionToken;

/// Outcome of checking a presented session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenVerdict {
    /// Signed with the current key.
    Valid,
    /// Signed with the previous key inside the rotation window.
    ValidPrevious,
    Malformed,
    Expired,
    BadSignature,
    /// Secrets could not be loaded.
    Config,
}

impl TokenVerdict {
    pub fn is_valid(self) -> bool {
        matches!(self, TokenVerdict::Valid | TokenVerdict::ValidPrevious)
    }
}

/// Check `cookie_value` for `client_ip` at `now_ms`.
pub fn validate_token(
    cookie_value: &str,
    secrets: &SecretMaterial,
    client_ip: &str,
    duration_secs: u64,
    now_ms: u64,
) -> TokenVerdict {
    let Ok(token) = cookie_value.parse::<SessionToken>() else {
        return TokenVerdict::Malformed;
    };
    if now_ms.saturating_sub(token.issued_at_ms) > duration_secs.saturating_mul(1000) {
        return TokenVerdict::Expired;
    }

    let message = SessionToken::signed_message(token.issued_at_ms, client_ip);
    if verify_hex(secrets.current.as_bytes(), &message, &token.signature) {
        return TokenVerdict::Valid;
    }
    match secrets.previous_if_active(now_ms) {
        Some(previous) if verify_hex(previous.as_bytes(), &message, &token.signature) => {
            TokenVerdict::ValidPrevious
        }
        _ => TokenVerdict::BadSignature,
    }
}

/// Answers "is this presented token currently valid" without storing anything.
pub struct TokenValidator<S: SecretSource, T: TimeProvider> {
    config: GateConfig,
    secrets: Arc<S>,
    time_provider: Arc<T>,
}

impl<S, T> TokenValidator<S, T>
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

    pub fn check(&self, cookie_value: &str, client_ip: &str) -> TokenVerdict {
        let secrets = match self.secrets.load() {
            Ok(secrets) => secrets,
            Err(err) => {
                tracing::error!(domain = %self.config.domain, error = %err, "token check could not load secrets");
                return TokenVerdict::Config;
            }
        };
        validate_token(
            cookie_value,
            &secrets,
            client_ip,
            self.config.cookie_duration_secs,
            self.time_provider.now_millis(),
        )
    }

    pub fn validate(&self, cookie_value: &str, client_ip: &str) -> bool {
        self.check(cookie_value, client_ip).is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sign_hex;
    use crate::secrets::{FileSecretSource, StaticSecretSource};
    use crate::time::ManualClock;
    use crate::verifier::mint_token;
    use chrono::{TimeZone, Utc};

    const T0: u64 = 1_700_000_000_000;
    const IP: &str = "198.51.100.20";
    const WEEK: u64 = 604_800;

    fn token_under(secret: &str, issued_at: u64) -> String {
        mint_token(&SecretMaterial::new(secret), IP, issued_at).to_string()
    }

    #[test]
    fn fresh_token_round_trip() {
        let secrets = SecretMaterial::new("A");
        let token = token_under("A", T0);
        assert_eq!(validate_token(&token, &secrets, IP, WEEK, T0), TokenVerdict::Valid);
        assert_eq!(
            validate_token(&token, &secrets, "198.51.100.21", WEEK, T0),
            TokenVerdict::BadSignature
        );
    }

    #[test]
    fn expiry_boundary() {
        let secrets = SecretMaterial::new("A");
        let token = token_under("A", T0);
        let limit = T0 + WEEK * 1000;
        assert_eq!(validate_token(&token, &secrets, IP, WEEK, limit), TokenVerdict::Valid);
        assert_eq!(
            validate_token(&token, &secrets, IP, WEEK, limit + 1),
            TokenVerdict::Expired
        );
    }

    #[test]
    fn rotation_window() {
        let deadline_ms = T0 + 60_000;
        let deadline = Utc.timestamp_millis_opt(deadline_ms as i64).unwrap();
        let secrets = SecretMaterial::new("A").with_previous("B", deadline);
        let old = token_under("B", T0);
        let new = token_under("A", T0);

        assert_eq!(
            validate_token(&old, &secrets, IP, WEEK, deadline_ms - 1),
            TokenVerdict::ValidPrevious
        );
        assert_eq!(
            validate_token(&old, &secrets, IP, WEEK, deadline_ms),
            TokenVerdict::BadSignature
        );
        for now in [T0, deadline_ms - 1, deadline_ms, deadline_ms + 1_000_000] {
            assert_eq!(validate_token(&new, &secrets, IP, WEEK, now), TokenVerdict::Valid);
        }
    }

    #[test]
    fn previous_without_rotation_is_ignored() {
        let secrets = SecretMaterial::new("A");
        assert_eq!(
            validate_token(&token_under("B", T0), &secrets, IP, WEEK, T0),
            TokenVerdict::BadSignature
        );
    }

    #[test]
    fn malformed_tokens() {
        let secrets = SecretMaterial::new("A");
        let sig = sign_hex(b"A", &format!("{T0}:{IP}"));
        let three_parts = format!("{sig}:{T0}:x");
        let bad_ts = format!("{sig}:abc");
        let cases: [&str; 5] = ["", "garbage", &sig, &three_parts, &bad_ts];
        for raw in cases {
            assert_eq!(
                validate_token(raw, &secrets, IP, WEEK, T0),
                TokenVerdict::Malformed,
                "{raw:?}"
            );
        }
    }

    #[test]
    fn forged_timestamp_fails_signature() {
        let secrets = SecretMaterial::new("A");
        let token: SessionToken = token_under("A", T0).parse().unwrap();
        let forged = SessionToken {
            issued_at_ms: T0 + 5_000,
            ..token
        };
        assert_eq!(
            validate_token(&forged.to_string(), &secrets, IP, WEEK, T0 + 5_000),
            TokenVerdict::BadSignature
        );
    }

    #[test]
    fn validator_reads_secrets_per_call() {
        let clock = Arc::new(ManualClock::new(T0));
        let validator = TokenValidator::new(
            GateConfig::default(),
            Arc::new(StaticSecretSource::new(SecretMaterial::new("A"))),
            clock.clone(),
        )
        .unwrap();
        let token = token_under("A", T0);
        assert!(validator.validate(&token, IP));
        clock.advance(WEEK * 1000 + 1);
        assert_eq!(validator.check(&token, IP), TokenVerdict::Expired);
        assert!(!validator.validate(&token, IP));
    }

    #[test]
    fn validator_without_secrets_denies() {
        let validator = TokenValidator::new(
            GateConfig::default(),
            Arc::new(FileSecretSource::unconfigured()),
            Arc::new(ManualClock::new(T0)),
        )
        .unwrap();
        assert_eq!(validator.check(&token_under("A", T0), IP), TokenVerdict::Config);
    }
}
