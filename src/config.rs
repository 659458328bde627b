use std::collections::HashMap;
use std::path::PathBuf;

use derive_builder::Builder;

use crate::error::Error;

pub const DEFAULT_DIFFICULTY: u32 = 18;
pub const DEFAULT_COOKIE_DURATION_SECS: u64 = 604_800;
pub const DEFAULT_CHALLENGE_TTL_MS: u64 = 300_000;
pub const DEFAULT_COOKIE_NAME: &str = "pow_token";
/// SHA-256 has no more bits than this.
pub const MAX_DIFFICULTY: u32 = 256;

/// Per-domain gate settings.
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
#[builder(pattern = "owned")]
pub struct GateConfig {
    /// Required leading zero bits of the work hash.
    #[builder(default = "DEFAULT_DIFFICULTY")]
    pub difficulty: u32,
    /// Session cookie lifetime, also the token validity window.
    #[builder(default = "DEFAULT_COOKIE_DURATION_SECS")]
    pub cookie_duration_secs: u64,
    /// How long an issued challenge may be answered.
    #[builder(default = "DEFAULT_CHALLENGE_TTL_MS")]
    pub challenge_ttl_ms: u64,
    #[builder(default = "DEFAULT_COOKIE_NAME.to_owned()", setter(into))]
    pub cookie_name: String,
    /// Location of the `key=value` secret file.
    #[builder(default, setter(into, strip_option))]
    pub secret_file: Option<PathBuf>,
    /// Routing domain this gate protects, used to label events and logs.
    #[builder(default, setter(into))]
    pub domain: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            cookie_duration_secs: DEFAULT_COOKIE_DURATION_SECS,
            challenge_ttl_ms: DEFAULT_CHALLENGE_TTL_MS,
            cookie_name: DEFAULT_COOKIE_NAME.to_owned(),
            secret_file: None,
            domain: String::new(),
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.difficulty == 0 {
            return Err(Error::InvalidConfig("difficulty must be >= 1".into()));
        }
        if self.difficulty > MAX_DIFFICULTY {
            return Err(Error::InvalidConfig(format!(
                "difficulty must be <= {MAX_DIFFICULTY}"
            )));
        }
        if self.cookie_duration_secs == 0 {
            return Err(Error::InvalidConfig(
                "cookie_duration_secs must be >= 1".into(),
            ));
        }
        if self.challenge_ttl_ms == 0 {
            return Err(Error::InvalidConfig("challenge_ttl_ms must be >= 1".into()));
        }
        if self.cookie_name.is_empty()
            || !self
                .cookie_name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(Error::InvalidConfig(
                "cookie_name must be a non-empty token".into(),
            ));
        }
        Ok(())
    }

    /// Build from routing-layer variables (`pow_difficulty`, `pow_cookie_duration`,
    /// `pow_hmac_secret_file`). Unset or unusable numbers fall back to defaults.
    pub fn from_vars(vars: &HashMap<String, String>, domain: &str) -> Self {
        let difficulty = parse_positive(vars.get("pow_difficulty"))
            .and_then(|d| u32::try_from(d).ok())
            .filter(|d| *d <= MAX_DIFFICULTY)
            .unwrap_or(DEFAULT_DIFFICULTY);
        let cookie_duration_secs = parse_positive(vars.get("pow_cookie_duration"))
            .unwrap_or(DEFAULT_COOKIE_DURATION_SECS);
        let secret_file = vars
            .get("pow_hmac_secret_file")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Self {
            difficulty,
            cookie_duration_secs,
            secret_file,
            domain: domain.to_owned(),
            ..Self::default()
        }
    }
}

fn parse_positive(raw: Option<&String>) -> Option<u64> {
    raw?.trim().parse::<u64>().ok().filter(|v| *v > 0)
}

impl GateConfigBuilder {
    pub fn build_validated(self) -> Result<GateConfig, Error> {
        let config = self
            .build()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
