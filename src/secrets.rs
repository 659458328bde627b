//! Secret material loading.
//!
//! Secrets are read on every operation and never cached, so a rotation written
//! by an external process is picked up by the next request.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::ConfigError;

/// HMAC key bytes. `Debug` never prints them.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(<{} bytes>)", self.0.len())
    }
}

impl From<&str> for SecretKey {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

/// Current key plus an optional rotating-out key and its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMaterial {
    pub current: SecretKey,
    previous: Option<(SecretKey, DateTime<Utc>)>,
}

impl SecretMaterial {
    pub fn new(current: impl Into<SecretKey>) -> Self {
        Self {
            current: current.into(),
            previous: None,
        }
    }

    /// Attach a previous key honored until `expires_at`.
    pub fn with_previous(mut self, previous: impl Into<SecretKey>, expires_at: DateTime<Utc>) -> Self {
        self.previous = Some((previous.into(), expires_at));
        self
    }

    pub fn previous(&self) -> Option<&SecretKey> {
        self.previous.as_ref().map(|(key, _)| key)
    }

    pub fn rotation_expires_at(&self) -> Option<DateTime<Utc>> {
        self.previous.as_ref().map(|(_, at)| *at)
    }

    /// The previous key, but only while `now_ms` is before the rotation deadline.
    pub fn previous_if_active(&self, now_ms: u64) -> Option<&SecretKey> {
        let (key, expires_at) = self.previous.as_ref()?;
        let deadline = expires_at.timestamp_millis();
        if deadline > 0 && now_ms < deadline as u64 {
            Some(key)
        } else {
            None
        }
    }
}

/// Where secret material comes from.
pub trait SecretSource: Send + Sync {
    fn load(&self) -> Result<SecretMaterial, ConfigError>;
}

/// `key=value` secret file, re-read on every call.
#[derive(Debug, Clone, Default)]
pub struct FileSecretSource {
    path: Option<PathBuf>,
}

impl FileSecretSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A source with no configured location; every load fails with `MissingSource`.
    pub fn unconfigured() -> Self {
        Self { path: None }
    }

    pub fn from_optional(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl SecretSource for FileSecretSource {
    fn load(&self) -> Result<SecretMaterial, ConfigError> {
        let path = self.path.as_ref().ok_or(ConfigError::MissingSource)?;
        let location = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::MissingSecret {
            location: location.clone(),
            reason: e.to_string(),
        })?;
        parse_secret_file(&content, &location)
    }
}

/// In-memory secret material.
#[derive(Debug, Clone)]
pub struct StaticSecretSource {
    material: SecretMaterial,
}

impl StaticSecretSource {
    pub fn new(material: SecretMaterial) -> Self {
        Self { material }
    }
}

impl SecretSource for StaticSecretSource {
    fn load(&self) -> Result<SecretMaterial, ConfigError> {
        Ok(self.material.clone())
    }
}

/// Parse the contents of a secret file. `location` only labels errors and logs.
pub fn parse_secret_file(content: &str, location: &str) -> Result<SecretMaterial, ConfigError> {
    let mut current = None;
    let mut previous = None;
    let mut rotation_expires = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "hmac_secret" => current = Some(value),
            "hmac_secret_old" => previous = Some(value),
            "rotation_expires" => rotation_expires = Some(value),
            _ => {}
        }
    }

    let current = current
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingSecret {
            location: location.to_owned(),
            reason: "hmac_secret not set".to_owned(),
        })?;
    let mut material = SecretMaterial::new(current);

    match (previous.filter(|v| !v.is_empty()), rotation_expires) {
        (Some(old), Some(raw)) => match parse_rotation_deadline(raw) {
            Some(at) => material = material.with_previous(old, at),
            None => tracing::warn!(
                location,
                rotation_expires = raw,
                "unparseable rotation_expires; previous secret ignored"
            ),
        },
        (Some(_), None) => tracing::warn!(
            location,
            "hmac_secret_old present without rotation_expires; previous secret ignored"
        ),
        (None, _) => {}
    }

    Ok(material)
}

/// Accepts RFC 3339, naive ISO date-time (UTC), `YYYY-MM-DD` or epoch milliseconds.
pub fn parse_rotation_deadline(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        let millis: i64 = raw.parse().ok()?;
        return Utc.timestamp_millis_opt(millis).single();
    }
    None
}
