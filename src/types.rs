use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Rejection;

/// Unsigned challenge: `"<issued_at_ms>:<seed>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Challenge {
    pub issued_at_ms: u64,
    pub seed: String,
}

impl Challenge {
    pub fn new(issued_at_ms: u64, seed: impl Into<String>) -> Self {
        Self {
            issued_at_ms,
            seed: seed.into(),
        }
    }

    /// Timestamp prefix of a serialized challenge (text before the first `:`).
    pub fn issued_at_of(raw: &str) -> Option<u64> {
        let prefix = raw.split(':').next()?;
        prefix.parse().ok()
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.issued_at_ms, self.seed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed challenge")]
pub struct ChallengeParseError;

impl FromStr for Challenge {
    type Err = ChallengeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts, seed) = s.split_once(':').ok_or(ChallengeParseError)?;
        let issued_at_ms = ts.parse().map_err(|_| ChallengeParseError)?;
        Ok(Self::new(issued_at_ms, seed))
    }
}

/// Signed challenge as handed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeEnvelope {
    pub challenge: String,
    pub hmac: String,
    pub difficulty: u32,
}

/// Client nonce. Any JSON scalar the client chose to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nonce {
    Text(String),
    /// Canonical decimal text of the number, as a browser would print it.
    Number(String),
    Bool(bool),
    Null,
}

impl Nonce {
    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Nonce::Text(s)),
            Value::Number(n) => Some(Nonce::Number(number_text(&n))),
            Value::Bool(b) => Some(Nonce::Bool(b)),
            Value::Null => Some(Nonce::Null),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Integral floats lose their fraction (`1.0` -> `"1"`, `-0.0` -> `"0"`).
fn number_text(n: &serde_json::Number) -> String {
    if n.is_u64() || n.is_i64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f == 0.0 => "0".to_owned(),
        Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{f:.0}"),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nonce::Text(s) | Nonce::Number(s) => f.write_str(s),
            Nonce::Bool(b) => write!(f, "{b}"),
            Nonce::Null => f.write_str("null"),
        }
    }
}

impl From<u64> for Nonce {
    fn from(n: u64) -> Self {
        Nonce::Number(n.to_string())
    }
}

impl From<&str> for Nonce {
    fn from(s: &str) -> Self {
        Nonce::Text(s.to_owned())
    }
}

/// A submitted solution: challenge and signature echoed back, plus the found nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub challenge: String,
    pub nonce: Nonce,
    pub hmac: String,
}

#[derive(Deserialize)]
struct RawSolution {
    #[serde(default)]
    challenge: Option<Value>,
    #[serde(default)]
    nonce: Option<Value>,
    #[serde(default)]
    hmac: Option<Value>,
}

fn non_empty_string(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// Any truthy value counts as a submitted signature. Non-strings keep their
/// JSON text and can never match a hex digest.
fn present_signature(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::String(_) | Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

impl Solution {
    /// Parse a JSON request body.
    pub fn from_json(body: &[u8]) -> Result<Self, Rejection> {
        let raw: Value = serde_json::from_slice(body).map_err(|_| Rejection::InvalidJson)?;
        if !raw.is_object() {
            return Err(Rejection::MissingFields);
        }
        let raw: RawSolution =
            serde_json::from_value(raw).map_err(|_| Rejection::MissingFields)?;

        let challenge = non_empty_string(raw.challenge).ok_or(Rejection::MissingFields)?;
        let hmac = present_signature(raw.hmac).ok_or(Rejection::MissingFields)?;
        let nonce = raw
            .nonce
            .and_then(Nonce::from_json)
            .ok_or(Rejection::MissingFields)?;

        Ok(Self {
            challenge,
            nonce,
            hmac,
        })
    }

    /// Serialize as the JSON body a client would POST.
    pub fn to_json(&self) -> Value {
        let nonce = match &self.nonce {
            Nonce::Text(s) => Value::String(s.clone()),
            Nonce::Number(s) => serde_json::from_str(s).unwrap_or(Value::String(s.clone())),
            Nonce::Bool(b) => Value::Bool(*b),
            Nonce::Null => Value::Null,
        };
        serde_json::json!({
            "challenge": self.challenge,
            "nonce": nonce,
            "hmac": self.hmac,
        })
    }
}

/// Client-held session credential: `"<signature>:<issued_at_ms>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken {
    pub signature: String,
    pub issued_at_ms: u64,
}

impl SessionToken {
    /// Message the signature covers.
    pub fn signed_message(issued_at_ms: u64, client_ip: &str) -> String {
        format!("{issued_at_ms}:{client_ip}")
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.signature, self.issued_at_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed session token")]
pub struct TokenParseError;

impl FromStr for SessionToken {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (Some(signature), Some(ts), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenParseError);
        };
        if signature.is_empty() || ts.is_empty() || !ts.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TokenParseError);
        }
        let issued_at_ms = ts.parse().map_err(|_| TokenParseError)?;
        Ok(Self {
            signature: signature.to_owned(),
            issued_at_ms,
        })
    }
}
