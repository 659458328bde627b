/// Failure to obtain usable secret material.
///
/// Always an operator problem: surfaced as a 500 and never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no secret source configured")]
    MissingSource,
    #[error("hmac secret unavailable from {location}: {reason}")]
    MissingSecret { location: String, reason: String },
}

/// Coarse taxonomy of rejected solutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionKind {
    MalformedInput,
    Integrity,
    Freshness,
    ProofOfWork,
    Configuration,
}

/// Why a submitted solution was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("request body is not valid JSON")]
    InvalidJson,
    #[error("challenge, nonce or hmac missing")]
    MissingFields,
    #[error("challenge signature mismatch")]
    BadSignature,
    #[error("challenge expired")]
    Expired,
    #[error("hash does not meet difficulty")]
    InsufficientWork,
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Rejection::InvalidJson | Rejection::MissingFields => RejectionKind::MalformedInput,
            Rejection::BadSignature => RejectionKind::Integrity,
            Rejection::Expired => RejectionKind::Freshness,
            Rejection::InsufficientWork => RejectionKind::ProofOfWork,
            Rejection::Config(_) => RejectionKind::Configuration,
        }
    }

    /// HTTP status the submission endpoint answers with.
    pub fn status(&self) -> u16 {
        match self.kind() {
            RejectionKind::MalformedInput => 400,
            RejectionKind::Integrity | RejectionKind::Freshness | RejectionKind::ProofOfWork => {
                403
            }
            RejectionKind::Configuration => 500,
        }
    }

    /// Message safe to show to the client. Internal detail stays in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            Rejection::InvalidJson => "Invalid JSON",
            Rejection::MissingFields => "Missing required fields",
            Rejection::BadSignature => "Invalid challenge signature",
            Rejection::Expired => "Challenge expired",
            Rejection::InsufficientWork => "Invalid proof of work",
            Rejection::Config(_) => "Server configuration error",
        }
    }

    /// Reason string reported to the tracking daemon, if the failure is one it counts.
    pub fn strike_reason(&self) -> Option<&'static str> {
        match self {
            Rejection::BadSignature => Some("hmac_failed"),
            Rejection::Expired => Some("timeout"),
            Rejection::InsufficientWork => Some("invalid_solution"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("solver failed: {0}")]
    SolverFailed(String),
    #[error("solver channel closed")]
    ChannelClosed,
}
