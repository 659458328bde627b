//! Stateless proof-of-work access gate.
//!
//! The server hands out HMAC-signed challenges of the form
//! `"<issued_at_ms>:<seed>"`. A client finds a nonce such that
//! `SHA256(challenge + ":" + nonce)` has the configured number of leading zero
//! bits and submits it together with the echoed signature. On success the
//! server mints a session token `"<hmac>:<issued_at_ms>"` bound to the client
//! IP. Every later check recomputes HMACs from the secret file and the request;
//! nothing is stored between requests.
//!
//! ```no_run
//! use powgate::{DefaultGate, GateConfigBuilder, RequestContext};
//!
//! let config = GateConfigBuilder::default()
//!     .secret_file("/etc/powgate/secrets/example.com.key")
//!     .domain("example.com")
//!     .build_validated()?;
//! let gate = DefaultGate::from_config(config)?;
//!
//! let ctx = RequestContext::new("203.0.113.7", "example.com");
//! if !gate.check_token(&ctx) {
//!     let challenge = gate.issue_challenge(&ctx);
//!     assert_eq!(challenge.status, 200);
//! }
//! # Ok::<(), powgate::Error>(())
//! ```

pub mod config;
pub mod context;
pub mod crypto;
pub mod difficulty;
pub mod error;
pub mod events;
pub mod gate;
pub mod issuer;
pub mod secrets;
pub mod seed;
pub mod solver;
pub mod time;
pub mod token;
pub mod types;
pub mod verifier;

pub use config::{GateConfig, GateConfigBuilder};
pub use context::RequestContext;
pub use difficulty::{leading_zero_bits, meets_difficulty};
pub use error::{ConfigError, Error, Rejection, RejectionKind};
pub use events::{EventKind, EventSink, GateEvent, TracingSink};
#[cfg(all(unix, feature = "daemon-socket"))]
pub use events::SocketSink;
pub use gate::{DefaultGate, GateResponse, PowGate};
pub use issuer::ChallengeIssuer;
pub use secrets::{FileSecretSource, SecretKey, SecretMaterial, SecretSource, StaticSecretSource};
pub use seed::{OsSeedSource, SeedSource};
pub use solver::{solve, Solved};
pub use time::{ManualClock, SystemTimeProvider, TimeProvider};
pub use token::{TokenValidator, TokenVerdict};
pub use types::{Challenge, ChallengeEnvelope, Nonce, SessionToken, Solution};
pub use verifier::{SessionGrant, SolutionVerifier, Verification};
