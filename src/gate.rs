//! Request-level façade: turns component outcomes into HTTP-shaped responses
//! and reports outcomes to the event sink.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use crate::config::GateConfig;
use crate::context::{sanitize_redirect, RequestContext};
use crate::error::{Error, Rejection, RejectionKind};
use crate::events::{EventSink, GateEvent, TracingSink};
use crate::issuer::ChallengeIssuer;
use crate::secrets::{FileSecretSource, SecretSource};
use crate::seed::{OsSeedSource, SeedSource};
use crate::time::{SystemTimeProvider, TimeProvider};
use crate::token::{TokenValidator, TokenVerdict};
use crate::verifier::{SolutionVerifier, Verification};

/// Transport-neutral response: status, headers and a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct GateResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl GateResponse {
    fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_owned(), "application/json".to_owned())],
            body,
        }
    }

    fn with_header(mut self, name: &str, value: String) -> Self {
        self.headers.push((name.to_owned(), value));
        self
    }

    /// First header named `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serialized JSON body, ready to write to the wire.
    pub fn body_bytes(&self) -> Vec<u8> {
        self.body.to_string().into_bytes()
    }
}

/// Gate with the production collaborators.
pub type DefaultGate = PowGate<FileSecretSource, SystemTimeProvider, OsSeedSource, TracingSink>;

pub struct PowGate<S, T, R, E>
where
    S: SecretSource,
    T: TimeProvider,
    R: SeedSource,
    E: EventSink,
{
    config: GateConfig,
    issuer: ChallengeIssuer<S, T, R>,
    verifier: SolutionVerifier<S, T>,
    validator: TokenValidator<S, T>,
    time_provider: Arc<T>,
    sink: Arc<E>,
}

impl DefaultGate {
    /// Secrets from `config.secret_file`, system clock, OS randomness, log-only events.
    pub fn from_config(config: GateConfig) -> Result<Self, Error> {
        let secrets = FileSecretSource::from_optional(config.secret_file.clone());
        PowGate::new(
            config,
            Arc::new(secrets),
            Arc::new(SystemTimeProvider),
            Arc::new(OsSeedSource),
            Arc::new(TracingSink),
        )
    }
}

impl<S, T, R, E> PowGate<S, T, R, E>
where
    S: SecretSource,
    T: TimeProvider,
    R: SeedSource,
    E: EventSink,
{
    pub fn new(
        config: GateConfig,
        secrets: Arc<S>,
        time_provider: Arc<T>,
        seed_source: Arc<R>,
        sink: Arc<E>,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            issuer: ChallengeIssuer::new(
                config.clone(),
                secrets.clone(),
                time_provider.clone(),
                seed_source,
            )?,
            verifier: SolutionVerifier::new(config.clone(), secrets.clone(), time_provider.clone())?,
            validator: TokenValidator::new(config.clone(), secrets, time_provider.clone())?,
            config,
            time_provider,
            sink,
        })
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Challenge endpoint.
    pub fn issue_challenge(&self, ctx: &RequestContext) -> GateResponse {
        match self.issuer.issue() {
            Ok(envelope) => match serde_json::to_value(&envelope) {
                Ok(body) => GateResponse::json(200, body),
                Err(err) => {
                    tracing::error!(domain = self.domain(ctx), error = %err, "challenge serialization failed");
                    GateResponse::json(500, json!({ "error": "Challenge generation failed" }))
                }
            },
            Err(Error::Config(err)) => {
                tracing::error!(domain = self.domain(ctx), error = %err, "cannot issue challenge");
                GateResponse::json(500, json!({ "error": "Server configuration error" }))
            }
            Err(err) => {
                tracing::error!(domain = self.domain(ctx), error = %err, "challenge generation failed");
                GateResponse::json(500, json!({ "error": "Challenge generation failed" }))
            }
        }
    }

    /// Solution submission endpoint.
    pub fn submit_solution(&self, ctx: &RequestContext) -> GateResponse {
        let domain = self.domain(ctx);
        match self.verifier.verify(&ctx.body, &ctx.client_ip) {
            Verification::Accepted(grant) => {
                tracing::debug!(ip = %ctx.client_ip, domain, "solution accepted");
                self.sink
                    .notify(GateEvent::success(&ctx.client_ip, domain, self.event_time()));
                let redirect = sanitize_redirect(ctx.query("redirect"));
                GateResponse::json(200, json!({ "success": true, "redirect": redirect }))
                    .with_header("Set-Cookie", grant.set_cookie())
            }
            Verification::Rejected(rejection) => {
                self.log_rejection(ctx, domain, &rejection);
                if let Some(reason) = rejection.strike_reason() {
                    self.sink.notify(GateEvent::failure(
                        &ctx.client_ip,
                        domain,
                        reason,
                        self.event_time(),
                    ));
                }
                GateResponse::json(
                    rejection.status(),
                    json!({ "success": false, "error": rejection.public_message() }),
                )
            }
        }
    }

    /// Whether the request carries a currently valid session cookie.
    pub fn check_token(&self, ctx: &RequestContext) -> bool {
        let Some(cookie) = ctx.cookie(&self.config.cookie_name) else {
            return false;
        };
        let verdict = self.validator.check(cookie, &ctx.client_ip);
        if verdict == TokenVerdict::ValidPrevious {
            tracing::debug!(ip = %ctx.client_ip, domain = self.domain(ctx), "token accepted under previous secret");
        }
        verdict.is_valid()
    }

    fn log_rejection(&self, ctx: &RequestContext, domain: &str, rejection: &Rejection) {
        match rejection.kind() {
            RejectionKind::Configuration => {
                tracing::error!(domain, error = %rejection, "solution verification unavailable")
            }
            RejectionKind::MalformedInput => {
                tracing::debug!(ip = %ctx.client_ip, domain, reason = %rejection, "malformed submission")
            }
            _ => tracing::warn!(ip = %ctx.client_ip, domain, reason = %rejection, "solution rejected"),
        }
    }

    fn domain<'a>(&'a self, ctx: &'a RequestContext) -> &'a str {
        if self.config.domain.is_empty() {
            &ctx.host
        } else {
            &self.config.domain
        }
    }

    fn event_time(&self) -> DateTime<Utc> {
        let millis = self.time_provider.now_millis() as i64;
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(Utc::now)
    }
}
