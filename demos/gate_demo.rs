//! End-to-end demo of the gate flow in a single process.
//!
//! - Writes a throwaway secret file and builds a `DefaultGate` from it.
//! - Client asks for a challenge, solves it on all cores, submits.
//! - The returned cookie is checked the way a router would.
//!
//! Run with `RUST_LOG=powgate=debug` to see the gate's own log lines.

use std::error::Error;
use std::time::Instant;

use powgate::solver::{solve_with, SolveConfig};
use powgate::{ChallengeEnvelope, DefaultGate, GateConfigBuilder, Nonce, RequestContext, Solution};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dir = std::env::temp_dir().join(format!("powgate-demo-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let secret_file = dir.join("demo.example.key");
    std::fs::write(&secret_file, "hmac_secret=demo-secret-change-me\n")?;

    let config = GateConfigBuilder::default()
        .difficulty(16)
        .secret_file(&secret_file)
        .domain("demo.example")
        .build_validated()?;
    let gate = DefaultGate::from_config(config)?;
    let client_ip = "127.0.0.1";

    let ctx = RequestContext::new(client_ip, "demo.example");
    println!("has valid cookie: {}", gate.check_token(&ctx));

    let resp = gate.issue_challenge(&ctx);
    let envelope: ChallengeEnvelope = serde_json::from_value(resp.body)?;
    println!(
        "challenge {} (difficulty {} bits)",
        envelope.challenge, envelope.difficulty
    );

    let started = Instant::now();
    let solved = solve_with(
        &envelope.challenge,
        envelope.difficulty,
        &SolveConfig::default_threads(),
    )?;
    println!(
        "solved: nonce={} hash={} in {:?}",
        solved.nonce,
        solved.hash,
        started.elapsed()
    );

    let body = Solution {
        challenge: envelope.challenge,
        nonce: Nonce::from(solved.nonce),
        hmac: envelope.hmac,
    }
    .to_json();
    let resp = gate.submit_solution(
        &RequestContext::new(client_ip, "demo.example")
            .with_query("redirect", "/welcome")
            .with_body(body.to_string()),
    );
    println!(
        "submit -> {} {}",
        resp.status,
        String::from_utf8_lossy(&resp.body_bytes())
    );

    let cookie = resp
        .header("Set-Cookie")
        .and_then(|c| c.split(';').next())
        .ok_or("no cookie issued")?;
    let ctx = RequestContext::new(client_ip, "demo.example").with_header("Cookie", cookie);
    println!("has valid cookie: {}", gate.check_token(&ctx));

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
