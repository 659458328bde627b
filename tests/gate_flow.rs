use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use powgate::{
    solve, ChallengeEnvelope, EventKind, EventSink, FileSecretSource, GateConfigBuilder,
    GateEvent, ManualClock, Nonce, PowGate, RequestContext, SeedSource, Solution,
};

const T0: u64 = 1_735_689_600_000; // 2025-01-01T00:00:00Z
const IP: &str = "192.0.2.44";
const HOST: &str = "shop.example";

#[derive(Default)]
struct Recorder(Mutex<Vec<GateEvent>>);

impl EventSink for Recorder {
    fn notify(&self, event: GateEvent) {
        self.0.lock().unwrap().push(event);
    }
}

struct CountingSeeds(Mutex<u64>);

impl SeedSource for CountingSeeds {
    fn seed(&self) -> String {
        let mut n = self.0.lock().unwrap();
        *n += 1;
        format!("{:016x}", *n)
    }
}

type Gate = PowGate<FileSecretSource, ManualClock, CountingSeeds, Recorder>;

fn write_secrets(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

fn build_gate(path: &Path, difficulty: u32) -> (Gate, Arc<ManualClock>, Arc<Recorder>) {
    let clock = Arc::new(ManualClock::new(T0));
    let recorder = Arc::new(Recorder::default());
    let config = GateConfigBuilder::default()
        .difficulty(difficulty)
        .secret_file(path)
        .domain(HOST)
        .build_validated()
        .unwrap();
    let gate = PowGate::new(
        config.clone(),
        Arc::new(FileSecretSource::from_optional(config.secret_file.clone())),
        clock.clone(),
        Arc::new(CountingSeeds(Mutex::new(0))),
        recorder.clone(),
    )
    .unwrap();
    (gate, clock, recorder)
}

fn fetch_challenge(gate: &Gate) -> ChallengeEnvelope {
    let resp = gate.issue_challenge(&RequestContext::new(IP, HOST));
    assert_eq!(resp.status, 200, "{}", resp.body);
    serde_json::from_value(resp.body).unwrap()
}

fn submit(gate: &Gate, env: &ChallengeEnvelope, nonce: Nonce) -> powgate::GateResponse {
    let body = Solution {
        challenge: env.challenge.clone(),
        nonce,
        hmac: env.hmac.clone(),
    }
    .to_json();
    gate.submit_solution(
        &RequestContext::new(IP, HOST)
            .with_query("redirect", "/checkout")
            .with_body(body.to_string()),
    )
}

fn cookie_value(resp: &powgate::GateResponse) -> String {
    let header = resp.header("Set-Cookie").expect("cookie set");
    header
        .split(';')
        .next()
        .unwrap()
        .strip_prefix("pow_token=")
        .unwrap()
        .to_owned()
}

fn with_cookie(value: &str) -> RequestContext {
    RequestContext::new(IP, HOST).with_header("Cookie", format!("pow_token={value}"))
}

#[test]
fn difficulty_eight_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.example.key");
    write_secrets(&path, "hmac_secret=0f1e2d3c4b5a69788796a5b4c3d2e1f0\n");
    let (gate, clock, recorder) = build_gate(&path, 8);

    let env = fetch_challenge(&gate);
    assert_eq!(env.difficulty, 8);
    let solved = solve(&env.challenge, env.difficulty, 2).unwrap();
    assert!(solved.hash.starts_with("00"));

    clock.advance(1_500);
    let resp = submit(&gate, &env, Nonce::from(solved.nonce));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["success"], true);
    assert_eq!(resp.body["redirect"], "/checkout");
    assert!(resp
        .header("Set-Cookie")
        .unwrap()
        .contains("Max-Age=604800"));

    let token = cookie_value(&resp);
    assert!(token.ends_with(&format!(":{}", T0 + 1_500)));
    assert!(gate.check_token(&with_cookie(&token)));

    clock.advance(604_800 * 1000);
    assert!(gate.check_token(&with_cookie(&token)));
    clock.advance(1);
    assert!(!gate.check_token(&with_cookie(&token)));

    let events = recorder.0.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Success);
    assert_eq!(events[0].ip, IP);
}

#[test]
fn string_nonce_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("k");
    write_secrets(&path, "hmac_secret=abc\n");
    let (gate, _clock, _recorder) = build_gate(&path, 6);

    let env = fetch_challenge(&gate);
    let solved = solve(&env.challenge, env.difficulty, 1).unwrap();
    let resp = submit(&gate, &env, Nonce::Text(solved.nonce.to_string()));
    assert_eq!(resp.status, 200);
}

#[test]
fn challenge_expires_after_five_minutes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("k");
    write_secrets(&path, "hmac_secret=abc\n");
    let (gate, clock, recorder) = build_gate(&path, 4);

    let env = fetch_challenge(&gate);
    let solved = solve(&env.challenge, env.difficulty, 1).unwrap();

    clock.set(T0 + 300_000);
    assert_eq!(submit(&gate, &env, Nonce::from(solved.nonce)).status, 200);

    clock.set(T0 + 300_001);
    let resp = submit(&gate, &env, Nonce::from(solved.nonce));
    assert_eq!(resp.status, 403);
    assert_eq!(resp.body["error"], "Challenge expired");

    let events = recorder.0.lock().unwrap();
    assert_eq!(events.last().unwrap().reason.as_deref(), Some("timeout"));
}

#[test]
fn challenge_signed_under_other_secret_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("k");
    write_secrets(&path, "hmac_secret=attacker-guess\n");
    let (gate, _clock, _recorder) = build_gate(&path, 6);
    let forged = fetch_challenge(&gate);
    let solved = solve(&forged.challenge, forged.difficulty, 1).unwrap();

    write_secrets(&path, "hmac_secret=real-secret\n");
    let resp = submit(&gate, &forged, Nonce::from(solved.nonce));
    assert_eq!(resp.status, 403);
    assert_eq!(resp.body["error"], "Invalid challenge signature");
}

#[test]
fn tokens_survive_rotation_until_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("k");
    write_secrets(&path, "hmac_secret=old-key\n");
    let (gate, clock, _recorder) = build_gate(&path, 4);

    let env = fetch_challenge(&gate);
    let solved = solve(&env.challenge, env.difficulty, 1).unwrap();
    let old_token = cookie_value(&submit(&gate, &env, Nonce::from(solved.nonce)));
    assert!(gate.check_token(&with_cookie(&old_token)));

    // Rotation deadline one hour after T0.
    write_secrets(
        &path,
        "hmac_secret=new-key\nhmac_secret_old=old-key\nrotation_expires=2025-01-01T01:00:00Z\n",
    );
    clock.set(T0 + 3_599_999);
    assert!(gate.check_token(&with_cookie(&old_token)));

    let env = fetch_challenge(&gate);
    let solved = solve(&env.challenge, env.difficulty, 1).unwrap();
    let new_token = cookie_value(&submit(&gate, &env, Nonce::from(solved.nonce)));

    clock.set(T0 + 3_600_000);
    assert!(!gate.check_token(&with_cookie(&old_token)));
    assert!(gate.check_token(&with_cookie(&new_token)));
}

#[test]
fn broken_secret_file_is_a_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("k");
    write_secrets(&path, "hmac_secret_old=only-old\n");
    let (gate, _clock, recorder) = build_gate(&path, 4);

    let resp = gate.issue_challenge(&RequestContext::new(IP, HOST));
    assert_eq!(resp.status, 500);
    assert_eq!(resp.body["error"], "Server configuration error");

    let resp = gate.submit_solution(
        &RequestContext::new(IP, HOST).with_body(r#"{"challenge":"1:a","nonce":3,"hmac":"ab"}"#),
    );
    assert_eq!(resp.status, 500);
    assert!(recorder.0.lock().unwrap().is_empty());
}

#[test]
fn gate_is_shareable_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("k");
    write_secrets(&path, "hmac_secret=threads\n");
    let (gate, _clock, recorder) = build_gate(&path, 4);
    let gate = Arc::new(gate);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let gate = gate.clone();
            std::thread::spawn(move || {
                let env = fetch_challenge(&gate);
                let solved = solve(&env.challenge, env.difficulty, 1).unwrap();
                submit(&gate, &env, Nonce::from(solved.nonce)).status
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 200);
    }
    assert_eq!(recorder.0.lock().unwrap().len(), 4);
}
