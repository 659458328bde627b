//! Client-side nonce search.
//!
//! Browsers normally do this in JavaScript; this solver serves native clients,
//! load tests and the demo.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use sha2::{Digest, Sha256};

use crate::config::MAX_DIFFICULTY;
use crate::difficulty::leading_zero_bits;
use crate::error::Error;

/// A nonce meeting the difficulty, with the hex work hash it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solved {
    pub nonce: u64,
    pub hash: String,
}

#[derive(Debug, Clone)]
pub struct SolveConfig {
    pub threads: usize,
    pub start_nonce: u64,
    /// Give up once a worker draws a nonce at or above this bound.
    pub max_nonce: Option<u64>,
}

impl SolveConfig {
    /// Threads = max(1, num_cpus - 1), unbounded search from zero.
    pub fn default_threads() -> Self {
        let threads = thread::available_parallelism()
            .map(|nz| nz.get())
            .unwrap_or(1)
            .saturating_sub(1)
            .max(1);
        Self {
            threads,
            start_nonce: 0,
            max_nonce: None,
        }
    }
}

/// Nonce counter shared by all workers, with an early-stop latch.
#[derive(Debug)]
struct Search {
    next: AtomicU64,
    max_nonce: Option<u64>,
    stop: AtomicBool,
}

impl Search {
    fn new(start: u64, max_nonce: Option<u64>) -> Self {
        Self {
            next: AtomicU64::new(start),
            max_nonce,
            stop: AtomicBool::new(false),
        }
    }

    /// Next nonce to try, or `None` once stopped or past the bound.
    #[inline]
    fn claim(&self) -> Option<u64> {
        if self.stop.load(Ordering::Relaxed) {
            return None;
        }
        let nonce = self.next.fetch_add(1, Ordering::Relaxed);
        match self.max_nonce {
            Some(max) if nonce >= max => None,
            _ => Some(nonce),
        }
    }

    fn finish(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn hash_nonce(prefix: &[u8], nonce: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(prefix);
    hasher.update(nonce.to_string().as_bytes());
    hasher.finalize().into()
}

/// Search for a decimal nonce `n` with `SHA256(challenge + ":" + n)` meeting `difficulty`.
pub fn solve(challenge: &str, difficulty: u32, threads: usize) -> Result<Solved, Error> {
    solve_with(
        challenge,
        difficulty,
        &SolveConfig {
            threads,
            start_nonce: 0,
            max_nonce: None,
        },
    )
}

pub fn solve_with(challenge: &str, difficulty: u32, cfg: &SolveConfig) -> Result<Solved, Error> {
    if cfg.threads == 0 {
        return Err(Error::InvalidConfig("threads must be >= 1".into()));
    }
    if difficulty > MAX_DIFFICULTY {
        return Err(Error::InvalidConfig(format!(
            "difficulty must be <= {MAX_DIFFICULTY}"
        )));
    }

    let prefix: Arc<[u8]> = format!("{challenge}:").into_bytes().into();
    let search = Arc::new(Search::new(cfg.start_nonce, cfg.max_nonce));
    let (tx, rx) = flume::bounded::<(u64, [u8; 32])>(1);

    let mut joins = Vec::with_capacity(cfg.threads);
    for _ in 0..cfg.threads {
        let prefix = prefix.clone();
        let search = search.clone();
        let tx = tx.clone();
        joins.push(thread::spawn(move || {
            while let Some(nonce) = search.claim() {
                let hash = hash_nonce(&prefix, nonce);
                if leading_zero_bits(&hash) >= difficulty {
                    search.finish();
                    // Another worker may already have filled the slot.
                    let _ = tx.try_send((nonce, hash));
                    return;
                }
            }
        }));
    }
    drop(tx);

    let hit = rx.recv();
    search.finish();
    for join in joins {
        join.join()
            .map_err(|_| Error::SolverFailed("worker panicked".into()))?;
    }

    match hit {
        Ok((nonce, hash)) => Ok(Solved {
            nonce,
            hash: hex::encode(hash),
        }),
        Err(_) if cfg.max_nonce.is_some() => {
            Err(Error::SolverFailed("nonce range exhausted".into()))
        }
        Err(_) => Err(Error::ChannelClosed),
    }
}
