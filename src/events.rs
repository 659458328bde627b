//! Fire-and-forget outcome events for an external tracking daemon.
//!
//! Sinks never report errors back to the caller: an event that cannot be
//! delivered is logged and dropped, and the gate's decision stands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Success,
    Failure,
}

/// One line on the daemon socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub ip: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl GateEvent {
    pub fn success(ip: &str, domain: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::Success,
            ip: ip.to_owned(),
            domain: domain.to_owned(),
            reason: None,
            timestamp,
        }
    }

    pub fn failure(ip: &str, domain: &str, reason: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::Failure,
            ip: ip.to_owned(),
            domain: domain.to_owned(),
            reason: Some(reason.to_owned()),
            timestamp,
        }
    }
}

/// Daemon reply to an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonResponse {
    #[serde(default)]
    pub strike_count: u32,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub trait EventSink: Send + Sync {
    /// Hand off an event. Must not block on delivery.
    fn notify(&self, event: GateEvent);
}

/// Writes events to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn notify(&self, event: GateEvent) {
        match event.kind {
            EventKind::Success => {
                tracing::info!(ip = %event.ip, domain = %event.domain, "pow success")
            }
            EventKind::Failure => tracing::warn!(
                ip = %event.ip,
                domain = %event.domain,
                reason = event.reason.as_deref().unwrap_or("unknown"),
                "pow failure"
            ),
        }
    }
}

#[cfg(all(unix, feature = "daemon-socket"))]
pub use socket::{SocketSink, DEFAULT_SOCKET_PATH};

#[cfg(all(unix, feature = "daemon-socket"))]
mod socket {
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixStream;
    use std::path::{Path, PathBuf};
    use std::thread;
    use std::time::Duration;

    use flume::{Sender, TrySendError};

    use super::{DaemonResponse, EventSink, GateEvent};
    use crate::error::Error;

    pub const DEFAULT_SOCKET_PATH: &str = "/var/run/powgate/tracker.sock";
    const IO_TIMEOUT: Duration = Duration::from_millis(500);

    /// Sends events to the tracking daemon over a Unix socket from a background thread.
    ///
    /// The queue is bounded; when it is full new events are dropped.
    #[derive(Debug, Clone)]
    pub struct SocketSink {
        tx: Sender<GateEvent>,
    }

    impl SocketSink {
        pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, Error> {
            if capacity == 0 {
                return Err(Error::InvalidConfig("sink capacity must be >= 1".into()));
            }
            let path = path.into();
            let (tx, rx) = flume::bounded::<GateEvent>(capacity);
            thread::Builder::new()
                .name("powgate-daemon-sink".into())
                .spawn(move || {
                    while let Ok(event) = rx.recv() {
                        let reply = match deliver(&path, &event) {
                            Ok(reply) => reply,
                            Err(err) => {
                                tracing::warn!(
                                    socket = %path.display(),
                                    error = %err,
                                    "failed to contact daemon"
                                );
                                continue;
                            }
                        };
                        match parse_reply(&reply) {
                            Ok(resp) => tracing::debug!(
                                ip = %event.ip,
                                strike_count = resp.strike_count,
                                blocked = resp.blocked,
                                "daemon acknowledged event"
                            ),
                            Err(err) => tracing::warn!(
                                ip = %event.ip,
                                reply = reply.trim(),
                                error = %err,
                                "unreadable daemon reply"
                            ),
                        }
                    }
                })
                .map_err(|e| Error::InvalidConfig(format!("cannot start sink thread: {e}")))?;
            Ok(Self { tx })
        }
    }

    impl EventSink for SocketSink {
        fn notify(&self, event: GateEvent) {
            match self.tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    tracing::warn!(ip = %event.ip, "daemon queue full; event dropped")
                }
                Err(TrySendError::Disconnected(event)) => {
                    tracing::warn!(ip = %event.ip, "daemon sink stopped; event dropped")
                }
            }
        }
    }

    /// Write one event line and return the daemon's raw reply line.
    fn deliver(path: &Path, event: &GateEvent) -> std::io::Result<String> {
        let mut stream = UnixStream::connect(path)?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        stream.write_all(&line)?;

        let mut reply = String::new();
        BufReader::new(&stream).read_line(&mut reply)?;
        Ok(reply)
    }

    fn parse_reply(reply: &str) -> Result<DaemonResponse, serde_json::Error> {
        serde_json::from_str(reply.trim())
    }

}
