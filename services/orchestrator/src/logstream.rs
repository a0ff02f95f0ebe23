//! Non-durable operator log fan-out.
//!
//! Single bounded producer channel with drop-on-overflow, one broadcaster
//! task, any number of dashboard subscribers. A subscriber that cannot
//! receive is evicted; logs are an observability surface, not a durability
//! surface.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use lighthouse_proto::tui::LogLine;

/// Producer-side channel capacity; overflow silently drops lines.
pub const LOG_CHANNEL_CAPACITY: usize = 256;
const SUBSCRIBER_CAPACITY: usize = 64;

/// Classify a line by substring into a dashboard color tag.
pub fn classify(line: &str) -> &'static str {
    let lower = line.to_lowercase();
    const RED: [&str; 4] = ["error", "failed", "fatal", "panic"];
    const YELLOW: [&str; 4] = ["starting", "checking", "queued", "sending"];
    const GREEN: [&str; 5] = ["connected", "completed", "success", "synced", "established"];

    if RED.iter().any(|needle| lower.contains(needle)) {
        "red"
    } else if YELLOW.iter().any(|needle| lower.contains(needle)) {
        "yellow"
    } else if GREEN.iter().any(|needle| lower.contains(needle)) {
        "green"
    } else {
        "white"
    }
}

/// Cloneable handle held by every subsystem that publishes operator logs,
/// and by the dashboard service for subscriptions.
#[derive(Clone)]
pub struct LogHub {
    tx: mpsc::Sender<String>,
    subscribers: Arc<Mutex<Vec<mpsc::Sender<LogLine>>>>,
}

impl LogHub {
    /// Publish one line. Never blocks; a full channel drops the line.
    pub fn publish(&self, line: impl Into<String>) {
        let _ = self.tx.try_send(line.into());
    }

    /// Attach a new dashboard log client.
    pub fn subscribe(&self) -> mpsc::Receiver<LogLine> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

/// The single fan-out task feeding all subscribers.
pub struct LogBroadcaster {
    rx: mpsc::Receiver<String>,
    subscribers: Arc<Mutex<Vec<mpsc::Sender<LogLine>>>>,
}

impl LogBroadcaster {
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => return,
                line = self.rx.recv() => match line {
                    Some(line) => line,
                    None => return,
                },
            };
            let decorated = LogLine {
                color: classify(&line).to_owned(),
                timestamp: Utc::now().to_rfc3339(),
                line,
            };
            let mut subscribers = self.subscribers.lock().unwrap();
            let before = subscribers.len();
            subscribers.retain(|sub| sub.try_send(decorated.clone()).is_ok());
            if subscribers.len() < before {
                debug!(
                    evicted = before - subscribers.len(),
                    "evicted unresponsive log subscribers"
                );
            }
        }
    }
}

/// Build the hub/broadcaster pair. The broadcaster must be spawned once.
pub fn log_channel() -> (LogHub, LogBroadcaster) {
    let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
    let subscribers = Arc::new(Mutex::new(Vec::new()));
    (
        LogHub {
            tx,
            subscribers: Arc::clone(&subscribers),
        },
        LogBroadcaster { rx, subscribers },
    )
}
