//! Stat recorder
//!
//! Subscribes to an upstream and writes status records as JSON lines. Every
//! record is written while a song is running, plus the first one after it
//! ends; idle records are sampled at most once per [`IDLE_SAMPLE_INTERVAL`].

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

use crate::registry::{FnSubscriber, RelayMessage, SendError, Subscriber};

/// Minimum gap between two idle samples
pub const IDLE_SAMPLE_INTERVAL: Duration = Duration::from_secs(20);

/// One output line
#[derive(Debug, Serialize)]
struct RecordLine<'a> {
    now: u64,
    count: u64,
    msg: &'a Value,
}

/// Sampling state
#[derive(Debug)]
pub struct StatRecorder {
    count: u64,
    was_in_song: bool,
    last_sample: Instant,
    last_count: u64,
}

impl StatRecorder {
    /// Create a recorder whose idle sampling window starts at `now`
    pub fn new(now: Instant) -> Self {
        Self {
            count: 0,
            // The first record is always written
            was_in_song: true,
            last_sample: now,
            last_count: 0,
        }
    }

    /// Number of records seen
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Feed one payload, returning the line to write if it is sampled
    ///
    /// `wall_ms` is the wall-clock timestamp written into the line. Payloads
    /// that are not JSON are counted and skipped.
    pub fn observe(&mut self, text: &str, now: Instant, wall_ms: u64) -> Option<String> {
        self.count += 1;

        let msg: Value = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping non-JSON status payload");
                return None;
            }
        };
        let in_song = msg.get("inSong").and_then(Value::as_bool).unwrap_or(false);

        let sampled = if in_song || self.was_in_song {
            self.was_in_song = in_song;
            true
        } else if now.duration_since(self.last_sample) > IDLE_SAMPLE_INTERVAL
            && self.last_count != self.count
        {
            self.last_count = self.count;
            self.last_sample = now;
            true
        } else {
            false
        };

        if !sampled {
            return None;
        }

        let line = RecordLine {
            now: wall_ms,
            count: self.count,
            msg: &msg,
        };
        serde_json::to_string(&line).ok()
    }

    /// Wrap the recorder as a subscriber printing to stdout
    pub fn into_subscriber(self) -> Arc<dyn Subscriber> {
        let state = Mutex::new(self);

        Arc::new(FnSubscriber::new(move |message: &RelayMessage| {
            let Some(text) = message.as_text() else {
                return Ok(());
            };
            let mut recorder = state
                .lock()
                .map_err(|_| SendError::Failed("recorder state poisoned".to_string()))?;

            if let Some(line) = recorder.observe(text, Instant::now(), wall_clock_ms()) {
                println!("{}", line);
            }
            Ok(())
        }))
    }
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
