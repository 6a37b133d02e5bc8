//! Simulated game session
//!
//! Produces one [`StatusRecord`] per tick following a fixed timeline: idle,
//! then the sample song with a random score, then a finished phase, then idle
//! again before the song restarts.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::record::{PlayerStatus, StatusRecord};

/// Idle time before the first song starts
pub const IDLE_LEAD: Duration = Duration::from_secs(12);

/// How long a finished song is still reported
pub const FINISHED_HOLD: Duration = Duration::from_secs(15);

/// Idle time between songs
pub const NEXT_SONG_DELAY: Duration = Duration::from_secs(15);

/// Highest multiplier a player can reach
pub const MAX_MULTIPLIER: u32 = 8;

/// Chance per tick that the multiplier steps up
const MULTIPLIER_STEP_CHANCE: f64 = 0.1;

/// Generator state for one simulated player
#[derive(Debug)]
pub struct GameSession {
    rng: StdRng,
    song_start: Instant,
    score: u64,
    multiplier: u32,
    player_health: Option<i32>,
    finished: bool,
}

impl GameSession {
    /// Start a session whose first song begins [`IDLE_LEAD`] from now
    pub fn new() -> Self {
        Self::starting_at(Instant::now() + IDLE_LEAD, StdRng::from_os_rng())
    }

    /// Start a session whose first song begins at `song_start`
    pub fn starting_at(song_start: Instant, rng: StdRng) -> Self {
        Self {
            rng,
            song_start,
            score: 0,
            multiplier: 1,
            player_health: None,
            finished: false,
        }
    }

    /// Start a reproducible session
    pub fn seeded(song_start: Instant, seed: u64) -> Self {
        Self::starting_at(song_start, StdRng::seed_from_u64(seed))
    }

    /// When the current or next song starts
    pub fn song_start(&self) -> Instant {
        self.song_start
    }

    /// Produce the record for `now`
    pub fn tick(&mut self, now: Instant) -> StatusRecord {
        let Some(elapsed) = now.checked_duration_since(self.song_start) else {
            return StatusRecord::idle();
        };

        let mut record = StatusRecord::sample_song();
        let song_length = record.song_length.unwrap_or_default();
        let cur_song_time = elapsed.as_secs_f64();

        let hit: u64 = self.rng.random_range(0..100);
        if self.multiplier < MAX_MULTIPLIER && self.rng.random_bool(MULTIPLIER_STEP_CHANCE) {
            self.multiplier = if self.multiplier == 1 {
                2
            } else {
                self.multiplier + 2
            };
        }
        self.score += u64::from(self.multiplier) * hit;

        if cur_song_time > song_length {
            self.finished = true;
        }

        record.cur_song_time = Some(cur_song_time);
        record.score = Some(self.score);
        record.multiplier = Some(self.multiplier);
        if let Some(health) = self.player_health {
            record.player_health = Some(health);
        }
        if self.finished {
            record.player_status = Some(PlayerStatus::Finished);
        }

        if self.finished && cur_song_time - song_length > FINISHED_HOLD.as_secs_f64() {
            tracing::debug!(score = self.score, "Song finished, resetting session");
            self.song_start = now + NEXT_SONG_DELAY;
            self.finished = false;
            self.score = 0;
            self.multiplier = 1;
            self.player_health = Some(1);
        }

        record
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}
