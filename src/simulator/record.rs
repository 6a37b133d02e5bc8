//! Game status record
//!
//! Mirrors the JSON the game's status socket emits. Song fields are absent
//! while the player is not in a song.

use serde::{Deserialize, Serialize};

use crate::registry::RelayMessage;

/// Reported `gameVersion` while idle
pub const IDLE_GAME_VERSION: &str = "1.0.3000-dummy";

/// Player state within a song
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerStatus {
    Playing,
    Finished,
}

/// One status payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub game_version: String,
    pub in_song: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choreo_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choreographer: Option<String>,
    #[serde(rename = "songID", default, skip_serializing_if = "Option::is_none")]
    pub song_id: Option<String>,
    #[serde(rename = "choreoID", default, skip_serializing_if = "Option::is_none")]
    pub choreo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_status: Option<PlayerStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_health: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cur_song_time: Option<f64>,
}

impl StatusRecord {
    /// Record sent while no song is running
    pub fn idle() -> Self {
        Self {
            game_version: IDLE_GAME_VERSION.to_string(),
            in_song: false,
            trip_type: None,
            song_length: None,
            song_title: None,
            song_artist: None,
            choreo_name: None,
            choreographer: None,
            song_id: None,
            choreo_id: None,
            player_status: None,
            score: None,
            multiplier: None,
            player_health: None,
            cur_song_time: None,
        }
    }

    /// The one song the simulator plays
    pub fn sample_song() -> Self {
        Self {
            game_version: "1.0.3066".to_string(),
            in_song: true,
            trip_type: Some("FullTrip".to_string()),
            song_length: Some(375.23),
            song_title: Some("Jurassic Snack Pack".to_string()),
            song_artist: Some("PrototypeRaptor".to_string()),
            choreo_name: Some("Expert".to_string()),
            choreographer: Some("Kinemotik Studios".to_string()),
            song_id: Some("4".to_string()),
            choreo_id: Some(
                "6bc1bab19320ee19955d6f5fb4fa9e0262ed05a9a1e26c389c73af21904ab22b".to_string(),
            ),
            player_status: Some(PlayerStatus::Playing),
            score: Some(0),
            multiplier: Some(1),
            player_health: Some(-1),
            cur_song_time: Some(0.0),
        }
    }

    /// Encode as a text message
    pub fn to_message(&self) -> Option<RelayMessage> {
        match serde_json::to_string(self) {
            Ok(json) => Some(RelayMessage::from(json)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize status record");
                None
            }
        }
    }
}
