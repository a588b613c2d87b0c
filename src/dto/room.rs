use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use std::time::Duration;

/// Per-room game settings. Durations are seconds on the wire; internal timer
/// arithmetic widens to milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfiguration {
    /// Seconds of audio playback per round.
    pub play_time: u64,
    /// Extra seconds for guessing after playback.
    pub guess_time: u64,
    /// Seconds the solution stays on screen between rounds.
    pub review_time: u64,
    /// Number of questions in a game.
    pub rounds: u32,
    /// Admission cap while the room is in the lobby.
    pub max_players: u32,
}

impl Default for RoomConfiguration {
    fn default() -> Self {
        Self {
            play_time: 20,
            guess_time: 10,
            review_time: 5,
            rounds: 20,
            max_players: 8,
        }
    }
}

impl RoomConfiguration {
    /// Full playback-plus-guessing window for one round.
    pub fn round_duration(&self) -> Duration {
        Duration::from_secs(self.play_time + self.guess_time)
    }

    /// Duration of the review window.
    pub fn review_duration(&self) -> Duration {
        Duration::from_secs(self.review_time)
    }

    /// Return a copy with every field present in `patch` overwritten.
    pub fn merged(&self, patch: &RoomConfigPatch) -> Self {
        Self {
            play_time: patch.play_time.unwrap_or(self.play_time),
            guess_time: patch.guess_time.unwrap_or(self.guess_time),
            review_time: patch.review_time.unwrap_or(self.review_time),
            rounds: patch.rounds.unwrap_or(self.rounds),
            max_players: patch.max_players.unwrap_or(self.max_players),
        }
    }
}

/// Partial lobby edit of a [`RoomConfiguration`]; absent fields keep their
/// current value. An out-of-bounds patch is rejected wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfigPatch {
    #[validate(range(min = 1, max = 300))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub play_time: Option<u64>,
    #[validate(range(min = 1, max = 300))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guess_time: Option<u64>,
    #[validate(range(min = 1, max = 300))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_time: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rounds: Option<u32>,
    #[validate(range(min = 1, max = 32))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_players: Option<u32>,
}

/// Public identity of a player inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlayerInfo {
    /// Opaque session nonce.
    pub id: String,
    /// Registered display name, falling back to a derived placeholder.
    pub name: String,
    /// True exactly for the first player admitted while in the lobby.
    pub host: bool,
}

/// Published view of a room, one variant per phase. Broadcast to clients in
/// `ROOM_STATE` envelopes and snapshotted for registry listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "state")]
pub enum RoomStatus {
    #[serde(rename = "LOBBY")]
    Lobby { players: Vec<PlayerInfo> },
    #[serde(rename = "LOADING")]
    Loading { players: Vec<PlayerInfo> },
    #[serde(rename = "BUFFERING")]
    Buffering {
        players: Vec<PlayerInfo>,
        round: u32,
        /// Players that have acknowledged the audio for `round`.
        ready: Vec<String>,
        scores: IndexMap<String, u32>,
    },
    #[serde(rename = "PLAYING", rename_all = "camelCase")]
    Playing {
        players: Vec<PlayerInfo>,
        round: u32,
        /// Unix milliseconds at which playback started.
        round_start: i64,
        prompt: String,
        /// Players with a guess on file for this round.
        guessed: Vec<String>,
        scores: IndexMap<String, u32>,
    },
    #[serde(rename = "REVIEWING")]
    Reviewing {
        players: Vec<PlayerInfo>,
        round: u32,
        prompt: String,
        solution: String,
        guesses: IndexMap<String, String>,
        correct: Vec<String>,
        scores: IndexMap<String, u32>,
    },
    #[serde(rename = "FINISHED")]
    Finished {
        players: Vec<PlayerInfo>,
        scores: IndexMap<String, u32>,
    },
}

impl RoomStatus {
    /// Wire tag of the current phase, as used in listings.
    pub fn phase_tag(&self) -> &'static str {
        match self {
            Self::Lobby { .. } => "LOBBY",
            Self::Loading { .. } => "LOADING",
            Self::Buffering { .. } => "BUFFERING",
            Self::Playing { .. } => "PLAYING",
            Self::Reviewing { .. } => "REVIEWING",
            Self::Finished { .. } => "FINISHED",
        }
    }

    pub fn players(&self) -> &[PlayerInfo] {
        match self {
            Self::Lobby { players }
            | Self::Loading { players }
            | Self::Buffering { players, .. }
            | Self::Playing { players, .. }
            | Self::Reviewing { players, .. }
            | Self::Finished { players, .. } => players,
        }
    }

    /// Zero-based round index, where the phase carries one.
    pub fn round(&self) -> Option<u32> {
        match self {
            Self::Buffering { round, .. }
            | Self::Playing { round, .. }
            | Self::Reviewing { round, .. } => Some(*round),
            _ => None,
        }
    }

    pub fn scores(&self) -> Option<&IndexMap<String, u32>> {
        match self {
            Self::Buffering { scores, .. }
            | Self::Playing { scores, .. }
            | Self::Reviewing { scores, .. }
            | Self::Finished { scores, .. } => Some(scores),
            Self::Lobby { .. } | Self::Loading { .. } => None,
        }
    }
}

/// One row of the `GET /room` listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomListing {
    pub id: String,
    /// Currently connected sockets, not committed players.
    pub players: usize,
    pub max_players: u32,
    pub phase: String,
    /// Unix milliseconds at which the room was created.
    pub created_at: i64,
}
