use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dto::room::{RoomConfigPatch, RoomConfiguration, RoomStatus};

/// Commands accepted from room WebSocket clients. Unknown tags decode to
/// [`ClientCommand::Unknown`] and are dropped by the engine, so newer clients
/// do not break older servers.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum ClientCommand {
    /// Host requests the lobby → loading transition.
    #[serde(rename = "START")]
    Start,
    /// Host forces the current phase to advance.
    #[serde(rename = "NEXT")]
    Next,
    /// The client has decoded the audio for `round`.
    #[serde(rename = "BUFFER_COMPLETE")]
    BufferComplete { round: u32 },
    /// A guess for `round`; ignored unless the round is currently playing.
    #[serde(rename = "GUESS")]
    Guess { round: u32, guess: String },
    /// Host edits the room configuration while in the lobby.
    #[serde(rename = "CONFIGURE")]
    Configure { config: RoomConfigPatch },
    #[serde(other)]
    Unknown,
}

/// Commands pushed to room WebSocket clients.
///
/// `SongData` announces the binary frame that immediately follows it on the
/// same socket; clients associate the next binary frame with `round`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum ServerCommand {
    #[serde(rename = "ROOM_CONFIG")]
    RoomConfig { config: RoomConfiguration },
    #[serde(rename = "ROOM_STATE")]
    RoomState { state: RoomStatus },
    #[serde(rename = "SONG_DATA", rename_all = "camelCase")]
    SongData { round: u32, size_bytes: u64 },
}
