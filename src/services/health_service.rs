use crate::{dto::health::HealthResponse, state::SharedState};

/// Health payload: room and library counts come from lock-free snapshots.
pub fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.rooms().len(), state.library().song_count())
}
