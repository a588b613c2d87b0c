use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by `GET /healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Rooms currently registered.
    pub rooms: usize,
    /// Songs available in the library.
    pub songs: usize,
}

impl HealthResponse {
    pub fn ok(rooms: usize, songs: usize) -> Self {
        Self {
            status: "ok",
            rooms,
            songs,
        }
    }
}
