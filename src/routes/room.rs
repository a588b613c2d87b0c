use axum::{
    Json, Router,
    extract::{Path, State, WebSocketUpgrade, ws::rejection::WebSocketUpgradeRejection},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use tracing::info;

use crate::{
    dto::room::RoomListing,
    services::{room_service, session_service, websocket_service},
    state::SharedState,
};

/// Client page opened in a browser; it connects back to the same URL as a
/// WebSocket.
const ROOM_PAGE: &str = r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>Amadeus room</title></head>
  <body>
    <h1>Amadeus room</h1>
    <p>This page is a placeholder; the game client opens a WebSocket against this same URL.</p>
  </body>
</html>
"#;

#[utoipa::path(
    get,
    path = "/room",
    responses((status = 200, description = "Rooms currently running", body = [RoomListing]))
)]
/// List rooms from their published snapshots.
pub async fn list_rooms(State(state): State<SharedState>) -> Json<Vec<RoomListing>> {
    Json(room_service::list_rooms(&state))
}

#[utoipa::path(
    get,
    path = "/room/{id}",
    params(("id" = String, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Room client page"),
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 401, description = "Upgrade without a registered session"),
    )
)]
/// Serve the room page, or upgrade to the game WebSocket when asked to.
///
/// Upgrades without a resolvable session cookie are refused before they ever
/// reach a room controller.
pub async fn room_page(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Ok(upgrade) = ws else {
        return Html(ROOM_PAGE).into_response();
    };

    let Some(session) = session_service::session_from_headers(&headers) else {
        info!(room = %id, "refusing upgrade without session cookie");
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if !state.sessions().contains(&session) {
        info!(room = %id, "refusing upgrade with unknown session");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    upgrade
        .on_upgrade(move |socket| websocket_service::handle_socket(state, socket, id, session))
        .into_response()
}

/// Configure the room listing and WebSocket endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/room", get(list_rooms))
        .route("/room/{id}", get(room_page))
}
