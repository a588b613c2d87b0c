use axum::{
    Json, Router,
    extract::State,
    http::header::SET_COOKIE,
    response::{AppendHeaders, Html, IntoResponse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::validate_display_name,
    error::{AppError, ServiceError},
    services::session_service,
    state::SharedState,
};

/// Minimal landing page; the real front-end is served elsewhere.
const LANDING_PAGE: &str = r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>Amadeus</title></head>
  <body>
    <h1>Amadeus</h1>
    <p>Register a display name via <code>POST /register</code>, then open a room at <code>/room/{id}</code>.</p>
  </body>
</html>
"#;

#[derive(Debug, Deserialize, Validate, ToSchema)]
/// Payload for claiming a display name.
pub struct RegisterRequest {
    #[validate(custom(function = validate_display_name))]
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Freshly minted session nonce, also set as a cookie.
pub struct RegisterResponse {
    pub session: String,
}

/// Serve the landing page.
pub async fn landing() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Session created", body = RegisterResponse),
        (status = 400, description = "Invalid display name"),
    )
)]
/// Register a display name and receive the session cookie.
pub async fn register(
    State(state): State<SharedState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let session = session_service::register(&state, request.name);
    let cookie = format!(
        "{}={session}; Path=/; HttpOnly; SameSite=Lax",
        session_service::SESSION_COOKIE
    );

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(RegisterResponse { session }),
    ))
}

/// Configure the landing and registration routes.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/", get(landing))
        .route("/register", post(register))
}
