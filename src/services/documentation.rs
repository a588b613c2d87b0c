use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Amadeus.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::register,
        crate::routes::room::list_rooms,
        crate::routes::room::room_page,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::RoomConfiguration,
            crate::dto::room::RoomConfigPatch,
            crate::dto::room::PlayerInfo,
            crate::dto::room::RoomStatus,
            crate::dto::room::RoomListing,
            crate::dto::ws::ClientCommand,
            crate::dto::ws::ServerCommand,
            crate::routes::session::RegisterRequest,
            crate::routes::session::RegisterResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Registration and session handling"),
        (name = "room", description = "Room listings and the game WebSocket"),
    )
)]
pub struct ApiDoc;
