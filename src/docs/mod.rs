use utoipa::OpenApi;
use crate::models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::health::ready_check,
        crate::handlers::rooms::room_info,
        crate::websocket::handler::websocket_handler,
    ),
    components(
        schemas(HealthResponse, ErrorResponse, RoomInfoResponse, EditMessage, BroadcastMessage, LogEntry)
    ),
    tags(
        (name = "api", description = "API endpoints")
    )
)]
pub struct ApiDoc;
