pub mod documentation;
pub mod health_service;
pub mod room_service;
pub mod session_service;
pub mod websocket_service;
