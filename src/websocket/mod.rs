pub mod handler;
pub mod msg_broadcast_handler;
pub mod msg_edit_handler;
pub mod session;

pub use handler::websocket_handler;
