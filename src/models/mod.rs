pub mod error;
pub mod health;
pub mod log_entry;
pub mod messages;
pub mod room;
pub mod seed;

pub use error::*;
pub use health::*;
pub use log_entry::*;
pub use messages::*;
pub use room::*;
pub use seed::*;
