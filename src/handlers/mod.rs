pub mod health;
pub mod rooms;

pub use health::*;
pub use rooms::*;
