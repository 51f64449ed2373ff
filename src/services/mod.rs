pub mod broadcast_service;
pub mod membership_service;
pub mod replay_log_service;
pub mod room_lifecycle_service;
pub mod sync_service;

pub use broadcast_service::BroadcastChannel;
pub use membership_service::MembershipRegistry;
pub use replay_log_service::ReplayLog;
pub use room_lifecycle_service::RoomLifecycle;
