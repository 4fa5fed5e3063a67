//! Repository modules for database access.

pub mod followups;
pub mod settings;

pub use followups::FollowUpsRepo;
pub use settings::SettingsRepo;
