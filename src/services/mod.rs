pub mod analysis;
pub mod auth;
pub mod usage;
pub mod vision;
