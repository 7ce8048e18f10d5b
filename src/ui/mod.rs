//! Terminal chat screen.

pub mod app;
pub mod avatar;
pub mod commands;
pub mod composer;
pub mod history;
pub mod sidebar;

pub use app::{run, App};
pub use avatar::Avatars;
