//! CLI commands for feather

pub mod dispatch;
pub mod inspect;
pub mod installs;
pub mod slim;
