pub mod catfind_toml;
pub mod config;
pub mod logger;
pub mod passphrase;

pub use config::*;
pub use logger::{level_for, setup_logging};
pub use passphrase::get_passphrase;
