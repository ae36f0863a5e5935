pub mod auth;
pub mod bot_options;
pub mod database;
pub mod intake;
pub mod stats;
pub mod torrent;
pub mod utils;

pub use torrent::{TorrentMetadata, TorrentValidator, ValidationError, ValidationResult};
