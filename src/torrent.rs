pub mod torrent_metadata;
pub use torrent_metadata::{TorrentFileEntry, TorrentMetadata, ValidationResult};

pub mod torrent_validator;
pub use torrent_validator::TorrentValidator;

pub mod validation_error;
pub use validation_error::ValidationError;
