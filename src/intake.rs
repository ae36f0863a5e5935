use anyhow::{Context, Result};

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::AuthManager;
use crate::bot_options::BotOptions;
use crate::database::{BotDatabase, NewUpload, UploadRecord, UserProfile};
use crate::torrent::{TorrentMetadata, TorrentValidator, ValidationResult};
use crate::utils::{format_file_size, read_file_as_bytes, sanitize_filename};

/// A document the transport layer already downloaded to `path`.
/// The intake owns that file from here on and removes it once handled.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub user: UserProfile,
    pub chat_id: i64,
    pub message_id: i64,
    pub file_name: String,
    pub file_size: u64,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    Banned,
    InvalidExtension { allowed: Vec<String> },
    TooLarge { file_size: u64, max_size: u64 },
    Rejected { error: String },
    Accepted { upload: UploadRecord, metadata: TorrentMetadata },
}

impl IntakeOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, IntakeOutcome::Accepted { .. })
    }
}

impl Display for IntakeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntakeOutcome::Banned => write!(f, "user is banned"),
            IntakeOutcome::InvalidExtension { allowed } => {
                write!(f, "invalid file type, only {} files are allowed", allowed.join(", "))
            }
            IntakeOutcome::TooLarge { file_size, max_size } => write!(
                f,
                "file too large ({}), maximum is {}",
                format_file_size(*file_size),
                format_file_size(*max_size)
            ),
            IntakeOutcome::Rejected { error } => write!(f, "invalid torrent file: {}", error),
            IntakeOutcome::Accepted { upload, metadata } => write!(
                f,
                "accepted upload #{} '{}' info hash {} ({} files, {})",
                upload.id,
                upload.file_name,
                metadata.info_hash,
                metadata.file_count,
                format_file_size(metadata.total_size)
            ),
        }
    }
}

/// Gatekeeper between a downloaded document and the upload records.
pub struct UploadIntake {
    options: BotOptions,
    db: Arc<BotDatabase>,
    auth: Arc<AuthManager>,
}

impl UploadIntake {
    pub fn new(options: BotOptions, db: Arc<BotDatabase>, auth: Arc<AuthManager>) -> UploadIntake {
        UploadIntake { options, db, auth }
    }

    pub fn validate_bytes(raw: &[u8]) -> ValidationResult {
        TorrentValidator::validate(raw)
    }

    pub async fn handle(&self, document: DocumentUpload) -> Result<IntakeOutcome> {
        let outcome = self.handle_inner(&document).await;
        remove_temporary_file(&document.path).await;

        let outcome = outcome?;
        tracing::info!(
            user_id = document.user.id,
            chat_id = document.chat_id,
            message_id = document.message_id,
            "upload '{}': {}", document.file_name, outcome
        );

        Ok(outcome)
    }

    async fn handle_inner(&self, document: &DocumentUpload) -> Result<IntakeOutcome> {
        let user_id = document.user.id;

        self.db
            .register_user(&document.user, self.auth.is_configured_admin(user_id))
            .await
            .context("couldn't register user")?;

        if !self.auth.is_user_allowed(user_id).await {
            return Ok(IntakeOutcome::Banned);
        }

        if !self.options.is_allowed_file_name(&document.file_name) {
            return Ok(IntakeOutcome::InvalidExtension { allowed: self.options.allowed_extensions.clone() });
        }

        let max_size = self.options.max_file_size_bytes();
        if document.file_size > max_size {
            return Ok(IntakeOutcome::TooLarge { file_size: document.file_size, max_size });
        }

        let raw = read_file_as_bytes(&document.path).await?;
        if raw.len() as u64 > max_size {
            return Ok(IntakeOutcome::TooLarge { file_size: raw.len() as u64, max_size });
        }

        let result = tokio::task::spawn_blocking(move || Self::validate_bytes(&raw))
            .await
            .context("torrent validation task failed")?;

        let metadata = match result.into_result() {
            Ok(metadata) => metadata,
            Err(e) => return Ok(IntakeOutcome::Rejected { error: e.to_string() }),
        };

        let upload = self
            .db
            .save_upload(NewUpload {
                user_id,
                file_name: sanitize_filename(&document.file_name),
                file_size: document.file_size,
                file_hash: Some(metadata.file_hash.clone()),
                chat_id: document.chat_id,
                message_id: document.message_id,
                is_valid: true,
                torrent_info: Some(metadata.to_json().context("couldn't serialize torrent metadata")?),
            })
            .await
            .context("couldn't save torrent upload")?;

        Ok(IntakeOutcome::Accepted { upload, metadata })
    }
}

async fn remove_temporary_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("removed temporary file '{}'", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("couldn't remove temporary file '{}': {}", path.display(), e),
    }
}

#[cfg(test)]
mod intake_tests {
    use super::*;

    const TORRENT: &[u8] = b"d8:announce14:http://x.test/4:infod6:lengthi12e4:name5:a.txt12:piece lengthi16384eee";

    struct Setup {
        intake: UploadIntake,
        db: Arc<BotDatabase>,
        auth: Arc<AuthManager>,
        dir: tempfile::TempDir,
    }

    fn setup(options: BotOptions) -> Setup {
        let db = Arc::new(BotDatabase::in_memory());
        let auth = Arc::new(AuthManager::new(&options, Arc::clone(&db)));
        let intake = UploadIntake::new(options, Arc::clone(&db), Arc::clone(&auth));

        Setup { intake, db, auth, dir: tempfile::tempdir().unwrap() }
    }

    async fn document(setup: &Setup, user_id: i64, file_name: &str, contents: &[u8]) -> DocumentUpload {
        let path = setup.dir.path().join("download.tmp");
        tokio::fs::write(&path, contents).await.unwrap();

        DocumentUpload {
            user: UserProfile::with_id(user_id),
            chat_id: 500,
            message_id: 42,
            file_name: file_name.to_string(),
            file_size: contents.len() as u64,
            path,
        }
    }

    #[tokio::test]
    async fn test_valid_torrent_is_recorded() {
        let setup = setup(BotOptions::default());
        let document = document(&setup, 7, "a.torrent", TORRENT).await;
        let path = document.path.clone();

        let outcome = setup.intake.handle(document).await.unwrap();

        let IntakeOutcome::Accepted { upload, metadata } = outcome.clone() else {
            panic!("expected the upload to be accepted, got {:?}", outcome);
        };
        assert_eq!("a.txt", metadata.name);
        assert_eq!(Some(metadata.file_hash.clone()), upload.file_hash);
        assert_eq!(metadata, TorrentMetadata::from_json(upload.torrent_info.as_deref().unwrap()).unwrap());
        assert_eq!(Some(upload), setup.db.upload_by_message(500, 42).await);
        assert!(setup.db.get_user(7).await.is_some(), "uploader gets registered");
        assert!(!path.exists(), "temporary file is removed");
    }

    #[tokio::test]
    async fn test_banned_user_is_refused() {
        let setup = setup(BotOptions::default());
        setup.db.set_banned(7, true).await.unwrap();
        let document = document(&setup, 7, "a.torrent", TORRENT).await;
        let path = document.path.clone();

        assert_eq!(IntakeOutcome::Banned, setup.intake.handle(document).await.unwrap());
        assert!(setup.db.all_uploads().await.is_empty());
        assert!(!path.exists());
        assert!(!setup.auth.is_user_allowed(7).await);
    }

    #[tokio::test]
    async fn test_wrong_extension_is_refused() {
        let setup = setup(BotOptions::default());
        let document = document(&setup, 7, "a.zip", TORRENT).await;

        let outcome = setup.intake.handle(document).await.unwrap();

        assert_eq!(IntakeOutcome::InvalidExtension { allowed: vec![".torrent".to_string()] }, outcome);
        assert!(setup.db.all_uploads().await.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_file_is_refused() {
        let setup = setup(BotOptions { max_file_size_mb: 0, ..BotOptions::default() });
        let document = document(&setup, 7, "a.torrent", TORRENT).await;

        let outcome = setup.intake.handle(document).await.unwrap();

        assert_eq!(IntakeOutcome::TooLarge { file_size: TORRENT.len() as u64, max_size: 0 }, outcome);
    }

    #[tokio::test]
    async fn test_invalid_torrent_is_rejected_and_not_saved() {
        let setup = setup(BotOptions::default());
        let document = document(&setup, 7, "a.torrent", b"d4:name9:short").await;
        let path = document.path.clone();

        let outcome = setup.intake.handle(document).await.unwrap();

        match &outcome {
            IntakeOutcome::Rejected { error } => assert!(error.starts_with("Invalid bencode format")),
            other => panic!("expected a rejection, got {:?}", other),
        }
        assert!(!outcome.is_accepted());
        assert!(setup.db.all_uploads().await.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_temporary_file_is_an_error() {
        let setup = setup(BotOptions::default());
        let mut document = document(&setup, 7, "a.torrent", TORRENT).await;
        document.path = setup.dir.path().join("never-downloaded.tmp");

        assert!(setup.intake.handle(document).await.is_err());
    }

    #[test]
    fn test_outcome_display() {
        let outcome = IntakeOutcome::TooLarge { file_size: 3 * 1024 * 1024, max_size: 1024 * 1024 };

        assert_eq!("file too large (3.00 MB), maximum is 1.00 MB", outcome.to_string());
    }
}
