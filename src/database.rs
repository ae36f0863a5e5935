use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tokio::sync::Mutex;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A chat user as reported by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserProfile {
    pub fn with_id(id: i64) -> UserProfile {
        UserProfile { id, username: None, first_name: None, last_name: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl UserRecord {
    fn new(profile: &UserProfile, is_admin: bool, now: DateTime<Utc>) -> UserRecord {
        UserRecord {
            id: profile.id,
            username: profile.username.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            is_admin,
            is_banned: false,
            created_at: now,
            last_seen: now,
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: u64,
    pub user_id: i64,
    pub file_name: String,
    pub file_size: u64,
    pub file_hash: Option<String>,
    pub chat_id: i64,
    pub message_id: i64,
    pub upload_date: DateTime<Utc>,
    pub is_valid: bool,
    /// JSON encoded `TorrentMetadata`.
    pub torrent_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUpload {
    pub user_id: i64,
    pub file_name: String,
    pub file_size: u64,
    pub file_hash: Option<String>,
    pub chat_id: i64,
    pub message_id: i64,
    pub is_valid: bool,
    pub torrent_info: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DatabaseState {
    users: BTreeMap<i64, UserRecord>,
    uploads: Vec<UploadRecord>,
    next_upload_id: u64,
}

/// Users and upload records kept in memory and mirrored to a JSON file after every write.
#[derive(Debug)]
pub struct BotDatabase {
    path: Option<PathBuf>,
    state: Mutex<DatabaseState>,
}

// BotDatabase constructors
impl BotDatabase {
    pub async fn open(path: impl AsRef<Path>) -> Result<BotDatabase> {
        let path = path.as_ref().to_path_buf();

        let state = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("couldn't parse database file '{}'", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no database at '{}', starting empty", path.display());
                DatabaseState::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("couldn't read database file '{}'", path.display()));
            }
        };

        Ok(BotDatabase { path: Some(path), state: Mutex::new(state) })
    }

    pub fn in_memory() -> BotDatabase {
        BotDatabase { path: None, state: Mutex::new(DatabaseState::default()) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

// users
impl BotDatabase {
    /// Inserts the user or refreshes their names and `last_seen`.
    pub async fn register_user(&self, profile: &UserProfile, is_admin: bool) -> Result<UserRecord> {
        let now = Utc::now();

        self.commit(|state| {
            state
                .users
                .entry(profile.id)
                .and_modify(|user| {
                    user.username = profile.username.clone();
                    user.first_name = profile.first_name.clone();
                    user.last_name = profile.last_name.clone();
                    user.last_seen = now;
                })
                .or_insert_with(|| {
                    tracing::info!("registered new user {}", profile.id);
                    UserRecord::new(profile, is_admin, now)
                })
                .clone()
        })
        .await
    }

    pub async fn get_user(&self, user_id: i64) -> Option<UserRecord> {
        self.state.lock().await.users.get(&user_id).cloned()
    }

    pub async fn set_banned(&self, user_id: i64, is_banned: bool) -> Result<()> {
        self.update_user(user_id, |user| user.is_banned = is_banned).await
    }

    pub async fn set_admin(&self, user_id: i64, is_admin: bool) -> Result<()> {
        self.update_user(user_id, |user| user.is_admin = is_admin).await
    }

    /// Applies `update` to the user, creating a bare record first if the user was never seen.
    async fn update_user(&self, user_id: i64, update: impl FnOnce(&mut UserRecord)) -> Result<()> {
        self.commit(|state| {
            let user = state
                .users
                .entry(user_id)
                .or_insert_with(|| UserRecord::new(&UserProfile::with_id(user_id), false, Utc::now()));
            update(user);
        })
        .await
    }

    pub async fn users(&self) -> Vec<UserRecord> {
        self.state.lock().await.users.values().cloned().collect()
    }

    pub async fn admins(&self) -> Vec<UserRecord> {
        self.users_where(|user| user.is_admin).await
    }

    pub async fn banned_users(&self) -> Vec<UserRecord> {
        self.users_where(|user| user.is_banned).await
    }

    async fn users_where(&self, predicate: impl Fn(&UserRecord) -> bool) -> Vec<UserRecord> {
        self.state
            .lock()
            .await
            .users
            .values()
            .filter(|user| predicate(*user))
            .cloned()
            .collect()
    }
}

// uploads
impl BotDatabase {
    pub async fn save_upload(&self, upload: NewUpload) -> Result<UploadRecord> {
        let record = self
            .commit(|state| {
                state.next_upload_id += 1;
                let record = UploadRecord {
                    id: state.next_upload_id,
                    user_id: upload.user_id,
                    file_name: upload.file_name,
                    file_size: upload.file_size,
                    file_hash: upload.file_hash,
                    chat_id: upload.chat_id,
                    message_id: upload.message_id,
                    upload_date: Utc::now(),
                    is_valid: upload.is_valid,
                    torrent_info: upload.torrent_info,
                };
                state.uploads.push(record.clone());

                record
            })
            .await?;

        tracing::debug!("saved upload {} for user {}", record.id, record.user_id);

        Ok(record)
    }

    pub async fn uploads_for_user(&self, user_id: i64) -> Vec<UploadRecord> {
        self.state
            .lock()
            .await
            .uploads
            .iter()
            .filter(|upload| upload.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn upload_by_message(&self, chat_id: i64, message_id: i64) -> Option<UploadRecord> {
        self.state
            .lock()
            .await
            .uploads
            .iter()
            .find(|upload| upload.chat_id == chat_id && upload.message_id == message_id)
            .cloned()
    }

    pub async fn all_uploads(&self) -> Vec<UploadRecord> {
        self.state.lock().await.uploads.clone()
    }
}

// persistence
impl BotDatabase {
    /// Applies `change` to a copy of the state and keeps it only once the copy is on disk.
    async fn commit<T>(&self, change: impl FnOnce(&mut DatabaseState) -> T) -> Result<T> {
        let mut state = self.state.lock().await;

        let mut next = state.clone();
        let output = change(&mut next);

        self.flush(&next).await?;
        *state = next;

        Ok(output)
    }

    async fn flush(&self, state: &DatabaseState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("couldn't create database directory '{}'", parent.display()))?;
        }

        let contents = serde_json::to_string_pretty(state).context("couldn't serialize database")?;

        let mut tmp_path = path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        tokio::fs::write(&tmp_path, contents)
            .await
            .with_context(|| format!("couldn't write database file '{}'", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .with_context(|| format!("couldn't replace database file '{}'", path.display()))?;

        Ok(())
    }
}
