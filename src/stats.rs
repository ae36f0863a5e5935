use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::{BotDatabase, UploadRecord, UserRecord};
use crate::torrent::TorrentMetadata;

const RECENT_UPLOADS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub user_id: i64,
    pub total_uploads: usize,
    pub total_size: u64,
    pub member_since: Option<DateTime<Utc>>,
    /// Newest first.
    pub recent: Vec<UploadRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalStats {
    pub total_uploads: usize,
    pub total_users: usize,
    pub total_size: u64,
    pub admin_count: usize,
    pub banned_count: usize,
}

pub async fn user_stats(db: &BotDatabase, user_id: i64) -> UserStats {
    let mut uploads = db.uploads_for_user(user_id).await;

    let total_size = uploads.iter().map(|upload| upload.file_size).sum();
    let member_since = match db.get_user(user_id).await {
        Some(user) => Some(user.created_at),
        None => uploads.iter().map(|upload| upload.upload_date).min(),
    };

    uploads.sort_by(|a, b| (b.upload_date, b.id).cmp(&(a.upload_date, a.id)));

    UserStats {
        user_id,
        total_uploads: uploads.len(),
        total_size,
        member_since,
        recent: uploads.into_iter().take(RECENT_UPLOADS).collect(),
    }
}

pub async fn global_stats(db: &BotDatabase) -> GlobalStats {
    let uploads = db.all_uploads().await;
    let users = db.users().await;

    GlobalStats {
        total_uploads: uploads.len(),
        total_users: users.len(),
        total_size: uploads.iter().map(|upload| upload.file_size).sum(),
        admin_count: users.iter().filter(|user| user.is_admin).count(),
        banned_count: users.iter().filter(|user| user.is_banned).count(),
    }
}

/// A stored upload with its uploader and the metadata recorded at intake time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadInfo {
    pub upload: UploadRecord,
    pub uploader: Option<UserRecord>,
    pub metadata: Option<TorrentMetadata>,
}

/// Looks up the upload posted as `message_id` in `chat_id`.
pub async fn upload_info(db: &BotDatabase, chat_id: i64, message_id: i64) -> Result<Option<UploadInfo>> {
    let Some(upload) = db.upload_by_message(chat_id, message_id).await else {
        return Ok(None);
    };

    let metadata = upload
        .torrent_info
        .as_deref()
        .map(TorrentMetadata::from_json)
        .transpose()
        .with_context(|| format!("couldn't parse stored torrent info of upload {}", upload.id))?;
    let uploader = db.get_user(upload.user_id).await;

    Ok(Some(UploadInfo { upload, uploader, metadata }))
}

#[cfg(test)]
mod stats_tests {
    use super::*;
    use crate::database::{NewUpload, UserProfile};

    fn upload(user_id: i64, message_id: i64, file_size: u64) -> NewUpload {
        NewUpload {
            user_id,
            file_name: format!("{}.torrent", message_id),
            file_size,
            file_hash: None,
            chat_id: 1,
            message_id,
            is_valid: true,
            torrent_info: None,
        }
    }

    #[tokio::test]
    async fn test_user_stats_keeps_five_newest() {
        let db = BotDatabase::in_memory();
        db.register_user(&UserProfile::with_id(9), false).await.unwrap();

        for message_id in 1..=7 {
            db.save_upload(upload(9, message_id, 10)).await.unwrap();
        }
        db.save_upload(upload(8, 100, 1000)).await.unwrap();

        let stats = user_stats(&db, 9).await;

        assert_eq!(7, stats.total_uploads);
        assert_eq!(70, stats.total_size);
        assert!(stats.member_since.is_some());
        assert_eq!(vec![7, 6, 5, 4, 3], stats.recent.iter().map(|u| u.message_id).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_user_stats_without_uploads() {
        let db = BotDatabase::in_memory();

        let stats = user_stats(&db, 5).await;

        assert_eq!(0, stats.total_uploads);
        assert_eq!(None, stats.member_since);
        assert!(stats.recent.is_empty());
    }

    #[tokio::test]
    async fn test_upload_info() {
        let db = BotDatabase::in_memory();
        db.register_user(&UserProfile::with_id(9), false).await.unwrap();

        let metadata = TorrentMetadata {
            name: "a.txt".to_string(),
            piece_length: 16384,
            announce_urls: vec!["http://x.test/".to_string()],
            files: Vec::new(),
            file_count: 0,
            total_size: 0,
            is_single_file: false,
            creation_date: None,
            comment: None,
            created_by: None,
            info_hash: "1".repeat(40),
            file_hash: "2".repeat(64),
        };
        let mut new_upload = upload(9, 42, 10);
        new_upload.torrent_info = Some(metadata.to_json().unwrap());
        let saved = db.save_upload(new_upload).await.unwrap();

        let info = upload_info(&db, 1, 42).await.unwrap().unwrap();

        assert_eq!(saved, info.upload);
        assert_eq!(Some(9), info.uploader.map(|user| user.id));
        assert_eq!(Some(metadata), info.metadata);
        assert_eq!(None, upload_info(&db, 1, 43).await.unwrap());
        assert_eq!(None, upload_info(&db, 2, 42).await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_info_with_corrupt_metadata() {
        let db = BotDatabase::in_memory();
        let mut new_upload = upload(9, 42, 10);
        new_upload.torrent_info = Some("{".to_string());
        db.save_upload(new_upload).await.unwrap();

        assert!(upload_info(&db, 1, 42).await.is_err());
    }

    #[tokio::test]
    async fn test_global_stats() {
        let db = BotDatabase::in_memory();
        db.register_user(&UserProfile::with_id(1), true).await.unwrap();
        db.register_user(&UserProfile::with_id(2), false).await.unwrap();
        db.set_banned(3, true).await.unwrap();
        db.save_upload(upload(1, 1, 100)).await.unwrap();
        db.save_upload(upload(2, 2, 250)).await.unwrap();

        let stats = global_stats(&db).await;

        assert_eq!(
            GlobalStats { total_uploads: 2, total_users: 3, total_size: 350, admin_count: 1, banned_count: 1 },
            stats
        );
    }
}
