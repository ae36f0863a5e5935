use anyhow::{anyhow, Context, Result};
use clap::Subcommand;
use serde::Serialize;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use torrent_intake::auth::AuthManager;
use torrent_intake::bot_options::BotOptions;
use torrent_intake::database::{BotDatabase, UserProfile, UserRecord};
use torrent_intake::intake::{DocumentUpload, IntakeOutcome, UploadIntake};
use torrent_intake::stats::{global_stats, upload_info, user_stats};
use torrent_intake::utils::{
    create_progress_bar, display_name, format_file_size, read_file_as_bytes, truncate_text,
    validate_user_input,
};
use torrent_intake::ValidationResult;

const PROGRESS_BAR_LENGTH: usize = 20;
const MAX_LISTED_NAME_LEN: usize = 40;
const MAX_USERNAME_LEN: usize = 64;

#[derive(Subcommand)]
pub enum Commands {
    /// Validate torrent files and print a JSON report for each
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Run a downloaded document through the upload intake
    Upload {
        #[arg(long, allow_negative_numbers = true)]
        user_id: i64,
        #[arg(long, allow_negative_numbers = true)]
        chat_id: i64,
        #[arg(long)]
        message_id: i64,
        /// Username of the uploader
        #[arg(long)]
        username: Option<String>,
        /// Validate a copy and leave the file in place
        #[arg(long)]
        keep: bool,
        file: PathBuf,
    },
    /// Show upload statistics, for one user or overall
    Stats {
        #[arg(long, allow_negative_numbers = true)]
        user_id: Option<i64>,
    },
    /// Show a stored upload and its torrent metadata
    Info {
        #[arg(long, allow_negative_numbers = true)]
        chat_id: i64,
        #[arg(long)]
        message_id: i64,
    },
    /// Ban a user (admins only)
    Ban {
        #[arg(long)]
        actor: i64,
        target: i64,
    },
    /// Lift a ban (admins only)
    Unban {
        #[arg(long)]
        actor: i64,
        target: i64,
    },
    /// Grant admin rights (super admin only)
    Promote {
        #[arg(long)]
        actor: i64,
        target: i64,
    },
    /// Revoke admin rights (super admin only)
    Demote {
        #[arg(long)]
        actor: i64,
        target: i64,
    },
    /// List admins
    Admins,
    /// List banned users
    Banned,
}

/// Runs the command and reports whether it succeeded.
pub async fn handle_command(command: Commands, options: BotOptions) -> Result<bool> {
    match command {
        Commands::Validate { files } => validate_files(&files).await,
        Commands::Upload { user_id, chat_id, message_id, username, keep, file } => {
            let user = UserProfile { id: user_id, username, first_name: None, last_name: None };
            upload(options, user, chat_id, message_id, &file, keep).await
        }
        Commands::Stats { user_id } => show_stats(&options, user_id).await,
        Commands::Info { chat_id, message_id } => show_upload(&options, chat_id, message_id).await,
        Commands::Ban { actor, target } => {
            let auth = open_auth(&options).await?;
            report(auth.ban_user(target, actor).await?, "banned", target)
        }
        Commands::Unban { actor, target } => {
            let auth = open_auth(&options).await?;
            report(auth.unban_user(target, actor).await?, "unbanned", target)
        }
        Commands::Promote { actor, target } => {
            let auth = open_auth(&options).await?;
            report(auth.promote_admin(target, actor).await?, "promoted to admin", target)
        }
        Commands::Demote { actor, target } => {
            let auth = open_auth(&options).await?;
            report(auth.demote_admin(target, actor).await?, "demoted from admin", target)
        }
        Commands::Admins => {
            let auth = open_auth(&options).await?;
            print_users("Admins", &auth.get_all_admins().await);
            Ok(true)
        }
        Commands::Banned => {
            let auth = open_auth(&options).await?;
            print_users("Banned users", &auth.get_banned_users().await);
            Ok(true)
        }
    }
}

#[derive(Serialize)]
struct FileReport<'a> {
    file: String,
    #[serde(flatten)]
    result: &'a ValidationResult,
}

async fn validate_files(files: &[PathBuf]) -> Result<bool> {
    let mut all_valid = true;

    for file in files {
        let raw = read_file_as_bytes(file).await?;
        let result = UploadIntake::validate_bytes(&raw);
        all_valid &= result.is_valid();

        let report = FileReport { file: file.display().to_string(), result: &result };
        println!("{}", serde_json::to_string_pretty(&report).context("couldn't serialize validation report")?);
    }

    Ok(all_valid)
}

async fn upload(
    options: BotOptions,
    user: UserProfile,
    chat_id: i64,
    message_id: i64,
    file: &Path,
    keep: bool,
) -> Result<bool> {
    if let Some(username) = &user.username {
        if !validate_user_input(username, MAX_USERNAME_LEN) {
            return Err(anyhow!("invalid username '{}'", username));
        }
    }

    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("'{}' is not a file", file.display()))?;

    let path = if keep {
        let mut copy = file.to_path_buf().into_os_string();
        copy.push(".intake");
        let copy = PathBuf::from(copy);

        tokio::fs::copy(file, &copy)
            .await
            .with_context(|| format!("couldn't copy '{}'", file.display()))?;
        copy
    }
    else {
        file.to_path_buf()
    };

    let file_size = tokio::fs::metadata(&path)
        .await
        .with_context(|| format!("couldn't stat '{}'", path.display()))?
        .len();

    let (db, auth) = open_store(&options).await?;
    let intake = UploadIntake::new(options, db, auth);

    let outcome = intake
        .handle(DocumentUpload { user, chat_id, message_id, file_name, file_size, path })
        .await?;

    println!("{}", outcome);
    if let IntakeOutcome::Accepted { metadata, .. } = &outcome {
        println!("{}", serde_json::to_string_pretty(metadata).context("couldn't serialize torrent metadata")?);
    }

    Ok(outcome.is_accepted())
}

async fn show_stats(options: &BotOptions, user_id: Option<i64>) -> Result<bool> {
    let (db, auth) = open_store(options).await?;
    let global = global_stats(&db).await;

    let Some(user_id) = user_id else {
        println!("{} statistics", options.bot_name);
        println!("  Users:   {} ({} admins, {} banned)", global.total_users, global.admin_count, global.banned_count);
        println!("  Uploads: {}", global.total_uploads);
        println!("  Size:    {}", format_file_size(global.total_size));
        return Ok(true);
    };

    let stats = user_stats(&db, user_id).await;
    let name = match auth.get_user_info(user_id).await {
        Some(user) => display_name(&user.profile()),
        None => display_name(&UserProfile::with_id(user_id)),
    };

    println!("Statistics for {} ({:?})", name, auth.role(user_id).await);
    println!("  Uploads: {} ({})", stats.total_uploads, format_file_size(stats.total_size));
    println!(
        "  Share:   {}",
        create_progress_bar(stats.total_uploads as u64, global.total_uploads as u64, PROGRESS_BAR_LENGTH)
    );
    if let Some(member_since) = stats.member_since {
        println!("  Member since: {}", member_since.format("%Y-%m-%d"));
    }

    if !stats.recent.is_empty() {
        println!("  Recent uploads:");
    }
    for upload in &stats.recent {
        println!(
            "    #{} {} ({}) {}",
            upload.id,
            truncate_text(&upload.file_name, MAX_LISTED_NAME_LEN),
            format_file_size(upload.file_size),
            upload.upload_date.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(true)
}

async fn show_upload(options: &BotOptions, chat_id: i64, message_id: i64) -> Result<bool> {
    let db = open_database(options).await?;

    let Some(info) = upload_info(&db, chat_id, message_id).await? else {
        println!("upload not found: chat {} message {}", chat_id, message_id);
        return Ok(false);
    };

    let upload = &info.upload;
    let uploader = match &info.uploader {
        Some(user) => display_name(&user.profile()),
        None => display_name(&UserProfile::with_id(upload.user_id)),
    };

    println!("Upload #{}", upload.id);
    println!("  File:     {}", upload.file_name);
    println!("  Uploader: {} [{}]", uploader, upload.user_id);
    println!("  Date:     {}", upload.upload_date.format("%Y-%m-%d %H:%M"));
    println!("  Size:     {}", format_file_size(upload.file_size));
    if let Some(file_hash) = &upload.file_hash {
        println!("  SHA-256:  {}", file_hash);
    }

    match &info.metadata {
        Some(metadata) => {
            println!("{}", serde_json::to_string_pretty(metadata).context("couldn't serialize torrent metadata")?)
        }
        None => println!("  no torrent metadata stored"),
    }

    Ok(true)
}

fn report(done: bool, action: &str, target: i64) -> Result<bool> {
    if done {
        println!("user {} {}", target, action);
    }
    else {
        println!("refused: user {} was not {}", target, action);
    }

    Ok(done)
}

fn print_users(title: &str, users: &[UserRecord]) {
    println!("{} ({}):", title, users.len());

    for user in users {
        println!("  {} [{}]", display_name(&user.profile()), user.id);
    }
}

async fn open_database(options: &BotOptions) -> Result<Arc<BotDatabase>> {
    let db = BotDatabase::open(&options.database_path).await?;

    if let Some(path) = db.path() {
        tracing::debug!("using database '{}'", path.display());
    }

    Ok(Arc::new(db))
}

async fn open_store(options: &BotOptions) -> Result<(Arc<BotDatabase>, Arc<AuthManager>)> {
    let db = open_database(options).await?;
    let auth = Arc::new(AuthManager::new(options, Arc::clone(&db)));

    Ok((db, auth))
}

async fn open_auth(options: &BotOptions) -> Result<Arc<AuthManager>> {
    Ok(open_store(options).await?.1)
}
