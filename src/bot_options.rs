use anyhow::{anyhow, Context, Result};

use std::path::PathBuf;
use std::str::FromStr;

const BOT_NAME: &str = "Torrent Intake Bot";
const DATABASE_PATH: &str = "bot_state/uploads.json";
const MAX_FILE_SIZE_MB: u64 = 2048;
const ALLOWED_TORRENT_EXTENSIONS: [&str; 1] = [".torrent"];
const TRACING_LEVEL: tracing::Level = tracing::Level::INFO;

/// Settings handed to the collaborators that enforce them. Nothing reads globals.
#[derive(Debug, Clone)]
pub struct BotOptions {
    pub bot_name: String,
    pub admin_user_ids: Vec<i64>,
    pub super_admin_id: i64,
    pub database_path: PathBuf,
    pub max_file_size_mb: u64,
    pub allowed_extensions: Vec<String>,
    pub tracing_level: tracing::Level,
}

impl Default for BotOptions {
    fn default() -> BotOptions {
        BotOptions {
            bot_name: BOT_NAME.to_string(),
            admin_user_ids: Vec::new(),
            super_admin_id: 0,
            database_path: PathBuf::from(DATABASE_PATH),
            max_file_size_mb: MAX_FILE_SIZE_MB,
            allowed_extensions: ALLOWED_TORRENT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            tracing_level: TRACING_LEVEL,
        }
    }
}

impl BotOptions {
    pub fn from_env() -> Result<BotOptions> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Overlays the defaults with whatever `lookup` returns for each setting name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<BotOptions> {
        let mut options = BotOptions::default();

        if let Some(name) = lookup("BOT_NAME") {
            options.bot_name = name;
        }

        if let Some(ids) = lookup("ADMIN_USER_IDS") {
            options.admin_user_ids = parse_list(&ids)
                .into_iter()
                .map(|id| parse_setting("ADMIN_USER_IDS", &id))
                .collect::<Result<Vec<i64>>>()?;
        }

        if let Some(id) = lookup("SUPER_ADMIN_ID") {
            options.super_admin_id = parse_setting("SUPER_ADMIN_ID", &id)?;
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            options.database_path = PathBuf::from(path);
        }

        if let Some(size) = lookup("MAX_FILE_SIZE") {
            options.max_file_size_mb = parse_setting("MAX_FILE_SIZE", &size)?;
        }

        if let Some(extensions) = lookup("ALLOWED_TORRENT_EXTENSIONS") {
            options.allowed_extensions = parse_list(&extensions);
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            options.tracing_level = parse_tracing_level(&level)?;
        }

        options.ensure_super_admin_listed();

        Ok(options)
    }

    pub fn ensure_super_admin_listed(&mut self) {
        if self.super_admin_id != 0 && !self.admin_user_ids.contains(&self.super_admin_id) {
            self.admin_user_ids.push(self.super_admin_id);
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn is_allowed_file_name(&self, file_name: &str) -> bool {
        let file_name = file_name.to_lowercase();

        self.allowed_extensions
            .iter()
            .any(|ext| file_name.ends_with(&ext.to_lowercase()))
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_setting<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .with_context(|| format!("invalid value '{}' for {}", value, key))
}

fn parse_tracing_level(level: &str) -> Result<tracing::Level> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(tracing::Level::TRACE),
        "debug" => Ok(tracing::Level::DEBUG),
        "info" => Ok(tracing::Level::INFO),
        "warn" | "warning" => Ok(tracing::Level::WARN),
        "error" | "critical" => Ok(tracing::Level::ERROR),
        _ => Err(anyhow!("invalid value '{}' for LOG_LEVEL", level)),
    }
}

#[cfg(test)]
mod bot_options_tests {
    use std::collections::HashMap;

    use super::*;

    fn options_from(vars: &[(&str, &str)]) -> Result<BotOptions> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        BotOptions::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let options = options_from(&[]).unwrap();

        assert_eq!(2048, options.max_file_size_mb);
        assert_eq!(2048 * 1024 * 1024, options.max_file_size_bytes());
        assert_eq!(vec![".torrent".to_string()], options.allowed_extensions);
        assert_eq!(tracing::Level::INFO, options.tracing_level);
        assert!(options.admin_user_ids.is_empty());
    }

    #[test]
    fn test_overrides() {
        let options = options_from(&[
            ("ADMIN_USER_IDS", " 10, 20 ,,"),
            ("SUPER_ADMIN_ID", "1"),
            ("MAX_FILE_SIZE", "50"),
            ("ALLOWED_TORRENT_EXTENSIONS", ".torrent,.tor"),
            ("LOG_LEVEL", "DEBUG"),
            ("DATABASE_PATH", "/tmp/db.json"),
        ])
        .unwrap();

        assert_eq!(vec![10, 20, 1], options.admin_user_ids);
        assert_eq!(1, options.super_admin_id);
        assert_eq!(50 * 1024 * 1024, options.max_file_size_bytes());
        assert_eq!(2, options.allowed_extensions.len());
        assert_eq!(tracing::Level::DEBUG, options.tracing_level);
        assert_eq!(PathBuf::from("/tmp/db.json"), options.database_path);
    }

    #[test]
    fn test_super_admin_listed_once() {
        let options = options_from(&[("ADMIN_USER_IDS", "1,2"), ("SUPER_ADMIN_ID", "2")]).unwrap();

        assert_eq!(vec![1, 2], options.admin_user_ids);
    }

    #[test]
    fn test_invalid_values_name_the_setting() {
        let err = options_from(&[("SUPER_ADMIN_ID", "abc")]).unwrap_err();
        assert!(err.to_string().contains("SUPER_ADMIN_ID"));

        let err = options_from(&[("ADMIN_USER_IDS", "1,x")]).unwrap_err();
        assert!(err.to_string().contains("ADMIN_USER_IDS"));

        let err = options_from(&[("LOG_LEVEL", "loud")]).unwrap_err();
        assert!(err.to_string().contains("LOG_LEVEL"));
    }

    #[test]
    fn test_is_allowed_file_name() {
        let options = BotOptions::default();

        assert!(options.is_allowed_file_name("movie.torrent"));
        assert!(options.is_allowed_file_name("MOVIE.TORRENT"));
        assert!(!options.is_allowed_file_name("movie.torrent.exe"));
        assert!(!options.is_allowed_file_name("torrent"));
    }
}
