use anyhow::{Context, Result};

use crate::database::UserProfile;

pub mod bencode;
pub mod hashing;

pub use hashing::{sha1_hash, sha256_hash, Sha1Hash, Sha256Hash};

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
const DANGEROUS_FILENAME_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
const DANGEROUS_INPUT_PATTERNS: [&str; 4] = ["<script", "javascript:", "data:", "vbscript:"];
const MAX_FILENAME_LEN: usize = 255;

pub async fn read_file_as_bytes(path: &std::path::Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("couldn't read file '{}'", path.display()))
}

/// Human readable size, base 1024 with two decimals.
pub fn format_file_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = size_bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", size, SIZE_UNITS[unit])
}

pub fn display_name(user: &UserProfile) -> String {
    match (&user.username, &user.first_name, &user.last_name) {
        (Some(username), _, _) => format!("@{}", username),
        (None, Some(first), Some(last)) => format!("{} {}", first, last),
        (None, Some(first), None) => first.clone(),
        _ => format!("User {}", user.id),
    }
}

/// Replaces path and shell metacharacters and caps the name at 255 bytes, keeping the extension.
pub fn sanitize_filename(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .map(|c| if DANGEROUS_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect();

    if sanitized.len() <= MAX_FILENAME_LEN {
        return sanitized;
    }

    let (stem, extension) = match sanitized.rfind('.') {
        Some(dot) if dot > 0 => sanitized.split_at(dot),
        _ => (sanitized.as_str(), ""),
    };

    let extension = truncate_to_bytes(extension, MAX_FILENAME_LEN);
    let stem = truncate_to_bytes(stem, MAX_FILENAME_LEN - extension.len());

    format!("{}{}", stem, extension)
}

fn truncate_to_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }

    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    &text[..end]
}

pub fn validate_user_input(text: &str, max_length: usize) -> bool {
    if text.is_empty() || text.chars().count() > max_length {
        return false;
    }

    let text = text.to_lowercase();

    !DANGEROUS_INPUT_PATTERNS
        .iter()
        .any(|pattern| text.contains(pattern))
}

pub fn create_progress_bar(current: u64, total: u64, length: usize) -> String {
    if total == 0 {
        return "█".repeat(length);
    }

    let ratio = (current as f64 / total as f64).clamp(0.0, 1.0);
    let filled = (length as f64 * ratio) as usize;

    format!("{}{} {:.1}%", "█".repeat(filled), "░".repeat(length - filled), ratio * 100.0)
}

pub fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }

    let kept: String = text.chars().take(max_length.saturating_sub(3)).collect();

    format!("{}...", kept)
}
