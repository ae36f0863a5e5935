use crate::utils::bencode::BencodedValue;
use crate::utils::{sha1_hash, sha256_hash};

use super::validation_error::FieldContext;
use super::{TorrentFileEntry, TorrentMetadata, ValidationError, ValidationResult};

/// Decodes raw `.torrent` bytes, checks their structure and extracts [`TorrentMetadata`].
///
/// Validation never panics on hostile input: every failure is reported through
/// [`ValidationResult::Invalid`]. The input is only borrowed for the duration of the call.
pub struct TorrentValidator {}

impl TorrentValidator {
    pub fn validate(raw: &[u8]) -> ValidationResult {
        let result = Self::extract_metadata(raw);

        match &result {
            Ok(metadata) => tracing::info!(
                info_hash = %metadata.info_hash,
                file_count = metadata.file_count,
                total_size = metadata.total_size,
                "validated torrent '{}'", metadata.name
            ),
            Err(e) => tracing::debug!("rejected torrent file ({} bytes): {}", raw.len(), e),
        }

        result.into()
    }

    pub fn extract_metadata(raw: &[u8]) -> Result<TorrentMetadata, ValidationError> {
        let root = BencodedValue::from_bytes(raw)?;
        let root_dict = root.try_into_dict().field("torrent")?;

        let info = root_dict
            .get(b"info".as_slice())
            .ok_or_else(ValidationError::missing_info)?;
        let announce = root_dict
            .get(b"announce".as_slice())
            .ok_or_else(ValidationError::missing_announce)?;

        info.try_into_dict().field("info")?;

        let name = optional_text(info, "name", "info.name")?.unwrap_or_default();
        let piece_length = optional_integer(info, "piece length", "info.piece length")?.unwrap_or(0);

        let (files, is_single_file) = match info.get_from_dict(b"files") {
            Some(files) => (multi_file_entries(files)?, false),
            None => {
                let size = non_negative_length(info, "info.length")?;
                (vec![TorrentFileEntry { path: name.clone(), size }], true)
            }
        };

        let total_size = files
            .iter()
            .try_fold(0u64, |total, file| total.checked_add(file.size))
            .ok_or_else(|| ValidationError::InvalidValue("total size overflows".to_string()))?;

        let announce_urls = announce_urls(announce, root.get_from_dict(b"announce-list"))?;

        let creation_date = optional_integer(&root, "creation date", "creation date")?;
        let comment = optional_text(&root, "comment", "comment")?;
        let created_by = optional_text(&root, "created by", "created by")?;

        let info_hash = sha1_hash(&info.as_bytes()).to_hex();
        let file_hash = sha256_hash(raw).to_hex();

        Ok(TorrentMetadata {
            name,
            piece_length,
            announce_urls,
            file_count: files.len(),
            files,
            total_size,
            is_single_file,
            creation_date,
            comment,
            created_by,
            info_hash,
            file_hash,
        })
    }
}

fn optional_text(dict: &BencodedValue, key: &str, field: &str) -> Result<Option<String>, ValidationError> {
    dict.get_from_dict(key.as_bytes())
        .map(|value| value.try_into_lossy_string().field(field))
        .transpose()
}

fn optional_integer(dict: &BencodedValue, key: &str, field: &str) -> Result<Option<i64>, ValidationError> {
    dict.get_from_dict(key.as_bytes())
        .map(|value| value.try_into_integer().field(field))
        .transpose()
}

/// `length` of a file dictionary, 0 when absent.
fn non_negative_length(dict: &BencodedValue, field: &str) -> Result<u64, ValidationError> {
    let length = optional_integer(dict, "length", field)?.unwrap_or(0);

    u64::try_from(length)
        .map_err(|_| ValidationError::InvalidValue(format!("'{}' must not be negative, got {}", field, length)))
}

fn multi_file_entries(files: &BencodedValue) -> Result<Vec<TorrentFileEntry>, ValidationError> {
    let files = files.try_into_list().field("info.files")?;

    files
        .iter()
        .enumerate()
        .map(|(index, file)| {
            let field = format!("info.files[{}]", index);
            file.try_into_dict().field(&field)?;

            let size = non_negative_length(file, &format!("{}.length", field))?;
            let path = match file.get_from_dict(b"path") {
                Some(path) => join_path_segments(path, &format!("{}.path", field))?,
                None => String::new(),
            };

            Ok(TorrentFileEntry { path, size })
        })
        .collect()
}

fn join_path_segments(path: &BencodedValue, field: &str) -> Result<String, ValidationError> {
    let segments = path
        .try_into_list()
        .field(field)?
        .iter()
        .enumerate()
        .map(|(index, segment)| segment.try_into_lossy_string().field(&format!("{}[{}]", field, index)))
        .collect::<Result<Vec<String>, ValidationError>>()?;

    Ok(segments.join("/"))
}

/// Primary announce URL followed by every tier of `announce-list`, tier by tier.
fn announce_urls(announce: &BencodedValue, announce_list: Option<&BencodedValue>) -> Result<Vec<String>, ValidationError> {
    let mut urls = vec![announce.try_into_lossy_string().field("announce")?];

    let Some(announce_list) = announce_list else {
        return Ok(urls);
    };

    for (tier_index, tier) in announce_list.try_into_list().field("announce-list")?.iter().enumerate() {
        let field = format!("announce-list[{}]", tier_index);

        for (url_index, url) in tier.try_into_list().field(&field)?.iter().enumerate() {
            urls.push(url.try_into_lossy_string().field(&format!("{}[{}]", field, url_index))?);
        }
    }

    Ok(urls)
}
