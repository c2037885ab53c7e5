//! Attachment validation logic
//!
//! Checks image files picked from disk (existence, size, extension) and
//! image URLs typed by the user, and turns accepted files into embeddable
//! `data:` URLs.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

pub const MAX_FILE_SIZE: u64 = 5_242_880; // 5MB
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "bmp"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("file is {size} bytes, limit is {max}")]
    FileTooLarge { size: u64, max: u64 },

    #[error("unsupported image type: {0}")]
    UnsupportedExtension(String),

    #[error("file has no extension")]
    NoExtension,

    #[error("file not found")]
    FileNotFound,

    #[error("failed to read file: {0}")]
    ReadFailed(String),

    #[error("not an http(s) or data:image URL: {0}")]
    InvalidUrl(String),
}

/// Validate a file for attachment
pub fn validate_image_file(path: &Path) -> Result<(), AttachmentError> {
    let metadata = std::fs::metadata(path).map_err(|_| AttachmentError::FileNotFound)?;

    let size = metadata.len();
    if size > MAX_FILE_SIZE {
        return Err(AttachmentError::FileTooLarge {
            size,
            max: MAX_FILE_SIZE,
        });
    }

    let ext = path
        .extension()
        .ok_or(AttachmentError::NoExtension)?
        .to_string_lossy()
        .to_lowercase();

    if !is_image_extension(&ext) {
        return Err(AttachmentError::UnsupportedExtension(ext));
    }

    Ok(())
}

/// Check if a file is an image based on extension
pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// MIME type for a supported image extension
pub fn media_type_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Validate and read an image file into a base64 `data:` URL
pub fn read_image_as_data_url(path: &Path) -> Result<String, AttachmentError> {
    validate_image_file(path)?;

    let bytes = std::fs::read(path).map_err(|e| AttachmentError::ReadFailed(e.to_string()))?;
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(format!(
        "data:{};base64,{}",
        media_type_for_extension(&ext),
        STANDARD.encode(bytes)
    ))
}

/// Accept http(s) URLs and inline image data URLs
pub fn validate_image_url(url: &str) -> Result<String, AttachmentError> {
    let trimmed = url.trim();
    let lower = trimmed.to_lowercase();
    let has_host = |rest: &str| !rest.is_empty() && !rest.starts_with('/');

    let ok = if let Some(rest) = lower.strip_prefix("https://") {
        has_host(rest)
    } else if let Some(rest) = lower.strip_prefix("http://") {
        has_host(rest)
    } else {
        lower.starts_with("data:image/")
    };

    if ok && !trimmed.contains(char::is_whitespace) {
        Ok(trimmed.to_string())
    } else {
        Err(AttachmentError::InvalidUrl(trimmed.to_string()))
    }
}
