//! Upload checks: image content types, magic-byte detection, filenames.

use crate::defaults;
use crate::error::{Error, Result};

/// Reject anything whose declared content type is not `image/*`.
///
/// Runs before any bytes are written.
pub fn ensure_image_content_type(content_type: &str) -> Result<()> {
    if content_type.trim().to_ascii_lowercase().starts_with("image/") {
        Ok(())
    } else {
        Err(Error::InvalidInput("File must be an image".to_string()))
    }
}

/// Detect actual content type from file magic bytes.
///
/// Falls back to the claimed type when `infer` recognizes nothing.
pub fn detect_content_type(data: &[u8], claimed: &str) -> String {
    match infer::get(data) {
        Some(kind) => kind.mime_type().to_string(),
        None => claimed.to_string(),
    }
}

/// Extension (with leading dot) of an uploaded filename, `.jpg` when absent.
pub fn upload_extension(original_filename: &str) -> String {
    let name = original_filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_filename);
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => {
            let ext = &name[pos + 1..];
            if ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                format!(".{}", ext.to_ascii_lowercase())
            } else {
                defaults::DEFAULT_IMAGE_EXTENSION.to_string()
            }
        }
        _ => defaults::DEFAULT_IMAGE_EXTENSION.to_string(),
    }
}

/// Strip path components and characters unsafe in filenames or headers.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        return "unnamed_file".to_string();
    }
    sanitized.to_string()
}

/// Validate a history entry name: non-empty, no path separators.
pub fn validate_entry_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("Name must not be empty".to_string()));
    }
    if trimmed.contains('/') || trimmed.contains('\\') || trimmed == "." || trimmed == ".." {
        return Err(Error::InvalidInput(format!("Invalid name: {}", trimmed)));
    }
    Ok(trimmed.to_string())
}
