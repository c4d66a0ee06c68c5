//! Media upload constants and pure helpers: content-type resolution, upload
//! admission checks and object-key construction.

use crate::types::DbId;
use crate::validation::ValidationError;

pub const CONTENT_TYPE_JPEG: &str = "image/jpeg";
pub const CONTENT_TYPE_PNG: &str = "image/png";
pub const CONTENT_TYPE_WEBP: &str = "image/webp";

/// Content types accepted for hero and gallery images.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &[CONTENT_TYPE_JPEG, CONTENT_TYPE_PNG, CONTENT_TYPE_WEBP];

/// Used when neither the declared type nor the extension resolves.
pub const DEFAULT_IMAGE_TYPE: &str = CONTENT_TYPE_JPEG;

/// Default per-file upload ceiling (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Default longest-side bound applied by the image processor.
pub const DEFAULT_MAX_DIMENSION: u32 = 2048;

/// Which slot of the draft an upload fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSlot {
    Hero,
    Gallery,
}

impl MediaSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hero => "hero",
            Self::Gallery => "gallery",
        }
    }
}

/// Resolve the content type of an upload.
///
/// Uses the declared type (parameters stripped, lowercased) unless it is
/// missing or generic, then sniffs the file extension, then falls back to
/// [`DEFAULT_IMAGE_TYPE`]. The result is not checked against the allow-list.
pub fn resolve_content_type(declared: Option<&str>, file_name: &str) -> String {
    let declared = declared
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value != "application/octet-stream");

    if let Some(content_type) = declared {
        return content_type;
    }

    content_type_from_extension(file_name)
        .unwrap_or(DEFAULT_IMAGE_TYPE)
        .to_string()
}

/// Map a file name's extension to an image content type.
pub fn content_type_from_extension(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some(CONTENT_TYPE_JPEG),
        "png" => Some(CONTENT_TYPE_PNG),
        "webp" => Some(CONTENT_TYPE_WEBP),
        _ => None,
    }
}

/// File extension used when storing an object of the given type.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        CONTENT_TYPE_PNG => "png",
        CONTENT_TYPE_WEBP => "webp",
        _ => "jpg",
    }
}

/// Admission check run before any I/O: size ceiling and type allow-list.
pub fn check_upload(
    file_name: &str,
    size_bytes: u64,
    content_type: &str,
    max_bytes: u64,
) -> Result<(), ValidationError> {
    let mut problems = Vec::new();
    if size_bytes == 0 {
        problems.push(format!("upload '{file_name}' is empty"));
    }
    if size_bytes > max_bytes {
        problems.push(format!(
            "upload '{file_name}' is {size_bytes} bytes, exceeding the {max_bytes} byte limit"
        ));
    }
    if !ALLOWED_IMAGE_TYPES.contains(&content_type) {
        problems.push(format!(
            "upload '{file_name}' has unsupported content type '{content_type}'. Must be one of: {}",
            ALLOWED_IMAGE_TYPES.join(", ")
        ));
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { problems })
    }
}

/// Object key for a change-request image:
/// `change-requests/{change_id}/{slot}/{uuid}.{ext}`.
pub fn media_object_key(change_id: DbId, slot: MediaSlot, content_type: &str) -> String {
    format!(
        "change-requests/{change_id}/{}/{}.{}",
        slot.as_str(),
        uuid::Uuid::new_v4(),
        extension_for(content_type)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_type_wins_and_is_normalised() {
        assert_eq!(
            resolve_content_type(Some("Image/PNG; charset=binary"), "photo.jpg"),
            "image/png"
        );
    }

    #[test]
    fn generic_declared_type_falls_back_to_extension() {
        assert_eq!(
            resolve_content_type(Some("application/octet-stream"), "beach.WEBP"),
            "image/webp"
        );
        assert_eq!(resolve_content_type(None, "tower.jpeg"), "image/jpeg");
    }

    #[test]
    fn unknown_extension_falls_back_to_default() {
        assert_eq!(resolve_content_type(None, "scan"), DEFAULT_IMAGE_TYPE);
        assert_eq!(resolve_content_type(Some(""), "scan.bmp"), DEFAULT_IMAGE_TYPE);
    }

    #[test]
    fn check_upload_enforces_size_and_type() {
        assert!(check_upload("a.png", 10, "image/png", 100).is_ok());

        let err = check_upload("a.gif", 200, "image/gif", 100).unwrap_err();
        assert_eq!(err.problems.len(), 2);

        assert!(check_upload("empty.png", 0, "image/png", 100).is_err());
    }

    #[test]
    fn object_key_layout() {
        let key = media_object_key(42, MediaSlot::Gallery, "image/webp");
        assert!(key.starts_with("change-requests/42/gallery/"));
        assert!(key.ends_with(".webp"));
    }
}
