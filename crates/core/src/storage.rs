//! Object storage backend selection and key helpers.
//!
//! The engine writes media and archived import files through an object
//! storage collaborator; this module holds the pure parts: backend naming,
//! backend settings validation and key construction for import archives.

use crate::error::CoreError;
use crate::types::UserId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default bucket for destination media.
pub const DEFAULT_MEDIA_BUCKET: &str = "destination-media";

/// Default bucket for archived import files.
pub const DEFAULT_IMPORT_BUCKET: &str = "destination-imports";

/// Maximum length kept from a user-supplied file name inside a key.
const MAX_KEY_FILE_NAME: usize = 80;

// ---------------------------------------------------------------------------
// Backend type
// ---------------------------------------------------------------------------

/// Object storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendType {
    Local,
    S3,
}

impl StorageBackendType {
    /// Parse from the `STORAGE_BACKEND` setting.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "s3" => Ok(Self::S3),
            other => Err(CoreError::invalid(format!(
                "Unknown storage backend '{other}'. Must be one of: local, s3"
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::S3 => "s3",
        }
    }
}

// ---------------------------------------------------------------------------
// Settings validation
// ---------------------------------------------------------------------------

/// Validate that the settings required by `backend` are present.
///
/// - `local`: requires a root directory and a public base URL
/// - `s3`: requires a public base URL (credentials come from the AWS chain)
pub fn validate_backend_settings(
    backend: StorageBackendType,
    local_root: Option<&str>,
    public_base_url: Option<&str>,
) -> Result<(), CoreError> {
    let mut missing = Vec::new();
    if backend == StorageBackendType::Local && is_blank(local_root) {
        missing.push("STORAGE_LOCAL_ROOT");
    }
    if is_blank(public_base_url) {
        missing.push("STORAGE_PUBLIC_BASE_URL");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CoreError::invalid(format!(
            "Storage backend '{}' requires: {}",
            backend.name(),
            missing.join(", ")
        )))
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Keys and URLs
// ---------------------------------------------------------------------------

/// Reduce a user-supplied file name to `[A-Za-z0-9._-]`, bounded in length.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_KEY_FILE_NAME)
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Key under which a raw import file is archived:
/// `imports/{uploader_id}/{uuid}-{sanitised name}`.
pub fn import_object_key(uploader_id: UserId, file_name: &str) -> String {
    format!(
        "imports/{uploader_id}/{}-{}",
        uuid::Uuid::new_v4(),
        sanitize_file_name(file_name)
    )
}

/// Join a public base URL, bucket and key into an object URL.
pub fn public_object_url(base_url: &str, bucket: &str, key: &str) -> String {
    format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        bucket.trim_matches('/'),
        key.trim_start_matches('/')
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
