use wayfinder_core::error::CoreError;
use wayfinder_core::import::{DEFAULT_MAX_IMPORT_BYTES, DEFAULT_MAX_IMPORT_ROWS, DEFAULT_MAX_PENDING_IDS};
use wayfinder_core::media::{DEFAULT_MAX_DIMENSION, DEFAULT_MAX_UPLOAD_BYTES};
use wayfinder_core::storage::{
    validate_backend_settings, StorageBackendType, DEFAULT_IMPORT_BUCKET, DEFAULT_MEDIA_BUCKET,
};
use wayfinder_core::validation::FieldPolicy;

/// Review and validation policy.
#[derive(Debug, Clone, Default)]
pub struct WorkflowPolicy {
    pub fields: FieldPolicy,
    /// Whether delete requests may physically remove a destination.
    pub allow_hard_delete: bool,
    /// Whether the author of a change request may also review it.
    pub allow_self_review: bool,
}

/// Media attachment settings.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub bucket: String,
    pub max_upload_bytes: u64,
    /// Longest side after processing. `0` disables image processing.
    pub max_dimension: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_MEDIA_BUCKET.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

/// CSV import settings.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub bucket: String,
    pub max_file_bytes: u64,
    pub max_rows: usize,
    /// Cap on change-request ids surfaced on a job.
    pub max_pending_ids: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_IMPORT_BUCKET.to_string(),
            max_file_bytes: DEFAULT_MAX_IMPORT_BYTES,
            max_rows: DEFAULT_MAX_IMPORT_ROWS,
            max_pending_ids: DEFAULT_MAX_PENDING_IDS,
        }
    }
}

/// Object storage backend selection.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackendType,
    pub local_root: Option<String>,
    pub public_base_url: Option<String>,
}

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub policy: WorkflowPolicy,
    pub media: MediaConfig,
    pub import: ImportConfig,
    pub storage: StorageConfig,
}

impl WorkflowConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default               |
    /// |---------------------------|-----------------------|
    /// | `DESTINATION_CATEGORIES`  | empty (any category)  |
    /// | `ALLOW_HARD_DELETE`       | `false`               |
    /// | `ALLOW_SELF_REVIEW`       | `false`               |
    /// | `MEDIA_BUCKET`            | `destination-media`   |
    /// | `MEDIA_MAX_UPLOAD_BYTES`  | `10485760`            |
    /// | `MEDIA_MAX_DIMENSION`     | `2048`                |
    /// | `IMPORT_BUCKET`           | `destination-imports` |
    /// | `IMPORT_MAX_FILE_BYTES`   | `5242880`             |
    /// | `IMPORT_MAX_ROWS`         | `1000`                |
    /// | `IMPORT_MAX_PENDING_IDS`  | `50`                  |
    /// | `STORAGE_BACKEND`         | `local`               |
    /// | `STORAGE_LOCAL_ROOT`      | unset                 |
    /// | `STORAGE_PUBLIC_BASE_URL` | unset                 |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let allowed_categories = get("DESTINATION_CATEGORIES")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let policy = WorkflowPolicy {
            fields: FieldPolicy { allowed_categories },
            allow_hard_delete: parse_bool("ALLOW_HARD_DELETE", get("ALLOW_HARD_DELETE"))?,
            allow_self_review: parse_bool("ALLOW_SELF_REVIEW", get("ALLOW_SELF_REVIEW"))?,
        };

        let media_defaults = MediaConfig::default();
        let media = MediaConfig {
            bucket: get("MEDIA_BUCKET").unwrap_or(media_defaults.bucket),
            max_upload_bytes: parse_or(
                "MEDIA_MAX_UPLOAD_BYTES",
                get("MEDIA_MAX_UPLOAD_BYTES"),
                media_defaults.max_upload_bytes,
            )?,
            max_dimension: parse_or(
                "MEDIA_MAX_DIMENSION",
                get("MEDIA_MAX_DIMENSION"),
                media_defaults.max_dimension,
            )?,
        };

        let import_defaults = ImportConfig::default();
        let import = ImportConfig {
            bucket: get("IMPORT_BUCKET").unwrap_or(import_defaults.bucket),
            max_file_bytes: parse_or(
                "IMPORT_MAX_FILE_BYTES",
                get("IMPORT_MAX_FILE_BYTES"),
                import_defaults.max_file_bytes,
            )?,
            max_rows: parse_or(
                "IMPORT_MAX_ROWS",
                get("IMPORT_MAX_ROWS"),
                import_defaults.max_rows,
            )?,
            max_pending_ids: parse_or(
                "IMPORT_MAX_PENDING_IDS",
                get("IMPORT_MAX_PENDING_IDS"),
                import_defaults.max_pending_ids,
            )?,
        };

        let backend = match get("STORAGE_BACKEND") {
            Some(name) => StorageBackendType::from_name(&name)?,
            None => StorageBackendType::Local,
        };
        let storage = StorageConfig {
            backend,
            local_root: get("STORAGE_LOCAL_ROOT"),
            public_base_url: get("STORAGE_PUBLIC_BASE_URL"),
        };

        Ok(Self {
            policy,
            media,
            import,
            storage,
        })
    }

    /// Check that the selected storage backend has what it needs.
    pub fn validate_storage(&self) -> Result<(), CoreError> {
        validate_backend_settings(
            self.storage.backend,
            self.storage.local_root.as_deref(),
            self.storage.public_base_url.as_deref(),
        )
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, CoreError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| CoreError::invalid(format!("{key} must be a valid number, got '{value}'"))),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: Option<String>) -> Result<bool, CoreError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(CoreError::invalid(format!("{key} must be a boolean, got '{v}'"))),
    }
}
