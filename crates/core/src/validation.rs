//! Validation engine for destination field payloads.
//!
//! Pure functions, no I/O. Every rule runs and all violations are collected
//! into a single [`ValidationError`] instead of stopping at the first one.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::change_request::ChangeAction;
use crate::destination::{DestinationFields, DestinationStatus};
use crate::patch::Patch;

/// Slug pattern: lowercase alphanumeric runs separated by single hyphens.
pub const SLUG_PATTERN: &str = r"^[a-z0-9]+(-[a-z0-9]+)*$";

/// 24-hour `HH:MM`.
pub const TIME_PATTERN: &str = r"^([01][0-9]|2[0-3]):[0-5][0-9]$";

pub const MAX_NAME_LENGTH: usize = 200;
pub const MAX_SLUG_LENGTH: usize = 120;
pub const MAX_DESCRIPTION_LENGTH: usize = 10_000;

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SLUG_PATTERN).expect("valid regex"));

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TIME_PATTERN).expect("valid regex"));

/// All problems found in one payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{}", problems.join("; "))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

impl ValidationError {
    pub fn single(problem: impl Into<String>) -> Self {
        Self {
            problems: vec![problem.into()],
        }
    }
}

/// Configured policy the validation rules consult.
#[derive(Debug, Clone, Default)]
pub struct FieldPolicy {
    /// Allowed categories, matched case-insensitively. Empty allows any.
    pub allowed_categories: Vec<String>,
}

impl FieldPolicy {
    fn category_allowed(&self, category: &str) -> bool {
        self.allowed_categories.is_empty()
            || self
                .allowed_categories
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(category))
    }
}

/// Validate a payload for the given action.
///
/// `require_all_fields` is set for creates. String fields are trimmed first;
/// blank optional strings count as absent.
pub fn validate_fields(
    action: ChangeAction,
    fields: &DestinationFields,
    require_all_fields: bool,
    policy: &FieldPolicy,
) -> Result<(), ValidationError> {
    let fields = fields.clone().normalized();
    let mut problems = Vec::new();

    match &fields.name {
        Patch::Set(name) if name.chars().count() > MAX_NAME_LENGTH => {
            problems.push(format!("name must be at most {MAX_NAME_LENGTH} characters"));
        }
        Patch::Set(_) => {}
        Patch::Clear if require_all_fields => problems.push("name is required".to_string()),
        Patch::Clear => problems.push("name cannot be empty".to_string()),
        Patch::Unchanged if require_all_fields => {
            problems.push("name is required".to_string());
        }
        Patch::Unchanged => {}
    }

    if matches!(fields.slug, Patch::Clear) && !require_all_fields {
        problems.push("slug cannot be empty".to_string());
    }

    if let Patch::Set(slug) = &fields.slug {
        if slug.len() > MAX_SLUG_LENGTH {
            problems.push(format!("slug must be at most {MAX_SLUG_LENGTH} characters"));
        }
        if !SLUG_RE.is_match(slug) {
            problems.push(format!(
                "slug '{slug}' must contain only lowercase letters, digits and single hyphens"
            ));
        }
    }

    if let Patch::Set(description) = &fields.description {
        if description.chars().count() > MAX_DESCRIPTION_LENGTH {
            problems.push(format!(
                "description must be at most {MAX_DESCRIPTION_LENGTH} characters"
            ));
        }
    }

    if let Patch::Set(category) = &fields.category {
        if !policy.category_allowed(category) {
            problems.push(format!(
                "category '{category}' is not allowed. Must be one of: {}",
                policy.allowed_categories.join(", ")
            ));
        }
    }

    if let Patch::Set(latitude) = fields.latitude {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            problems.push(format!("latitude {latitude} must be between -90 and 90"));
        }
    }

    if let Patch::Set(longitude) = fields.longitude {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            problems.push(format!("longitude {longitude} must be between -180 and 180"));
        }
    }

    for (label, value) in [
        ("opening_time", &fields.opening_time),
        ("closing_time", &fields.closing_time),
    ] {
        if let Patch::Set(time) = value {
            if !is_valid_time(time) {
                problems.push(format!(
                    "{label} '{time}' must be a 24-hour time in HH:MM format"
                ));
            }
        }
    }

    if let Patch::Set(fee) = fields.entry_fee {
        if !fee.is_finite() || fee < 0.0 {
            problems.push(format!("entry_fee {fee} must be a non-negative amount"));
        }
    }

    if let Patch::Set(website) = &fields.website {
        if !(website.starts_with("http://") || website.starts_with("https://")) {
            problems.push(format!(
                "website '{website}' must start with http:// or https://"
            ));
        }
    }

    if let Patch::Set(items) = &fields.gallery {
        for (index, item) in items.iter().enumerate() {
            if item.url.is_empty() {
                problems.push(format!("gallery[{index}].url is required"));
            }
            if item.ordering < 0 {
                problems.push(format!("gallery[{index}].ordering must be non-negative"));
            }
        }
    }

    if let Patch::Set(status) = &fields.status {
        let allowed = allowed_statuses(action);
        let matches = DestinationStatus::parse(status)
            .map(|parsed| allowed.contains(&parsed))
            .unwrap_or(false);
        if !matches {
            let names: Vec<&str> = allowed.iter().map(|s| s.as_str()).collect();
            problems.push(format!(
                "status '{status}' is not allowed for {action}. Must be one of: {}",
                names.join(", ")
            ));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { problems })
    }
}

/// Destination statuses a payload may request for the given action.
pub fn allowed_statuses(action: ChangeAction) -> &'static [DestinationStatus] {
    match action {
        ChangeAction::Create => DestinationStatus::ON_CREATE,
        ChangeAction::Update | ChangeAction::Delete => DestinationStatus::ALL,
    }
}

/// `true` for a 24-hour `HH:MM` time.
pub fn is_valid_time(value: &str) -> bool {
    TIME_RE.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::GalleryItem;

    fn named(name: &str) -> DestinationFields {
        DestinationFields {
            name: Patch::Set(name.to_string()),
            ..Default::default()
        }
    }

    fn problems(result: Result<(), ValidationError>) -> Vec<String> {
        result.expect_err("expected validation to fail").problems
    }

    #[test]
    fn create_requires_name() {
        let found = problems(validate_fields(
            ChangeAction::Create,
            &DestinationFields::default(),
            true,
            &FieldPolicy::default(),
        ));
        assert_eq!(found, vec!["name is required".to_string()]);
    }

    #[test]
    fn blank_name_on_create_counts_as_missing() {
        let found = problems(validate_fields(
            ChangeAction::Create,
            &named("   "),
            true,
            &FieldPolicy::default(),
        ));
        assert_eq!(found, vec!["name is required".to_string()]);
    }

    #[test]
    fn update_may_omit_name_but_not_clear_it() {
        let policy = FieldPolicy::default();
        assert!(validate_fields(
            ChangeAction::Update,
            &DestinationFields::default(),
            false,
            &policy
        )
        .is_ok());

        let cleared = DestinationFields {
            name: Patch::Clear,
            ..Default::default()
        };
        let found = problems(validate_fields(ChangeAction::Update, &cleared, false, &policy));
        assert_eq!(found, vec!["name cannot be empty".to_string()]);

        let cleared_slug = DestinationFields {
            slug: Patch::Clear,
            ..Default::default()
        };
        let found = problems(validate_fields(ChangeAction::Update, &cleared_slug, false, &policy));
        assert_eq!(found, vec!["slug cannot be empty".to_string()]);
    }

    #[test]
    fn invalid_opening_time_mentions_field() {
        let fields = DestinationFields {
            opening_time: Patch::Set("25:00".into()),
            ..named("X")
        };
        let found = problems(validate_fields(
            ChangeAction::Create,
            &fields,
            true,
            &FieldPolicy::default(),
        ));
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("opening_time"));
    }

    #[test]
    fn all_violations_accumulate() {
        let fields = DestinationFields {
            slug: Patch::Set("Bad Slug".into()),
            latitude: Patch::Set(91.0),
            longitude: Patch::Set(-181.0),
            closing_time: Patch::Set("7pm".into()),
            gallery: Patch::Set(vec![
                GalleryItem {
                    url: " ".into(),
                    caption: None,
                    ordering: 0,
                },
                GalleryItem {
                    url: "https://cdn.example/a.jpg".into(),
                    caption: None,
                    ordering: -1,
                },
            ]),
            ..Default::default()
        };
        let found = problems(validate_fields(
            ChangeAction::Create,
            &fields,
            true,
            &FieldPolicy::default(),
        ));
        let joined = found.join("\n");
        assert_eq!(found.len(), 7, "{joined}");
        assert!(joined.contains("name is required"));
        assert!(joined.contains("slug 'Bad Slug'"));
        assert!(joined.contains("latitude"));
        assert!(joined.contains("longitude"));
        assert!(joined.contains("closing_time"));
        assert!(joined.contains("gallery[0].url"));
        assert!(joined.contains("gallery[1].ordering"));
    }

    #[test]
    fn boundary_coordinates_are_valid() {
        let fields = DestinationFields {
            latitude: Patch::Set(-90.0),
            longitude: Patch::Set(180.0),
            ..named("Pole")
        };
        assert!(validate_fields(ChangeAction::Create, &fields, true, &FieldPolicy::default()).is_ok());
    }

    #[test]
    fn category_allow_list_is_case_insensitive() {
        let policy = FieldPolicy {
            allowed_categories: vec!["Park".into(), "Museum".into()],
        };
        let ok = DestinationFields {
            category: Patch::Set("park".into()),
            ..named("Green")
        };
        assert!(validate_fields(ChangeAction::Create, &ok, true, &policy).is_ok());

        let bad = DestinationFields {
            category: Patch::Set("casino".into()),
            ..named("Strip")
        };
        let found = problems(validate_fields(ChangeAction::Create, &bad, true, &policy));
        assert!(found[0].contains("category 'casino'"));
    }

    #[test]
    fn archived_status_only_allowed_on_update() {
        let fields = DestinationFields {
            status: Patch::Set("archived".into()),
            ..named("Old Fort")
        };
        let policy = FieldPolicy::default();
        assert!(validate_fields(ChangeAction::Create, &fields, true, &policy).is_err());
        assert!(validate_fields(ChangeAction::Update, &fields, false, &policy).is_ok());
    }

    #[test]
    fn negative_fee_and_bare_website_are_rejected() {
        let fields = DestinationFields {
            entry_fee: Patch::Set(-2.5),
            website: Patch::Set("example.com".into()),
            ..named("Museum")
        };
        let found = problems(validate_fields(
            ChangeAction::Create,
            &fields,
            true,
            &FieldPolicy::default(),
        ));
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn zero_fee_is_valid() {
        let fields = DestinationFields {
            entry_fee: Patch::Set(0.0),
            ..named("Free Park")
        };
        assert!(validate_fields(ChangeAction::Create, &fields, true, &FieldPolicy::default()).is_ok());
    }

    #[test]
    fn time_format_edges() {
        assert!(is_valid_time("00:00"));
        assert!(is_valid_time("23:59"));
        assert!(!is_valid_time("24:00"));
        assert!(!is_valid_time("9:00"));
        assert!(!is_valid_time("12:60"));
    }
}
