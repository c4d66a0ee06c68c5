//! Destination field model: the sparse payload carried by change requests,
//! destination lifecycle statuses, gallery items and slug derivation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::patch::Patch;

// ── Status ───────────────────────────────────────────────────────────

/// Lifecycle status of a destination aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationStatus {
    Draft,
    Published,
    Archived,
}

impl DestinationStatus {
    pub const ALL: &'static [DestinationStatus] = &[Self::Draft, Self::Published, Self::Archived];

    /// Statuses a create request may ask for.
    pub const ON_CREATE: &'static [DestinationStatus] = &[Self::Draft, Self::Published];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }

    /// Parse a status value (case-insensitive).
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            other => Err(CoreError::invalid(format!(
                "Unknown destination status '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for DestinationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Gallery ──────────────────────────────────────────────────────────

/// One image in a destination's gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryItem {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub ordering: i32,
}

// ── Field payload ────────────────────────────────────────────────────

/// Sparse set of destination field edits.
///
/// Every business field is a [`Patch`]; see that type for the absent / clear
/// / set distinction. `hard_delete` is only meaningful on delete requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationFields {
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub name: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub slug: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub description: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub category: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub city: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub country: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub address: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub latitude: Patch<f64>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub longitude: Patch<f64>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub opening_time: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub closing_time: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub entry_fee: Patch<f64>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub website: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub contact_phone: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub tags: Patch<Vec<String>>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub hero_image_url: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub gallery: Patch<Vec<GalleryItem>>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub status: Patch<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_delete: Option<bool>,
}

impl DestinationFields {
    /// Trim every text field; blank values become `Clear`. Tags are trimmed
    /// and blank tags dropped, gallery URLs and captions are trimmed.
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trimmed(),
            slug: self.slug.trimmed(),
            description: self.description.trimmed(),
            category: self.category.trimmed(),
            city: self.city.trimmed(),
            country: self.country.trimmed(),
            address: self.address.trimmed(),
            latitude: self.latitude,
            longitude: self.longitude,
            opening_time: self.opening_time.trimmed(),
            closing_time: self.closing_time.trimmed(),
            entry_fee: self.entry_fee,
            website: self.website.trimmed(),
            contact_phone: self.contact_phone.trimmed(),
            tags: self.tags.map(|tags| {
                tags.into_iter()
                    .map(|tag| tag.trim().to_string())
                    .filter(|tag| !tag.is_empty())
                    .collect()
            }),
            hero_image_url: self.hero_image_url.trimmed(),
            gallery: self.gallery.map(|items| {
                items
                    .into_iter()
                    .map(|item| GalleryItem {
                        url: item.url.trim().to_string(),
                        caption: item
                            .caption
                            .map(|c| c.trim().to_string())
                            .filter(|c| !c.is_empty()),
                        ordering: item.ordering,
                    })
                    .collect()
            }),
            status: self.status.trimmed().map(|s| s.to_ascii_lowercase()),
            hard_delete: self.hard_delete,
        }
    }

    /// The slug this payload would publish under: the explicit slug when
    /// set, otherwise one derived from the name.
    pub fn effective_slug(&self) -> Option<String> {
        match (&self.slug, &self.name) {
            (Patch::Set(slug), _) => Some(slug.clone()),
            (_, Patch::Set(name)) => {
                let derived = slugify(name);
                (!derived.is_empty()).then_some(derived)
            }
            _ => None,
        }
    }
}

// ── Slugs ────────────────────────────────────────────────────────────

/// Derive a URL slug: lowercase ASCII alphanumeric runs joined by `-`.
///
/// Non-ASCII characters act as separators, so the result always matches
/// the slug pattern (or is empty).
pub fn slugify(input: &str) -> String {
    input
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(
            DestinationStatus::parse(" Published ").unwrap(),
            DestinationStatus::Published
        );
        assert!(DestinationStatus::parse("deleted").is_err());
    }

    #[test]
    fn slugify_collapses_punctuation_and_case() {
        assert_eq!(slugify("Central Park"), "central-park");
        assert_eq!(slugify("  St. Peter's -- Basilica!"), "st-peter-s-basilica");
        assert_eq!(slugify("Café Zürich"), "caf-z-rich");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn normalized_trims_and_clears_blank_text() {
        let fields = DestinationFields {
            name: Patch::Set("  Old Town  ".into()),
            city: Patch::Set("   ".into()),
            tags: Patch::Set(vec![" food ".into(), "".into(), "history".into()]),
            status: Patch::Set("PUBLISHED".into()),
            ..Default::default()
        }
        .normalized();

        assert_eq!(fields.name, Patch::Set("Old Town".into()));
        assert_eq!(fields.city, Patch::Clear);
        assert_eq!(
            fields.tags,
            Patch::Set(vec!["food".to_string(), "history".to_string()])
        );
        assert_eq!(fields.status, Patch::Set("published".into()));
    }

    #[test]
    fn effective_slug_prefers_explicit_slug() {
        let explicit = DestinationFields {
            name: Patch::Set("Central Park".into()),
            slug: Patch::Set("nyc-central-park".into()),
            ..Default::default()
        };
        assert_eq!(explicit.effective_slug().as_deref(), Some("nyc-central-park"));

        let derived = DestinationFields {
            name: Patch::Set("Central Park".into()),
            ..Default::default()
        };
        assert_eq!(derived.effective_slug().as_deref(), Some("central-park"));

        assert_eq!(DestinationFields::default().effective_slug(), None);
    }

    #[test]
    fn payload_round_trips_through_json_without_losing_clears() {
        let fields = DestinationFields {
            description: Patch::Clear,
            entry_fee: Patch::Set(0.0),
            ..Default::default()
        };
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(json, serde_json::json!({"description": null, "entry_fee": 0.0}));

        let back: DestinationFields = serde_json::from_value(json).unwrap();
        assert_eq!(back, fields);
    }
}
