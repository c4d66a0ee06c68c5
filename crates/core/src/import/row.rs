//! Mapping CSV records onto destination field payloads.

use std::collections::HashMap;

use crate::destination::{DestinationFields, GalleryItem};
use crate::patch::Patch;

/// Columns every import file must carry.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "name",
    "slug",
    "category",
    "city",
    "country",
    "latitude",
    "longitude",
    "hero_image_url",
];

/// Separator for multi-value cells (`tags`, `gallery`).
pub const LIST_SEPARATOR: char = ';';

/// Required columns absent from the (normalised) header row.
pub fn missing_columns(headers: &[String]) -> Vec<&'static str> {
    REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|required| !headers.iter().any(|h| h == required))
        .collect()
}

/// A record mapped to a payload plus the parse problems found on the way.
/// Parse problems never abort the mapping of the remaining columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowMapping {
    pub fields: DestinationFields,
    pub errors: Vec<String>,
}

/// Map one record's values (aligned with `headers`) onto a create payload.
///
/// Blank cells are left `Unchanged`; unknown columns are ignored.
pub fn map_record(headers: &[String], values: &[String]) -> RowMapping {
    let mut mapping = RowMapping::default();

    if values.len() > headers.len() {
        mapping.errors.push(format!(
            "row has {} values but the header has {} columns",
            values.len(),
            headers.len()
        ));
    }

    for (header, raw) in headers.iter().zip(values.iter()) {
        let value = raw.trim();
        if value.is_empty() {
            continue;
        }
        let text = || Patch::Set(value.to_string());
        let fields = &mut mapping.fields;

        match header.as_str() {
            "name" => fields.name = text(),
            "slug" => fields.slug = text(),
            "category" => fields.category = text(),
            "city" => fields.city = text(),
            "country" => fields.country = text(),
            "hero_image_url" => fields.hero_image_url = text(),
            "description" => fields.description = text(),
            "address" => fields.address = text(),
            "opening_time" => fields.opening_time = text(),
            "closing_time" => fields.closing_time = text(),
            "website" => fields.website = text(),
            "contact_phone" => fields.contact_phone = text(),
            "status" => fields.status = text(),
            "latitude" => fields.latitude = parse_number("latitude", value, &mut mapping.errors),
            "longitude" => {
                fields.longitude = parse_number("longitude", value, &mut mapping.errors)
            }
            "entry_fee" => {
                fields.entry_fee = parse_number("entry_fee", value, &mut mapping.errors)
            }
            "tags" => fields.tags = Patch::Set(split_list(value)),
            "gallery" => {
                fields.gallery = Patch::Set(
                    split_list(value)
                        .into_iter()
                        .enumerate()
                        .map(|(ordering, url)| GalleryItem {
                            url,
                            caption: None,
                            ordering: ordering as i32,
                        })
                        .collect(),
                )
            }
            _ => {}
        }
    }

    mapping
}

fn parse_number(label: &str, value: &str, errors: &mut Vec<String>) -> Patch<f64> {
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() => Patch::Set(number),
        _ => {
            errors.push(format!("{label} '{value}' is not a valid number"));
            Patch::Unchanged
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tracks slugs already claimed earlier in the same batch.
/// The first occurrence wins; later rows learn which row owns the slug.
#[derive(Debug, Default)]
pub struct BatchSlugs {
    first_row: HashMap<String, usize>,
}

impl BatchSlugs {
    /// Claim `slug` for `row`. Returns the owning row number if the slug
    /// was already claimed.
    pub fn claim(&mut self, slug: &str, row: usize) -> Result<(), usize> {
        match self.first_row.get(slug) {
            Some(&owner) => Err(owner),
            None => {
                self.first_row.insert(slug.to_string(), row);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn values(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reports_missing_required_columns() {
        let missing = missing_columns(&headers(&["name", "slug", "city", "latitude"]));
        assert_eq!(
            missing,
            vec!["category", "country", "longitude", "hero_image_url"]
        );
        assert!(missing_columns(&headers(REQUIRED_COLUMNS)).is_empty());
    }

    #[test]
    fn maps_text_numbers_and_lists() {
        let mapping = map_record(
            &headers(&["name", "latitude", "longitude", "tags", "gallery", "unknown"]),
            &values(&[
                " Central Park ",
                "40.78",
                "-73.96",
                "park; nature ;",
                "https://a/1.jpg;https://a/2.jpg",
                "ignored",
            ]),
        );
        assert!(mapping.errors.is_empty());
        let fields = mapping.fields;
        assert_eq!(fields.name, Patch::Set("Central Park".into()));
        assert_eq!(fields.latitude, Patch::Set(40.78));
        assert_eq!(fields.longitude, Patch::Set(-73.96));
        assert_eq!(
            fields.tags,
            Patch::Set(vec!["park".to_string(), "nature".to_string()])
        );
        let gallery = fields.gallery.as_set().unwrap();
        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery[1].ordering, 1);
        assert_eq!(gallery[1].url, "https://a/2.jpg");
    }

    #[test]
    fn unparsable_numbers_are_collected_without_aborting() {
        let mapping = map_record(
            &headers(&["latitude", "longitude", "name"]),
            &values(&["north", "NaN", "Somewhere"]),
        );
        assert_eq!(mapping.errors.len(), 2);
        assert!(mapping.errors[0].contains("latitude 'north'"));
        assert_eq!(mapping.fields.name, Patch::Set("Somewhere".into()));
        assert!(mapping.fields.latitude.is_unchanged());
    }

    #[test]
    fn blank_cells_stay_unchanged_and_short_rows_are_padded() {
        let mapping = map_record(&headers(&["name", "city", "country"]), &values(&["X", " "]));
        assert!(mapping.errors.is_empty());
        assert!(mapping.fields.city.is_unchanged());
        assert!(mapping.fields.country.is_unchanged());
    }

    #[test]
    fn extra_values_are_reported() {
        let mapping = map_record(&headers(&["name"]), &values(&["X", "surplus"]));
        assert_eq!(mapping.errors.len(), 1);
        assert_eq!(mapping.fields.name, Patch::Set("X".into()));
    }

    #[test]
    fn batch_slugs_first_occurrence_wins() {
        let mut slugs = BatchSlugs::default();
        assert!(slugs.claim("central-park", 2).is_ok());
        assert_eq!(slugs.claim("central-park", 3), Err(2));
        assert!(slugs.claim("hyde-park", 4).is_ok());
    }
}
