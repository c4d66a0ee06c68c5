//! Destination aggregate model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use wayfinder_core::destination::{DestinationStatus, GalleryItem};
use wayfinder_core::error::CoreError;
use wayfinder_core::types::{DbId, Timestamp, UserId};

/// A row from the `destinations` table.
///
/// `version` starts at 1 and is bumped by every applied change.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Destination {
    pub id: DbId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
    pub entry_fee: Option<f64>,
    pub website: Option<String>,
    pub contact_phone: Option<String>,
    pub tags: Vec<String>,
    pub hero_image_url: Option<String>,
    pub gallery: Json<Vec<GalleryItem>>,
    pub status: String,
    pub version: i32,
    pub created_by: UserId,
    pub updated_by: Option<UserId>,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Destination {
    pub fn parsed_status(&self) -> Result<DestinationStatus, CoreError> {
        DestinationStatus::parse(&self.status)
    }
}

/// DTO for inserting a destination. The row starts at version 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDestination {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
    pub entry_fee: Option<f64>,
    pub website: Option<String>,
    pub contact_phone: Option<String>,
    pub tags: Vec<String>,
    pub hero_image_url: Option<String>,
    pub gallery: Vec<GalleryItem>,
    pub status: String,
    pub created_by: UserId,
}
