//! Repository for the `destinations` table.

use sqlx::types::Json;
use sqlx::PgPool;
use wayfinder_core::types::DbId;

use crate::models::destination::{Destination, NewDestination};

/// Column list for destinations queries.
const COLUMNS: &str = "id, name, slug, description, category, city, country, address, \
    latitude, longitude, opening_time, closing_time, entry_fee, website, contact_phone, \
    tags, hero_image_url, gallery, status, version, created_by, updated_by, deleted_at, \
    created_at, updated_at";

/// Provides CRUD operations for the destination aggregate.
pub struct DestinationRepo;

impl DestinationRepo {
    /// Find a destination by id, including archived (soft-deleted) rows.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Destination>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM destinations WHERE id = $1");
        sqlx::query_as::<_, Destination>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a destination by its unique slug.
    pub async fn find_by_slug(
        pool: &PgPool,
        slug: &str,
    ) -> Result<Option<Destination>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM destinations WHERE slug = $1");
        sqlx::query_as::<_, Destination>(&query)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    /// Insert a destination at version 1, returning the created row.
    ///
    /// A taken slug surfaces as a `uq_destinations_slug` violation.
    pub async fn create(pool: &PgPool, input: &NewDestination) -> Result<Destination, sqlx::Error> {
        let query = format!(
            "INSERT INTO destinations
                (name, slug, description, category, city, country, address,
                 latitude, longitude, opening_time, closing_time, entry_fee, website,
                 contact_phone, tags, hero_image_url, gallery, status, version, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                     $16, $17, $18, 1, $19)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Destination>(&query)
            .bind(&input.name)
            .bind(&input.slug)
            .bind(&input.description)
            .bind(&input.category)
            .bind(&input.city)
            .bind(&input.country)
            .bind(&input.address)
            .bind(input.latitude)
            .bind(input.longitude)
            .bind(&input.opening_time)
            .bind(&input.closing_time)
            .bind(input.entry_fee)
            .bind(&input.website)
            .bind(&input.contact_phone)
            .bind(&input.tags)
            .bind(&input.hero_image_url)
            .bind(Json(&input.gallery))
            .bind(&input.status)
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }

    /// Write the full state of `destination`, bumping `version` by one.
    ///
    /// Compare-and-swap on `expected_version`: returns `None` when the row is
    /// missing or has moved on since it was read.
    pub async fn update(
        pool: &PgPool,
        destination: &Destination,
        expected_version: i32,
    ) -> Result<Option<Destination>, sqlx::Error> {
        let query = format!(
            "UPDATE destinations SET
                name = $3, slug = $4, description = $5, category = $6, city = $7,
                country = $8, address = $9, latitude = $10, longitude = $11,
                opening_time = $12, closing_time = $13, entry_fee = $14, website = $15,
                contact_phone = $16, tags = $17, hero_image_url = $18, gallery = $19,
                status = $20, updated_by = $21, deleted_at = $22,
                version = version + 1, updated_at = NOW()
             WHERE id = $1 AND version = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Destination>(&query)
            .bind(destination.id)
            .bind(expected_version)
            .bind(&destination.name)
            .bind(&destination.slug)
            .bind(&destination.description)
            .bind(&destination.category)
            .bind(&destination.city)
            .bind(&destination.country)
            .bind(&destination.address)
            .bind(destination.latitude)
            .bind(destination.longitude)
            .bind(&destination.opening_time)
            .bind(&destination.closing_time)
            .bind(destination.entry_fee)
            .bind(&destination.website)
            .bind(&destination.contact_phone)
            .bind(&destination.tags)
            .bind(&destination.hero_image_url)
            .bind(&destination.gallery)
            .bind(&destination.status)
            .bind(destination.updated_by)
            .bind(destination.deleted_at)
            .fetch_optional(pool)
            .await
    }

    /// Physically remove a destination row, guarded by its version.
    /// Returns `true` if a row was deleted.
    pub async fn hard_delete(
        pool: &PgPool,
        id: DbId,
        expected_version: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM destinations WHERE id = $1 AND version = $2")
            .bind(id)
            .bind(expected_version)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
