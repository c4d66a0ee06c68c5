//! Approval Applier: turns an approved change request into a mutation of the
//! destination aggregate plus exactly one ledger entry.
//!
//! Invoked only by [`ChangeWorkflow::approve`](crate::service::ChangeWorkflow::approve).

use chrono::Utc;
use sqlx::types::Json;
use wayfinder_core::change_request::ChangeAction;
use wayfinder_core::destination::{DestinationFields, DestinationStatus};
use wayfinder_core::error::CoreError;
use wayfinder_core::patch::Patch;
use wayfinder_core::types::{DbId, UserId};
use wayfinder_db::models::change_request::ChangeRequest;
use wayfinder_db::models::destination::{Destination, NewDestination};
use wayfinder_db::models::destination_version::{CreateDestinationVersion, DestinationVersion};

use crate::config::WorkflowPolicy;
use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::{CasOutcome, DestinationStore, VersionLedger};

/// What a successful application produced.
#[derive(Debug, Clone)]
pub struct AppliedChange {
    pub destination_id: DbId,
    /// Destination version recorded in the ledger.
    pub version: i32,
    pub ledger_entry: DestinationVersion,
}

/// A failed application. `mutated` is set when the aggregate was already
/// written and only the ledger append failed.
#[derive(Debug)]
pub struct ApplyFailure {
    pub error: WorkflowError,
    pub mutated: Option<MutatedDestination>,
}

/// The aggregate write that happened before a ledger failure.
#[derive(Debug, Clone, Copy)]
pub struct MutatedDestination {
    pub destination_id: DbId,
    pub version: i32,
}

impl From<WorkflowError> for ApplyFailure {
    fn from(error: WorkflowError) -> Self {
        Self {
            error,
            mutated: None,
        }
    }
}

impl From<CoreError> for ApplyFailure {
    fn from(err: CoreError) -> Self {
        WorkflowError::from(err).into()
    }
}

pub(crate) struct ApprovalApplier<'a> {
    pub destinations: &'a dyn DestinationStore,
    pub ledger: &'a dyn VersionLedger,
    pub policy: &'a WorkflowPolicy,
}

impl ApprovalApplier<'_> {
    /// Apply `change` (already claimed as approved) on behalf of `reviewer_id`.
    pub async fn apply(
        &self,
        change: &ChangeRequest,
        fields: &DestinationFields,
        reviewer_id: UserId,
    ) -> Result<AppliedChange, ApplyFailure> {
        let action = change.change_action()?;
        match action {
            ChangeAction::Create => self.apply_create(change, fields, reviewer_id).await,
            ChangeAction::Update => {
                let id = target_id(change)?;
                self.apply_update(change, id, fields, reviewer_id).await
            }
            ChangeAction::Delete => {
                let id = target_id(change)?;
                self.apply_delete(change, id, fields, reviewer_id).await
            }
        }
    }

    async fn apply_create(
        &self,
        change: &ChangeRequest,
        fields: &DestinationFields,
        reviewer_id: UserId,
    ) -> Result<AppliedChange, ApplyFailure> {
        let input = new_destination(fields, reviewer_id)?;
        self.ensure_slug_free(&input.slug, None).await?;

        let destination = self.destinations.create(&input).await?;
        tracing::info!(
            change_id = change.id,
            destination_id = destination.id,
            slug = %destination.slug,
            "Destination created from change request"
        );
        self.record(change, ChangeAction::Create, &destination, destination.version, reviewer_id)
            .await
    }

    async fn apply_update(
        &self,
        change: &ChangeRequest,
        destination_id: DbId,
        fields: &DestinationFields,
        reviewer_id: UserId,
    ) -> Result<AppliedChange, ApplyFailure> {
        let current = self.load(destination_id).await?;
        let mut merged = current.clone();
        merge_fields(&mut merged, fields)?;
        merged.updated_by = Some(reviewer_id);

        if merged.slug != current.slug {
            self.ensure_slug_free(&merged.slug, Some(current.id)).await?;
        }

        let updated = self.write(&merged, current.version).await?;
        tracing::info!(
            change_id = change.id,
            destination_id,
            version = updated.version,
            "Destination updated from change request"
        );
        self.record(change, ChangeAction::Update, &updated, updated.version, reviewer_id)
            .await
    }

    async fn apply_delete(
        &self,
        change: &ChangeRequest,
        destination_id: DbId,
        fields: &DestinationFields,
        reviewer_id: UserId,
    ) -> Result<AppliedChange, ApplyFailure> {
        let current = self.load(destination_id).await?;

        if fields.hard_delete.unwrap_or(false) {
            if !self.policy.allow_hard_delete {
                return Err(CoreError::HardDeleteNotAllowed { destination_id }.into());
            }
            match self
                .destinations
                .hard_delete(destination_id, current.version)
                .await?
            {
                CasOutcome::Updated(()) => {}
                CasOutcome::Conflict { current: version } => {
                    return Err(concurrent_write(destination_id, current.version, version).into())
                }
                CasOutcome::NotFound => return Err(not_found(destination_id).into()),
            }
            tracing::info!(change_id = change.id, destination_id, "Destination hard-deleted");
            // The ledger keeps the pre-deletion state under the next version.
            return self
                .record(change, ChangeAction::Delete, &current, current.version + 1, reviewer_id)
                .await;
        }

        let mut archived = current.clone();
        archived.status = DestinationStatus::Archived.as_str().to_string();
        archived.deleted_at = Some(Utc::now());
        archived.updated_by = Some(reviewer_id);

        let updated = self.write(&archived, current.version).await?;
        tracing::info!(
            change_id = change.id,
            destination_id,
            version = updated.version,
            "Destination archived"
        );
        self.record(change, ChangeAction::Delete, &updated, updated.version, reviewer_id)
            .await
    }

    async fn load(&self, destination_id: DbId) -> WorkflowResult<Destination> {
        self.destinations
            .find_by_id(destination_id)
            .await?
            .ok_or_else(|| not_found(destination_id).into())
    }

    async fn ensure_slug_free(&self, slug: &str, owner: Option<DbId>) -> WorkflowResult<()> {
        match self.destinations.find_by_slug(slug).await? {
            Some(existing) if Some(existing.id) != owner => Err(CoreError::Conflict(format!(
                "slug '{slug}' already exists on destination {}",
                existing.id
            ))
            .into()),
            _ => Ok(()),
        }
    }

    async fn write(&self, destination: &Destination, expected_version: i32) -> WorkflowResult<Destination> {
        match self.destinations.update(destination, expected_version).await? {
            CasOutcome::Updated(updated) => Ok(updated),
            CasOutcome::Conflict { current } => {
                Err(concurrent_write(destination.id, expected_version, current).into())
            }
            CasOutcome::NotFound => Err(not_found(destination.id).into()),
        }
    }

    /// Append the ledger entry for a mutation that has already happened.
    async fn record(
        &self,
        change: &ChangeRequest,
        action: ChangeAction,
        snapshot_of: &Destination,
        version: i32,
        reviewer_id: UserId,
    ) -> Result<AppliedChange, ApplyFailure> {
        let failed = |error: WorkflowError| ApplyFailure {
            error,
            mutated: Some(MutatedDestination {
                destination_id: snapshot_of.id,
                version,
            }),
        };

        let snapshot = serde_json::to_value(snapshot_of).map_err(|e| {
            failed(CoreError::Internal(format!("cannot snapshot destination: {e}")).into())
        })?;
        let ledger_entry = self
            .ledger
            .append(&CreateDestinationVersion {
                destination_id: snapshot_of.id,
                version,
                change_request_id: change.id,
                action,
                snapshot,
                created_by: reviewer_id,
            })
            .await
            .map_err(failed)?;

        tracing::info!(
            change_id = change.id,
            destination_id = snapshot_of.id,
            version,
            "Ledger entry appended"
        );
        Ok(AppliedChange {
            destination_id: snapshot_of.id,
            version,
            ledger_entry,
        })
    }
}

fn target_id(change: &ChangeRequest) -> Result<DbId, CoreError> {
    change.destination_id.ok_or_else(|| {
        CoreError::Internal(format!(
            "change request {} has no destination_id for {}",
            change.id, change.action
        ))
    })
}

fn not_found(id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: "Destination",
        id,
    }
}

fn concurrent_write(id: DbId, expected: i32, current: i32) -> CoreError {
    CoreError::Conflict(format!(
        "destination {id} was modified concurrently (expected version {expected}, found {current})"
    ))
}

/// Build the insert DTO for a create. Status defaults to `published`.
pub(crate) fn new_destination(
    fields: &DestinationFields,
    created_by: UserId,
) -> Result<NewDestination, CoreError> {
    let name = fields
        .name
        .as_set()
        .cloned()
        .ok_or_else(|| CoreError::invalid("name is required"))?;
    let slug = fields
        .effective_slug()
        .ok_or_else(|| CoreError::invalid("slug is required"))?;
    let status = match fields.status.as_set() {
        Some(status) => DestinationStatus::parse(status)?,
        None => DestinationStatus::Published,
    };

    Ok(NewDestination {
        name,
        slug,
        description: fields.description.resolve(None),
        category: fields.category.resolve(None),
        city: fields.city.resolve(None),
        country: fields.country.resolve(None),
        address: fields.address.resolve(None),
        latitude: fields.latitude.resolve(None),
        longitude: fields.longitude.resolve(None),
        opening_time: fields.opening_time.resolve(None),
        closing_time: fields.closing_time.resolve(None),
        entry_fee: fields.entry_fee.resolve(None),
        website: fields.website.resolve(None),
        contact_phone: fields.contact_phone.resolve(None),
        tags: fields.tags.resolve(None).unwrap_or_default(),
        hero_image_url: fields.hero_image_url.resolve(None),
        gallery: fields.gallery.resolve(None).unwrap_or_default(),
        status: status.as_str().to_string(),
        created_by,
    })
}

/// Sparse merge: fields left `Unchanged` keep their current value.
///
/// Moving into the archived status stamps `deleted_at` like a soft delete;
/// leaving it clears the stamp.
pub(crate) fn merge_fields(
    destination: &mut Destination,
    fields: &DestinationFields,
) -> Result<(), CoreError> {
    if let Patch::Set(name) = &fields.name {
        destination.name = name.clone();
    }
    if let Patch::Set(slug) = &fields.slug {
        destination.slug = slug.clone();
    }
    fields.description.apply_to(&mut destination.description);
    fields.category.apply_to(&mut destination.category);
    fields.city.apply_to(&mut destination.city);
    fields.country.apply_to(&mut destination.country);
    fields.address.apply_to(&mut destination.address);
    fields.latitude.apply_to(&mut destination.latitude);
    fields.longitude.apply_to(&mut destination.longitude);
    fields.opening_time.apply_to(&mut destination.opening_time);
    fields.closing_time.apply_to(&mut destination.closing_time);
    fields.entry_fee.apply_to(&mut destination.entry_fee);
    fields.website.apply_to(&mut destination.website);
    fields.contact_phone.apply_to(&mut destination.contact_phone);
    fields.hero_image_url.apply_to(&mut destination.hero_image_url);

    match &fields.tags {
        Patch::Unchanged => {}
        Patch::Clear => destination.tags.clear(),
        Patch::Set(tags) => destination.tags = tags.clone(),
    }
    match &fields.gallery {
        Patch::Unchanged => {}
        Patch::Clear => destination.gallery = Json(Vec::new()),
        Patch::Set(items) => destination.gallery = Json(items.clone()),
    }

    if let Patch::Set(status) = &fields.status {
        let status = DestinationStatus::parse(status)?;
        destination.status = status.as_str().to_string();
        if status == DestinationStatus::Archived {
            destination.deleted_at.get_or_insert_with(Utc::now);
        } else {
            destination.deleted_at = None;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use wayfinder_core::destination::GalleryItem;

    use super::*;

    fn stored() -> Destination {
        let now = Utc::now();
        Destination {
            id: 3,
            name: "Belém Tower".into(),
            slug: "belem-tower".into(),
            description: Some("Fortified tower".into()),
            category: Some("landmark".into()),
            city: Some("Lisbon".into()),
            country: Some("Portugal".into()),
            address: None,
            latitude: Some(38.69),
            longitude: Some(-9.21),
            opening_time: Some("10:00".into()),
            closing_time: Some("17:30".into()),
            entry_fee: Some(8.0),
            website: Some("https://example.pt".into()),
            contact_phone: None,
            tags: vec!["history".into()],
            hero_image_url: Some("https://cdn.example/hero.jpg".into()),
            gallery: Json(vec![GalleryItem {
                url: "https://cdn.example/1.jpg".into(),
                caption: None,
                ordering: 0,
            }]),
            status: "archived".into(),
            version: 4,
            created_by: 1,
            updated_by: None,
            deleted_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn merge_touches_only_present_fields() {
        let before = stored();
        let mut after = before.clone();
        merge_fields(
            &mut after,
            &DestinationFields {
                city: Patch::Set("Lisboa".into()),
                website: Patch::Clear,
                entry_fee: Patch::Set(0.0),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(after.city.as_deref(), Some("Lisboa"));
        assert_eq!(after.website, None);
        assert_eq!(after.entry_fee, Some(0.0));

        let untouched = Destination {
            city: before.city.clone(),
            website: before.website.clone(),
            entry_fee: before.entry_fee,
            ..after.clone()
        };
        assert_eq!(untouched, before);
    }

    #[test]
    fn merge_replaces_and_clears_lists() {
        let mut destination = stored();
        merge_fields(
            &mut destination,
            &DestinationFields {
                tags: Patch::Clear,
                gallery: Patch::Set(vec![]),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(destination.tags.is_empty());
        assert!(destination.gallery.0.is_empty());
    }

    #[test]
    fn restoring_status_clears_deleted_at() {
        let mut destination = stored();
        merge_fields(
            &mut destination,
            &DestinationFields {
                status: Patch::Set("published".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(destination.status, "published");
        assert!(destination.deleted_at.is_none());
    }

    #[test]
    fn archiving_through_update_stamps_deleted_at() {
        let mut destination = Destination {
            status: "published".into(),
            deleted_at: None,
            ..stored()
        };
        merge_fields(
            &mut destination,
            &DestinationFields {
                status: Patch::Set("archived".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(destination.status, "archived");
        assert!(destination.deleted_at.is_some());

        // An already archived destination keeps its original stamp.
        let before = stored();
        let mut again = before.clone();
        merge_fields(
            &mut again,
            &DestinationFields {
                status: Patch::Set("archived".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(again.deleted_at, before.deleted_at);
    }

    #[test]
    fn create_defaults_to_published_and_derives_slug() {
        let input = new_destination(
            &DestinationFields {
                name: Patch::Set("Jardim da Estrela".into()),
                tags: Patch::Set(vec!["garden".into()]),
                ..Default::default()
            },
            9,
        )
        .unwrap();
        assert_eq!(input.slug, "jardim-da-estrela");
        assert_eq!(input.status, "published");
        assert_eq!(input.created_by, 9);
        assert!(input.gallery.is_empty());
    }

    #[test]
    fn create_honours_draft_status() {
        let input = new_destination(
            &DestinationFields {
                name: Patch::Set("Hidden Beach".into()),
                status: Patch::Set("draft".into()),
                ..Default::default()
            },
            9,
        )
        .unwrap();
        assert_eq!(input.status, "draft");
    }
}
