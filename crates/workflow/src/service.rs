//! Change-Request State Machine.
//!
//! `draft -> pending_review -> approved | rejected`, with `rejected`
//! editable and resubmittable like a draft. Author edits are serialized by
//! a compare-and-swap on `draft_version`; reviewer decisions by a status
//! compare-and-swap, so the loser of a race sees `InvalidChangeState`.

use std::sync::Arc;

use serde_json::json;
use wayfinder_core::change_request::{
    check_destination_reference, ensure_author, ensure_draft_version, ensure_editable,
    ensure_pending_review, ensure_reviewer_allowed, normalize_review_message, ChangeAction,
    ChangeStatus,
};
use wayfinder_core::destination::DestinationFields;
use wayfinder_core::error::CoreError;
use wayfinder_core::patch::Patch;
use wayfinder_core::types::{DbId, UserId};
use wayfinder_core::validation::{validate_fields, ValidationError};
use wayfinder_db::models::change_request::{ChangeRequest, CreateChangeRequest, ReviewDecision};
use wayfinder_db::models::destination_version::DestinationVersion;
use wayfinder_events::{EventBus, EventKind, WorkflowEvent};

use crate::applier::ApprovalApplier;
use crate::config::{MediaConfig, WorkflowPolicy};
use crate::error::WorkflowResult;
use crate::ports::{
    CasOutcome, ChangeRequestStore, DestinationStore, ImageProcessor, ObjectStorage,
    VersionLedger,
};

/// Largest page returned by [`ChangeWorkflow::list_changes`].
pub const MAX_PAGE_SIZE: i64 = 100;

/// The workflow engine for single change requests.
pub struct ChangeWorkflow {
    pub(crate) changes: Arc<dyn ChangeRequestStore>,
    pub(crate) destinations: Arc<dyn DestinationStore>,
    pub(crate) ledger: Arc<dyn VersionLedger>,
    pub(crate) storage: Option<Arc<dyn ObjectStorage>>,
    pub(crate) images: Option<Arc<dyn ImageProcessor>>,
    pub(crate) events: Option<Arc<EventBus>>,
    pub(crate) policy: WorkflowPolicy,
    pub(crate) media: MediaConfig,
}

impl ChangeWorkflow {
    pub fn new(
        changes: Arc<dyn ChangeRequestStore>,
        destinations: Arc<dyn DestinationStore>,
        ledger: Arc<dyn VersionLedger>,
        policy: WorkflowPolicy,
    ) -> Self {
        Self {
            changes,
            destinations,
            ledger,
            storage: None,
            images: None,
            events: None,
            policy,
            media: MediaConfig::default(),
        }
    }

    /// Enable media attachments.
    pub fn with_media(mut self, storage: Arc<dyn ObjectStorage>, media: MediaConfig) -> Self {
        self.storage = Some(storage);
        self.media = media;
        self
    }

    /// Pipe uploads through `processor` before they are stored.
    pub fn with_image_processor(mut self, processor: Arc<dyn ImageProcessor>) -> Self {
        self.images = Some(processor);
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn policy(&self) -> &WorkflowPolicy {
        &self.policy
    }

    // -----------------------------------------------------------------------
    // Author operations
    // -----------------------------------------------------------------------

    /// Create a draft at `draft_version = 1`.
    ///
    /// Creates must not reference a destination; updates and deletes must
    /// reference one that exists.
    pub async fn create_draft(
        &self,
        author_id: UserId,
        action: ChangeAction,
        destination_id: Option<DbId>,
        fields: DestinationFields,
    ) -> WorkflowResult<ChangeRequest> {
        check_destination_reference(action, destination_id)?;
        if let Some(id) = destination_id {
            if self.destinations.find_by_id(id).await?.is_none() {
                return Err(CoreError::NotFound {
                    entity: "Destination",
                    id,
                }
                .into());
            }
        }
        let payload = self.prepare_fields(action, fields)?;

        let change = self
            .changes
            .create(&CreateChangeRequest {
                action,
                destination_id,
                payload,
                submitted_by: author_id,
            })
            .await?;

        tracing::info!(
            change_id = change.id,
            author_id,
            action = %action,
            destination_id,
            "Change request draft created"
        );
        self.publish(EventKind::ChangeRequestCreated, &change, author_id, json!({
            "action": change.action,
            "destination_id": change.destination_id,
        }));
        Ok(change)
    }

    /// Replace the payload of an editable draft.
    pub async fn update_draft(
        &self,
        change_id: DbId,
        author_id: UserId,
        expected_draft_version: i32,
        fields: DestinationFields,
    ) -> WorkflowResult<ChangeRequest> {
        let change = self.get_change(change_id).await?;
        ensure_author(change.id, change.submitted_by, author_id)?;
        ensure_editable(change.id, change.change_status()?)?;
        ensure_draft_version(change.id, expected_draft_version, change.draft_version)?;

        let payload = self.prepare_fields(change.change_action()?, fields)?;
        let updated = self
            .store_draft(change.id, expected_draft_version, &payload)
            .await?;

        tracing::info!(
            change_id,
            author_id,
            draft_version = updated.draft_version,
            "Change request draft updated"
        );
        self.publish(EventKind::ChangeRequestUpdated, &updated, author_id, json!({
            "draft_version": updated.draft_version,
        }));
        Ok(updated)
    }

    /// Submit an editable draft for review.
    pub async fn submit_draft(&self, change_id: DbId, author_id: UserId) -> WorkflowResult<ChangeRequest> {
        let change = self.get_change(change_id).await?;
        ensure_author(change.id, change.submitted_by, author_id)?;
        ensure_editable(change.id, change.change_status()?)?;
        self.revalidate(&change)?;

        let submitted = match self.changes.submit(change.id).await? {
            CasOutcome::Updated(submitted) => submitted,
            CasOutcome::Conflict { current } => {
                return Err(CoreError::NotEditable {
                    id: current.id,
                    status: current.change_status()?,
                }
                .into())
            }
            CasOutcome::NotFound => return Err(change_not_found(change_id).into()),
        };

        tracing::info!(change_id, author_id, "Change request submitted for review");
        self.publish(EventKind::ChangeRequestSubmitted, &submitted, author_id, json!({}));
        Ok(submitted)
    }

    // -----------------------------------------------------------------------
    // Reviewer operations
    // -----------------------------------------------------------------------

    /// Approve a pending request and apply it to the destination aggregate.
    ///
    /// The request is claimed (`pending_review -> approved`) before the
    /// applier runs. A failed application releases the claim and returns the
    /// error; when the failure was the ledger append, the aggregate mutation
    /// is not undone and needs reconciliation.
    pub async fn approve(&self, change_id: DbId, reviewer_id: UserId) -> WorkflowResult<ChangeRequest> {
        let change = self.get_change(change_id).await?;
        ensure_pending_review(change.id, change.change_status()?)?;
        ensure_reviewer_allowed(
            change.id,
            change.submitted_by,
            reviewer_id,
            self.policy.allow_self_review,
        )?;
        self.revalidate(&change)?;

        let claimed = self
            .decide(
                change.id,
                ReviewDecision {
                    from: ChangeStatus::PendingReview,
                    to: ChangeStatus::Approved,
                    reviewer_id: Some(reviewer_id),
                    message: None,
                },
            )
            .await?;

        let applier = ApprovalApplier {
            destinations: self.destinations.as_ref(),
            ledger: self.ledger.as_ref(),
            policy: &self.policy,
        };
        let applied = match applier.apply(&claimed, claimed.fields(), reviewer_id).await {
            Ok(applied) => applied,
            Err(failure) => {
                if let Some(mutated) = failure.mutated {
                    tracing::error!(
                        change_id,
                        reviewer_id,
                        destination_id = mutated.destination_id,
                        version = mutated.version,
                        error = %failure.error,
                        "Destination was mutated but the ledger append failed; reconciliation required"
                    );
                }
                self.release_claim(change_id).await;
                return Err(failure.error);
            }
        };

        let approved = self
            .changes
            .set_published(change.id, applied.destination_id, applied.version)
            .await?
            .ok_or_else(|| {
                CoreError::Internal(format!(
                    "change request {change_id} lost its approved status while publishing"
                ))
            })?;

        tracing::info!(
            change_id,
            reviewer_id,
            destination_id = applied.destination_id,
            published_version = applied.version,
            ledger_entry_id = applied.ledger_entry.id,
            "Change request approved"
        );
        self.publish(EventKind::ChangeRequestApproved, &approved, reviewer_id, json!({
            "action": approved.action,
            "destination_id": applied.destination_id,
            "published_version": applied.version,
            "ledger_entry_id": applied.ledger_entry.id,
        }));
        Ok(approved)
    }

    /// Reject a pending request. The destination is never touched.
    pub async fn reject(
        &self,
        change_id: DbId,
        reviewer_id: UserId,
        message: &str,
    ) -> WorkflowResult<ChangeRequest> {
        let change = self.get_change(change_id).await?;
        ensure_pending_review(change.id, change.change_status()?)?;
        ensure_reviewer_allowed(
            change.id,
            change.submitted_by,
            reviewer_id,
            self.policy.allow_self_review,
        )?;
        let message = normalize_review_message(message)?;

        let rejected = self
            .decide(
                change.id,
                ReviewDecision {
                    from: ChangeStatus::PendingReview,
                    to: ChangeStatus::Rejected,
                    reviewer_id: Some(reviewer_id),
                    message: Some(message),
                },
            )
            .await?;

        tracing::info!(change_id, reviewer_id, "Change request rejected");
        self.publish(EventKind::ChangeRequestRejected, &rejected, reviewer_id, json!({
            "review_message": rejected.review_message,
        }));
        Ok(rejected)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn get_change(&self, change_id: DbId) -> WorkflowResult<ChangeRequest> {
        self.changes
            .find_by_id(change_id)
            .await?
            .ok_or_else(|| change_not_found(change_id).into())
    }

    /// Page through change requests, oldest first. With
    /// `Some(PendingReview)` this is the review queue.
    pub async fn list_changes(
        &self,
        status: Option<ChangeStatus>,
        limit: i64,
        offset: i64,
    ) -> WorkflowResult<Vec<ChangeRequest>> {
        self.changes
            .list(status, limit.clamp(1, MAX_PAGE_SIZE), offset.max(0))
            .await
    }

    pub async fn list_changes_by_author(&self, author_id: UserId) -> WorkflowResult<Vec<ChangeRequest>> {
        self.changes.list_by_author(author_id).await
    }

    /// Ledger entries for a destination in version order. Hard-deleted
    /// destinations keep their history.
    pub async fn destination_history(&self, destination_id: DbId) -> WorkflowResult<Vec<DestinationVersion>> {
        self.ledger.history(destination_id).await
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Normalise, derive a missing create slug from the name, and validate.
    fn prepare_fields(
        &self,
        action: ChangeAction,
        fields: DestinationFields,
    ) -> Result<DestinationFields, ValidationError> {
        let mut fields = fields.normalized();
        if action == ChangeAction::Create && fields.slug.as_set().is_none() {
            if let Some(slug) = fields.effective_slug() {
                fields.slug = Patch::Set(slug);
            }
        }
        if !action.validates_fields() {
            return Ok(fields);
        }

        let mut problems = match validate_fields(
            action,
            &fields,
            action.requires_all_fields(),
            &self.policy.fields,
        ) {
            Ok(()) => Vec::new(),
            Err(err) => err.problems,
        };
        if action == ChangeAction::Create
            && fields.slug.as_set().is_none()
            && fields.name.as_set().is_some()
        {
            problems.push("slug is required and could not be derived from name".to_string());
        }

        if problems.is_empty() {
            Ok(fields)
        } else {
            Err(ValidationError { problems })
        }
    }

    fn revalidate(&self, change: &ChangeRequest) -> WorkflowResult<()> {
        self.prepare_fields(change.change_action()?, change.fields().clone())?;
        Ok(())
    }

    /// Compare-and-swap a new payload, translating a lost race into the
    /// matching state error.
    pub(crate) async fn store_draft(
        &self,
        change_id: DbId,
        expected_draft_version: i32,
        payload: &DestinationFields,
    ) -> WorkflowResult<ChangeRequest> {
        match self
            .changes
            .update_draft(change_id, expected_draft_version, payload)
            .await?
        {
            CasOutcome::Updated(updated) => Ok(updated),
            CasOutcome::Conflict { current } => {
                let status = current.change_status()?;
                ensure_editable(current.id, status)?;
                Err(CoreError::StaleVersion {
                    id: current.id,
                    expected: expected_draft_version,
                    current: current.draft_version,
                }
                .into())
            }
            CasOutcome::NotFound => Err(change_not_found(change_id).into()),
        }
    }

    async fn decide(&self, change_id: DbId, decision: ReviewDecision) -> WorkflowResult<ChangeRequest> {
        match self.changes.transition(change_id, &decision).await? {
            CasOutcome::Updated(change) => Ok(change),
            CasOutcome::Conflict { current } => Err(CoreError::InvalidChangeState {
                id: current.id,
                status: current.change_status()?,
                expected: decision.from,
            }
            .into()),
            CasOutcome::NotFound => Err(change_not_found(change_id).into()),
        }
    }

    /// Hand an approval claim back to the review queue.
    async fn release_claim(&self, change_id: DbId) {
        let release = ReviewDecision {
            from: ChangeStatus::Approved,
            to: ChangeStatus::PendingReview,
            reviewer_id: None,
            message: None,
        };
        match self.changes.transition(change_id, &release).await {
            Ok(CasOutcome::Updated(_)) => {
                tracing::info!(change_id, "Approval claim released");
            }
            Ok(_) => tracing::warn!(change_id, "Approval claim was no longer held"),
            Err(e) => tracing::warn!(change_id, error = %e, "Failed to release approval claim"),
        }
    }

    pub(crate) fn publish(
        &self,
        kind: EventKind,
        change: &ChangeRequest,
        actor_id: UserId,
        payload: serde_json::Value,
    ) {
        if let Some(bus) = &self.events {
            bus.publish(WorkflowEvent::new(kind, change.id, actor_id).with_payload(payload));
        }
    }
}

fn change_not_found(id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: "ChangeRequest",
        id,
    }
}
