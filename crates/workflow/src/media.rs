//! Media attachment for editable drafts.
//!
//! Uploads are admitted (size and type) before any I/O, optionally resized,
//! stored under `change-requests/{id}/{slot}/`, and the resulting URLs are
//! written into the draft through the usual `draft_version` compare-and-swap.

use serde::Serialize;
use serde_json::json;
use wayfinder_core::change_request::{ensure_author, ensure_editable, ChangeAction};
use wayfinder_core::destination::GalleryItem;
use wayfinder_core::error::CoreError;
use wayfinder_core::media::{check_upload, media_object_key, resolve_content_type, MediaSlot};
use wayfinder_core::patch::Patch;
use wayfinder_core::types::{DbId, UserId};
use wayfinder_db::models::change_request::ChangeRequest;
use wayfinder_events::EventKind;

use crate::error::WorkflowResult;
use crate::ports::ImageData;
use crate::service::ChangeWorkflow;

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    /// Declared content type, if the client sent one.
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// A stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredMedia {
    pub url: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Gallery position; `None` for the hero image.
    pub ordering: Option<i32>,
}

/// An upload that passed admission.
struct Admitted {
    data: Vec<u8>,
    content_type: String,
}

impl ChangeWorkflow {
    /// Store `upload` and set it as the draft's hero image.
    pub async fn attach_hero_image(
        &self,
        change_id: DbId,
        author_id: UserId,
        upload: Upload,
    ) -> WorkflowResult<(ChangeRequest, StoredMedia)> {
        let change = self.media_target(change_id, author_id).await?;
        let admitted = self.admit(upload)?;

        let mut stored = self.store(change.id, MediaSlot::Hero, admitted).await?;
        stored.ordering = None;

        let mut payload = change.fields().clone();
        payload.hero_image_url = Patch::Set(stored.url.clone());
        let updated = self
            .store_draft(change.id, change.draft_version, &payload)
            .await?;

        tracing::info!(
            change_id,
            author_id,
            url = %stored.url,
            size_bytes = stored.size_bytes,
            "Hero image attached"
        );
        self.publish(EventKind::ChangeRequestUpdated, &updated, author_id, json!({
            "draft_version": updated.draft_version,
            "hero_image_url": stored.url,
        }));
        Ok((updated, stored))
    }

    /// Store `uploads` and append them to the draft's gallery, in order.
    ///
    /// The gallery starts from the draft's own gallery, or for update
    /// requests without one, from the destination's current gallery.
    pub async fn attach_gallery_images(
        &self,
        change_id: DbId,
        author_id: UserId,
        uploads: Vec<Upload>,
    ) -> WorkflowResult<(ChangeRequest, Vec<StoredMedia>)> {
        if uploads.is_empty() {
            return Err(CoreError::invalid("at least one gallery image is required").into());
        }
        let change = self.media_target(change_id, author_id).await?;
        let admitted = uploads
            .into_iter()
            .map(|upload| self.admit(upload))
            .collect::<WorkflowResult<Vec<_>>>()?;

        let mut gallery = self.gallery_seed(&change).await?;
        let offset = gallery.len();

        let mut stored = Vec::with_capacity(admitted.len());
        for (i, upload) in admitted.into_iter().enumerate() {
            let mut media = self.store(change.id, MediaSlot::Gallery, upload).await?;
            let ordering = (offset + i) as i32;
            media.ordering = Some(ordering);
            gallery.push(GalleryItem {
                url: media.url.clone(),
                caption: None,
                ordering,
            });
            stored.push(media);
        }

        let mut payload = change.fields().clone();
        payload.gallery = Patch::Set(gallery);
        let updated = self
            .store_draft(change.id, change.draft_version, &payload)
            .await?;

        tracing::info!(
            change_id,
            author_id,
            added = stored.len(),
            "Gallery images attached"
        );
        self.publish(EventKind::ChangeRequestUpdated, &updated, author_id, json!({
            "draft_version": updated.draft_version,
            "gallery_added": stored.len(),
        }));
        Ok((updated, stored))
    }

    /// Load the change and check it can take media from `author_id`.
    async fn media_target(&self, change_id: DbId, author_id: UserId) -> WorkflowResult<ChangeRequest> {
        let change = self.get_change(change_id).await?;
        ensure_author(change.id, change.submitted_by, author_id)?;
        ensure_editable(change.id, change.change_status()?)?;
        match change.change_action()? {
            ChangeAction::Create | ChangeAction::Update => Ok(change),
            ChangeAction::Delete => Err(CoreError::invalid(
                "media can only be attached to create or update requests",
            )
            .into()),
        }
    }

    fn admit(&self, upload: Upload) -> WorkflowResult<Admitted> {
        let content_type = resolve_content_type(upload.content_type.as_deref(), &upload.file_name);
        check_upload(
            &upload.file_name,
            upload.data.len() as u64,
            &content_type,
            self.media.max_upload_bytes,
        )?;
        Ok(Admitted {
            data: upload.data,
            content_type,
        })
    }

    async fn store(&self, change_id: DbId, slot: MediaSlot, upload: Admitted) -> WorkflowResult<StoredMedia> {
        let storage = self.storage.as_ref().ok_or_else(|| {
            CoreError::Internal("Object storage is not configured for media uploads".into())
        })?;

        let mut image = ImageData {
            bytes: upload.data,
            content_type: upload.content_type,
        };
        if let Some(processor) = &self.images {
            if self.media.max_dimension > 0 {
                image = processor.process(image, self.media.max_dimension).await?;
            }
        }

        let key = media_object_key(change_id, slot, &image.content_type);
        let size_bytes = image.bytes.len() as u64;
        let url = storage
            .upload(&self.media.bucket, &key, &image.content_type, image.bytes)
            .await?;

        tracing::debug!(change_id, key = %key, size_bytes, "Media object stored");
        Ok(StoredMedia {
            url,
            content_type: image.content_type,
            size_bytes,
            ordering: None,
        })
    }

    async fn gallery_seed(&self, change: &ChangeRequest) -> WorkflowResult<Vec<GalleryItem>> {
        match &change.fields().gallery {
            Patch::Set(items) => return Ok(items.clone()),
            Patch::Clear => return Ok(Vec::new()),
            Patch::Unchanged => {}
        }
        if change.change_action()? != ChangeAction::Update {
            return Ok(Vec::new());
        }
        let Some(destination_id) = change.destination_id else {
            return Ok(Vec::new());
        };
        Ok(self
            .destinations
            .find_by_id(destination_id)
            .await?
            .map(|destination| destination.gallery.0)
            .unwrap_or_default())
    }
}
