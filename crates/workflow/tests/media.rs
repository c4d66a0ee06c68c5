//! Media attachment tests.

mod common;

use assert_matches::assert_matches;
use common::{edit_during_upload_harness, harness, place, AUTHOR};
use wayfinder_core::change_request::ChangeAction;
use wayfinder_core::destination::{DestinationFields, GalleryItem};
use wayfinder_core::error::CoreError;
use wayfinder_core::patch::Patch;
use wayfinder_workflow::{Upload, WorkflowError};

fn png(file_name: &str) -> Upload {
    Upload {
        file_name: file_name.to_string(),
        content_type: Some("image/png".to_string()),
        data: vec![1, 2, 3, 4],
    }
}

#[tokio::test]
async fn test_hero_image_sets_url_and_bumps_version() {
    let h = harness();
    let draft = h
        .workflow
        .create_draft(AUTHOR, ChangeAction::Create, None, place("Central Park"))
        .await
        .unwrap();

    let upload = Upload {
        file_name: "hero.webp".to_string(),
        content_type: None,
        data: vec![0; 16],
    };
    let (updated, stored) = h
        .workflow
        .attach_hero_image(draft.id, AUTHOR, upload)
        .await
        .unwrap();

    assert_eq!(updated.draft_version, 2);
    assert_eq!(stored.content_type, "image/webp");
    assert_eq!(stored.size_bytes, 16);
    assert_eq!(stored.ordering, None);
    assert_eq!(updated.fields().hero_image_url, Patch::Set(stored.url.clone()));

    let objects = h.objects.objects();
    assert_eq!(objects.len(), 1);
    assert!(objects[0]
        .key
        .starts_with(&format!("change-requests/{}/hero/", draft.id)));
    assert!(objects[0].key.ends_with(".webp"));
    assert_eq!(objects[0].bucket, "destination-media");
}

#[tokio::test]
async fn test_gallery_appends_with_contiguous_ordering() {
    let h = harness();
    let mut fields = place("Central Park");
    fields.gallery = Patch::Set(vec![GalleryItem {
        url: "https://img.example.com/existing.jpg".to_string(),
        caption: Some("Existing".to_string()),
        ordering: 0,
    }]);
    let draft = h
        .workflow
        .create_draft(AUTHOR, ChangeAction::Create, None, fields)
        .await
        .unwrap();

    let (updated, stored) = h
        .workflow
        .attach_gallery_images(draft.id, AUTHOR, vec![png("a.png"), png("b.png")])
        .await
        .unwrap();

    let gallery = updated.fields().gallery.as_set().unwrap();
    let orderings: Vec<i32> = gallery.iter().map(|item| item.ordering).collect();
    assert_eq!(orderings, vec![0, 1, 2]);
    assert_eq!(gallery[0].caption.as_deref(), Some("Existing"));
    assert_eq!(gallery[2].url, stored[1].url);
    assert_eq!(stored[0].ordering, Some(1));
    assert_eq!(updated.draft_version, 2);
}

#[tokio::test]
async fn test_edit_during_upload_wins_over_gallery_append() {
    let (h, storage) = edit_during_upload_harness();
    let existing = GalleryItem {
        url: "https://img.example.com/existing.jpg".to_string(),
        caption: None,
        ordering: 0,
    };
    let mut fields = place("Central Park");
    fields.gallery = Patch::Set(vec![existing.clone()]);
    let draft = h
        .workflow
        .create_draft(AUTHOR, ChangeAction::Create, None, fields.clone())
        .await
        .unwrap();

    let mut edit = fields;
    edit.gallery = Patch::Set(vec![
        existing,
        GalleryItem {
            url: "https://img.example.com/edited.jpg".to_string(),
            caption: Some("Edited".to_string()),
            ordering: 1,
        },
    ]);
    storage.arm(draft.id, edit.clone());

    let err = h
        .workflow
        .attach_gallery_images(draft.id, AUTHOR, vec![png("late.png")])
        .await
        .unwrap_err();
    assert_matches!(
        err,
        WorkflowError::Core(CoreError::StaleVersion { expected: 1, current: 2, .. })
    );

    let stored = h.store.change(draft.id).unwrap();
    assert_eq!(stored.draft_version, 2);
    assert_eq!(stored.fields().gallery, edit.gallery);
}

#[tokio::test]
async fn test_update_gallery_seeds_from_destination() {
    let h = harness();
    let mut fields = place("Central Park");
    fields.gallery = Patch::Set(vec![GalleryItem {
        url: "https://img.example.com/one.jpg".to_string(),
        caption: None,
        ordering: 0,
    }]);
    let pending = h.pending(ChangeAction::Create, None, fields).await;
    let approved = h.workflow.approve(pending.id, common::REVIEWER).await.unwrap();

    let draft = h
        .workflow
        .create_draft(
            AUTHOR,
            ChangeAction::Update,
            approved.destination_id,
            DestinationFields::default(),
        )
        .await
        .unwrap();
    let (updated, _) = h
        .workflow
        .attach_gallery_images(draft.id, AUTHOR, vec![png("two.png")])
        .await
        .unwrap();

    let gallery = updated.fields().gallery.as_set().unwrap();
    assert_eq!(gallery.len(), 2);
    assert_eq!(gallery[0].url, "https://img.example.com/one.jpg");
    assert_eq!(gallery[1].ordering, 1);
}

#[tokio::test]
async fn test_rejected_uploads_never_reach_storage() {
    let h = harness();
    let draft = h
        .workflow
        .create_draft(AUTHOR, ChangeAction::Create, None, place("Central Park"))
        .await
        .unwrap();

    let gif = Upload {
        file_name: "anim.gif".to_string(),
        content_type: Some("image/gif".to_string()),
        data: vec![1],
    };
    let err = h
        .workflow
        .attach_gallery_images(draft.id, AUTHOR, vec![png("ok.png"), gif])
        .await
        .unwrap_err();

    assert_matches!(err, WorkflowError::Core(CoreError::Validation(_)));
    assert!(h.objects.objects().is_empty());
    assert_eq!(h.store.change(draft.id).unwrap().draft_version, 1);
}

#[tokio::test]
async fn test_media_guards() {
    let h = harness();
    let draft = h
        .workflow
        .create_draft(AUTHOR, ChangeAction::Create, None, place("Central Park"))
        .await
        .unwrap();

    let err = h
        .workflow
        .attach_hero_image(draft.id, 99, png("x.png"))
        .await
        .unwrap_err();
    assert_matches!(err, WorkflowError::Core(CoreError::Forbidden(_)));

    h.workflow.submit_draft(draft.id, AUTHOR).await.unwrap();
    let err = h
        .workflow
        .attach_hero_image(draft.id, AUTHOR, png("x.png"))
        .await
        .unwrap_err();
    assert_matches!(err, WorkflowError::Core(CoreError::NotEditable { .. }));

    let destination = h.published("Hyde Park").await;
    let delete = h
        .workflow
        .create_draft(AUTHOR, ChangeAction::Delete, Some(destination.id), DestinationFields::default())
        .await
        .unwrap();
    let err = h
        .workflow
        .attach_hero_image(delete.id, AUTHOR, png("x.png"))
        .await
        .unwrap_err();
    assert_matches!(err, WorkflowError::Core(CoreError::Validation(_)));
}

#[tokio::test]
async fn test_storage_failure_is_propagated() {
    let h = harness();
    let draft = h
        .workflow
        .create_draft(AUTHOR, ChangeAction::Create, None, place("Central Park"))
        .await
        .unwrap();
    h.objects.fail_uploads(true);

    let err = h
        .workflow
        .attach_hero_image(draft.id, AUTHOR, png("x.png"))
        .await
        .unwrap_err();
    assert_matches!(err, WorkflowError::Storage(_));
    assert_eq!(h.store.change(draft.id).unwrap().draft_version, 1);
}
