#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use wayfinder_core::change_request::{ChangeAction, ChangeStatus};
use wayfinder_core::destination::DestinationFields;
use wayfinder_core::patch::Patch;
use wayfinder_core::types::{DbId, UserId};
use wayfinder_db::models::change_request::{ChangeRequest, CreateChangeRequest, ReviewDecision};
use wayfinder_db::models::destination::Destination;
use wayfinder_workflow::memory::{MemoryObjectStorage, MemoryStore};
use wayfinder_workflow::ports::{CasOutcome, ChangeRequestStore, ObjectStorage};
use wayfinder_workflow::{
    ChangeWorkflow, DestinationImporter, ImportConfig, MediaConfig, WorkflowPolicy,
    WorkflowResult,
};

pub const AUTHOR: UserId = 1;
pub const REVIEWER: UserId = 2;

/// An engine wired to in-memory collaborators, plus handles to inspect them.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub objects: Arc<MemoryObjectStorage>,
    pub workflow: Arc<ChangeWorkflow>,
}

pub fn harness() -> Harness {
    harness_with(WorkflowPolicy::default())
}

pub fn harness_with(policy: WorkflowPolicy) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let objects = Arc::new(MemoryObjectStorage::new());
    assemble(store.clone(), store, objects.clone(), objects, policy)
}

/// A harness whose change-request reads yield to the scheduler, returned
/// with the wrapper so tests can inspect the order of store calls.
pub fn yielding_harness() -> (Harness, Arc<YieldingChanges>) {
    let store = Arc::new(MemoryStore::new());
    let objects = Arc::new(MemoryObjectStorage::new());
    let changes = Arc::new(YieldingChanges::new(store.clone()));
    let h = assemble(
        store,
        changes.clone(),
        objects.clone(),
        objects,
        WorkflowPolicy::default(),
    );
    (h, changes)
}

/// A harness whose object storage runs one author edit, via
/// [`EditDuringUpload::arm`], while the next upload is in flight.
pub fn edit_during_upload_harness() -> (Harness, Arc<EditDuringUpload>) {
    let store = Arc::new(MemoryStore::new());
    let objects = Arc::new(MemoryObjectStorage::new());
    let storage = Arc::new(EditDuringUpload {
        store: store.clone(),
        objects: objects.clone(),
        pending: Mutex::new(None),
    });
    let h = assemble(
        store.clone(),
        store,
        objects,
        storage.clone(),
        WorkflowPolicy::default(),
    );
    (h, storage)
}

fn assemble(
    store: Arc<MemoryStore>,
    changes: Arc<dyn ChangeRequestStore>,
    objects: Arc<MemoryObjectStorage>,
    storage: Arc<dyn ObjectStorage>,
    policy: WorkflowPolicy,
) -> Harness {
    let media = MediaConfig {
        max_dimension: 0,
        ..MediaConfig::default()
    };
    let workflow = ChangeWorkflow::new(changes, store.clone(), store.clone(), policy)
        .with_media(storage, media);
    Harness {
        store,
        objects,
        workflow: Arc::new(workflow),
    }
}

impl Harness {
    pub fn importer(&self) -> DestinationImporter {
        self.importer_with(ImportConfig::default())
    }

    pub fn importer_with(&self, config: ImportConfig) -> DestinationImporter {
        DestinationImporter::new(
            self.workflow.clone(),
            self.store.clone(),
            self.store.clone(),
            config,
        )
        .with_object_storage(self.objects.clone())
    }

    /// Create and submit a draft, returning the pending request.
    pub async fn pending(
        &self,
        action: ChangeAction,
        destination_id: Option<i64>,
        fields: DestinationFields,
    ) -> ChangeRequest {
        let draft = self
            .workflow
            .create_draft(AUTHOR, action, destination_id, fields)
            .await
            .unwrap();
        self.workflow.submit_draft(draft.id, AUTHOR).await.unwrap()
    }

    /// Publish a destination through the full create workflow.
    pub async fn published(&self, name: &str) -> Destination {
        let pending = self
            .pending(ChangeAction::Create, None, place(name))
            .await;
        let approved = self.workflow.approve(pending.id, REVIEWER).await.unwrap();
        self.store
            .destination(approved.destination_id.unwrap())
            .unwrap()
    }
}

/// A complete create payload.
pub fn place(name: &str) -> DestinationFields {
    DestinationFields {
        name: Patch::Set(name.to_string()),
        description: Patch::Set(format!("All about {name}")),
        category: Patch::Set("park".to_string()),
        city: Patch::Set("New York".to_string()),
        country: Patch::Set("US".to_string()),
        latitude: Patch::Set(40.78),
        longitude: Patch::Set(-73.96),
        opening_time: Patch::Set("06:00".to_string()),
        hero_image_url: Patch::Set("https://img.example.com/hero.jpg".to_string()),
        tags: Patch::Set(vec!["outdoors".to_string()]),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Interleaving collaborators
// ---------------------------------------------------------------------------

/// Change-request store that yields after every `find_by_id`, so callers
/// joined on one task all read before any of them writes.
pub struct YieldingChanges {
    inner: Arc<MemoryStore>,
    calls: Mutex<Vec<String>>,
}

impl YieldingChanges {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Store calls in the order they happened.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl ChangeRequestStore for YieldingChanges {
    async fn create(&self, input: &CreateChangeRequest) -> WorkflowResult<ChangeRequest> {
        ChangeRequestStore::create(self.inner.as_ref(), input).await
    }

    async fn find_by_id(&self, id: DbId) -> WorkflowResult<Option<ChangeRequest>> {
        let found = ChangeRequestStore::find_by_id(self.inner.as_ref(), id).await;
        self.log("find");
        tokio::task::yield_now().await;
        found
    }

    async fn list(
        &self,
        status: Option<ChangeStatus>,
        limit: i64,
        offset: i64,
    ) -> WorkflowResult<Vec<ChangeRequest>> {
        self.inner.list(status, limit, offset).await
    }

    async fn list_by_author(&self, author_id: UserId) -> WorkflowResult<Vec<ChangeRequest>> {
        self.inner.list_by_author(author_id).await
    }

    async fn update_draft(
        &self,
        id: DbId,
        expected_draft_version: i32,
        payload: &DestinationFields,
    ) -> WorkflowResult<CasOutcome<ChangeRequest>> {
        self.inner
            .update_draft(id, expected_draft_version, payload)
            .await
    }

    async fn submit(&self, id: DbId) -> WorkflowResult<CasOutcome<ChangeRequest>> {
        self.inner.submit(id).await
    }

    async fn transition(
        &self,
        id: DbId,
        decision: &ReviewDecision,
    ) -> WorkflowResult<CasOutcome<ChangeRequest>> {
        let outcome = self.inner.transition(id, decision).await;
        let result = match &outcome {
            Ok(CasOutcome::Updated(_)) => "won",
            _ => "lost",
        };
        self.log(format!("transition->{} {result}", decision.to.as_str()));
        outcome
    }

    async fn set_published(
        &self,
        id: DbId,
        destination_id: DbId,
        published_version: i32,
    ) -> WorkflowResult<Option<ChangeRequest>> {
        self.inner
            .set_published(id, destination_id, published_version)
            .await
    }
}

/// Object storage that applies one pending author edit to a change request
/// before storing the next upload.
pub struct EditDuringUpload {
    store: Arc<MemoryStore>,
    objects: Arc<MemoryObjectStorage>,
    pending: Mutex<Option<(DbId, DestinationFields)>>,
}

impl EditDuringUpload {
    pub fn arm(&self, change_id: DbId, edit: DestinationFields) {
        *self.pending.lock().unwrap() = Some((change_id, edit));
    }
}

#[async_trait]
impl ObjectStorage for EditDuringUpload {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> WorkflowResult<String> {
        let pending = self.pending.lock().unwrap().take();
        if let Some((change_id, edit)) = pending {
            let current = self.store.change(change_id).unwrap();
            let outcome = self
                .store
                .update_draft(change_id, current.draft_version, &edit)
                .await?;
            assert!(matches!(outcome, CasOutcome::Updated(_)));
        }
        self.objects.upload(bucket, key, content_type, data).await
    }
}
