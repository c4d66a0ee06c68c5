//! PostgreSQL implementations of the collaborator traits, delegating to the
//! `wayfinder_db` repositories.
//!
//! Zero-row results of guarded statements are classified with a follow-up
//! read so callers can tell a lost race from a missing row.

use async_trait::async_trait;
use wayfinder_core::change_request::ChangeStatus;
use wayfinder_core::destination::DestinationFields;
use wayfinder_core::error::CoreError;
use wayfinder_core::types::{DbId, UserId};
use wayfinder_db::models::change_request::{ChangeRequest, CreateChangeRequest, ReviewDecision};
use wayfinder_db::models::destination::{Destination, NewDestination};
use wayfinder_db::models::destination_version::{CreateDestinationVersion, DestinationVersion};
use wayfinder_db::models::import_job::{
    CreateImportJob, CreateImportRow, DestinationImportJob, DestinationImportRow, FinishImportJob,
};
use wayfinder_db::repositories::{
    ChangeRequestRepo, DestinationRepo, DestinationVersionRepo, ImportJobRepo, ImportRowRepo,
};
use wayfinder_db::DbPool;

use crate::error::{map_db_error, WorkflowResult};
use crate::ports::{
    CasOutcome, ChangeRequestStore, DestinationLookup, DestinationStore, ImportStore,
    VersionLedger,
};

/// All stores backed by one connection pool.
#[derive(Clone)]
pub struct PgStores {
    pool: DbPool,
}

impl PgStores {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn classify_change(&self, id: DbId) -> WorkflowResult<CasOutcome<ChangeRequest>> {
        Ok(match ChangeRequestRepo::find_by_id(&self.pool, id).await? {
            Some(current) => CasOutcome::Conflict { current },
            None => CasOutcome::NotFound,
        })
    }

    async fn classify_destination<T>(&self, id: DbId) -> WorkflowResult<CasOutcome<T, i32>> {
        Ok(match DestinationRepo::find_by_id(&self.pool, id).await? {
            Some(current) => CasOutcome::Conflict {
                current: current.version,
            },
            None => CasOutcome::NotFound,
        })
    }
}

#[async_trait]
impl ChangeRequestStore for PgStores {
    async fn create(&self, input: &CreateChangeRequest) -> WorkflowResult<ChangeRequest> {
        Ok(ChangeRequestRepo::create(&self.pool, input).await?)
    }

    async fn find_by_id(&self, id: DbId) -> WorkflowResult<Option<ChangeRequest>> {
        Ok(ChangeRequestRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list(
        &self,
        status: Option<ChangeStatus>,
        limit: i64,
        offset: i64,
    ) -> WorkflowResult<Vec<ChangeRequest>> {
        Ok(ChangeRequestRepo::list_by_status(&self.pool, status, limit, offset).await?)
    }

    async fn list_by_author(&self, author_id: UserId) -> WorkflowResult<Vec<ChangeRequest>> {
        Ok(ChangeRequestRepo::list_by_author(&self.pool, author_id).await?)
    }

    async fn update_draft(
        &self,
        id: DbId,
        expected_draft_version: i32,
        payload: &DestinationFields,
    ) -> WorkflowResult<CasOutcome<ChangeRequest>> {
        match ChangeRequestRepo::update_draft(&self.pool, id, expected_draft_version, payload).await? {
            Some(updated) => Ok(CasOutcome::Updated(updated)),
            None => self.classify_change(id).await,
        }
    }

    async fn submit(&self, id: DbId) -> WorkflowResult<CasOutcome<ChangeRequest>> {
        match ChangeRequestRepo::submit(&self.pool, id).await? {
            Some(updated) => Ok(CasOutcome::Updated(updated)),
            None => self.classify_change(id).await,
        }
    }

    async fn transition(
        &self,
        id: DbId,
        decision: &ReviewDecision,
    ) -> WorkflowResult<CasOutcome<ChangeRequest>> {
        match ChangeRequestRepo::transition(&self.pool, id, decision).await? {
            Some(updated) => Ok(CasOutcome::Updated(updated)),
            None => self.classify_change(id).await,
        }
    }

    async fn set_published(
        &self,
        id: DbId,
        destination_id: DbId,
        published_version: i32,
    ) -> WorkflowResult<Option<ChangeRequest>> {
        Ok(
            ChangeRequestRepo::set_published(&self.pool, id, destination_id, published_version)
                .await?,
        )
    }
}

#[async_trait]
impl DestinationLookup for PgStores {
    async fn find_by_id(&self, id: DbId) -> WorkflowResult<Option<Destination>> {
        Ok(DestinationRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_by_slug(&self, slug: &str) -> WorkflowResult<Option<Destination>> {
        Ok(DestinationRepo::find_by_slug(&self.pool, slug).await?)
    }
}

#[async_trait]
impl DestinationStore for PgStores {
    async fn create(&self, input: &NewDestination) -> WorkflowResult<Destination> {
        DestinationRepo::create(&self.pool, input)
            .await
            .map_err(map_db_error)
    }

    async fn update(
        &self,
        destination: &Destination,
        expected_version: i32,
    ) -> WorkflowResult<CasOutcome<Destination, i32>> {
        match DestinationRepo::update(&self.pool, destination, expected_version)
            .await
            .map_err(map_db_error)?
        {
            Some(updated) => Ok(CasOutcome::Updated(updated)),
            None => self.classify_destination(destination.id).await,
        }
    }

    async fn hard_delete(
        &self,
        id: DbId,
        expected_version: i32,
    ) -> WorkflowResult<CasOutcome<(), i32>> {
        if DestinationRepo::hard_delete(&self.pool, id, expected_version).await? {
            Ok(CasOutcome::Updated(()))
        } else {
            self.classify_destination(id).await
        }
    }
}

#[async_trait]
impl VersionLedger for PgStores {
    async fn append(&self, entry: &CreateDestinationVersion) -> WorkflowResult<DestinationVersion> {
        Ok(DestinationVersionRepo::create(&self.pool, entry).await?)
    }

    async fn history(&self, destination_id: DbId) -> WorkflowResult<Vec<DestinationVersion>> {
        Ok(DestinationVersionRepo::list_by_destination(&self.pool, destination_id).await?)
    }
}

#[async_trait]
impl ImportStore for PgStores {
    async fn create_job(&self, input: &CreateImportJob) -> WorkflowResult<DestinationImportJob> {
        Ok(ImportJobRepo::create(&self.pool, input).await?)
    }

    async fn finish_job(
        &self,
        id: DbId,
        input: &FinishImportJob,
    ) -> WorkflowResult<DestinationImportJob> {
        ImportJobRepo::finish(&self.pool, id, input)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "DestinationImportJob",
                    id,
                }
                .into()
            })
    }

    async fn find_job(&self, id: DbId) -> WorkflowResult<Option<DestinationImportJob>> {
        Ok(ImportJobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_jobs_by_uploader(
        &self,
        uploaded_by: UserId,
    ) -> WorkflowResult<Vec<DestinationImportJob>> {
        Ok(ImportJobRepo::list_by_uploader(&self.pool, uploaded_by).await?)
    }

    async fn insert_row(&self, input: &CreateImportRow) -> WorkflowResult<DestinationImportRow> {
        Ok(ImportRowRepo::create(&self.pool, input).await?)
    }

    async fn list_rows(&self, job_id: DbId) -> WorkflowResult<Vec<DestinationImportRow>> {
        Ok(ImportRowRepo::list_by_job(&self.pool, job_id).await?)
    }
}
