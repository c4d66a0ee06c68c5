//! `wayfinder`: operator commands over the destination change-request workflow.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wayfinder_core::change_request::ChangeStatus;
use wayfinder_core::types::{DbId, UserId};
use wayfinder_events::{EventAuditLog, EventBus};
use wayfinder_workflow::imaging::ResizeProcessor;
use wayfinder_workflow::pg::PgStores;
use wayfinder_workflow::storage::build_object_storage;
use wayfinder_workflow::{ChangeWorkflow, DestinationImporter, WorkflowConfig};

#[derive(Debug, Parser)]
#[command(
    name = "wayfinder",
    about = "Review, publish and bulk-import destination change requests",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import a CSV file of new destinations as pending change requests.
    Import {
        /// Path to the CSV file.
        file: PathBuf,
        /// User the change requests are submitted as.
        #[arg(long)]
        uploader: UserId,
        /// Validate and report without creating change requests.
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Submit a draft for review.
    Submit {
        change_id: DbId,
        #[arg(long)]
        author: UserId,
    },
    /// Approve a pending change request and publish it.
    Approve {
        change_id: DbId,
        #[arg(long)]
        reviewer: UserId,
    },
    /// Reject a pending change request.
    Reject {
        change_id: DbId,
        #[arg(long)]
        reviewer: UserId,
        #[arg(long)]
        message: String,
    },
    /// List change requests awaiting review, oldest first.
    Queue {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Show the version ledger of a destination.
    History { destination_id: DbId },
    /// Show an import job and its row outcomes.
    Job { job_id: DbId },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wayfinder_worker=info,wayfinder_workflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // --- Configuration ---
    let config = WorkflowConfig::from_env().context("Invalid workflow configuration")?;

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = wayfinder_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    wayfinder_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    wayfinder_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let audit_handle = tokio::spawn(EventAuditLog::run(event_bus.subscribe()));

    let result = run(cli.command, config, PgStores::new(pool), Arc::clone(&event_bus)).await;

    // Every sender is gone once `run` returns; let the audit log drain.
    drop(event_bus);
    if let Ok(logged) = audit_handle.await {
        tracing::debug!(logged, "Event audit log drained");
    }
    result
}

async fn run(
    command: Command,
    config: WorkflowConfig,
    stores: PgStores,
    event_bus: Arc<EventBus>,
) -> anyhow::Result<()> {
    let stores = Arc::new(stores);

    let storage = match config
        .validate_storage()
        .map(|()| &config.storage)
    {
        Ok(storage_config) => match build_object_storage(storage_config).await {
            Ok(storage) => Some(storage),
            Err(e) => {
                tracing::warn!(error = %e, "Object storage unavailable, continuing without it");
                None
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Object storage not configured, continuing without it");
            None
        }
    };

    let mut workflow = ChangeWorkflow::new(
        stores.clone(),
        stores.clone(),
        stores.clone(),
        config.policy.clone(),
    )
    .with_image_processor(Arc::new(ResizeProcessor))
    .with_event_bus(Arc::clone(&event_bus));
    if let Some(storage) = &storage {
        workflow = workflow.with_media(Arc::clone(storage), config.media.clone());
    }
    let workflow = Arc::new(workflow);

    match command {
        Command::Import {
            file,
            uploader,
            dry_run,
            notes,
        } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "import.csv".to_string());

            let mut importer = DestinationImporter::new(
                Arc::clone(&workflow),
                stores.clone(),
                stores.clone(),
                config.import.clone(),
            )
            .with_event_bus(event_bus);
            if let Some(storage) = storage {
                importer = importer.with_object_storage(storage);
            }

            let outcome = importer
                .import(uploader, &file_name, data, dry_run, notes)
                .await?;
            print_json(&outcome)
        }
        Command::Submit { change_id, author } => {
            print_json(&workflow.submit_draft(change_id, author).await?)
        }
        Command::Approve {
            change_id,
            reviewer,
        } => print_json(&workflow.approve(change_id, reviewer).await?),
        Command::Reject {
            change_id,
            reviewer,
            message,
        } => print_json(&workflow.reject(change_id, reviewer, &message).await?),
        Command::Queue { limit, offset } => print_json(
            &workflow
                .list_changes(Some(ChangeStatus::PendingReview), limit, offset)
                .await?,
        ),
        Command::History { destination_id } => {
            print_json(&workflow.destination_history(destination_id).await?)
        }
        Command::Job { job_id } => {
            let importer = DestinationImporter::new(
                Arc::clone(&workflow),
                stores.clone(),
                stores.clone(),
                config.import.clone(),
            );
            print_json(&importer.get_job(job_id).await?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
