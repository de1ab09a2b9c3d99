//! Engagement Worker - Backend service for employee engagement surveys
//!
//! This worker connects to NATS, imports survey CSV exports and answers
//! analytics requests.

mod cli;
mod config;
mod db;
mod defaults;
mod error;
mod handlers;
mod services;
mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::db::PgStore;
use crate::services::import::{ImportJobStore, ImportPipeline, ImportSettings, MemoryStore, SurveyStore};
use crate::types::ImportJobView;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,engagement_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Migrate => {
            let config = Config::from_env()?;
            let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
            db::run_migrations(&pool).await
        }
        Command::Import { file, dry_run } => import_file(&file, dry_run).await,
        Command::Status { job_id } => print_status(job_id).await,
    }
}

async fn serve() -> Result<()> {
    info!("Starting Engagement Worker...");

    let config = Config::from_env()?;
    info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    info!("Connected to PostgreSQL");

    db::run_migrations(&pool).await?;

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (&config.nats_user, &config.nats_password) {
        (Some(user), Some(password)) => {
            async_nats::ConnectOptions::new()
                .user_and_password(user.clone(), password.clone())
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    let handler_result = handlers::start_handlers(nats_client, PgStore::new(pool), &config).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Run one import in the foreground; the file is left in place
async fn import_file(file: &Path, dry_run: bool) -> Result<()> {
    let (rows, jobs, settings): (Arc<dyn SurveyStore>, Arc<dyn ImportJobStore>, ImportSettings) = if dry_run {
        let store = MemoryStore::new();
        let settings = ImportSettings::from_env()?;
        (Arc::new(store.clone()), Arc::new(store), settings)
    } else {
        let config = Config::from_env()?;
        let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
        db::run_migrations(&pool).await?;
        let store = PgStore::new(pool);
        (Arc::new(store.clone()), Arc::new(store), config.import_settings())
    };

    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    let job = jobs.create_job(&file_name, &file.to_string_lossy()).await?;
    info!("Importing {} as job {}{}", file.display(), job.id, if dry_run { " (dry run)" } else { "" });

    let pipeline = ImportPipeline::new(rows, Arc::clone(&jobs), settings);
    let outcome = pipeline.run(job.id).await;

    let finished = jobs
        .find_job(job.id)
        .await?
        .with_context(|| format!("import job {} disappeared", job.id))?;
    println!("{}", serde_json::to_string_pretty(&ImportJobView::from(&finished))?);

    outcome.map(|_| ()).map_err(anyhow::Error::from)
}

async fn print_status(job_id: Uuid) -> Result<()> {
    let config = Config::from_env()?;
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    let store = PgStore::new(pool);

    let job = store
        .find_job(job_id)
        .await?
        .with_context(|| format!("import job {} not found", job_id))?;
    println!("{}", serde_json::to_string_pretty(&ImportJobView::from(&job))?);

    Ok(())
}
