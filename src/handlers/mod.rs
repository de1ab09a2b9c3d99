//! NATS message handlers

pub mod analytics;
pub mod import;
pub mod ping;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use crate::db::PgStore;
use crate::services::import::{ImportJobStore, ImportPipeline, SurveyStore};
use crate::services::import_processor::ImportProcessor;

/// Start all message handlers and the import runner
pub async fn start_handlers(client: Client, store: PgStore, config: &Config) -> Result<()> {
    let rows: Arc<dyn SurveyStore> = Arc::new(store.clone());
    let jobs: Arc<dyn ImportJobStore> = Arc::new(store.clone());
    let pipeline = Arc::new(ImportPipeline::new(rows, Arc::clone(&jobs), config.import_settings()));

    let processor = Arc::new(
        ImportProcessor::new(
            client.clone(),
            Arc::clone(&jobs),
            pipeline,
            config.upload_dir.clone(),
            config.max_deliver,
        )
        .await?,
    );
    info!("Import processor initialized");

    // Subscribe to subjects
    let ping_sub = client.subscribe("engagement.ping").await?;
    let import_submit_sub = client.subscribe("engagement.import.submit").await?;
    let import_status_sub = client.subscribe("engagement.import.status").await?;
    let import_list_sub = client.subscribe("engagement.import.list").await?;
    let analytics_overview_sub = client.subscribe("engagement.analytics.overview").await?;

    info!("Subscribed to NATS subjects");

    let client_ping = client.clone();
    let ping_handle = tokio::spawn(async move { ping::handle_ping(client_ping, ping_sub).await });

    let client_submit = client.clone();
    let submit_processor = Arc::clone(&processor);
    let import_submit_handle = tokio::spawn(async move {
        import::handle_submit(client_submit, import_submit_sub, submit_processor).await
    });

    let client_status = client.clone();
    let status_jobs = Arc::clone(&jobs);
    let import_status_handle = tokio::spawn(async move {
        import::handle_status(client_status, import_status_sub, status_jobs).await
    });

    let client_list = client.clone();
    let list_jobs = Arc::clone(&jobs);
    let import_list_handle = tokio::spawn(async move {
        import::handle_list(client_list, import_list_sub, list_jobs).await
    });

    let client_overview = client.clone();
    let pool = store.pool().clone();
    let analytics_overview_handle = tokio::spawn(async move {
        analytics::handle_overview(client_overview, analytics_overview_sub, pool).await
    });

    let import_runner_handle = tokio::spawn(async move { processor.start_processing().await });

    info!("All handlers started, waiting for messages...");

    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = import_submit_handle => {
            error!("Import submit handler finished: {:?}", result);
        }
        result = import_status_handle => {
            error!("Import status handler finished: {:?}", result);
        }
        result = import_list_handle => {
            error!("Import list handler finished: {:?}", result);
        }
        result = analytics_overview_handle => {
            error!("Analytics overview handler finished: {:?}", result);
        }
        result = import_runner_handle => {
            error!("Import runner finished: {:?}", result);
        }
    }

    Ok(())
}
