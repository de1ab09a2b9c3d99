//! Import handlers for NATS messages

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::defaults::{DEFAULT_IMPORT_LIST_LIMIT, MAX_IMPORT_LIST_LIMIT};
use crate::services::import::ImportJobStore;
use crate::services::import_processor::ImportProcessor;
use crate::types::{
    ErrorResponse, ImportJobListItem, ImportJobView, ImportListRequest, ImportStatusRequest,
    ImportSubmitRequest, Request, SuccessResponse,
};

/// Handle engagement.import.submit messages
pub async fn handle_submit(
    client: Client,
    mut subscriber: Subscriber,
    processor: Arc<ImportProcessor>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<ImportSubmitRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse import submit request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if let Err(message) = validate_submit(&request.payload) {
            let error = ErrorResponse::new(request.id, "INVALID_REQUEST", message);
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let payload = request.payload;
        match processor.submit_upload(&payload.file_name, &payload.csv_content).await {
            Ok(response) => {
                let success = SuccessResponse::new(request.id, response);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                error!("Failed to submit import: {}", e);
                let error = ErrorResponse::new(request.id, "SUBMIT_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle engagement.import.status messages
pub async fn handle_status(
    client: Client,
    mut subscriber: Subscriber,
    jobs: Arc<dyn ImportJobStore>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received import.status message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ImportStatusRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match jobs.find_job(request.payload.job_id).await {
            Ok(Some(job)) => {
                let response = SuccessResponse::new(request.id, ImportJobView::from(&job));
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Import not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to get import {}: {}", request.payload.job_id, e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle engagement.import.list messages
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    jobs: Arc<dyn ImportJobStore>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received import.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ImportListRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match jobs.list_recent_jobs(list_limit(request.payload.limit)).await {
            Ok(found) => {
                let items: Vec<ImportJobListItem> = found.iter().map(ImportJobListItem::from).collect();
                let response = SuccessResponse::new(request.id, items);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list imports: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

fn validate_submit(request: &ImportSubmitRequest) -> Result<(), &'static str> {
    if request.file_name.trim().is_empty() {
        return Err("fileName is required");
    }
    if request.csv_content.trim().is_empty() {
        return Err("csvContent is empty");
    }
    Ok(())
}

fn list_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_IMPORT_LIST_LIMIT)
        .clamp(1, MAX_IMPORT_LIST_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_limit_defaults_and_clamps() {
        assert_eq!(list_limit(None), 20);
        assert_eq!(list_limit(Some(5)), 5);
        assert_eq!(list_limit(Some(1_000)), 100);
        assert_eq!(list_limit(Some(0)), 1);
    }

    #[test]
    fn test_submit_requires_name_and_content() {
        let request = |file_name: &str, csv_content: &str| ImportSubmitRequest {
            file_name: file_name.to_string(),
            csv_content: csv_content.to_string(),
        };

        assert!(validate_submit(&request("survey.csv", "nome;email\n")).is_ok());
        assert_eq!(validate_submit(&request(" ", "nome\n")), Err("fileName is required"));
        assert_eq!(validate_submit(&request("survey.csv", "")), Err("csvContent is empty"));
    }
}
