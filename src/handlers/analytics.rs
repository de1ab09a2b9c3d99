//! Analytics handlers for NATS messages

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::db::queries::analytics::{self, AnalyticsFilter};
use crate::services::analytics::{overview, AnalyticsOverview};
use crate::types::{ErrorResponse, Request, SuccessResponse};

/// Handle engagement.analytics.overview messages
pub async fn handle_overview(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received analytics.overview message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<AnalyticsFilter> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let filter = request.payload;
        if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
            if from > to {
                let error = ErrorResponse::new(request.id, "INVALID_REQUEST", "dateFrom is after dateTo");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        }

        match load_overview(&pool, &filter).await {
            Ok(result) => {
                let response = SuccessResponse::new(request.id, result);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to compute analytics overview: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

async fn load_overview(pool: &PgPool, filter: &AnalyticsFilter) -> Result<AnalyticsOverview> {
    let responses = analytics::list_responses(pool, filter).await?;
    let total_employees = analytics::count_employees(pool, filter).await?;
    Ok(overview(usize::try_from(total_employees)?, &responses))
}
