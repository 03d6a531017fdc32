//! Probes for the orchestrator.
//!
//! - GET /health - Process is up
//! - GET /health/ready - Database reachable and alert job queue readable

use actix_web::{http::StatusCode, web, HttpResponse};
use serde::Serialize;

use crate::db::{self, DbPool};
use crate::models::QueueBacklog;

#[derive(Serialize)]
pub struct LivenessResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    status: &'static str,
    checks: ReadinessChecks,
    #[serde(skip_serializing_if = "Option::is_none")]
    alert_jobs: Option<QueueBacklog>,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    database: &'static str,
    queue: &'static str,
}

/// GET /health
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(LivenessResponse { status: "ok" })
}

/// GET /health/ready
///
/// 503 until the database answers and the job table is readable.
pub async fn readiness(pool: web::Data<DbPool>) -> HttpResponse {
    let storage = db::storage_status(pool.get_ref()).await;

    let (code, status) = if storage.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    HttpResponse::build(code).json(ReadinessResponse {
        status,
        checks: ReadinessChecks {
            database: storage.database_label(),
            queue: storage.queue_label(),
        },
        alert_jobs: storage.alert_jobs,
    })
}
