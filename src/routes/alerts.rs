//! Alert rule administration routes.
//!
//! - GET /api/alert-rules - List rules
//! - POST /api/alert-rules - Create rule
//! - GET /api/alert-rules/{id} - Get rule with recipients
//! - PATCH /api/alert-rules/{id} - Update rule
//! - DELETE /api/alert-rules/{id} - Delete (or deactivate) rule
//! - POST /api/alert-rules/{id}/test - Test-send a rule
//! - POST /api/alert-rules/{code}/evaluate - Evaluate a rule condition
//! - GET /api/alert-rules/{id}/history - Delivery history

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::db::DbPool;
use crate::engine::{AlertEngine, FireOutcome};
use crate::error::AppResult;
use crate::models::{AlertContext, CreateAlertRule, TestAlertPayload, UpdateAlertRule};
use crate::services::{AlertService, RuleRemoval};

// =============================================================================
// Alert Rule Endpoints
// =============================================================================

/// GET /api/alert-rules
pub async fn list_rules(pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let rules = AlertService::list_rules(pool.get_ref()).await?;

    let mut responses = Vec::with_capacity(rules.len());
    for rule in rules {
        let recipients = AlertService::get_recipients(pool.get_ref(), rule.id).await?;
        responses.push(rule.to_response(recipients));
    }

    Ok(HttpResponse::Ok().json(responses))
}

/// POST /api/alert-rules
pub async fn create_rule(
    pool: web::Data<DbPool>,
    body: web::Json<CreateAlertRule>,
) -> AppResult<HttpResponse> {
    let rule = AlertService::create_rule(pool.get_ref(), body.into_inner()).await?;
    let recipients = AlertService::get_recipients(pool.get_ref(), rule.id).await?;

    Ok(HttpResponse::Created().json(rule.to_response(recipients)))
}

/// GET /api/alert-rules/{id}
pub async fn get_rule(pool: web::Data<DbPool>, path: web::Path<i32>) -> AppResult<HttpResponse> {
    let rule = AlertService::get_rule(pool.get_ref(), path.into_inner()).await?;
    let recipients = AlertService::get_recipients(pool.get_ref(), rule.id).await?;

    Ok(HttpResponse::Ok().json(rule.to_response(recipients)))
}

/// PATCH /api/alert-rules/{id}
pub async fn update_rule(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    body: web::Json<UpdateAlertRule>,
) -> AppResult<HttpResponse> {
    let rule = AlertService::update_rule(pool.get_ref(), path.into_inner(), body.into_inner()).await?;
    let recipients = AlertService::get_recipients(pool.get_ref(), rule.id).await?;

    Ok(HttpResponse::Ok().json(rule.to_response(recipients)))
}

/// DELETE /api/alert-rules/{id}
pub async fn delete_rule(pool: web::Data<DbPool>, path: web::Path<i32>) -> AppResult<HttpResponse> {
    match AlertService::delete_rule(pool.get_ref(), path.into_inner()).await? {
        RuleRemoval::Deleted => Ok(HttpResponse::NoContent().finish()),
        RuleRemoval::Deactivated => Ok(HttpResponse::Ok().json(json!({
            "deleted": false,
            "deactivated": true
        }))),
    }
}

// =============================================================================
// Engine Endpoints
// =============================================================================

/// POST /api/alert-rules/{id}/test
pub async fn test_rule(
    engine: web::Data<AlertEngine>,
    path: web::Path<i32>,
    body: web::Json<TestAlertPayload>,
) -> AppResult<HttpResponse> {
    let report = engine
        .trigger_alert(path.into_inner(), body.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "rule_code": report.rule_code,
        "attempted": report.attempted(),
        "delivered": report.delivered,
        "failed": report.failed(),
        "notification_ids": report.notification_ids,
    })))
}

/// POST /api/alert-rules/{code}/evaluate
pub async fn evaluate_rule(
    engine: web::Data<AlertEngine>,
    path: web::Path<String>,
    body: web::Json<AlertContext>,
) -> AppResult<HttpResponse> {
    let code = path.into_inner();
    let triggered = engine.evaluate_rules(&code, &body).await?;

    Ok(HttpResponse::Ok().json(json!({
        "code": code,
        "triggered": triggered,
    })))
}

/// Serializable summary of an engine outcome
pub(crate) fn outcome_json(outcome: &FireOutcome) -> serde_json::Value {
    match outcome {
        FireOutcome::Skipped(reason) => json!({
            "status": "skipped",
            "reason": format!("{:?}", reason),
        }),
        FireOutcome::ConditionNotMet => json!({ "status": "condition_not_met" }),
        FireOutcome::Fired(report) => json!({
            "status": "fired",
            "rule_code": report.rule_code,
            "attempted": report.attempted(),
            "delivered": report.delivered,
            "notification_ids": report.notification_ids,
        }),
    }
}

// =============================================================================
// Delivery History
// =============================================================================

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// GET /api/alert-rules/{id}/history
pub async fn list_history(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    query: web::Query<HistoryQuery>,
) -> AppResult<HttpResponse> {
    let rule = AlertService::get_rule(pool.get_ref(), path.into_inner()).await?;

    let limit = query.limit.clamp(1, 200);
    let history = AlertService::list_history(pool.get_ref(), rule.id, limit).await?;

    Ok(HttpResponse::Ok().json(history))
}

// =============================================================================
// Route Configuration
// =============================================================================

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/alert-rules")
            .route("", web::get().to(list_rules))
            .route("", web::post().to(create_rule))
            .route("/{id}", web::get().to(get_rule))
            .route("/{id}", web::patch().to(update_rule))
            .route("/{id}", web::delete().to(delete_rule))
            .route("/{id}/test", web::post().to(test_rule))
            .route("/{code}/evaluate", web::post().to(evaluate_rule))
            .route("/{id}/history", web::get().to(list_history)),
    );
}
