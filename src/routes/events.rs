//! Internal event intake.
//!
//! - POST /api/events - Dispatch a business event

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::dispatcher::{DispatchOptions, DispatchOutcome, EventDispatcher};
use crate::error::{AppError, AppResult};
use crate::events::EventCode;
use crate::models::AlertContext;

use super::alerts::outcome_json;

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub event_code: String,
    #[serde(default)]
    pub context: AlertContext,
    #[serde(default)]
    pub in_app_user_id: Option<String>,
    #[serde(default = "default_sync")]
    pub sync: bool,
}

fn default_sync() -> bool {
    true
}

/// POST /api/events
///
/// Unknown event codes are rejected; anything after parsing is best-effort
/// and always answers 202.
pub async fn dispatch_event(
    dispatcher: web::Data<EventDispatcher>,
    body: web::Json<EventRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    let event: EventCode = request
        .event_code
        .parse()
        .map_err(AppError::Validation)?;

    let options = DispatchOptions {
        in_app_user_id: request.in_app_user_id,
        sync: request.sync,
    };

    let outcome = dispatcher.dispatch(event, request.context, options).await;

    let body = match outcome {
        DispatchOutcome::Processed(ref fire) => json!({
            "event_code": event,
            "alert_code": event.alert_code(),
            "outcome": outcome_json(fire),
        }),
        DispatchOutcome::Enqueued(job_id) => json!({
            "event_code": event,
            "alert_code": event.alert_code(),
            "outcome": { "status": "enqueued", "job_id": job_id },
        }),
        DispatchOutcome::Dropped => json!({
            "event_code": event,
            "alert_code": event.alert_code(),
            "outcome": { "status": "dropped" },
        }),
    };

    Ok(HttpResponse::Accepted().json(body))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/events").route(web::post().to(dispatch_event)));
}
