//! Channel settings routes.
//!
//! - GET /api/notification-channels - List channels with health stats
//! - PATCH /api/notification-channels/{channel} - Enable/disable or configure

use actix_web::{web, HttpResponse};

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{ChannelKind, UpdateNotificationChannel};
use crate::services::ChannelService;

/// GET /api/notification-channels
pub async fn list_channels(pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let channels = ChannelService::list(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(channels))
}

/// PATCH /api/notification-channels/{channel}
pub async fn update_channel(
    pool: web::Data<DbPool>,
    path: web::Path<String>,
    body: web::Json<UpdateNotificationChannel>,
) -> AppResult<HttpResponse> {
    let kind: ChannelKind = path.parse().map_err(AppError::Validation)?;
    let channel = ChannelService::update(pool.get_ref(), kind, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(channel))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/notification-channels")
            .route("", web::get().to(list_channels))
            .route("/{channel}", web::patch().to(update_channel)),
    );
}
