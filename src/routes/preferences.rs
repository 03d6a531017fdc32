//! Notification preference routes.
//!
//! - GET /api/users/{user_id}/notification-preferences
//! - PUT /api/users/{user_id}/notification-preferences

use actix_web::{web, HttpResponse};

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::UpsertPreferences;
use crate::services::PreferenceService;

/// GET /api/users/{user_id}/notification-preferences
///
/// Users who never saved preferences get the defaults.
pub async fn get_preferences(
    pool: web::Data<DbPool>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let prefs = PreferenceService::get(pool.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(prefs))
}

/// PUT /api/users/{user_id}/notification-preferences
pub async fn put_preferences(
    pool: web::Data<DbPool>,
    path: web::Path<String>,
    body: web::Json<UpsertPreferences>,
) -> AppResult<HttpResponse> {
    let prefs =
        PreferenceService::upsert(pool.get_ref(), &path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(prefs))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/users/{user_id}/notification-preferences")
            .route(web::get().to(get_preferences))
            .route(web::put().to(put_preferences)),
    );
}
