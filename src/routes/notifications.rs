//! In-app notification feed routes.
//!
//! - GET /api/users/{user_id}/notifications - Feed (newest first)
//! - GET /api/users/{user_id}/notifications/unread-count - Unread badge
//! - POST /api/users/{user_id}/notifications/{id}/read - Mark one read
//! - POST /api/users/{user_id}/notifications/read-all - Mark all read

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::FeedQuery;
use crate::services::NotificationFeedService;

#[derive(Deserialize)]
pub struct NotificationPath {
    pub user_id: String,
    pub id: i64,
}

/// GET /api/users/{user_id}/notifications
pub async fn list_notifications(
    pool: web::Data<DbPool>,
    path: web::Path<String>,
    query: web::Query<FeedQuery>,
) -> AppResult<HttpResponse> {
    let notifications =
        NotificationFeedService::list(pool.get_ref(), &path.into_inner(), &query).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

/// GET /api/users/{user_id}/notifications/unread-count
pub async fn unread_count(pool: web::Data<DbPool>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let count = NotificationFeedService::unread_count(pool.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(count))
}

/// POST /api/users/{user_id}/notifications/{id}/read
pub async fn mark_read(
    pool: web::Data<DbPool>,
    path: web::Path<NotificationPath>,
) -> AppResult<HttpResponse> {
    let params = path.into_inner();
    NotificationFeedService::mark_read(pool.get_ref(), params.id, &params.user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/users/{user_id}/notifications/read-all
pub async fn mark_all_read(pool: web::Data<DbPool>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let marked = NotificationFeedService::mark_all_read(pool.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(marked))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/users/{user_id}/notifications")
            .route("", web::get().to(list_notifications))
            .route("/unread-count", web::get().to(unread_count))
            .route("/read-all", web::post().to(mark_all_read))
            .route("/{id}/read", web::post().to(mark_read)),
    );
}
