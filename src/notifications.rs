//! In-app notification feed. Records are created by the order workflow and
//! read, acknowledged or deleted here, always scoped to the authenticated
//! recipient. Listing returns the 20 newest entries.

use std::sync::Arc;

use axum::{extract::State, response::Response, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::Auth,
    database::Store,
    error::{ok_data, ok_message, AppError},
    models::Notification,
    state::AppState,
};

pub const FEED_LIMIT: usize = 20;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/list", post(list_handler))
        .route("/mark-read", post(mark_read_handler))
        .route("/mark-all-read", post(mark_all_read_handler))
        .route("/unread-count", post(unread_count_handler))
        .route("/delete", post(delete_handler))
}

pub async fn feed(store: &dyn Store, user_id: &str) -> Result<Vec<Notification>, AppError> {
    let mut notifications = store.notifications_for(user_id).await?;
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    notifications.truncate(FEED_LIMIT);
    Ok(notifications)
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    Auth(user): Auth,
) -> Result<Response, AppError> {
    Ok(ok_data(feed(&state.store, &user.id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationRequest {
    notification_id: String,
}

async fn mark_read_handler(
    State(state): State<Arc<AppState>>,
    Auth(user): Auth,
    Json(request): Json<NotificationRequest>,
) -> Result<Response, AppError> {
    if !state
        .store
        .mark_notification_read(&request.notification_id, &user.id)
        .await?
    {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(ok_message("Notification marked as read"))
}

async fn mark_all_read_handler(
    State(state): State<Arc<AppState>>,
    Auth(user): Auth,
) -> Result<Response, AppError> {
    state.store.mark_all_notifications_read(&user.id).await?;
    Ok(ok_message("All notifications marked as read"))
}

async fn unread_count_handler(
    State(state): State<Arc<AppState>>,
    Auth(user): Auth,
) -> Result<Json<serde_json::Value>, AppError> {
    let count = state.store.unread_count(&user.id).await?;
    Ok(Json(json!({ "success": true, "count": count })))
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Auth(user): Auth,
    Json(request): Json<NotificationRequest>,
) -> Result<Response, AppError> {
    if !state
        .store
        .delete_notification(&request.notification_id, &user.id)
        .await?
    {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(ok_message("Notification deleted"))
}
