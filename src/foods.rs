//! Food catalog. Items carry an `added_by` attribution back to the owning
//! restaurant account; owners may only remove their own items, admins any.

use std::sync::Arc;

use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::Auth,
    database::Store,
    error::{ok_data, ok_message, AppError},
    models::{FoodItem, Role},
    state::AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/add", post(add_handler))
        .route("/list", get(list_handler))
        .route("/remove", post(remove_handler))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddFoodRequest {
    name: String,
    #[serde(default)]
    description: Option<String>,
    price: f64,
    category: String,
    image: String,
}

async fn add_handler(
    State(state): State<Arc<AppState>>,
    Auth(user): Auth,
    Json(request): Json<AddFoodRequest>,
) -> Result<Response, AppError> {
    if !matches!(user.role, Role::Admin | Role::RestaurantOwner) {
        return Err(AppError::Unauthorized(
            "You are not authorized to add food items".to_string(),
        ));
    }

    let item = FoodItem {
        id: Uuid::new_v4().to_string(),
        name: request.name,
        description: request.description,
        price: request.price,
        category: request.category,
        image: request.image,
        added_by: user.id,
        created_at: Utc::now(),
    };
    state.store.put_food(&item).await?;

    info!(food_id = %item.id, added_by = %item.added_by, "food added");
    Ok(ok_message("Food Added"))
}

async fn list_handler(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let mut foods = state.store.foods().await?;
    foods.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(ok_data(foods))
}

#[derive(Debug, Deserialize)]
struct RemoveFoodRequest {
    id: String,
}

async fn remove_handler(
    State(state): State<Arc<AppState>>,
    Auth(user): Auth,
    Json(request): Json<RemoveFoodRequest>,
) -> Result<Response, AppError> {
    let food = state
        .store
        .food(&request.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Food item not found".to_string()))?;

    let allowed = user.role == Role::Admin
        || (user.role == Role::RestaurantOwner && food.added_by == user.id);
    if !allowed {
        return Err(AppError::Unauthorized(
            "You are not authorized to remove this food item".to_string(),
        ));
    }

    state.store.delete_food(&request.id).await?;

    info!(food_id = %request.id, "food removed");
    Ok(ok_message("Food Removed"))
}
