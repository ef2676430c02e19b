//! Per-user cart, an item-id to quantity map on the user document. Cleared
//! by order placement.

use std::sync::Arc;

use axum::{extract::State, response::Response, routing::post, Json, Router};
use serde::Deserialize;

use crate::{
    auth::Auth,
    database::Store,
    error::{ok_data, ok_message, AppError},
    state::AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/add", post(add_handler))
        .route("/remove", post(remove_handler))
        .route("/get", post(get_handler))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartRequest {
    item_id: String,
}

async fn add_handler(
    State(state): State<Arc<AppState>>,
    Auth(mut user): Auth,
    Json(request): Json<CartRequest>,
) -> Result<Response, AppError> {
    *user.cart.entry(request.item_id).or_insert(0) += 1;
    state.store.put_user(&user).await?;
    Ok(ok_message("Added To Cart"))
}

async fn remove_handler(
    State(state): State<Arc<AppState>>,
    Auth(mut user): Auth,
    Json(request): Json<CartRequest>,
) -> Result<Response, AppError> {
    if let Some(quantity) = user.cart.get_mut(&request.item_id) {
        *quantity -= 1;
        if *quantity == 0 {
            user.cart.remove(&request.item_id);
        }
        state.store.put_user(&user).await?;
    }
    Ok(ok_message("Removed From Cart"))
}

async fn get_handler(Auth(user): Auth) -> Response {
    ok_data(user.cart)
}
