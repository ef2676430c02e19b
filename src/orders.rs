//! HTTP surface of the order workflow. Handlers stay thin: capability
//! extraction, payload decoding, then a [`crate::workflow`] call.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    auth::{AdminUser, Auth, OwnerUser},
    error::{ok_data, ok_message, AppError},
    models::{OrderItem, OrderStatus},
    state::AppState,
    workflow::{self, PlaceOrder, Placement, Verification},
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/place", post(place_handler))
        .route("/verify", post(verify_handler))
        .route("/userorders", post(user_orders_handler))
        .route("/list", get(list_handler))
        .route("/status", post(admin_status_handler))
        .route("/restro-orders", post(owner_orders_handler))
        .route("/restro-status", post(owner_status_handler))
        .route("/accept-order", post(accept_handler))
        .route("/reject-order", post(reject_handler))
        .route("/cancel-order", post(cancel_handler))
        .route("/remove-delivered", post(remove_delivered_handler))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceOrderRequest {
    items: Vec<OrderItem>,
    amount: f64,
    address: Value,
    payment_method: String,
}

async fn place_handler(
    State(state): State<Arc<AppState>>,
    Auth(user): Auth,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<Response, AppError> {
    let placement = workflow::place(
        &state.store,
        &state.config,
        &user,
        PlaceOrder {
            items: request.items,
            amount: request.amount,
            address: request.address,
            payment_method: request.payment_method,
        },
    )
    .await?;

    Ok(match placement {
        Placement::Placed => ok_message("Order placed successfully"),
        Placement::Checkout { session_url } => (
            StatusCode::OK,
            Json(json!({ "success": true, "session_url": session_url })),
        )
            .into_response(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest {
    order_id: String,
    success: String,
}

async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyRequest>,
) -> Result<Response, AppError> {
    let outcome =
        workflow::verify(&state.store, &request.order_id, request.success == "true").await?;

    Ok(match outcome {
        Verification::Paid => ok_message("Paid"),
        Verification::NotPaid => (
            StatusCode::OK,
            Json(json!({ "success": false, "message": "Not Paid" })),
        )
            .into_response(),
    })
}

async fn user_orders_handler(
    State(state): State<Arc<AppState>>,
    Auth(user): Auth,
) -> Result<Response, AppError> {
    Ok(ok_data(
        workflow::list_for_customer(&state.store, &user).await?,
    ))
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> Result<Response, AppError> {
    Ok(ok_data(workflow::list_all(&state.store).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusRequest {
    order_id: String,
    status: String,
}

fn parse_status(raw: &str) -> Result<OrderStatus, AppError> {
    OrderStatus::parse(raw).ok_or_else(|| AppError::Validation("Invalid status".to_string()))
}

async fn admin_status_handler(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Json(request): Json<StatusRequest>,
) -> Result<Response, AppError> {
    let status = parse_status(&request.status)?;
    workflow::admin_update_status(&state.store, &request.order_id, status).await?;
    Ok(ok_message("Status Updated Successfully"))
}

async fn owner_orders_handler(
    State(state): State<Arc<AppState>>,
    OwnerUser(owner): OwnerUser,
) -> Result<Response, AppError> {
    Ok(ok_data(
        workflow::list_for_owner(&state.store, &owner).await?,
    ))
}

async fn owner_status_handler(
    State(state): State<Arc<AppState>>,
    OwnerUser(owner): OwnerUser,
    Json(request): Json<StatusRequest>,
) -> Result<Response, AppError> {
    let status = parse_status(&request.status)?;
    workflow::update_status(&state.store, &owner, &request.order_id, status).await?;
    Ok(ok_message("Status Updated Successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderDecisionRequest {
    order_id: String,
    #[serde(default)]
    reason: Option<String>,
}

async fn accept_handler(
    State(state): State<Arc<AppState>>,
    OwnerUser(owner): OwnerUser,
    Json(request): Json<OrderDecisionRequest>,
) -> Result<Response, AppError> {
    workflow::accept(&state.store, &owner, &request.order_id).await?;
    Ok(ok_message("Order accepted"))
}

async fn reject_handler(
    State(state): State<Arc<AppState>>,
    OwnerUser(owner): OwnerUser,
    Json(request): Json<OrderDecisionRequest>,
) -> Result<Response, AppError> {
    workflow::reject(&state.store, &owner, &request.order_id, request.reason).await?;
    Ok(ok_message("Order rejected"))
}

async fn cancel_handler(
    State(state): State<Arc<AppState>>,
    Auth(user): Auth,
    Json(request): Json<OrderDecisionRequest>,
) -> Result<Response, AppError> {
    workflow::cancel(&state.store, &user, &request.order_id, request.reason).await?;
    Ok(ok_message("Order cancelled successfully"))
}

async fn remove_delivered_handler(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> Result<Response, AppError> {
    let removed = workflow::remove_delivered(&state.store).await?;
    Ok(ok_message(format!("Removed {removed} delivered orders")))
}
