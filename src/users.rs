//! Accounts: registration, login, profiles, and admin management of
//! restaurant owners. Freshly registered owners start unapproved and cannot
//! sign in until an admin flips the flag; rejection deletes the pending
//! account outright.

use std::sync::Arc;

use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{issue_token, AdminUser, Auth, OwnerUser},
    config::Config,
    database::Store,
    error::{ok_data, ok_message, AppError},
    models::{Role, User},
    state::AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/profile", post(profile_handler))
        .route("/update-profile", post(update_profile_handler))
}

pub fn owner_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pending", get(pending_owners_handler))
        .route("/approved", get(approved_owners_handler))
        .route("/approve", post(approve_owner_handler))
        .route("/reject", post(reject_owner_handler))
        .route("/profile", post(owner_profile_handler))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub restaurant_name: Option<String>,
    #[serde(default)]
    pub restaurant_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn register(
    store: &dyn Store,
    config: &Config,
    request: RegisterRequest,
) -> Result<Value, AppError> {
    if !request.email.contains('@') {
        return Err(AppError::Validation(
            "Please enter valid email".to_string(),
        ));
    }
    if request.password.len() < 8 {
        return Err(AppError::Validation(
            "Please enter strong password".to_string(),
        ));
    }

    let role = request.role.unwrap_or_default();
    if role == Role::RestaurantOwner
        && (request.restaurant_name.is_none() || request.restaurant_address.is_none())
    {
        return Err(AppError::Validation(
            "Restaurant name and address are required for restaurant owners".to_string(),
        ));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        name: request.name,
        email: request.email,
        password: bcrypt::hash(&request.password, config.bcrypt_cost)?,
        role,
        // Owners wait for admin approval; everyone else is live immediately.
        is_approved: role != Role::RestaurantOwner,
        restaurant_name: request.restaurant_name,
        restaurant_address: request.restaurant_address,
        cart: Default::default(),
        created_at: Utc::now(),
    };

    if !store.create_user(&user).await? {
        return Err(AppError::Validation("User already exists".to_string()));
    }

    info!(user_id = %user.id, ?role, "user registered");

    if user.is_approved {
        let token = issue_token(&config.jwt_secret, &user.id)?;
        Ok(json!({
            "success": true,
            "token": token,
            "role": user.role,
            "isApproved": user.is_approved,
        }))
    } else {
        Ok(json!({
            "success": true,
            "message": "Restaurant owner registration submitted. Waiting for admin approval.",
            "role": user.role,
            "isApproved": user.is_approved,
        }))
    }
}

pub async fn login(
    store: &dyn Store,
    config: &Config,
    request: LoginRequest,
) -> Result<Value, AppError> {
    let user = store
        .user_by_email(&request.email)
        .await?
        .ok_or_else(|| AppError::NotFound("User Doesn't exist".to_string()))?;

    if !bcrypt::verify(&request.password, &user.password)? {
        return Err(AppError::Validation("Invalid Credentials".to_string()));
    }
    if !user.is_approved {
        return Err(AppError::Unauthorized(
            "Your account is pending admin approval".to_string(),
        ));
    }

    let token = issue_token(&config.jwt_secret, &user.id)?;
    Ok(json!({
        "success": true,
        "token": token,
        "role": user.role,
        "isApproved": user.is_approved,
    }))
}

async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Value>, AppError> {
    register(&state.store, &state.config, request).await.map(Json)
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    login(&state.store, &state.config, request).await.map(Json)
}

async fn profile_handler(Auth(user): Auth) -> Response {
    ok_data(user.public())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    name: Option<String>,
    restaurant_name: Option<String>,
    restaurant_address: Option<String>,
}

async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Auth(mut user): Auth,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Response, AppError> {
    if let Some(name) = request.name {
        user.name = name;
    }
    if request.restaurant_name.is_some() {
        user.restaurant_name = request.restaurant_name;
    }
    if request.restaurant_address.is_some() {
        user.restaurant_address = request.restaurant_address;
    }
    state.store.put_user(&user).await?;

    Ok(ok_data(user.public()))
}

async fn owners(store: &dyn Store, approved: bool) -> Result<Vec<Value>, AppError> {
    Ok(store
        .users()
        .await?
        .iter()
        .filter(|user| user.role == Role::RestaurantOwner && user.is_approved == approved)
        .map(User::public)
        .collect())
}

async fn pending_owners_handler(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> Result<Response, AppError> {
    Ok(ok_data(owners(&state.store, false).await?))
}

async fn approved_owners_handler(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> Result<Response, AppError> {
    Ok(ok_data(owners(&state.store, true).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerActionRequest {
    owner_id: String,
}

async fn approve_owner_handler(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Json(request): Json<OwnerActionRequest>,
) -> Result<Response, AppError> {
    let mut owner = state
        .store
        .user(&request.owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    owner.is_approved = true;
    state.store.put_user(&owner).await?;

    info!(owner_id = %owner.id, "restaurant owner approved");
    Ok(ok_data(owner.public()))
}

async fn reject_owner_handler(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Json(request): Json<OwnerActionRequest>,
) -> Result<Response, AppError> {
    if !state.store.delete_user(&request.owner_id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    info!(owner_id = %request.owner_id, "restaurant owner request rejected");
    Ok(ok_message("Restaurant owner request rejected and deleted"))
}

async fn owner_profile_handler(OwnerUser(owner): OwnerUser) -> Response {
    ok_data(owner.public())
}
