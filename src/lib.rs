//! # gorestro
//!
//! Backend for a multi-tenant food-ordering platform: a customer storefront,
//! a restaurant-owner panel and an admin panel all talk to this API.
//!
//! # Architecture
//!
//! - Stateless axum service in front of Redis, which holds every collection
//!   as a hash of JSON documents ([`database`])
//! - Role-gated capabilities resolved per request by the [`auth`] extractors
//! - The order lifecycle lives in [`workflow`]: placement, restaurant
//!   accept/reject, status progression, delivery and cancellation, with
//!   notification fan-out on every transition
//! - All responses use the `{success, message|data}` envelope the frontends
//!   consume; failures are flattened at the request boundary ([`error`])

use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, HeaderName, Method},
    routing::get,
    Router,
};

use signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod auth;
pub mod cart;
pub mod config;
pub mod database;
pub mod error;
pub mod foods;
pub mod models;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod routes;
pub mod state;
pub mod users;
pub mod workflow;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
pub(crate) mod mock_store;

use routes::{health_handler, root_handler};
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(auth::TOKEN_HEADER)])
        .allow_origin(Any)
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .nest("/api/user", users::router())
        .nest("/api/food", foods::router())
        .nest("/api/cart", cart::router())
        .nest("/api/order", orders::router())
        .nest("/api/restro-owner", users::owner_router())
        .nest("/api/notification", notifications::router())
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
