//! Documentation of a crowd-sourced civic problem reporting backend.
//!
//! # General Infrastructure
//! - Users register once and authenticate with a 30-day bearer token
//! - Anyone can report a geotagged problem (pothole, broken light, dumping)
//! - Everyone else votes on whether the problem is real and still present
//! - The map client asks for a viewport center and gets every problem nearby,
//!   each carrying its live yes/no/total verification tally
//!
//! # Notes
//!
//! ## Tally freshness
//! Tallies are never cached. Every feed request recounts the ledger, so the
//! numbers a client sees are at most one request old. The counting fan-out is
//! capped (see `markers`) so a dense viewport cannot starve the connection
//! pool.
//!
//! ## Postgres
//! Three entities (users, problems, categories) plus the verification
//! ledger. The feed is a single three-way join; the tallies are count pairs
//! over the ledger. Schema bootstraps idempotently at startup — there is no
//! migration machinery to run first.
//!
//! # Setup
//!
//! ```sh
//! DATABASE_URL=postgres://localhost/civic RUST_PORT=1111 cargo run
//! ```
//!
//! The token signing key is read from `/run/secrets/JWT_KEY`.
use std::time::Duration;

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod markers;
pub mod routes;
pub mod state;
pub mod users;
pub mod utils;
pub mod verifications;

use routes::{
    cast_verification_handler, change_verification_handler, create_problem_handler,
    lookup_verification_handler, markers_handler, register_handler, root_handler, token_handler,
};
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/markers", post(markers_handler))
        .route("/problem", post(create_problem_handler))
        .route(
            "/verification/{user_id}/{prob_id}",
            get(lookup_verification_handler),
        )
        .route(
            "/verification",
            post(cast_verification_handler).patch(change_verification_handler),
        )
        .route("/users", post(register_handler))
        .route("/token", post(token_handler))
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
