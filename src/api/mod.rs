pub mod auth;
mod bids;
mod bookings;
mod error;
mod password_reset;
mod validation;
mod vehicles;
mod ws;

pub use error::{ApiError, ErrorCode};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/forgot-password", post(password_reset::forgot_password))
        .route("/verify-reset-token", post(password_reset::verify_reset_token))
        .route("/reset-password", post(password_reset::reset_password));

    // Marketplace routes; write paths authenticate via the User extractor,
    // read paths are public
    let api_routes = Router::new()
        // Vehicles
        .route("/vehicles", get(vehicles::list_vehicles))
        .route("/vehicles", post(vehicles::create_vehicle))
        .route("/vehicles/mine", get(vehicles::my_vehicles))
        .route("/vehicles/:id", get(vehicles::get_vehicle))
        .route("/vehicles/:id/bids", get(vehicles::list_vehicle_bids))
        // Axum's default 2 MB body cap is below the per-file image limit;
        // give this route a budget wide enough for a full multipart batch
        .route(
            "/vehicles/:id/images",
            post(vehicles::upload_images)
                .layer(DefaultBodyLimit::max(vehicles::MAX_UPLOAD_BODY_BYTES)),
        )
        // Bids
        .route("/bids", post(bids::place_bid))
        // Bookings
        .route("/bookings", post(bookings::confirm_booking))
        .route("/bookings/mine", get(bookings::my_bookings));

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(ws::market_events_ws))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(&state.uploads_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
