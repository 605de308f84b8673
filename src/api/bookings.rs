//! Booking confirmation and the buyer/seller dashboard view.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::db::{Booking, ConfirmBookingRequest, User};
use crate::AppState;

use super::error::ApiError;

/// Confirm the sale of a vehicle to its highest bidder (seller only)
///
/// POST /api/bookings
pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<ConfirmBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    if req.vehicle_id.trim().is_empty() {
        return Err(ApiError::validation("vehicle_id is required"));
    }

    let booking = state
        .bidding
        .confirm_booking(&req.vehicle_id, &user.id)
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

/// Bookings where the caller is buyer or seller, newest first
///
/// GET /api/bookings/mine
pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let bookings: Vec<Booking> = sqlx::query_as(
        "SELECT * FROM bookings WHERE buyer_id = ? OR seller_id = ?
         ORDER BY created_at DESC",
    )
    .bind(&user.id)
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(bookings))
}
