//! Bid placement. Validation and state rules live in the bidding engine;
//! this handler only resolves the caller's identity and maps errors.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::db::{Bid, PlaceBidRequest, User};
use crate::AppState;

use super::error::ApiError;

/// Place a bid on a vehicle
///
/// POST /api/bids
pub async fn place_bid(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<PlaceBidRequest>,
) -> Result<(StatusCode, Json<Bid>), ApiError> {
    if req.vehicle_id.trim().is_empty() {
        return Err(ApiError::validation("vehicle_id is required"));
    }

    let bid = state
        .bidding
        .place_bid(&req.vehicle_id, &user.id, req.amount)
        .await?;

    Ok((StatusCode::CREATED, Json(bid)))
}
