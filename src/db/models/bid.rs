//! Bid model.
//!
//! A bid starts `pending` and is terminal once accepted or rejected. Exactly
//! one bid per vehicle is ever accepted; the rest are rejected in the same
//! booking confirmation.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub mod bid_status {
    pub const PENDING: &str = "pending";
    pub const ACCEPTED: &str = "accepted";
    pub const REJECTED: &str = "rejected";
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bid {
    pub id: String,
    pub vehicle_id: String,
    pub user_id: String,
    pub amount: i64,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaceBidRequest {
    pub vehicle_id: String,
    pub amount: i64,
}
