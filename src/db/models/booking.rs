//! Booking model, the confirmed sale artifact binding buyer, seller and the
//! winning bid. At most one booking exists per vehicle.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: String,
    pub vehicle_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub bid_id: String,
    pub final_price: i64,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmBookingRequest {
    pub vehicle_id: String,
}
