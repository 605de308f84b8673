//! The bidding engine.
//!
//! Validates and applies bid placement and booking confirmation against the
//! vehicle and bid tables. The rules it enforces:
//!
//! - a vehicle accepts bids only while `available`
//! - a bid must strictly exceed both the listed price and the current highest
//!   pending bid (the floor is monotonically increasing)
//! - the seller never holds a bid on their own vehicle
//! - confirming a booking atomically marks the vehicle sold, accepts the
//!   single winning bid and rejects every other pending bid
//!
//! Writes against the same vehicle are serialized with a per-vehicle lock so
//! two concurrent bids cannot both pass the floor check against a stale
//! floor. The confirmation effect runs inside one sqlite transaction; no
//! partial state is ever visible.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::{bid_status, vehicle_status, Bid, Booking, DbPool, Vehicle};
use crate::notifications::{EventBroadcaster, MarketEvent};

#[derive(Debug, Error)]
pub enum BidError {
    #[error("Vehicle not found")]
    VehicleNotFound,
    #[error("{0}")]
    InvalidState(&'static str),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Bidding engine over an injected database pool. Cheap to clone; the lock
/// map and event channel are shared.
#[derive(Clone)]
pub struct BiddingEngine {
    db: DbPool,
    events: EventBroadcaster,
    vehicle_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl BiddingEngine {
    pub fn new(db: DbPool, events: EventBroadcaster) -> Self {
        Self {
            db,
            events,
            vehicle_locks: Arc::new(DashMap::new()),
        }
    }

    /// Single-writer lock per vehicle, held across the read-check-insert
    /// sequence of a bid and across the whole confirmation transaction. Also
    /// taken by any other writer that read-modify-writes the vehicle row.
    pub(crate) async fn lock_vehicle(&self, vehicle_id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self
            .vehicle_locks
            .entry(vehicle_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Place a bid on a vehicle. Precondition checks run in a fixed order and
    /// the first failure wins.
    ///
    /// Ties are impossible: a bid equal to the current floor fails the strict
    /// inequality, so the first bid at a given amount holds priority until it
    /// is strictly outbid. This is intentional.
    pub async fn place_bid(
        &self,
        vehicle_id: &str,
        bidder_id: &str,
        amount: i64,
    ) -> Result<Bid, BidError> {
        let _guard = self.lock_vehicle(vehicle_id).await;

        let mut tx = self.db.begin().await?;

        let vehicle: Vehicle = sqlx::query_as("SELECT * FROM vehicles WHERE id = ?")
            .bind(vehicle_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(BidError::VehicleNotFound)?;

        if vehicle.status != vehicle_status::AVAILABLE {
            return Err(BidError::InvalidState("This vehicle is no longer available"));
        }

        if bidder_id == vehicle.seller_id {
            return Err(BidError::Forbidden("You cannot bid on your own vehicle"));
        }

        if amount <= vehicle.price {
            return Err(BidError::InvalidArgument(format!(
                "Bid must be greater than the listed price of {}",
                vehicle.price
            )));
        }

        let highest: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(amount) FROM bids WHERE vehicle_id = ? AND status = 'pending'",
        )
        .bind(vehicle_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(highest) = highest {
            if amount <= highest {
                return Err(BidError::InvalidArgument(format!(
                    "Bid must be greater than the current highest bid of {}",
                    highest
                )));
            }
        }

        let bid = Bid {
            id: Uuid::new_v4().to_string(),
            vehicle_id: vehicle_id.to_string(),
            user_id: bidder_id.to_string(),
            amount,
            status: bid_status::PENDING.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO bids (id, vehicle_id, user_id, amount, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&bid.id)
        .bind(&bid.vehicle_id)
        .bind(&bid.user_id)
        .bind(bid.amount)
        .bind(&bid.status)
        .bind(&bid.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(vehicle_id = %vehicle_id, amount, "Bid placed");

        self.events.publish(MarketEvent::NewBid {
            vehicle_id: vehicle_id.to_string(),
            amount,
        });

        Ok(bid)
    }

    /// Confirm the sale of a vehicle to the highest pending bidder. Only the
    /// seller may confirm. In one transaction: the booking is created, the
    /// vehicle goes `sold`, the winning bid goes `accepted` and every other
    /// pending bid goes `rejected`.
    pub async fn confirm_booking(
        &self,
        vehicle_id: &str,
        caller_id: &str,
    ) -> Result<Booking, BidError> {
        let _guard = self.lock_vehicle(vehicle_id).await;

        let mut tx = self.db.begin().await?;

        let vehicle: Vehicle = sqlx::query_as("SELECT * FROM vehicles WHERE id = ?")
            .bind(vehicle_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(BidError::VehicleNotFound)?;

        if vehicle.status != vehicle_status::AVAILABLE {
            return Err(BidError::InvalidState("This vehicle is already booked"));
        }

        if caller_id != vehicle.seller_id {
            return Err(BidError::Forbidden("Only the seller can confirm a booking"));
        }

        // Winner is the highest pending bid. The created_at tie-break is
        // unreachable while bidding enforces strict inequality, but the
        // ordering keeps the winner deterministic regardless.
        let winner: Bid = sqlx::query_as(
            "SELECT * FROM bids WHERE vehicle_id = ? AND status = 'pending'
             ORDER BY amount DESC, created_at ASC LIMIT 1",
        )
        .bind(vehicle_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BidError::InvalidState("No bids available for this vehicle"))?;

        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            vehicle_id: vehicle_id.to_string(),
            buyer_id: winner.user_id.clone(),
            seller_id: vehicle.seller_id.clone(),
            bid_id: winner.id.clone(),
            final_price: winner.amount,
            status: "confirmed".to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO bookings (id, vehicle_id, buyer_id, seller_id, bid_id, final_price, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&booking.id)
        .bind(&booking.vehicle_id)
        .bind(&booking.buyer_id)
        .bind(&booking.seller_id)
        .bind(&booking.bid_id)
        .bind(booking.final_price)
        .bind(&booking.status)
        .bind(&booking.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE vehicles SET status = 'sold' WHERE id = ?")
            .bind(vehicle_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE bids SET status = 'accepted' WHERE id = ?")
            .bind(&winner.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE bids SET status = 'rejected' WHERE vehicle_id = ? AND status = 'pending'",
        )
        .bind(vehicle_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        // The vehicle is terminal once sold; drop its lock entry so the map
        // does not grow with every sale. Waiters already holding the Arc
        // still resolve and then fail the status check.
        self.vehicle_locks.remove(vehicle_id);

        tracing::info!(
            vehicle_id = %vehicle_id,
            booking_id = %booking.id,
            final_price = booking.final_price,
            "Booking confirmed"
        );

        self.events.publish(MarketEvent::BookingConfirmed {
            vehicle_id: vehicle_id.to_string(),
            booking_id: booking.id.clone(),
        });

        Ok(booking)
    }

    /// Pending bids for a vehicle, highest first. Read path, no side effects.
    /// Accepted and rejected bids are only visible through booking views.
    pub async fn list_bids(&self, vehicle_id: &str) -> Result<Vec<Bid>, BidError> {
        let bids = sqlx::query_as(
            "SELECT * FROM bids WHERE vehicle_id = ? AND status = 'pending'
             ORDER BY amount DESC",
        )
        .bind(vehicle_id)
        .fetch_all(&self.db)
        .await?;
        Ok(bids)
    }
}
