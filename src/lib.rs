pub mod api;
pub mod bidding;
pub mod config;
pub mod db;
pub mod notifications;

pub use db::DbPool;

use std::path::PathBuf;

use bidding::BiddingEngine;
use config::Config;
use notifications::EventBroadcaster;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub events: EventBroadcaster,
    pub bidding: BiddingEngine,
    pub uploads_dir: PathBuf,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let events = EventBroadcaster::new();
        let bidding = BiddingEngine::new(db.clone(), events.clone());
        let uploads_dir = config.server.data_dir.join("uploads");
        Self {
            config,
            db,
            events,
            bidding,
            uploads_dir,
        }
    }
}
