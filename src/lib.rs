//! Stock and price monitor for One Piece TCG booster displays on French storefronts

pub mod config;
pub mod database;
pub mod fetcher;
pub mod models;
pub mod monitor;
pub mod normalize;
pub mod scrapers;
pub mod traits;

pub use database::Database;
pub use monitor::{StockMonitor, TriggerError};
pub use scrapers::AdapterRegistry;
