//! Storefront back-office core: orders with stock reservation, invoice
//! request review, and VNPay payment reconciliation behind an axum API.

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod invoicing;
pub mod models;
pub mod orders;
pub mod payments;
pub mod routes;
pub mod store;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use routes::create_router;

/// Application state shared with every route handler.
#[derive(Clone)]
pub struct AppState {
    /// Transactional persistence (Postgres or in-memory)
    pub store: Arc<dyn store::Store>,

    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn store::Store>, config: AppConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}
