pub mod config;
pub mod db;
pub mod dice;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod ws;

use config::Config;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub whiteboard: Arc<ws::gateway::WhiteboardGateway>,
    /// OAuth `state` nonce -> issued at
    pub oauth_pending: tokio::sync::RwLock<HashMap<String, Instant>>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(db: sqlx::SqlitePool, config: Config) -> Self {
        let whiteboard = Arc::new(ws::gateway::WhiteboardGateway::new(
            db.clone(),
            std::time::Duration::from_millis(config.whiteboard_save_debounce_ms),
        ));
        Self {
            db,
            config,
            whiteboard,
            oauth_pending: tokio::sync::RwLock::new(HashMap::new()),
            http: reqwest::Client::new(),
        }
    }
}
