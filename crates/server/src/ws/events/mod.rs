mod server_event;

pub use server_event::{Peer, ServerEvent};

use serde::Deserialize;

// ── Client → Server Events ──

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Records to upsert (objects carrying a string `id`) and ids to delete.
    Update {
        #[serde(default)]
        put: Vec<serde_json::Value>,
        #[serde(default)]
        remove: Vec<String>,
    },
    Presence {
        #[serde(default)]
        cursor: serde_json::Value,
    },
    Ping,
}
