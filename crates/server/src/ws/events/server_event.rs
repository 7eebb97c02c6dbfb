use serde::Serialize;

/// A connected collaborator as the rest of the room sees them.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    pub client_id: u64,
    pub user_id: String,
    pub name: String,
    pub color: String,
}

// ── Server → Client Events ──

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Ready {
        #[serde(rename = "self")]
        me: Peer,
        version: i64,
        document: serde_json::Map<String, serde_json::Value>,
        others: Vec<Peer>,
    },
    UserJoined {
        user: Peer,
    },
    UserLeft {
        #[serde(rename = "clientId")]
        client_id: u64,
        #[serde(rename = "userId")]
        user_id: String,
    },
    Update {
        version: i64,
        put: Vec<serde_json::Value>,
        remove: Vec<String>,
        #[serde(rename = "userId")]
        user_id: String,
    },
    Presence {
        #[serde(rename = "clientId")]
        client_id: u64,
        #[serde(rename = "userId")]
        user_id: String,
        cursor: serde_json::Value,
    },
    Pong,
    Error {
        message: String,
    },
}
