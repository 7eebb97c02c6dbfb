mod broadcast;
mod persist;

pub use persist::{load_document, save_document};

use rand::Rng;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use crate::ws::events::{Peer, ServerEvent};

pub type ClientId = u64;

/// Shared record map: record id -> record.
pub type Document = Map<String, Value>;

pub struct RoomClient {
    pub peer: Peer,
    pub tx: mpsc::UnboundedSender<String>,
}

/// One campaign's live board.
pub struct Room {
    pub clients: HashMap<ClientId, RoomClient>,
    pub document: Document,
    pub version: i64,
    /// Holds changes not yet written to the database.
    pub dirty: bool,
}

/// The change a client update actually makes once no-ops are dropped.
#[derive(Debug, Default, PartialEq)]
pub struct Changes {
    pub put: Vec<Value>,
    pub remove: Vec<String>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.put.is_empty() && self.remove.is_empty()
    }
}

/// Apply puts and removals to a document, keeping only those that change it.
///
/// Records without a string `id` are skipped. Later puts of the same id win.
pub fn apply_changes(document: &mut Document, put: Vec<Value>, remove: Vec<String>) -> Changes {
    let mut changes = Changes::default();

    for record in put {
        let id = match record.get("id").and_then(Value::as_str) {
            Some(id) if record.is_object() => id.to_string(),
            _ => continue,
        };
        if document.get(&id) == Some(&record) {
            continue;
        }
        changes.put.retain(|r| r.get("id").and_then(Value::as_str) != Some(id.as_str()));
        changes.remove.retain(|r| r != &id);
        document.insert(id, record.clone());
        changes.put.push(record);
    }

    for id in remove {
        if document.remove(&id).is_some() {
            changes
                .put
                .retain(|r| r.get("id").and_then(Value::as_str) != Some(id.as_str()));
            changes.remove.push(id);
        }
    }

    changes
}

fn random_color() -> String {
    format!("#{:06x}", rand::thread_rng().gen_range(0..0x100_0000u32))
}

pub struct WhiteboardGateway {
    db: SqlitePool,
    save_debounce: Duration,
    next_id: RwLock<u64>,
    pub rooms: RwLock<HashMap<String, Room>>,
    pub save_timers: RwLock<HashMap<String, tokio::task::JoinHandle<()>>>,
}

impl WhiteboardGateway {
    pub fn new(db: SqlitePool, save_debounce: Duration) -> Self {
        Self {
            db,
            save_debounce,
            next_id: RwLock::new(1),
            rooms: RwLock::new(HashMap::new()),
            save_timers: RwLock::new(HashMap::new()),
        }
    }

    pub async fn next_client_id(&self) -> ClientId {
        let mut id = self.next_id.write().await;
        let current = *id;
        *id += 1;
        current
    }

    /// Add a socket to the campaign's room, loading the board on first join.
    ///
    /// The joiner gets `ready`; everyone else gets `user_joined`.
    pub async fn join(
        &self,
        campaign_id: &str,
        user_id: &str,
        name: &str,
        tx: mpsc::UnboundedSender<String>,
    ) -> Result<Peer, sqlx::Error> {
        let mut loaded = if self.rooms.read().await.contains_key(campaign_id) {
            None
        } else {
            Some(load_document(&self.db, campaign_id).await?)
        };

        let mut rooms = self.rooms.write().await;
        // The room may have closed between the check and the write lock
        if loaded.is_none() && !rooms.contains_key(campaign_id) {
            drop(rooms);
            loaded = Some(load_document(&self.db, campaign_id).await?);
            rooms = self.rooms.write().await;
        }

        let client_id = self.next_client_id().await;
        let name = match name.trim() {
            "" => "Anonymous".to_string(),
            n => n.to_string(),
        };
        let peer = Peer {
            client_id,
            user_id: user_id.to_string(),
            name,
            color: random_color(),
        };

        let room = rooms.entry(campaign_id.to_string()).or_insert_with(|| {
            let (document, version) = loaded.unwrap_or_default();
            tracing::debug!("Opened whiteboard room {}", campaign_id);
            Room {
                clients: HashMap::new(),
                document,
                version,
                dirty: false,
            }
        });

        let ready = ServerEvent::Ready {
            me: peer.clone(),
            version: room.version,
            document: room.document.clone(),
            others: room.clients.values().map(|c| c.peer.clone()).collect(),
        };
        broadcast::send_event(&tx, &ready);
        broadcast::to_room(room, &ServerEvent::UserJoined { user: peer.clone() }, None);

        room.clients.insert(client_id, RoomClient {
            peer: peer.clone(),
            tx,
        });

        Ok(peer)
    }

    /// Remove a socket. The last one out flushes the board and closes the room.
    pub async fn leave(&self, campaign_id: &str, client_id: ClientId) {
        let mut rooms = self.rooms.write().await;
        self.remove_clients(&mut rooms, campaign_id, |id, _| id == client_id)
            .await;
    }

    /// Disconnect every socket a user has open on a campaign's board. Their
    /// senders are dropped, so the socket closes with code 4403.
    pub async fn kick_user(&self, campaign_id: &str, user_id: &str) {
        let mut rooms = self.rooms.write().await;
        let removed = self
            .remove_clients(&mut rooms, campaign_id, |_, peer| peer.user_id == user_id)
            .await;
        if removed > 0 {
            tracing::info!("Kicked user {} from whiteboard {}", user_id, campaign_id);
        }
    }

    /// `kick_user` across every open board.
    pub async fn kick_user_everywhere(&self, user_id: &str) {
        let mut rooms = self.rooms.write().await;
        let open: Vec<String> = rooms.keys().cloned().collect();
        for campaign_id in open {
            self.remove_clients(&mut rooms, &campaign_id, |_, peer| peer.user_id == user_id)
                .await;
        }
    }

    async fn remove_clients<F>(
        &self,
        rooms: &mut HashMap<String, Room>,
        campaign_id: &str,
        matches: F,
    ) -> usize
    where
        F: Fn(ClientId, &Peer) -> bool,
    {
        let Some(room) = rooms.get_mut(campaign_id) else {
            return 0;
        };
        let gone: Vec<ClientId> = room
            .clients
            .iter()
            .filter(|(id, client)| matches(**id, &client.peer))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &gone {
            let Some(client) = room.clients.remove(client_id) else {
                continue;
            };
            broadcast::to_room(
                room,
                &ServerEvent::UserLeft {
                    client_id: *client_id,
                    user_id: client.peer.user_id,
                },
                None,
            );
        }

        if gone.is_empty() || !room.clients.is_empty() {
            return gone.len();
        }

        // Save under the lock so a concurrent join can't load a stale board
        self.cancel_save(campaign_id).await;
        if room.dirty {
            self.persist(campaign_id, &room.document, room.version).await;
        }
        rooms.remove(campaign_id);
        tracing::debug!("Closed whiteboard room {}", campaign_id);
        gone.len()
    }

    /// Apply a client's update and relay the effective part to the rest of
    /// the room. Returns the new version, or `None` when nothing changed.
    pub async fn apply_update(
        self: &Arc<Self>,
        campaign_id: &str,
        client_id: ClientId,
        put: Vec<Value>,
        remove: Vec<String>,
    ) -> Option<i64> {
        let version = {
            let mut rooms = self.rooms.write().await;
            let room = rooms.get_mut(campaign_id)?;
            let user_id = room.clients.get(&client_id)?.peer.user_id.clone();

            let changes = apply_changes(&mut room.document, put, remove);
            if changes.is_empty() {
                return None;
            }

            room.version += 1;
            room.dirty = true;
            let event = ServerEvent::Update {
                version: room.version,
                put: changes.put,
                remove: changes.remove,
                user_id,
            };
            broadcast::to_room(room, &event, Some(client_id));
            room.version
        };

        self.schedule_save(campaign_id.to_string()).await;
        Some(version)
    }

    /// Relay a cursor position to everyone else in the room.
    pub async fn relay_presence(&self, campaign_id: &str, client_id: ClientId, cursor: Value) {
        let rooms = self.rooms.read().await;
        let Some(room) = rooms.get(campaign_id) else {
            return;
        };
        let Some(client) = room.clients.get(&client_id) else {
            return;
        };
        let event = ServerEvent::Presence {
            client_id,
            user_id: client.peer.user_id.clone(),
            cursor,
        };
        broadcast::to_room(room, &event, Some(client_id));
    }

    pub async fn send_to(&self, campaign_id: &str, client_id: ClientId, event: &ServerEvent) {
        let rooms = self.rooms.read().await;
        if let Some(client) = rooms
            .get(campaign_id)
            .and_then(|room| room.clients.get(&client_id))
        {
            broadcast::send_event(&client.tx, event);
        }
    }

    /// Live board state, if the room is open.
    pub async fn snapshot(&self, campaign_id: &str) -> Option<(Document, i64)> {
        let rooms = self.rooms.read().await;
        rooms
            .get(campaign_id)
            .map(|room| (room.document.clone(), room.version))
    }

    pub async fn connected_count(&self, campaign_id: &str) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(campaign_id).map_or(0, |room| room.clients.len())
    }

    /// Debounced save: a newer change cancels and reschedules the pending one.
    pub async fn schedule_save(self: &Arc<Self>, campaign_id: String) {
        let mut timers = self.save_timers.write().await;
        if let Some(handle) = timers.remove(&campaign_id) {
            handle.abort();
        }
        let gw = Arc::clone(self);
        let cid = campaign_id.clone();
        let delay = self.save_debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            gw.save_timers.write().await.remove(&cid);
            gw.save_room(&cid).await;
        });
        timers.insert(campaign_id, handle);
    }

    async fn cancel_save(&self, campaign_id: &str) {
        let mut timers = self.save_timers.write().await;
        if let Some(handle) = timers.remove(campaign_id) {
            handle.abort();
        }
    }

    /// Write an open room to the database if it has unsaved changes.
    pub async fn save_room(&self, campaign_id: &str) {
        let snapshot = {
            let mut rooms = self.rooms.write().await;
            match rooms.get_mut(campaign_id) {
                Some(room) if room.dirty => {
                    room.dirty = false;
                    Some((room.document.clone(), room.version))
                }
                _ => None,
            }
        };

        if let Some((document, version)) = snapshot {
            if !self.persist(campaign_id, &document, version).await {
                if let Some(room) = self.rooms.write().await.get_mut(campaign_id) {
                    room.dirty = true;
                }
            }
        }
    }

    async fn persist(&self, campaign_id: &str, document: &Document, version: i64) -> bool {
        match save_document(&self.db, campaign_id, document, version).await {
            Ok(()) => {
                tracing::debug!("Saved whiteboard {} at version {}", campaign_id, version);
                true
            }
            Err(e) => {
                tracing::error!("Failed to save whiteboard {}: {}", campaign_id, e);
                false
            }
        }
    }

    /// Save every room with pending changes. Called on shutdown.
    pub async fn flush_all(&self) {
        for (_, handle) in self.save_timers.write().await.drain() {
            handle.abort();
        }
        let pending: Vec<String> = self.rooms.read().await.keys().cloned().collect();

        for campaign_id in pending {
            self.save_room(&campaign_id).await;
        }
        tracing::info!("Whiteboards flushed");
    }

    /// Drop a room without saving, disconnecting its sockets. Used when the
    /// campaign itself is being deleted.
    pub async fn discard_room(&self, campaign_id: &str) {
        self.cancel_save(campaign_id).await;
        if self.rooms.write().await.remove(campaign_id).is_some() {
            tracing::info!("Discarded whiteboard room {}", campaign_id);
        }
    }
}
