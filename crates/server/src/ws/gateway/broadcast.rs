use tokio::sync::mpsc;

use super::{ClientId, Room};
use crate::ws::events::ServerEvent;

pub fn send_event(tx: &mpsc::UnboundedSender<String>, event: &ServerEvent) {
    let msg = match serde_json::to_string(event) {
        Ok(m) => m,
        Err(_) => return,
    };
    let _ = tx.send(msg);
}

pub fn to_room(room: &Room, event: &ServerEvent, exclude: Option<ClientId>) {
    let msg = match serde_json::to_string(event) {
        Ok(m) => m,
        Err(_) => return,
    };

    for (&cid, client) in room.clients.iter() {
        if Some(cid) == exclude {
            continue;
        }
        let _ = client.tx.send(msg.clone());
    }
}
