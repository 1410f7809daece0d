use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::{debug, info, warn};
use tokio::sync::mpsc;

use icn_common::ConnectionId;
use icn_core::Message;
use icn_forwarder::ConnectionTable;

/// Outbound half of an in-process connection
#[derive(Debug)]
struct LocalConnection {
    name: Option<String>,
    local: bool,
    tx: mpsc::UnboundedSender<Arc<Message>>,
}

/// In-memory connections. Each one is an unbounded channel whose
/// receiver belongs to whoever registered it.
#[derive(Debug, Default)]
pub struct LocalConnectionTable {
    connections: RwLock<HashMap<ConnectionId, LocalConnection>>,
}

impl LocalConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create connection `id`, replacing any previous one with that id.
    /// Messages the forwarder sends on it arrive on the returned receiver.
    pub fn register(
        &self,
        id: ConnectionId,
        local: bool,
        name: Option<String>,
    ) -> mpsc::UnboundedReceiver<Arc<Message>> {
        let (tx, rx) = mpsc::unbounded_channel();
        info!(
            "Connection {} ({}) registered{}",
            id,
            if local { "local" } else { "remote" },
            name.as_deref().map(|n| format!(" as {}", n)).unwrap_or_default()
        );

        let connection = LocalConnection { name, local, tx };
        match self.connections.write() {
            Ok(mut connections) => {
                if connections.insert(id, connection).is_some() {
                    warn!("Connection {} replaced", id);
                }
            }
            Err(e) => warn!("Connection table lock poisoned: {}", e),
        }
        rx
    }

    /// Forget connection `id`. Returns false if it did not exist.
    pub fn close(&self, id: ConnectionId) -> bool {
        let removed = self
            .connections
            .write()
            .map(|mut connections| connections.remove(&id))
            .ok()
            .flatten();
        match removed {
            Some(connection) => {
                info!(
                    "Connection {} closed{}",
                    id,
                    connection.name.map(|n| format!(" ({})", n)).unwrap_or_default()
                );
                true
            }
            None => false,
        }
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .connections
            .read()
            .map(|connections| connections.keys().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.connections.read().map(|c| c.len()).unwrap_or(0)
    }
}

impl ConnectionTable for LocalConnectionTable {
    fn send(&self, connection: ConnectionId, message: &Arc<Message>) -> bool {
        let Ok(connections) = self.connections.read() else {
            return false;
        };
        match connections.get(&connection) {
            Some(entry) => {
                let sent = entry.tx.send(Arc::clone(message)).is_ok();
                if !sent {
                    debug!("Connection {} receiver is gone", connection);
                }
                sent
            }
            None => false,
        }
    }

    fn is_up(&self, connection: ConnectionId) -> bool {
        self.connections
            .read()
            .map(|connections| {
                connections
                    .get(&connection)
                    .is_some_and(|entry| !entry.tx.is_closed())
            })
            .unwrap_or(false)
    }

    fn is_local(&self, connection: ConnectionId) -> bool {
        self.connections
            .read()
            .map(|connections| connections.get(&connection).is_some_and(|entry| entry.local))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icn_core::Name;

    #[test]
    fn test_send_and_receive() {
        let table = LocalConnectionTable::new();
        let mut rx = table.register(5, true, Some("app".to_string()));

        let message = Arc::new(Message::interest(Name::parse("/a").unwrap()));
        assert!(table.send(5, &message));
        assert!(!table.send(6, &message));

        let received = rx.try_recv().unwrap();
        assert!(Arc::ptr_eq(&received, &message));
    }

    #[test]
    fn test_liveness_and_locality() {
        let table = LocalConnectionTable::new();
        let rx = table.register(1, false, None);
        let _app = table.register(2, true, None);

        assert!(table.is_up(1));
        assert!(!table.is_local(1));
        assert!(table.is_local(2));
        assert_eq!(table.ids(), vec![1, 2]);

        drop(rx);
        assert!(!table.is_up(1));

        assert!(table.close(2));
        assert!(!table.close(2));
        assert!(!table.is_up(2));
        assert_eq!(table.len(), 1);
    }
}
