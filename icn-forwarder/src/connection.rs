use std::sync::Arc;

use icn_common::ConnectionId;
use icn_core::Message;

/// Transport side of the forwarder.
///
/// Implementations own the actual faces; the processor only asks them
/// to emit messages and to report liveness.
pub trait ConnectionTable: Send + Sync {
    /// Queue `message` on `connection`. Returns false if it could not be sent.
    fn send(&self, connection: ConnectionId, message: &Arc<Message>) -> bool;

    /// Whether `connection` exists and can carry traffic
    fn is_up(&self, connection: ConnectionId) -> bool;

    /// Local connections (applications on this host) are exempt from
    /// hop-limit checks
    fn is_local(&self, connection: ConnectionId) -> bool;
}
