use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use icn_common::{Clock, ConnectionId, NumberSet, PacketType, Ticks};
use icn_core::{Message, Name};

use crate::config::ForwarderConfig;
use crate::connection::ConnectionTable;
use crate::content_store::{ContentStore, ContentStoreStats, LruContentStore};
use crate::fib::{FibEntryInfo, ForwardingInformationBase, Route};
use crate::metrics::{ForwarderMetrics, MetricsSnapshot};
use crate::pit::{PendingInterestTable, PitEntry, PitStats, PitVerdict};
use crate::strategy::StrategyKind;
use crate::tap::{self, Tap, TapEvent};

/// Receiver of control messages, which the processor does not interpret
pub trait ControlHandler: Send {
    fn handle_control(&mut self, message: Arc<Message>);
}

/// Combined processor state for status reports
#[derive(Debug, Clone, Serialize)]
pub struct ProcessorStatus {
    pub metrics: MetricsSnapshot,
    pub pit: PitStats,
    pub content_store: ContentStoreStats,
    pub fib_entries: usize,
    pub cache_store: bool,
    pub cache_serve: bool,
}

/// Run-to-completion forwarding pipeline.
///
/// The processor exclusively owns the PIT, FIB and content store. Every
/// call runs on the caller's thread and finishes before returning, so
/// none of the tables need locking.
pub struct MessageProcessor {
    config: ForwarderConfig,
    clock: Arc<dyn Clock>,
    connections: Arc<dyn ConnectionTable>,
    metrics: Arc<ForwarderMetrics>,
    pit: PendingInterestTable,
    fib: ForwardingInformationBase,
    content_store: Box<dyn ContentStore>,
    /// Strategies chosen per prefix, applied when the FIB entry appears
    strategies: HashMap<Name, StrategyKind>,
    store_in_cache: bool,
    serve_from_cache: bool,
    tap: Option<Box<dyn Tap>>,
    control_handler: Option<Box<dyn ControlHandler>>,
}

impl MessageProcessor {
    pub fn new(
        config: ForwarderConfig,
        connections: Arc<dyn ConnectionTable>,
        clock: Arc<dyn Clock>,
        metrics: Arc<ForwarderMetrics>,
    ) -> Self {
        info!(
            target: "processor",
            "Message processor created (cache capacity {}, default strategy {})",
            config.content_store_capacity, config.default_strategy
        );
        Self {
            pit: PendingInterestTable::new(
                config.default_interest_lifetime_ms,
                config.max_interest_lifetime_ms,
            ),
            fib: ForwardingInformationBase::new(config.empty_route_policy),
            content_store: Box::new(LruContentStore::new(config.content_store_capacity)),
            strategies: HashMap::new(),
            store_in_cache: config.cache_store,
            serve_from_cache: config.cache_serve,
            tap: None,
            control_handler: None,
            config,
            clock,
            connections,
            metrics,
        }
    }

    /// Process one inbound message to completion
    pub fn receive(&mut self, message: Message) {
        self.metrics.received.increment();

        if let Err(e) = message.validate() {
            warn!(target: "message", "Dropping malformed message from {}: {}", message.ingress(), e);
            self.metrics.dropped_malformed.increment();
            self.drop_message(&message);
            return;
        }

        tap::notify(&mut self.tap, TapEvent::Receive, &message);

        match message.packet_type() {
            PacketType::Interest => self.receive_interest(message),
            PacketType::ContentObject => self.receive_content_object(message),
            PacketType::Control => self.receive_control(message),
        }
    }

    fn receive_interest(&mut self, mut message: Message) {
        self.metrics.interests_received.increment();

        if !self.check_ingress_hop_limit(&mut message) {
            self.drop_message(&message);
            return;
        }

        let interest = Arc::new(message);
        let now = self.clock.ticks();

        // Step 1: Check Content Store
        if self.serve_from_cache && self.satisfy_from_content_store(&interest, now) {
            return;
        }

        // Step 2: Check PIT
        match self.pit.receive_interest(&interest, now) {
            PitVerdict::Aggregate => {
                self.metrics.interests_aggregated.increment();
                return;
            }
            PitVerdict::Forward { timed_out } => {
                if let Some(entry) = timed_out {
                    self.notify_timeout(&entry);
                }
            }
        }

        // Step 3: FIB lookup and forwarding
        if self.forward_via_fib(&interest) {
            return;
        }

        debug!(target: "processor", "No route for {}", interest);
        self.metrics.dropped_no_route.increment();
        if self
            .pit
            .get_mut(&interest)
            .is_some_and(|entry| entry.egress.is_empty())
        {
            self.pit.remove_interest(&interest);
        }
        self.drop_message(&interest);
    }

    /// Apply hop-limit rules to an arriving Interest, decrementing the
    /// limit of Interests from remote peers
    fn check_ingress_hop_limit(&self, message: &mut Message) -> bool {
        let local = self.connections.is_local(message.ingress());
        match message.hop_limit() {
            None => {
                debug!(target: "processor", "Dropping {}: no hop limit", message);
                self.metrics.dropped_no_hop_limit.increment();
                false
            }
            Some(0) if !local => {
                debug!(target: "processor", "Dropping {}: zero hop limit from remote", message);
                self.metrics.dropped_zero_hop_limit_from_remote.increment();
                false
            }
            Some(_) => {
                if !local {
                    message.decrement_hop_limit();
                }
                true
            }
        }
    }

    fn satisfy_from_content_store(&mut self, interest: &Arc<Message>, now: Ticks) -> bool {
        let Some(object) = self.content_store.match_interest(interest, now) else {
            return false;
        };

        if let Some(required) = interest.key_id() {
            if object.key_id() != Some(required) || !object.key_id_verified() {
                debug!(target: "processor", "Cached object for {} fails KeyId restriction", interest);
                return false;
            }
        }

        debug!(target: "processor", "Satisfied {} from content store", interest);
        self.metrics.interests_satisfied_from_store.increment();
        self.forward_to_connection(interest.ingress(), &object);
        true
    }

    /// Send the Interest out the next hops chosen by the matching FIB
    /// entry's strategy. Returns false if it went nowhere.
    fn forward_via_fib(&mut self, interest: &Arc<Message>) -> bool {
        let ingress = interest.ingress();
        let connections = Arc::clone(&self.connections);

        let Some(fib_entry) = self.fib.match_interest(interest) else {
            return false;
        };

        let candidates: NumberSet = fib_entry
            .nexthops()
            .iter()
            .filter(|&id| id != ingress && connections.is_up(id))
            .collect();
        let chosen = fib_entry.lookup_nexthops(interest, &candidates);
        if chosen.is_empty() {
            return false;
        }
        let prefix = fib_entry.prefix().clone();

        let mut sent = NumberSet::with_capacity(chosen.len());
        for id in chosen.iter() {
            if self.forward_to_connection(id, interest) {
                sent.add(id);
            }
        }
        if sent.is_empty() {
            return false;
        }

        // Hops already in the egress set were counted on the first send
        let newly_sent: NumberSet = match self.pit.get_mut(interest) {
            Some(pit_entry) => {
                let newly_sent = sent.iter().filter(|&id| !pit_entry.egress.contains(id)).collect();
                pit_entry.fib_prefix = Some(prefix.clone());
                pit_entry.egress.add_set(&sent);
                newly_sent
            }
            None => NumberSet::new(),
        };
        if let Some(fib_entry) = self.fib.get_mut(&prefix) {
            fib_entry.forwarded(&newly_sent);
        }
        true
    }

    fn receive_content_object(&mut self, message: Message) {
        self.metrics.objects_received.increment();

        let object = Arc::new(message);
        let now = self.clock.ticks();

        let satisfied = self.pit.satisfy_interest(&object);
        if satisfied.is_empty() {
            debug!(target: "processor", "Dropping unsolicited {}", object);
            self.metrics.dropped_no_reverse_path.increment();
            self.drop_message(&object);
            return;
        }

        let mut reverse_path = NumberSet::new();
        for entry in &satisfied {
            let rtt = now.saturating_sub(entry.creation_time);
            if let Some(fib_entry) = entry
                .fib_prefix
                .as_ref()
                .and_then(|prefix| self.fib.get_mut(prefix))
            {
                fib_entry.receive_object(&entry.egress, rtt);
            }
            reverse_path.add_set(&entry.ingress);
        }

        if self.store_in_cache {
            self.content_store.put_content(Arc::clone(&object), now);
        }

        for id in reverse_path.iter() {
            if id == object.ingress() {
                continue;
            }
            self.forward_to_connection(id, &object);
        }
    }

    fn receive_control(&mut self, message: Message) {
        self.metrics.control_received.increment();
        match self.control_handler.as_mut() {
            Some(handler) => handler.handle_control(Arc::new(message)),
            None => {
                debug!(target: "processor", "No control handler for {}", message);
            }
        }
    }

    /// Emit `message` on one connection, applying egress hop-limit rules
    fn forward_to_connection(&mut self, connection: ConnectionId, message: &Arc<Message>) -> bool {
        if !self.connections.is_up(connection) {
            debug!(target: "io", "Connection {} not found for {}", connection, message);
            self.metrics.dropped_connection_not_found.increment();
            self.drop_message(message);
            return false;
        }

        if message.hop_limit() == Some(0) && !self.connections.is_local(connection) {
            debug!(target: "processor", "Not sending {} to remote {}: zero hop limit", message, connection);
            self.metrics.dropped_zero_hop_limit_to_remote.increment();
            self.drop_message(message);
            return false;
        }

        if !self.connections.send(connection, message) {
            warn!(target: "io", "Send of {} on connection {} failed", message, connection);
            self.metrics.send_failures.increment();
            self.drop_message(message);
            return false;
        }

        match message.packet_type() {
            PacketType::Interest => self.metrics.interests_forwarded.increment(),
            PacketType::ContentObject => self.metrics.objects_forwarded.increment(),
            PacketType::Control => {}
        }
        debug!(target: "processor", "Sent {} on connection {}", message, connection);
        tap::notify(&mut self.tap, TapEvent::Send, message);
        true
    }

    fn drop_message(&mut self, message: &Message) {
        self.metrics.dropped.increment();
        match message.packet_type() {
            PacketType::Interest => self.metrics.interests_dropped.increment(),
            PacketType::ContentObject => self.metrics.objects_dropped.increment(),
            PacketType::Control => {}
        }
        tap::notify(&mut self.tap, TapEvent::Drop, message);
    }

    fn notify_timeout(&mut self, entry: &PitEntry) {
        self.metrics.pit_timeouts.increment();
        if let Some(fib_entry) = entry
            .fib_prefix
            .as_ref()
            .and_then(|prefix| self.fib.get_mut(prefix))
        {
            fib_entry.on_timeout(&entry.egress);
        }
    }

    /// Remove expired PIT entries now instead of waiting for a lookup
    pub fn sweep_expired_interests(&mut self) -> usize {
        let now = self.clock.ticks();
        let expired = self.pit.sweep_expired(now);
        for entry in &expired {
            self.notify_timeout(entry);
        }
        if !expired.is_empty() {
            debug!(target: "processor", "Swept {} expired PIT entries", expired.len());
        }
        expired.len()
    }

    /// Add a route, or update it if it exists
    pub fn add_or_update_route(&mut self, route: &Route) -> bool {
        let strategy = self
            .strategies
            .get(&route.prefix)
            .copied()
            .unwrap_or(self.config.default_strategy);
        self.fib.add_or_update(route, strategy)
    }

    /// Remove a route's next hop. Returns false if there was no such route.
    pub fn remove_route(&mut self, route: &Route) -> bool {
        self.fib.remove(route)
    }

    /// Purge a connection from every FIB entry
    pub fn remove_connection_id_from_routes(&mut self, connection: ConnectionId) -> usize {
        self.fib.remove_connection_id_from_routes(connection)
    }

    /// Forget a closed connection in the FIB and the PIT
    pub fn remove_connection(&mut self, connection: ConnectionId) {
        let routes = self.fib.remove_connection_id_from_routes(connection);
        let interests = self.pit.remove_connection(connection);
        info!(
            target: "processor",
            "Connection {} removed from {} routes, {} pending interests dropped",
            connection, routes, interests
        );
    }

    /// Choose the strategy for `prefix`, now and for future routes
    pub fn set_strategy(&mut self, prefix: Name, kind: StrategyKind) {
        self.fib.set_strategy(&prefix, kind);
        self.strategies.insert(prefix, kind);
    }

    pub fn fib_entries(&self) -> Vec<FibEntryInfo> {
        self.fib.entries()
    }

    /// Replace the content store with an empty one of capacity `size`
    pub fn set_content_object_store_size(&mut self, size: usize) {
        info!(target: "processor", "Resizing content store to {} (cached content dropped)", size);
        self.config.content_store_capacity = size;
        self.content_store = Box::new(LruContentStore::new(size));
    }

    pub fn content_object_store(&self) -> &dyn ContentStore {
        self.content_store.as_ref()
    }

    pub fn clear_cache(&mut self) {
        info!(target: "processor", "Content store cleared");
        self.content_store = Box::new(LruContentStore::new(self.config.content_store_capacity));
    }

    pub fn set_cache_store_flag(&mut self, enabled: bool) {
        self.store_in_cache = enabled;
    }

    pub fn cache_store_flag(&self) -> bool {
        self.store_in_cache
    }

    pub fn set_cache_serve_flag(&mut self, enabled: bool) {
        self.serve_from_cache = enabled;
    }

    pub fn cache_serve_flag(&self) -> bool {
        self.serve_from_cache
    }

    /// Install a tap, returning the one it replaces
    pub fn add_tap(&mut self, tap: Box<dyn Tap>) -> Option<Box<dyn Tap>> {
        self.tap.replace(tap)
    }

    pub fn remove_tap(&mut self) -> Option<Box<dyn Tap>> {
        self.tap.take()
    }

    pub fn set_control_handler(&mut self, handler: Box<dyn ControlHandler>) {
        self.control_handler = Some(handler);
    }

    pub fn pit(&self) -> &PendingInterestTable {
        &self.pit
    }

    pub fn fib(&self) -> &ForwardingInformationBase {
        &self.fib
    }

    pub fn metrics(&self) -> &Arc<ForwarderMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    pub fn status(&self) -> ProcessorStatus {
        ProcessorStatus {
            metrics: self.metrics.snapshot(),
            pit: self.pit.stats(),
            content_store: self.content_store.stats(),
            fib_entries: self.fib.len(),
            cache_store: self.store_in_cache,
            cache_serve: self.serve_from_cache,
        }
    }
}
