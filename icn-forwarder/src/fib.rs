use std::collections::HashMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use icn_common::{ConnectionId, NumberSet, Ticks};
use icn_core::{Message, Name};

use crate::strategy::{ForwardingStrategy, StrategyKind};

/// Where a route came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOrigin {
    /// Configuration file
    #[default]
    Static,
    /// Runtime control command
    Control,
}

/// A route: prefix reachable through a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub prefix: Name,
    pub connection_id: ConnectionId,
    pub cost: u32,
    pub origin: RouteOrigin,
}

impl Route {
    pub fn new(prefix: Name, connection_id: ConnectionId) -> Self {
        Self {
            prefix,
            connection_id,
            cost: 1,
            origin: RouteOrigin::Static,
        }
    }

    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_origin(mut self, origin: RouteOrigin) -> Self {
        self.origin = origin;
        self
    }
}

/// What happens to a FIB entry whose last next hop disappears because
/// its connection closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyRoutePolicy {
    /// Leave the entry in place with no next hops
    #[default]
    Keep,
    /// Delete the entry
    Remove,
}

/// Next hop information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextHop {
    pub connection_id: ConnectionId,
    /// Cost metric for this next hop
    pub cost: u32,
    pub origin: RouteOrigin,
}

/// FIB entry metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FibMetrics {
    /// Number of Interests forwarded through this entry
    pub interests_forwarded: u64,
    /// Number of content objects that came back
    pub objects_received: u64,
    /// Number of timeouts
    pub timeouts: u64,
    /// Last round-trip time observed, in ticks
    pub last_rtt: Ticks,
}

/// One prefix, its strategy and its next hops
#[derive(Debug)]
pub struct FibEntry {
    prefix: Name,
    strategy: Box<dyn ForwardingStrategy>,
    next_hops: HashMap<ConnectionId, NextHop>,
    metrics: FibMetrics,
}

impl FibEntry {
    pub fn new(prefix: Name, kind: StrategyKind) -> Self {
        Self {
            prefix,
            strategy: kind.create(),
            next_hops: HashMap::new(),
            metrics: FibMetrics::default(),
        }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Swap the strategy, carrying the next hops over
    pub fn set_strategy(&mut self, kind: StrategyKind) {
        if self.strategy.kind() == kind {
            return;
        }
        let mut strategy = kind.create();
        for id in self.strategy.nexthops().iter() {
            if let Some(hop) = self.next_hops.get(&id) {
                strategy.add_nexthop(
                    &Route::new(self.prefix.clone(), id)
                        .with_cost(hop.cost)
                        .with_origin(hop.origin),
                );
            }
        }
        self.strategy = strategy;
    }

    pub fn add_route(&mut self, route: &Route) {
        self.strategy.add_nexthop(route);
        self.next_hops.insert(
            route.connection_id,
            NextHop {
                connection_id: route.connection_id,
                cost: route.cost,
                origin: route.origin,
            },
        );
    }

    pub fn remove_nexthop(&mut self, connection: ConnectionId) -> bool {
        self.next_hops.remove(&connection);
        self.strategy.remove_nexthop(connection)
    }

    pub fn nexthops(&self) -> &NumberSet {
        self.strategy.nexthops()
    }

    pub fn nexthop_count(&self) -> usize {
        self.strategy.nexthop_count()
    }

    /// Usable for an Interest arriving on `ingress`: some next hop
    /// leads somewhere other than back to the sender
    pub fn serves(&self, ingress: ConnectionId) -> bool {
        let hops = self.strategy.nexthops();
        hops.len() > 1 || (hops.len() == 1 && !hops.contains(ingress))
    }

    pub fn lookup_nexthops(&mut self, interest: &Message, candidates: &NumberSet) -> NumberSet {
        let chosen = self.strategy.lookup_nexthops(interest, candidates);
        if !chosen.is_empty() {
            self.metrics.interests_forwarded += 1;
        }
        chosen
    }

    /// Record hops the Interest was newly sent on
    pub fn forwarded(&mut self, sent: &NumberSet) {
        if !sent.is_empty() {
            self.strategy.on_forwarded(sent);
        }
    }

    pub fn outstanding(&self, connection: ConnectionId) -> u32 {
        self.strategy.outstanding(connection)
    }

    pub fn receive_object(&mut self, egress: &NumberSet, rtt: Ticks) {
        self.metrics.objects_received += 1;
        self.metrics.last_rtt = rtt;
        self.strategy.receive_object(egress, rtt);
    }

    pub fn on_timeout(&mut self, egress: &NumberSet) {
        self.metrics.timeouts += 1;
        self.strategy.on_timeout(egress);
    }

    pub fn metrics(&self) -> &FibMetrics {
        &self.metrics
    }

    pub fn info(&self) -> FibEntryInfo {
        FibEntryInfo {
            prefix: self.prefix.to_string(),
            strategy: self.strategy.kind(),
            next_hops: self
                .strategy
                .nexthops()
                .iter()
                .filter_map(|id| self.next_hops.get(&id).cloned())
                .collect(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Snapshot of one FIB entry for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FibEntryInfo {
    pub prefix: String,
    pub strategy: StrategyKind,
    pub next_hops: Vec<NextHop>,
    pub metrics: FibMetrics,
}

/// Forwarding Information Base (FIB) for ICN routing
#[derive(Debug, Default)]
pub struct ForwardingInformationBase {
    /// FIB entries indexed by name prefix
    entries: HashMap<Name, FibEntry>,
    empty_route_policy: EmptyRoutePolicy,
}

impl ForwardingInformationBase {
    pub fn new(empty_route_policy: EmptyRoutePolicy) -> Self {
        Self {
            entries: HashMap::new(),
            empty_route_policy,
        }
    }

    /// Add a next hop, creating the entry with `strategy` if needed.
    /// Adding an existing route updates its metadata in place.
    pub fn add_or_update(&mut self, route: &Route, strategy: StrategyKind) -> bool {
        let entry = self.entries.entry(route.prefix.clone()).or_insert_with(|| {
            info!(target: "processor", "Added FIB entry for prefix: {} ({})", route.prefix, strategy);
            FibEntry::new(route.prefix.clone(), strategy)
        });
        entry.add_route(route);
        debug!(
            target: "processor",
            "Route {} via {} cost {}",
            route.prefix, route.connection_id, route.cost
        );
        true
    }

    /// Remove one next hop. The entry goes away with its last next hop.
    /// Returns false if the prefix or the next hop was not present.
    pub fn remove(&mut self, route: &Route) -> bool {
        let Some(entry) = self.entries.get_mut(&route.prefix) else {
            return false;
        };
        if !entry.remove_nexthop(route.connection_id) {
            return false;
        }
        if entry.nexthop_count() == 0 {
            self.entries.remove(&route.prefix);
            info!(target: "processor", "Removed FIB entry for prefix: {}", route.prefix);
        }
        true
    }

    /// Purge a connection from every entry. Entries left empty are kept
    /// or deleted per the configured [`EmptyRoutePolicy`]. Returns the
    /// number of entries that referenced the connection.
    pub fn remove_connection_id_from_routes(&mut self, connection: ConnectionId) -> usize {
        let mut touched = 0;
        for entry in self.entries.values_mut() {
            if entry.remove_nexthop(connection) {
                touched += 1;
            }
        }
        if self.empty_route_policy == EmptyRoutePolicy::Remove {
            self.entries.retain(|prefix, entry| {
                let keep = entry.nexthop_count() > 0;
                if !keep {
                    info!(target: "processor", "Removed empty FIB entry for prefix: {}", prefix);
                }
                keep
            });
        }
        touched
    }

    /// Longest-prefix match for `interest`, skipping entries whose only
    /// next hop is the Interest's own ingress
    pub fn match_interest(&mut self, interest: &Message) -> Option<&mut FibEntry> {
        let name = interest.name()?;
        let ingress = interest.ingress();

        let best = (0..=name.len())
            .rev()
            .map(|len| name.prefix(len))
            .find(|prefix| {
                self.entries
                    .get(prefix)
                    .is_some_and(|entry| entry.serves(ingress))
            });

        match best {
            Some(prefix) => self.entries.get_mut(&prefix),
            None => {
                debug!(target: "processor", "FIB lookup for {}: no route found", name);
                None
            }
        }
    }

    /// Set the strategy of an existing prefix. Returns false if absent.
    pub fn set_strategy(&mut self, prefix: &Name, kind: StrategyKind) -> bool {
        match self.entries.get_mut(prefix) {
            Some(entry) => {
                entry.set_strategy(kind);
                info!(target: "processor", "Strategy for {} set to {}", prefix, kind);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, prefix: &Name) -> Option<&FibEntry> {
        self.entries.get(prefix)
    }

    pub fn get_mut(&mut self, prefix: &Name) -> Option<&mut FibEntry> {
        self.entries.get_mut(prefix)
    }

    /// All entries, ordered by prefix
    pub fn entries(&self) -> Vec<FibEntryInfo> {
        let mut prefixes: Vec<&Name> = self.entries.keys().collect();
        prefixes.sort();
        prefixes
            .into_iter()
            .filter_map(|prefix| self.entries.get(prefix).map(FibEntry::info))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
