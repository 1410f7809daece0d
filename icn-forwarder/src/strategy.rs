use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use icn_common::{ConnectionId, NumberSet, Ticks};
use icn_core::Message;

use crate::fib::Route;

/// Smoothing weight for the load balancer's pending-interest average
const LOAD_BALANCER_ALPHA: f64 = 0.9;

/// Available forwarding strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// One uniformly random next hop per Interest
    #[default]
    Random,
    /// Next hops in turn
    RoundRobin,
    /// Random next hop weighted by outstanding Interests
    LoadBalancer,
    /// Every next hop
    Multicast,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Random => "random",
            StrategyKind::RoundRobin => "round_robin",
            StrategyKind::LoadBalancer => "load_balancer",
            StrategyKind::Multicast => "multicast",
        }
    }

    /// Fresh strategy instance with no next hops
    pub fn create(self) -> Box<dyn ForwardingStrategy> {
        match self {
            StrategyKind::Random => Box::new(RandomStrategy::default()),
            StrategyKind::RoundRobin => Box::new(RoundRobinStrategy::default()),
            StrategyKind::LoadBalancer => Box::new(LoadBalancerStrategy::default()),
            StrategyKind::Multicast => Box::new(MulticastStrategy::default()),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown forwarding strategy: {0}")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(StrategyKind::Random),
            "round_robin" | "roundrobin" => Ok(StrategyKind::RoundRobin),
            "load_balancer" | "loadbalancer" => Ok(StrategyKind::LoadBalancer),
            "multicast" | "all" => Ok(StrategyKind::Multicast),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}

/// Per-prefix forwarding decision logic.
///
/// A strategy owns the next-hop set of its FIB entry. The processor
/// passes the subset of next hops that are usable for a given Interest
/// (up, and not the Interest's ingress) and the strategy chooses among
/// them.
pub trait ForwardingStrategy: Send + fmt::Debug {
    fn kind(&self) -> StrategyKind;

    fn add_nexthop(&mut self, route: &Route);

    /// Returns false if the connection was not a next hop
    fn remove_nexthop(&mut self, connection: ConnectionId) -> bool;

    fn nexthops(&self) -> &NumberSet;

    /// Choose where to send `interest`; the result is a subset of `candidates`
    fn lookup_nexthops(&mut self, interest: &Message, candidates: &NumberSet) -> NumberSet;

    /// The Interest was sent on `sent`, none of which already held it
    /// in the PIT entry's egress set
    fn on_forwarded(&mut self, _sent: &NumberSet) {}

    /// A content object came back over `egress` after `rtt` ticks
    fn receive_object(&mut self, _egress: &NumberSet, _rtt: Ticks) {}

    /// The Interest sent over `egress` expired unanswered
    fn on_timeout(&mut self, _egress: &NumberSet) {}

    fn nexthop_count(&self) -> usize {
        self.nexthops().len()
    }

    /// Interests outstanding on `connection`, for strategies that count them
    fn outstanding(&self, _connection: ConnectionId) -> u32 {
        0
    }
}

fn pick_random(candidates: &NumberSet) -> NumberSet {
    let mut chosen = NumberSet::new();
    if candidates.is_empty() {
        return chosen;
    }
    let index = rand::thread_rng().gen_range(0..candidates.len());
    if let Some(id) = candidates.get(index) {
        chosen.add(id);
    }
    chosen
}

#[derive(Debug, Default)]
pub struct RandomStrategy {
    nexthops: NumberSet,
}

impl ForwardingStrategy for RandomStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Random
    }

    fn add_nexthop(&mut self, route: &Route) {
        self.nexthops.add(route.connection_id);
    }

    fn remove_nexthop(&mut self, connection: ConnectionId) -> bool {
        self.nexthops.remove(connection)
    }

    fn nexthops(&self) -> &NumberSet {
        &self.nexthops
    }

    fn lookup_nexthops(&mut self, _interest: &Message, candidates: &NumberSet) -> NumberSet {
        pick_random(candidates)
    }
}

#[derive(Debug, Default)]
pub struct RoundRobinStrategy {
    nexthops: NumberSet,
    cursor: usize,
}

impl ForwardingStrategy for RoundRobinStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RoundRobin
    }

    fn add_nexthop(&mut self, route: &Route) {
        self.nexthops.add(route.connection_id);
    }

    fn remove_nexthop(&mut self, connection: ConnectionId) -> bool {
        self.nexthops.remove(connection)
    }

    fn nexthops(&self) -> &NumberSet {
        &self.nexthops
    }

    fn lookup_nexthops(&mut self, _interest: &Message, candidates: &NumberSet) -> NumberSet {
        let mut chosen = NumberSet::new();
        let count = self.nexthops.len();
        for step in 0..count {
            let index = (self.cursor + step) % count;
            if let Some(id) = self.nexthops.get(index) {
                if candidates.contains(id) {
                    chosen.add(id);
                    self.cursor = (index + 1) % count;
                    break;
                }
            }
        }
        chosen
    }
}

/// Pending-interest bookkeeping for one next hop
#[derive(Debug, Clone)]
struct NexthopState {
    pending: u32,
    average_pending: f64,
    weight: f64,
}

impl Default for NexthopState {
    fn default() -> Self {
        Self {
            pending: 0,
            average_pending: 0.0,
            weight: 1.0,
        }
    }
}

impl NexthopState {
    fn update(&mut self, forwarded: bool) {
        if forwarded {
            self.pending += 1;
        } else {
            self.pending = self.pending.saturating_sub(1);
        }
        self.average_pending = self.average_pending * LOAD_BALANCER_ALPHA
            + self.pending as f64 * (1.0 - LOAD_BALANCER_ALPHA);
        self.weight = 1.0 / (1.0 + self.average_pending);
    }
}

/// Weighted random choice favouring next hops with fewer Interests
/// in flight
#[derive(Debug, Default)]
pub struct LoadBalancerStrategy {
    nexthops: NumberSet,
    state: HashMap<ConnectionId, NexthopState>,
}

impl LoadBalancerStrategy {
    pub fn weight(&self, connection: ConnectionId) -> Option<f64> {
        self.state.get(&connection).map(|s| s.weight)
    }

    fn settle(&mut self, egress: &NumberSet) {
        for id in egress.iter() {
            if let Some(state) = self.state.get_mut(&id) {
                state.update(false);
            }
        }
    }
}

impl ForwardingStrategy for LoadBalancerStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LoadBalancer
    }

    fn add_nexthop(&mut self, route: &Route) {
        if self.nexthops.add(route.connection_id) {
            self.state.insert(route.connection_id, NexthopState::default());
        }
    }

    fn remove_nexthop(&mut self, connection: ConnectionId) -> bool {
        self.state.remove(&connection);
        self.nexthops.remove(connection)
    }

    fn nexthops(&self) -> &NumberSet {
        &self.nexthops
    }

    fn lookup_nexthops(&mut self, _interest: &Message, candidates: &NumberSet) -> NumberSet {
        let weighted: Vec<(ConnectionId, f64)> = candidates
            .iter()
            .filter_map(|id| self.state.get(&id).map(|s| (id, s.weight)))
            .collect();
        let total: f64 = weighted.iter().map(|(_, w)| w).sum();

        let mut chosen = NumberSet::new();
        if weighted.is_empty() || total <= 0.0 {
            return chosen;
        }

        let mut point = rand::thread_rng().gen_range(0.0..total);
        let mut selected = weighted[weighted.len() - 1].0;
        for (id, weight) in &weighted {
            if point < *weight {
                selected = *id;
                break;
            }
            point -= weight;
        }

        chosen.add(selected);
        chosen
    }

    fn on_forwarded(&mut self, sent: &NumberSet) {
        for id in sent.iter() {
            if let Some(state) = self.state.get_mut(&id) {
                state.update(true);
            }
        }
    }

    fn outstanding(&self, connection: ConnectionId) -> u32 {
        self.state.get(&connection).map_or(0, |s| s.pending)
    }

    fn receive_object(&mut self, egress: &NumberSet, _rtt: Ticks) {
        self.settle(egress);
    }

    fn on_timeout(&mut self, egress: &NumberSet) {
        self.settle(egress);
    }
}

#[derive(Debug, Default)]
pub struct MulticastStrategy {
    nexthops: NumberSet,
}

impl ForwardingStrategy for MulticastStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Multicast
    }

    fn add_nexthop(&mut self, route: &Route) {
        self.nexthops.add(route.connection_id);
    }

    fn remove_nexthop(&mut self, connection: ConnectionId) -> bool {
        self.nexthops.remove(connection)
    }

    fn nexthops(&self) -> &NumberSet {
        &self.nexthops
    }

    fn lookup_nexthops(&mut self, _interest: &Message, candidates: &NumberSet) -> NumberSet {
        candidates.clone()
    }
}
