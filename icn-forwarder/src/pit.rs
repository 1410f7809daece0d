use std::sync::Arc;

use log::debug;
use serde::Serialize;

use icn_common::{ConnectionId, NumberSet, Ticks};
use icn_core::{Message, Name};

use crate::matching_rules::MatchingRulesTable;

/// One Interest waiting for a content object
#[derive(Debug, Clone)]
pub struct PitEntry {
    /// The first Interest that created the entry
    pub interest: Arc<Message>,
    /// Reverse path: connections that asked for this content
    pub ingress: NumberSet,
    /// Forward path: connections the Interest went out on
    pub egress: NumberSet,
    pub creation_time: Ticks,
    pub expiry_time: Ticks,
    /// Prefix of the FIB entry that forwarded the Interest
    pub fib_prefix: Option<Name>,
}

impl PitEntry {
    pub fn is_expired(&self, now: Ticks) -> bool {
        self.expiry_time <= now
    }
}

/// Outcome of offering an Interest to the PIT
#[derive(Debug)]
pub enum PitVerdict {
    /// A live entry already covers the Interest from another connection;
    /// it has been recorded as an extra reverse path and must not go out
    Aggregate,
    /// The Interest must be forwarded. `timed_out` carries a previous
    /// entry for the same selectors that had expired and was replaced.
    Forward { timed_out: Option<PitEntry> },
}

/// PIT counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PitStats {
    pub entries: usize,
    pub created: u64,
    pub aggregated: u64,
    pub retransmissions: u64,
    pub satisfied: u64,
    pub expired: u64,
}

/// Pending Interest Table.
///
/// Expiry is lazy: a dead entry stays until a lookup for the same
/// selectors or a call to [`PendingInterestTable::sweep_expired`]
/// removes it. Until then it still answers content objects.
#[derive(Debug)]
pub struct PendingInterestTable {
    table: MatchingRulesTable<PitEntry>,
    default_lifetime: Ticks,
    max_lifetime: Ticks,
    stats: PitStats,
}

impl PendingInterestTable {
    pub fn new(default_lifetime: Ticks, max_lifetime: Ticks) -> Self {
        Self {
            table: MatchingRulesTable::new(),
            default_lifetime,
            max_lifetime: max_lifetime.max(1),
            stats: PitStats::default(),
        }
    }

    /// Lifetime in ticks for `interest`, clamped to the table maximum
    pub fn lifetime_of(&self, interest: &Message) -> Ticks {
        interest
            .interest_lifetime_ms()
            .unwrap_or(self.default_lifetime)
            .clamp(1, self.max_lifetime)
    }

    fn new_entry(&self, interest: &Arc<Message>, now: Ticks) -> PitEntry {
        let mut ingress = NumberSet::new();
        ingress.add(interest.ingress());
        PitEntry {
            interest: Arc::clone(interest),
            ingress,
            egress: NumberSet::new(),
            creation_time: now,
            expiry_time: now + self.lifetime_of(interest),
            fib_prefix: None,
        }
    }

    /// Record `interest` and decide whether it should be forwarded.
    ///
    /// The same connection asking again is a retransmission and is
    /// forwarded again. A different connection is aggregated.
    pub fn receive_interest(&mut self, interest: &Arc<Message>, now: Ticks) -> PitVerdict {
        let lifetime = self.lifetime_of(interest);
        let ingress = interest.ingress();

        let mut timed_out = None;
        if let Some(entry) = self.table.get_exact_mut(interest) {
            if !entry.is_expired(now) {
                entry.expiry_time = entry.expiry_time.max(now + lifetime);
                if entry.ingress.contains(ingress) {
                    self.stats.retransmissions += 1;
                    debug!(target: "processor", "Retransmission of {} from {}", interest, ingress);
                    return PitVerdict::Forward { timed_out: None };
                }
                entry.ingress.add(ingress);
                self.stats.aggregated += 1;
                debug!(target: "processor", "Aggregated {} (ingress {})", interest, entry.ingress);
                return PitVerdict::Aggregate;
            }
            timed_out = self.table.remove_from_best(interest);
            self.stats.expired += 1;
        }

        let entry = self.new_entry(interest, now);
        self.table.add_to_best_table(interest, entry);
        self.stats.created += 1;
        PitVerdict::Forward { timed_out }
    }

    /// Remove and return every entry `object` satisfies.
    ///
    /// Entries are matched across all three tables, so one object can
    /// answer a name-only Interest and a hash-restricted one at once.
    pub fn satisfy_interest(&mut self, object: &Message) -> Vec<PitEntry> {
        let rules: Vec<_> = self
            .table
            .get_union(object)
            .into_iter()
            .map(|(rule, _)| rule)
            .collect();

        let satisfied: Vec<PitEntry> = rules
            .into_iter()
            .filter_map(|rule| self.table.remove_from(rule, object))
            .collect();
        self.stats.satisfied += satisfied.len() as u64;
        satisfied
    }

    pub fn get(&self, interest: &Message) -> Option<&PitEntry> {
        self.table.get(interest)
    }

    /// Entry keyed by exactly the selectors of `interest`
    pub fn get_mut(&mut self, interest: &Message) -> Option<&mut PitEntry> {
        self.table.get_exact_mut(interest)
    }

    pub fn remove_interest(&mut self, interest: &Message) -> Option<PitEntry> {
        self.table.remove_from_best(interest)
    }

    /// Drop every expired entry, returning them for timeout accounting
    pub fn sweep_expired(&mut self, now: Ticks) -> Vec<PitEntry> {
        let mut expired = Vec::new();
        self.table.retain(|entry| {
            if entry.is_expired(now) {
                expired.push(entry.clone());
                false
            } else {
                true
            }
        });
        self.stats.expired += expired.len() as u64;
        expired
    }

    /// Forget a closed connection. Entries left without any ingress are
    /// removed. Returns the number of removed entries.
    pub fn remove_connection(&mut self, connection: ConnectionId) -> usize {
        let before = self.table.len();
        self.table.retain(|entry| {
            entry.ingress.remove(connection);
            entry.egress.remove(connection);
            !entry.ingress.is_empty()
        });
        before - self.table.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &PitEntry> {
        self.table.values()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn stats(&self) -> PitStats {
        PitStats {
            entries: self.table.len(),
            ..self.stats.clone()
        }
    }
}
