use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;

use icn_common::Ticks;
use icn_core::Message;

use crate::lru::{LruEntryId, LruList};
use crate::matching_rules::{MatchRule, MatchingRulesTable};

/// Cache of content objects consulted before the PIT
pub trait ContentStore: Send {
    /// Cache `object`. Returns false if it was not stored.
    fn put_content(&mut self, object: Arc<Message>, now: Ticks) -> bool;

    /// Drop the exact object (same name and hash) if cached
    fn remove_content(&mut self, object: &Message) -> bool;

    /// Cached object for `interest` under its most specific restriction,
    /// touching it as recently used. An expired object is dropped and
    /// reported as a miss.
    fn match_interest(&mut self, interest: &Message, now: Ticks) -> Option<Arc<Message>>;

    fn object_count(&self) -> usize;

    fn object_capacity(&self) -> usize;

    fn stats(&self) -> ContentStoreStats;
}

/// Content store counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContentStoreStats {
    pub object_count: usize,
    pub capacity: usize,
    pub adds: u64,
    pub hits: u64,
    pub misses: u64,
    pub lru_evictions: u64,
    pub expiry_evictions: u64,
    pub rct_evictions: u64,
}

/// Bounded content store with least-recently-used eviction.
///
/// When full, objects that have already expired go first, then objects
/// past their recommended cache time, and only then the LRU tail.
#[derive(Debug)]
pub struct LruContentStore {
    capacity: usize,
    lru: LruList<Arc<Message>>,
    index: MatchingRulesTable<LruEntryId>,
    by_expiry: BTreeSet<(Ticks, LruEntryId)>,
    by_rct: BTreeSet<(Ticks, LruEntryId)>,
    stats: ContentStoreStats,
}

impl LruContentStore {
    pub fn new(capacity: usize) -> Self {
        info!(target: "processor", "Content store created with capacity {}", capacity);
        Self {
            capacity,
            lru: LruList::with_capacity(capacity.min(4096)),
            index: MatchingRulesTable::new(),
            by_expiry: BTreeSet::new(),
            by_rct: BTreeSet::new(),
            stats: ContentStoreStats {
                capacity,
                ..Default::default()
            },
        }
    }

    /// Entry holding exactly this object, found through the hash table
    fn find_exact(&self, object: &Message) -> Option<LruEntryId> {
        self.index
            .get_union(object)
            .into_iter()
            .find(|(rule, _)| *rule == MatchRule::NameAndObjectHash)
            .map(|(_, id)| *id)
    }

    fn remove_entry(&mut self, id: LruEntryId) -> Option<Arc<Message>> {
        let object = self.lru.remove(id)?;

        // Another object with the same name may own the name or KeyId slot
        let owned: Vec<MatchRule> = self
            .index
            .get_union(&object)
            .into_iter()
            .filter(|(_, entry)| **entry == id)
            .map(|(rule, _)| rule)
            .collect();
        for rule in owned {
            self.index.remove_from(rule, &object);
        }

        if let Some(expiry) = object.expiry_time() {
            self.by_expiry.remove(&(expiry, id));
        }
        if let Some(rct) = object.recommended_cache_time() {
            self.by_rct.remove(&(rct, id));
        }
        Some(object)
    }

    /// Make room for one object
    fn evict_one(&mut self, now: Ticks) {
        if let Some(&(expiry, id)) = self.by_expiry.first() {
            if expiry <= now {
                if let Some(object) = self.remove_entry(id) {
                    self.stats.expiry_evictions += 1;
                    debug!(target: "processor", "Evicted expired {}", display_name(&object));
                    return;
                }
            }
        }

        if let Some(&(rct, id)) = self.by_rct.first() {
            if rct <= now {
                if let Some(object) = self.remove_entry(id) {
                    self.stats.rct_evictions += 1;
                    debug!(target: "processor", "Evicted stale {}", display_name(&object));
                    return;
                }
            }
        }

        if let Some(id) = self.lru.tail() {
            if let Some(object) = self.remove_entry(id) {
                self.stats.lru_evictions += 1;
                debug!(target: "processor", "Evicted LRU tail {}", display_name(&object));
            }
        }
    }

    /// Cached objects from most to least recently used
    pub fn objects(&self) -> impl Iterator<Item = &Arc<Message>> {
        self.lru.iter().map(|(_, object)| object)
    }
}

fn display_name(object: &Message) -> String {
    object
        .name()
        .map(|name| name.to_string())
        .unwrap_or_else(|| "<unnamed>".to_string())
}

impl ContentStore for LruContentStore {
    fn put_content(&mut self, object: Arc<Message>, now: Ticks) -> bool {
        if self.capacity == 0 || !object.is_content_object() || object.name().is_none() {
            return false;
        }
        if object.has_expired(now) || object.past_recommended_cache_time(now) {
            debug!(target: "processor", "Not caching {}: already stale", display_name(&object));
            return false;
        }

        if let Some(existing) = self.find_exact(&object) {
            self.lru.move_to_head(existing);
            return false;
        }

        while self.lru.len() >= self.capacity {
            self.evict_one(now);
        }

        let id = self.lru.new_head_entry(Arc::clone(&object));
        self.index.add_to_all_tables(&object, id);
        if let Some(expiry) = object.expiry_time() {
            self.by_expiry.insert((expiry, id));
        }
        if let Some(rct) = object.recommended_cache_time() {
            self.by_rct.insert((rct, id));
        }
        self.stats.adds += 1;

        debug!(
            target: "processor",
            "Cached {} (cache size: {})",
            display_name(&object),
            self.lru.len()
        );
        true
    }

    fn remove_content(&mut self, object: &Message) -> bool {
        match self.find_exact(object) {
            Some(id) => self.remove_entry(id).is_some(),
            None => false,
        }
    }

    fn match_interest(&mut self, interest: &Message, now: Ticks) -> Option<Arc<Message>> {
        let Some(&id) = self.index.get_exact(interest) else {
            self.stats.misses += 1;
            return None;
        };

        let expired = self.lru.get(id).map_or(true, |object| object.has_expired(now));
        if expired {
            if let Some(object) = self.remove_entry(id) {
                self.stats.expiry_evictions += 1;
                debug!(target: "processor", "Dropped expired {} on lookup", display_name(&object));
            }
            self.stats.misses += 1;
            return None;
        }

        self.lru.move_to_head(id);
        self.stats.hits += 1;
        self.lru.get(id).cloned()
    }

    fn object_count(&self) -> usize {
        self.lru.len()
    }

    fn object_capacity(&self) -> usize {
        self.capacity
    }

    fn stats(&self) -> ContentStoreStats {
        ContentStoreStats {
            object_count: self.lru.len(),
            ..self.stats.clone()
        }
    }
}
