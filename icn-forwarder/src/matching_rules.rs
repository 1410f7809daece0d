use std::collections::HashMap;

use icn_core::{KeyId, Message, Name, ObjectHash};

/// Which of the three tables an entry lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchRule {
    Name,
    NameAndKeyId,
    NameAndObjectHash,
}

/// Table indexed under three matching disciplines.
///
/// Interests are stored only under their most restrictive selector, so
/// one pending Interest lives in exactly one table. Content objects are
/// stored under every selector they can answer, so any Interest style
/// finds them.
///
/// Precedence is always object hash, then KeyId, then name.
#[derive(Debug)]
pub struct MatchingRulesTable<T> {
    by_name: HashMap<Name, T>,
    by_key_id: HashMap<(Name, KeyId), T>,
    by_object_hash: HashMap<(Name, ObjectHash), T>,
}

impl<T> Default for MatchingRulesTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MatchingRulesTable<T> {
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            by_key_id: HashMap::new(),
            by_object_hash: HashMap::new(),
        }
    }

    /// Most restrictive table `message` qualifies for
    pub fn best_rule(message: &Message) -> MatchRule {
        if message.object_hash().is_some() {
            MatchRule::NameAndObjectHash
        } else if message.key_id().is_some() {
            MatchRule::NameAndKeyId
        } else {
            MatchRule::Name
        }
    }

    /// Insert into the best table. Returns false, leaving the existing
    /// value in place, if the key is already present.
    pub fn add_to_best_table(&mut self, message: &Message, data: T) -> bool {
        let Some(name) = message.name() else {
            return false;
        };

        match (message.object_hash(), message.key_id()) {
            (Some(hash), _) => insert_new(&mut self.by_object_hash, (name.clone(), *hash), data),
            (None, Some(key_id)) => {
                insert_new(&mut self.by_key_id, (name.clone(), key_id.clone()), data)
            }
            (None, None) => insert_new(&mut self.by_name, name.clone(), data),
        }
    }

    /// Best match for `message`: hash table, then KeyId table, then name table
    pub fn get(&self, message: &Message) -> Option<&T> {
        let name = message.name()?;

        if let Some(hash) = message.object_hash() {
            if let Some(data) = self.by_object_hash.get(&(name.clone(), *hash)) {
                return Some(data);
            }
        }
        if let Some(key_id) = message.key_id() {
            if let Some(data) = self.by_key_id.get(&(name.clone(), key_id.clone())) {
                return Some(data);
            }
        }
        self.by_name.get(name)
    }

    /// Entry stored under exactly the best table of `message`, no fallback
    pub fn get_exact(&self, message: &Message) -> Option<&T> {
        let name = message.name()?;
        match (message.object_hash(), message.key_id()) {
            (Some(hash), _) => self.by_object_hash.get(&(name.clone(), *hash)),
            (None, Some(key_id)) => self.by_key_id.get(&(name.clone(), key_id.clone())),
            (None, None) => self.by_name.get(name),
        }
    }

    pub fn get_exact_mut(&mut self, message: &Message) -> Option<&mut T> {
        let name = message.name()?;
        match (message.object_hash(), message.key_id()) {
            (Some(hash), _) => self.by_object_hash.get_mut(&(name.clone(), *hash)),
            (None, Some(key_id)) => self.by_key_id.get_mut(&(name.clone(), key_id.clone())),
            (None, None) => self.by_name.get_mut(name),
        }
    }

    /// Every entry `message` matches, one per table, in precedence order
    pub fn get_union(&self, message: &Message) -> Vec<(MatchRule, &T)> {
        let mut matches = Vec::new();
        let Some(name) = message.name() else {
            return matches;
        };

        if let Some(hash) = message.object_hash() {
            if let Some(data) = self.by_object_hash.get(&(name.clone(), *hash)) {
                matches.push((MatchRule::NameAndObjectHash, data));
            }
        }
        if let Some(key_id) = message.key_id() {
            if let Some(data) = self.by_key_id.get(&(name.clone(), key_id.clone())) {
                matches.push((MatchRule::NameAndKeyId, data));
            }
        }
        if let Some(data) = self.by_name.get(name) {
            matches.push((MatchRule::Name, data));
        }
        matches
    }

    /// Remove the entry from the best table of `message` and hand it back
    pub fn remove_from_best(&mut self, message: &Message) -> Option<T> {
        let name = message.name()?;
        match (message.object_hash(), message.key_id()) {
            (Some(hash), _) => self.by_object_hash.remove(&(name.clone(), *hash)),
            (None, Some(key_id)) => self.by_key_id.remove(&(name.clone(), key_id.clone())),
            (None, None) => self.by_name.remove(name),
        }
    }

    /// Remove the entry stored under `rule` for `message`
    pub fn remove_from(&mut self, rule: MatchRule, message: &Message) -> Option<T> {
        let name = message.name()?;
        match rule {
            MatchRule::Name => self.by_name.remove(name),
            MatchRule::NameAndKeyId => {
                let key_id = message.key_id()?;
                self.by_key_id.remove(&(name.clone(), key_id.clone()))
            }
            MatchRule::NameAndObjectHash => {
                let hash = message.object_hash()?;
                self.by_object_hash.remove(&(name.clone(), *hash))
            }
        }
    }

    /// Remove `message` from every table it qualifies for
    pub fn remove_from_all(&mut self, message: &Message) -> Vec<T> {
        [
            MatchRule::NameAndObjectHash,
            MatchRule::NameAndKeyId,
            MatchRule::Name,
        ]
        .into_iter()
        .filter_map(|rule| self.remove_from(rule, message))
        .collect()
    }

    /// Visit every stored value, table by table
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.by_object_hash
            .values()
            .chain(self.by_key_id.values())
            .chain(self.by_name.values())
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.by_object_hash
            .values_mut()
            .chain(self.by_key_id.values_mut())
            .chain(self.by_name.values_mut())
    }

    /// Keep only entries for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&mut T) -> bool) {
        self.by_object_hash.retain(|_, data| keep(data));
        self.by_key_id.retain(|_, data| keep(data));
        self.by_name.retain(|_, data| keep(data));
    }

    pub fn table_len(&self, rule: MatchRule) -> usize {
        match rule {
            MatchRule::Name => self.by_name.len(),
            MatchRule::NameAndKeyId => self.by_key_id.len(),
            MatchRule::NameAndObjectHash => self.by_object_hash.len(),
        }
    }

    /// Stored values across all tables. A value added to several tables
    /// is counted once per table.
    pub fn len(&self) -> usize {
        self.by_name.len() + self.by_key_id.len() + self.by_object_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.by_name.clear();
        self.by_key_id.clear();
        self.by_object_hash.clear();
    }
}

impl<T: Clone> MatchingRulesTable<T> {
    /// Insert under every table `message` qualifies for, skipping tables
    /// that already hold the key. Returns the number of tables written.
    pub fn add_to_all_tables(&mut self, message: &Message, data: T) -> usize {
        let Some(name) = message.name() else {
            return 0;
        };

        let mut added = 0;
        if let Some(hash) = message.object_hash() {
            added += insert_new(&mut self.by_object_hash, (name.clone(), *hash), data.clone()) as usize;
        }
        if let Some(key_id) = message.key_id() {
            added += insert_new(&mut self.by_key_id, (name.clone(), key_id.clone()), data.clone())
                as usize;
        }
        added += insert_new(&mut self.by_name, name.clone(), data) as usize;
        added
    }
}

fn insert_new<K: std::hash::Hash + Eq, T>(map: &mut HashMap<K, T>, key: K, data: T) -> bool {
    match map.entry(key) {
        std::collections::hash_map::Entry::Occupied(_) => false,
        std::collections::hash_map::Entry::Vacant(slot) => {
            slot.insert(data);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::parse(uri).unwrap()
    }

    fn key() -> KeyId {
        KeyId::new(vec![0xab; 4])
    }

    #[test]
    fn test_best_table_selection() {
        let mut table = MatchingRulesTable::new();
        let plain = Message::interest(name("/a/b"));
        let keyed = Message::interest(name("/a/b")).with_key_id(key());
        let hashed = Message::interest(name("/a/b"))
            .with_key_id(key())
            .with_object_hash(ObjectHash::from_bytes([1; 32]));

        assert!(table.add_to_best_table(&plain, "name"));
        assert!(table.add_to_best_table(&keyed, "keyid"));
        assert!(table.add_to_best_table(&hashed, "hash"));

        assert_eq!(table.table_len(MatchRule::Name), 1);
        assert_eq!(table.table_len(MatchRule::NameAndKeyId), 1);
        assert_eq!(table.table_len(MatchRule::NameAndObjectHash), 1);
    }

    #[test]
    fn test_best_table_rejects_duplicates() {
        let mut table = MatchingRulesTable::new();
        let interest = Message::interest(name("/a/b"));
        assert!(table.add_to_best_table(&interest, 1));
        assert!(!table.add_to_best_table(&interest, 2));
        assert_eq!(table.get(&interest), Some(&1));
    }

    #[test]
    fn test_get_prefers_key_id_entry() {
        let mut table = MatchingRulesTable::new();
        table.add_to_best_table(&Message::interest(name("/a/b")), "name");
        table.add_to_best_table(&Message::interest(name("/a/b")).with_key_id(key()), "keyid");

        let query = Message::interest(name("/a/b")).with_key_id(key());
        assert_eq!(table.get(&query), Some(&"keyid"));

        let unrestricted = Message::interest(name("/a/b"));
        assert_eq!(table.get(&unrestricted), Some(&"name"));
    }

    #[test]
    fn test_get_exact_does_not_fall_back() {
        let mut table = MatchingRulesTable::new();
        table.add_to_best_table(&Message::interest(name("/a/b")), "name");

        let hashed = Message::interest(name("/a/b")).with_object_hash(ObjectHash::from_bytes([9; 32]));
        let keyed = Message::interest(name("/a/b")).with_key_id(key());
        assert_eq!(table.get(&hashed), Some(&"name"));
        assert_eq!(table.get_exact(&hashed), None);
        assert_eq!(table.get_exact(&keyed), None);
        assert_eq!(table.get_exact(&Message::interest(name("/a/b"))), Some(&"name"));
    }

    #[test]
    fn test_union_returns_name_and_hash_entries() {
        let object = Message::content_object(name("/a/b"), b"data".to_vec());
        let hash = *object.object_hash().unwrap();

        let mut table = MatchingRulesTable::new();
        table.add_to_best_table(&Message::interest(name("/a/b")), "name");
        table.add_to_best_table(&Message::interest(name("/a/b")).with_object_hash(hash), "hash");

        let union = table.get_union(&object);
        assert_eq!(
            union,
            vec![(MatchRule::NameAndObjectHash, &"hash"), (MatchRule::Name, &"name")]
        );
    }

    #[test]
    fn test_add_to_all_and_remove_from_all() {
        let object =
            Message::content_object(name("/a/b"), b"data".to_vec()).with_key_id(key());

        let mut table = MatchingRulesTable::new();
        assert_eq!(table.add_to_all_tables(&object, 7usize), 3);
        assert_eq!(table.add_to_all_tables(&object, 8usize), 0);
        assert_eq!(table.len(), 3);

        let by_key = Message::interest(name("/a/b")).with_key_id(key());
        assert_eq!(table.get(&by_key), Some(&7));

        assert_eq!(table.remove_from_all(&object), vec![7, 7, 7]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_from_best_leaves_other_tables() {
        let mut table = MatchingRulesTable::new();
        let plain = Message::interest(name("/a"));
        let keyed = Message::interest(name("/a")).with_key_id(key());
        table.add_to_best_table(&plain, 1);
        table.add_to_best_table(&keyed, 2);

        assert_eq!(table.remove_from_best(&keyed), Some(2));
        assert_eq!(table.remove_from_best(&keyed), None);
        assert_eq!(table.get(&plain), Some(&1));
    }
}
