use serde::{Deserialize, Serialize};

use crate::ConnectionId;

/// Ordered set of connection identifiers.
///
/// Members keep their insertion order, which is the order the forwarder
/// uses when fanning a message out to several connections. Sets are small
/// (a handful of faces) so a vector scan beats hashing here.
#[derive(Debug, Clone, Default, Eq, Serialize, Deserialize)]
pub struct NumberSet {
    members: Vec<ConnectionId>,
}

impl NumberSet {
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            members: Vec::with_capacity(capacity),
        }
    }

    /// Add a member, returns false if it was already present
    pub fn add(&mut self, id: ConnectionId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.members.push(id);
        true
    }

    /// Add every member of `other` not already present
    pub fn add_set(&mut self, other: &NumberSet) {
        for id in other.iter() {
            self.add(id);
        }
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.contains(&id)
    }

    /// Remove a member, returns false if it was absent
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        match self.members.iter().position(|&m| m == id) {
            Some(index) => {
                self.members.remove(index);
                true
            }
            None => false,
        }
    }

    /// Members of `self` that are not in `other`
    pub fn subtract(&self, other: &NumberSet) -> NumberSet {
        NumberSet {
            members: self
                .members
                .iter()
                .copied()
                .filter(|id| !other.contains(*id))
                .collect(),
        }
    }

    /// Member at insertion position `index`
    pub fn get(&self, index: usize) -> Option<ConnectionId> {
        self.members.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.members.iter().copied()
    }

    pub fn as_slice(&self) -> &[ConnectionId] {
        &self.members
    }
}

/// Set equality: same members regardless of insertion order
impl PartialEq for NumberSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|id| other.contains(id))
    }
}

impl FromIterator<ConnectionId> for NumberSet {
    fn from_iter<I: IntoIterator<Item = ConnectionId>>(iter: I) -> Self {
        let mut set = NumberSet::new();
        for id in iter {
            set.add(id);
        }
        set
    }
}

impl From<&[ConnectionId]> for NumberSet {
    fn from(ids: &[ConnectionId]) -> Self {
        ids.iter().copied().collect()
    }
}

impl std::fmt::Display for NumberSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, id) in self.members.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", id)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_rejects_duplicates() {
        let mut set = NumberSet::new();
        assert!(set.add(5));
        assert!(set.add(9));
        assert!(!set.add(5));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0), Some(5));
        assert_eq!(set.get(1), Some(9));
        assert_eq!(set.get(2), None);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut set: NumberSet = [1, 2, 3, 4].as_slice().into();
        assert!(set.remove(2));
        assert!(!set.remove(2));
        assert_eq!(set.as_slice(), &[1, 3, 4]);
    }

    #[test]
    fn test_union_and_subtract() {
        let mut a: NumberSet = [1, 2].as_slice().into();
        let b: NumberSet = [2, 3].as_slice().into();
        a.add_set(&b);
        assert_eq!(a.as_slice(), &[1, 2, 3]);

        let diff = a.subtract(&b);
        assert_eq!(diff.as_slice(), &[1]);
    }

    #[test]
    fn test_equality_ignores_order() {
        let a: NumberSet = [1, 2, 3].as_slice().into();
        let b: NumberSet = [3, 1, 2].as_slice().into();
        let c: NumberSet = [1, 2].as_slice().into();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(NumberSet::new(), NumberSet::default());
    }

    #[test]
    fn test_display() {
        let set: NumberSet = [5, 9].as_slice().into();
        assert_eq!(set.to_string(), "{5, 9}");
    }
}
