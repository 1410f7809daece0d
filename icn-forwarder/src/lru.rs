/// Handle to an entry of an [`LruList`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LruEntryId(usize);

#[derive(Debug)]
struct Node<T> {
    data: T,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Doubly linked recency list stored in a slab.
///
/// The head is the most recently used entry and the tail the least
/// recently used one. Handles stay valid until their entry is removed;
/// freed slots are recycled.
#[derive(Debug)]
pub struct LruList<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for LruList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LruList<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    /// Insert `data` as the most recently used entry
    pub fn new_head_entry(&mut self, data: T) -> LruEntryId {
        let node = Node {
            data,
            prev: None,
            next: None,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(node);
                index
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.link_at_head(index);
        self.len += 1;
        LruEntryId(index)
    }

    /// Mark an entry as most recently used. Returns false for stale handles.
    pub fn move_to_head(&mut self, id: LruEntryId) -> bool {
        if !self.contains(id) {
            return false;
        }
        if self.head == Some(id.0) {
            return true;
        }
        self.unlink(id.0);
        self.link_at_head(id.0);
        true
    }

    /// Remove and return the least recently used entry
    pub fn pop_tail(&mut self) -> Option<(LruEntryId, T)> {
        let tail = self.tail?;
        self.remove(LruEntryId(tail)).map(|data| (LruEntryId(tail), data))
    }

    /// Remove an arbitrary entry
    pub fn remove(&mut self, id: LruEntryId) -> Option<T> {
        if !self.contains(id) {
            return None;
        }
        self.unlink(id.0);
        let node = self.slots[id.0].take()?;
        self.free.push(id.0);
        self.len -= 1;
        Some(node.data)
    }

    pub fn get(&self, id: LruEntryId) -> Option<&T> {
        self.slots.get(id.0)?.as_ref().map(|node| &node.data)
    }

    pub fn contains(&self, id: LruEntryId) -> bool {
        matches!(self.slots.get(id.0), Some(Some(_)))
    }

    pub fn tail(&self) -> Option<LruEntryId> {
        self.tail.map(LruEntryId)
    }

    pub fn head(&self) -> Option<LruEntryId> {
        self.head.map(LruEntryId)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Entries from most to least recently used
    pub fn iter(&self) -> LruIter<'_, T> {
        LruIter {
            list: self,
            cursor: self.head,
        }
    }

    fn link_at_head(&mut self, index: usize) {
        let old_head = self.head;
        if let Some(node) = self.slots[index].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(old) => {
                if let Some(node) = self.slots[old].as_mut() {
                    node.prev = Some(index);
                }
            }
            None => self.tail = Some(index),
        }
        self.head = Some(index);
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = match self.slots[index].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };
        match prev {
            Some(p) => {
                if let Some(node) = self.slots[p].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.slots[n].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        if let Some(node) = self.slots[index].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }
}

pub struct LruIter<'a, T> {
    list: &'a LruList<T>,
    cursor: Option<usize>,
}

impl<'a, T> Iterator for LruIter<'a, T> {
    type Item = (LruEntryId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let node = self.list.slots.get(index)?.as_ref()?;
        self.cursor = node.next;
        Some((LruEntryId(index), &node.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(list: &LruList<&'static str>) -> Vec<&'static str> {
        list.iter().map(|(_, data)| *data).collect()
    }

    #[test]
    fn test_head_insert_order() {
        let mut list = LruList::new();
        list.new_head_entry("a");
        list.new_head_entry("b");
        list.new_head_entry("c");
        assert_eq!(order(&list), vec!["c", "b", "a"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_move_to_head() {
        let mut list = LruList::new();
        let a = list.new_head_entry("a");
        list.new_head_entry("b");
        let c = list.new_head_entry("c");

        assert!(list.move_to_head(a));
        assert_eq!(order(&list), vec!["a", "c", "b"]);
        assert!(list.move_to_head(a));
        assert_eq!(order(&list), vec!["a", "c", "b"]);
        assert!(list.move_to_head(c));
        assert_eq!(order(&list), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_pop_tail_returns_least_recent() {
        let mut list = LruList::new();
        let a = list.new_head_entry("a");
        list.new_head_entry("b");

        assert_eq!(list.pop_tail(), Some((a, "a")));
        assert_eq!(list.pop_tail().map(|(_, d)| d), Some("b"));
        assert_eq!(list.pop_tail(), None);
        assert!(list.is_empty());
        assert_eq!(list.head(), None);
        assert_eq!(list.tail(), None);
    }

    #[test]
    fn test_remove_middle_and_reuse_slot() {
        let mut list = LruList::new();
        list.new_head_entry("a");
        let b = list.new_head_entry("b");
        list.new_head_entry("c");

        assert_eq!(list.remove(b), Some("b"));
        assert_eq!(list.remove(b), None);
        assert!(!list.move_to_head(b));
        assert_eq!(order(&list), vec!["c", "a"]);

        let d = list.new_head_entry("d");
        assert_eq!(d, b);
        assert_eq!(order(&list), vec!["d", "c", "a"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_single_entry_links() {
        let mut list = LruList::new();
        let only = list.new_head_entry(1);
        assert_eq!(list.head(), Some(only));
        assert_eq!(list.tail(), Some(only));
        assert_eq!(list.get(only), Some(&1));
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.get(only), None);
    }
}
