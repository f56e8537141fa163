//! Capacity-limited set with FIFO eviction

use std::collections::{HashSet, VecDeque};

use crate::signature::Signature;

/// Set of signatures that never exceeds its capacity. Inserting into a full
/// set evicts the earliest-inserted member first.
#[derive(Debug, Clone)]
pub struct BoundedSet {
    capacity: usize,
    members: HashSet<Signature>,
    order: VecDeque<Signature>,
}

impl BoundedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            members: HashSet::with_capacity(capacity.min(1024)),
            order: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.members.contains(signature)
    }

    /// Insert a signature, returning the member evicted to make room.
    /// Re-inserting an existing member keeps its original position.
    pub fn insert(&mut self, signature: Signature) -> Option<Signature> {
        if self.members.contains(&signature) {
            return None;
        }
        if self.capacity == 0 {
            return Some(signature);
        }
        let evicted = if self.members.len() >= self.capacity {
            self.order.pop_front().inspect(|oldest| {
                self.members.remove(oldest);
            })
        } else {
            None
        };
        self.members.insert(signature.clone());
        self.order.push_back(signature);
        evicted
    }

    pub fn remove(&mut self, signature: &str) -> bool {
        if self.members.remove(signature) {
            self.order.retain(|s| s.as_str() != signature);
            true
        } else {
            false
        }
    }

    /// Members, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.order.iter()
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(i: usize) -> Signature {
        Signature::from(format!("div#slot-{}", i))
    }

    #[test]
    fn test_insert_and_contains() {
        let mut set = BoundedSet::new(3);
        assert_eq!(set.insert(sig(1)), None);
        assert!(set.contains("div#slot-1"));
        assert!(!set.contains("div#slot-2"));
    }

    #[test]
    fn test_full_set_evicts_oldest() {
        let mut set = BoundedSet::new(2);
        set.insert(sig(1));
        set.insert(sig(2));
        assert_eq!(set.insert(sig(3)), Some(sig(1)));
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().cloned().collect::<Vec<_>>(), vec![sig(2), sig(3)]);
    }

    #[test]
    fn test_reinsert_is_noop() {
        let mut set = BoundedSet::new(2);
        set.insert(sig(1));
        set.insert(sig(2));
        assert_eq!(set.insert(sig(1)), None);
        assert_eq!(set.iter().next(), Some(&sig(1)));
    }

    #[test]
    fn test_remove_frees_a_slot() {
        let mut set = BoundedSet::new(2);
        set.insert(sig(1));
        set.insert(sig(2));
        assert!(set.remove("div#slot-1"));
        assert!(!set.remove("div#slot-1"));
        assert_eq!(set.insert(sig(3)), None);
        assert_eq!(set.len(), 2);
    }
}
