//! OrderedTable: hashed lookup over generational slots, threaded on an
//! insertion-order list.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use hashbrown::hash_table::{Entry as IndexEntry, HashTable};
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;

/// Stable, generational position of an entry. A slot stays valid until its
/// entry is removed and never resolves to a later entry afterwards.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Slot(DefaultKey);

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    hash: u64,
    prev: Option<DefaultKey>,
    next: Option<DefaultKey>,
}

pub struct OrderedTable<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    nodes: SlotMap<DefaultKey, Node<K, V>>,
    head: Option<DefaultKey>,
    tail: Option<DefaultKey>,
}

impl<K, V, S> OrderedTable<K, V, S> {
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::with_capacity(capacity),
            nodes: SlotMap::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, slot: Slot) -> Option<(&K, &V)> {
        self.nodes.get(slot.0).map(|n| (&n.key, &n.value))
    }

    /// Unlink and return the entry at `slot`; `None` for a stale slot.
    pub fn remove(&mut self, slot: Slot) -> Option<(K, V)> {
        let node = self.nodes.remove(slot.0)?;

        match self.index.find_entry(node.hash, |&k| k == slot.0) {
            Ok(found) => {
                found.remove();
            }
            Err(_) => debug_assert!(false, "slot missing from index"),
        }

        match node.prev {
            Some(p) => self.nodes[p].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(n) => self.nodes[n].prev = node.prev,
            None => self.tail = node.prev,
        }

        Some((node.key, node.value))
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            nodes: &self.nodes,
            cursor: self.head,
            remaining: self.nodes.len(),
        }
    }
}

impl<K, V, S> OrderedTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn find<Q>(&self, q: &Q) -> Option<Slot>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hasher.hash_one(q);
        self.index
            .find(hash, |&k| {
                self.nodes
                    .get(k)
                    .map(|n| n.key.borrow() == q)
                    .unwrap_or(false)
            })
            .map(|&k| Slot(k))
    }

    /// Replace the value stored under `key`, or append a new entry at the
    /// end of the order.
    ///
    /// `make` receives the entry's slot and, when the key is already present,
    /// the value about to be replaced. On replacement the stored key and the
    /// position are kept and the previous value is returned.
    pub fn insert_with<F>(&mut self, key: K, make: F) -> (Slot, Option<V>)
    where
        F: FnOnce(Slot, Option<&V>) -> V,
    {
        let hash = self.hasher.hash_one(&key);
        match self.index.entry(
            hash,
            |&k| self.nodes.get(k).map(|n| n.key == key).unwrap_or(false),
            |&k| self.nodes.get(k).map(|n| n.hash).unwrap_or(0),
        ) {
            IndexEntry::Occupied(occupied) => {
                let k = *occupied.get();
                let node = &mut self.nodes[k];
                let value = make(Slot(k), Some(&node.value));
                (Slot(k), Some(core::mem::replace(&mut node.value, value)))
            }
            IndexEntry::Vacant(vacant) => {
                let prev = self.tail;
                let k = self.nodes.insert_with_key(|k| Node {
                    key,
                    value: make(Slot(k), None),
                    hash,
                    prev,
                    next: None,
                });
                let _ = vacant.insert(k);
                match prev {
                    Some(p) => self.nodes[p].next = Some(k),
                    None => self.head = Some(k),
                }
                self.tail = Some(k);
                (Slot(k), None)
            }
        }
    }
}

/// Insertion-order iterator over `OrderedTable`.
pub struct Iter<'a, K, V> {
    nodes: &'a SlotMap<DefaultKey, Node<K, V>>,
    cursor: Option<DefaultKey>,
    remaining: usize,
}

impl<'a, K, V> Clone for Iter<'a, K, V> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes,
            cursor: self.cursor,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (Slot, &'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let k = self.cursor?;
        let node = self.nodes.get(k)?;
        self.cursor = node.next;
        self.remaining -= 1;
        Some((Slot(k), &node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V> {}
impl<'a, K, V> FusedIterator for Iter<'a, K, V> {}
