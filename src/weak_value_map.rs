use crate::ordered_table::{self, OrderedTable, Slot};
use crate::registry::{ReclamationRegistry, Registration};
use crate::sweep::SweepPolicy;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use std::collections::hash_map::RandomState;
use std::rc::{Rc, Weak};

// Table entry: the weak handle plus the registration that will report its
// reclamation. Exactly one registration is pending per entry.
struct Entry<V: ?Sized> {
    target: Weak<V>,
    registration: Registration,
}

/// A map from keys to values it does not keep alive.
///
/// Values are shared as `Rc<V>`; the map stores only a `Weak<V>`. Once the
/// last `Rc` is dropped, `get` reports the value as absent, and the entry
/// itself is removed by the next sweep (explicit via `sweep`, or automatic
/// according to the map's `SweepPolicy`). Until then `len`, `contains_key`
/// and the iterators still count it: `get` is the only liveness test.
///
/// Entries iterate in insertion order. Re-inserting an existing key replaces
/// its handle in place.
pub struct WeakValueMap<K, V: ?Sized, S = RandomState> {
    table: OrderedTable<K, Entry<V>, S>,
    registry: ReclamationRegistry<V, Slot>,
    policy: SweepPolicy,
    mutations: usize,
    // Table length right after the last sweep; the amortized baseline.
    swept_len: usize,
}

impl<K, V: ?Sized> WeakValueMap<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }
}

impl<K, V: ?Sized, S> WeakValueMap<K, V, S> {
    /// Type tag used by the `Debug` rendering.
    pub const TAG: &'static str = "WeakValueMap";

    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(0, hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            table: OrderedTable::with_capacity_and_hasher(capacity, hasher),
            registry: ReclamationRegistry::with_capacity(capacity),
            policy: SweepPolicy::default(),
            mutations: 0,
            swept_len: 0,
        }
    }

    pub fn with_sweep_policy(mut self, policy: SweepPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn sweep_policy(&self) -> SweepPolicy {
        self.policy
    }

    pub fn set_sweep_policy(&mut self, policy: SweepPolicy) {
        self.policy = policy;
    }

    pub fn hasher(&self) -> &S {
        self.table.hasher()
    }

    /// Number of entries, including reclaimed ones not yet swept.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of entries whose value is alive right now. O(n).
    pub fn live_len(&self) -> usize {
        self.table
            .iter()
            .filter(|(_, _, e)| e.target.strong_count() > 0)
            .count()
    }

    /// Number of entries whose value is gone but which the next sweep will
    /// remove. O(n).
    pub fn pending_reclaims(&self) -> usize {
        self.registry.pending()
    }

    /// Remove every entry and cancel every pending notification.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.table.clear();
        self.mutations = 0;
        self.swept_len = 0;
    }

    /// Deliver all pending reclamation notifications, removing the entries
    /// whose value has been dropped. Returns the number of entries removed.
    pub fn sweep(&mut self) -> usize {
        self.mutations = 0;
        let table = &mut self.table;
        let mut removed = 0;
        // A payload always names the entry's current registration: overwrite,
        // remove and clear cancel the old one first. Slots are generational,
        // so a payload can never reach an unrelated later entry.
        self.registry.drain_reclaimed(|slot| {
            if table.remove(slot).is_some() {
                removed += 1;
            }
        });
        debug_assert_eq!(self.registry.len(), self.table.len());
        self.swept_len = self.table.len();
        if removed > 0 {
            log::debug!(
                "swept {} reclaimed entries, {} remain",
                removed,
                self.table.len()
            );
        }
        removed
    }

    /// Keys in insertion order, regardless of liveness.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys {
            inner: self.table.iter(),
        }
    }

    /// Values in insertion order. Each handle is upgraded as the item is
    /// produced; a reclaimed value comes out as `None`.
    pub fn values(&self) -> Values<'_, K, V> {
        Values {
            inner: self.table.iter(),
        }
    }

    /// `(key, value)` pairs in insertion order. A reclaimed value comes out as
    /// `None`.
    pub fn entries(&self) -> Entries<'_, K, V> {
        Entries {
            inner: self.table.iter(),
        }
    }

    /// Same as `entries`.
    pub fn iter(&self) -> Entries<'_, K, V> {
        self.entries()
    }

    /// Call `visit(value, key, map)` for every entry whose value is alive,
    /// in insertion order. Reclaimed entries are skipped.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(Rc<V>, &K, &Self),
    {
        for (key, value) in self.entries() {
            if let Some(value) = value {
                visit(value, key, self);
            }
        }
    }

    fn note_mutation(&mut self) {
        self.mutations += 1;
        if self.policy.is_due(self.mutations, self.swept_len) {
            self.sweep();
        }
    }
}

impl<K, V, S> WeakValueMap<K, V, S>
where
    K: Eq + Hash,
    V: ?Sized,
    S: BuildHasher,
{
    /// Build a map from a fallible sequence, stopping at its first error.
    pub fn try_from_iter<'a, I, E>(iter: I) -> Result<Self, E>
    where
        I: IntoIterator<Item = Result<(K, &'a Rc<V>), E>>,
        V: 'a,
        S: Default,
    {
        let mut map = Self::with_hasher(S::default());
        for item in iter {
            let (key, value) = item?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Point `key` at `value` without taking ownership of it.
    ///
    /// An existing entry keeps its key and position; its old registration is
    /// cancelled before the new one is made. Returns the previous value if it
    /// was still alive.
    pub fn insert(&mut self, key: K, value: &Rc<V>) -> Option<Rc<V>> {
        let registry = &mut self.registry;
        let (_, previous) = self.table.insert_with(key, |slot, current| {
            if let Some(current) = current {
                registry.unregister(current.registration);
            }
            Entry {
                target: Rc::downgrade(value),
                registration: registry.register(value, slot),
            }
        });
        self.note_mutation();
        previous.and_then(|e| e.target.upgrade())
    }

    /// The value for `key`, if the entry exists and the value is alive.
    /// Never modifies the map.
    pub fn get<Q>(&self, key: &Q) -> Option<Rc<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, Rc<V>)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.table.find(key)?;
        let (k, entry) = self.table.get(slot)?;
        entry.target.upgrade().map(|v| (k, v))
    }

    /// Whether an entry for `key` exists, alive or not.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find(key).is_some()
    }

    /// Remove the entry for `key` and cancel its notification. Returns whether
    /// an entry existed, alive or not.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let removed = self
            .table
            .find(key)
            .and_then(|slot| self.table.remove(slot));
        let existed = match removed {
            Some((_, entry)) => {
                self.registry.unregister(entry.registration);
                true
            }
            None => false,
        };
        self.note_mutation();
        existed
    }
}

impl<K, V: ?Sized, S: Default> Default for WeakValueMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> fmt::Debug for WeakValueMap<K, V, S>
where
    K: fmt::Debug,
    V: ?Sized + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::TAG)?;
        f.write_str(" ")?;
        f.debug_map().entries(self.entries()).finish()
    }
}

impl<'a, K, V, S> FromIterator<(K, &'a Rc<V>)> for WeakValueMap<K, V, S>
where
    K: Eq + Hash,
    V: ?Sized + 'a,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, &'a Rc<V>)>>(iter: I) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S> Extend<(K, &'a Rc<V>)> for WeakValueMap<K, V, S>
where
    K: Eq + Hash,
    V: ?Sized + 'a,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, &'a Rc<V>)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a, K, V: ?Sized, S> IntoIterator for &'a WeakValueMap<K, V, S> {
    type Item = (&'a K, Option<Rc<V>>);
    type IntoIter = Entries<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries()
    }
}

/// Iterator returned by `WeakValueMap::keys`.
pub struct Keys<'a, K, V: ?Sized> {
    inner: ordered_table::Iter<'a, K, Entry<V>>,
}

/// Iterator returned by `WeakValueMap::values`.
pub struct Values<'a, K, V: ?Sized> {
    inner: ordered_table::Iter<'a, K, Entry<V>>,
}

/// Iterator returned by `WeakValueMap::entries` and `iter`.
pub struct Entries<'a, K, V: ?Sized> {
    inner: ordered_table::Iter<'a, K, Entry<V>>,
}

impl<'a, K, V: ?Sized> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V: ?Sized> Iterator for Values<'a, K, V> {
    type Item = Option<Rc<V>>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, _, e)| e.target.upgrade())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V: ?Sized> Iterator for Entries<'a, K, V> {
    type Item = (&'a K, Option<Rc<V>>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, k, e)| (k, e.target.upgrade()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

macro_rules! iter_traits {
    ($($name:ident),*) => {$(
        impl<'a, K, V: ?Sized> Clone for $name<'a, K, V> {
            fn clone(&self) -> Self {
                Self { inner: self.inner.clone() }
            }
        }
        impl<'a, K, V: ?Sized> ExactSizeIterator for $name<'a, K, V> {}
        impl<'a, K, V: ?Sized> FusedIterator for $name<'a, K, V> {}
    )*};
}

iter_traits!(Keys, Values, Entries);

#[cfg(test)]
mod tests {
    use super::*;

    fn manual() -> WeakValueMap<String, String> {
        WeakValueMap::new().with_sweep_policy(SweepPolicy::Manual)
    }

    /// Invariant: the map holds no strong count on inserted values.
    #[test]
    fn insert_does_not_retain() {
        let mut m = manual();
        let v = Rc::new("v".to_string());
        m.insert("k".to_string(), &v);
        assert_eq!(Rc::strong_count(&v), 1);
        assert_eq!(Rc::weak_count(&v), 2);
        m.clear();
        assert_eq!(Rc::weak_count(&v), 0);
    }

    /// Invariant: one pending registration per entry, across overwrites.
    #[test]
    fn overwrite_keeps_one_registration() {
        let mut m = manual();
        let a = Rc::new("a".to_string());
        let b = Rc::new("b".to_string());
        let c = Rc::new("c".to_string());
        m.insert("k".to_string(), &a);
        m.insert("k".to_string(), &b);
        m.insert("k".to_string(), &c);
        assert_eq!(m.registry.len(), 1);
        assert_eq!(m.table.len(), 1);
        assert_eq!(Rc::weak_count(&a), 0);
        assert_eq!(Rc::weak_count(&b), 0);
    }

    /// Invariant: remove cancels the entry's registration.
    #[test]
    fn remove_cancels_registration() {
        let mut m = manual();
        let a = Rc::new("a".to_string());
        m.insert("k".to_string(), &a);
        assert!(m.remove("k"));
        assert!(m.registry.is_empty());
        assert!(!m.remove("k"));
    }

    /// Invariant: insert reports the previous value only while it is alive.
    #[test]
    fn insert_returns_live_previous() {
        let mut m = manual();
        let a = Rc::new("a".to_string());
        let b = Rc::new("b".to_string());
        assert!(m.insert("k".to_string(), &a).is_none());
        let prev = m.insert("k".to_string(), &b);
        assert!(prev.is_some_and(|p| Rc::ptr_eq(&p, &a)));

        let c = Rc::new("c".to_string());
        drop(b);
        assert!(m.insert("k".to_string(), &c).is_none());
    }

    /// Invariant: automatic sweeping under `Every(1)` runs after each mutation.
    #[test]
    fn every_policy_sweeps_on_mutation() {
        let mut m: WeakValueMap<String, String> = WeakValueMap::new()
            .with_sweep_policy(SweepPolicy::Every(core::num::NonZeroUsize::new(1).unwrap()));
        let keep = Rc::new("keep".to_string());
        {
            let gone = Rc::new("gone".to_string());
            m.insert("gone".to_string(), &gone);
        }
        assert!(m.contains_key("gone"));
        m.insert("keep".to_string(), &keep);
        assert!(!m.contains_key("gone"));
        assert_eq!(m.len(), 1);
    }

    /// Invariant: the amortized default eventually sweeps without explicit calls.
    #[test]
    fn amortized_policy_bounds_staleness() {
        let mut m: WeakValueMap<u32, u32> = WeakValueMap::new();
        let keep: Vec<Rc<u32>> = (0..4).map(Rc::new).collect();
        for (i, v) in keep.iter().enumerate() {
            m.insert(i as u32, v);
        }
        {
            let gone = Rc::new(99);
            m.insert(99, &gone);
        }
        for _ in 0..(m.len() + 1) {
            m.remove(&1000);
        }
        assert!(!m.contains_key(&99));
        assert_eq!(m.len(), keep.len());
    }

    #[test]
    fn debug_uses_tag() {
        let mut m = manual();
        let a = Rc::new("a".to_string());
        m.insert("k".to_string(), &a);
        let rendered = format!("{:?}", m);
        assert!(rendered.starts_with("WeakValueMap {"));
        assert!(rendered.contains("\"k\": Some(\"a\")"));
        drop(a);
        assert!(format!("{:?}", m).contains("\"k\": None"));
    }
}
