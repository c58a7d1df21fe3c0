//! weak-value-map: a single-threaded, insertion-ordered map whose values are
//! held weakly, so entries disappear once the program stops owning them.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a map usable as a cache, registry or identity table that never
//!   keeps the `Rc<V>` values it indexes alive.
//! - Layers:
//!   - OrderedTable<K, V, S>: structural map with stable generational
//!     slots, O(1) average lookup, and an intrusive insertion-order list.
//!   - ReclamationRegistry<T, P>: watches `Rc` targets through `Weak` and
//!     delivers a payload, at most once, after a target is reclaimed.
//!     Registrations can be cancelled by their token.
//!   - WeakValueMap<K, V, S>: public API. Each entry stores a `Weak<V>` and
//!     the registration whose payload is the entry's own slot.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` through `Weak<V>`.
//! - The map never owns a value; `insert` borrows the caller's `&Rc<V>`.
//! - One pending registration per key. Overwrite, remove and clear cancel
//!   the previous registration before anything else touches the entry, so a
//!   notification for a replaced value can never remove its successor.
//! - Notifications are only delivered between user operations: by `sweep`,
//!   or at the end of a mutating call according to the `SweepPolicy`.
//!
//! Staleness
//! - `len`, `contains_key` and iteration count an entry until it is swept,
//!   even after its value is gone. `get` is the liveness test and never
//!   mutates the map.
//! - `entries`/`values` produce `None` for a reclaimed value; `for_each`
//!   skips it.
//!
//! Hasher and rehashing invariants
//! - Each entry stores a precomputed `u64` hash and indexing always uses
//!   the stored hash; `K: Hash` is never invoked after insertion.
//!
//! Notes and non-goals
//! - No eviction policy: reclamation of the value is the only trigger.
//! - No guarantee on when a stale entry is removed beyond the sweep policy.
//! - Public API surface is `WeakValueMap`, its iterators, `SweepPolicy`, and
//!   the registry primitive; the table is an implementation detail.

mod ordered_table;
mod ordered_table_proptest;
mod registry;
mod sweep;
mod weak_value_map;

// Public surface
pub use registry::{ReclamationRegistry, Registration};
pub use sweep::SweepPolicy;
pub use weak_value_map::{Entries, Keys, Values, WeakValueMap};
