//! Reclamation notifications for `Rc` allocations.
//!
//! `Rc` has no finalizer hook, so the registry watches each target through a
//! `Weak` and delivers the payload chosen at registration time during
//! `drain_reclaimed`, once the target has no strong owner left. Every
//! registration is delivered at most once: delivery retires it, and a
//! cancelled (`unregister`ed) registration is never delivered.

use slotmap::{DefaultKey, SlotMap};
use std::rc::{Rc, Weak};

/// Generational token naming one registration. Stale tokens (delivered or
/// cancelled) are inert: they never alias a later registration.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Registration(DefaultKey);

struct Watch<T: ?Sized, P> {
    target: Weak<T>,
    payload: P,
}

pub struct ReclamationRegistry<T: ?Sized, P> {
    watches: SlotMap<DefaultKey, Watch<T, P>>,
}

impl<T: ?Sized, P> ReclamationRegistry<T, P> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            watches: SlotMap::with_capacity(capacity),
        }
    }

    /// Number of registrations that have been neither delivered nor cancelled.
    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    /// Arrange for `payload` to be delivered once `target` is reclaimed.
    pub fn register(&mut self, target: &Rc<T>, payload: P) -> Registration {
        let target = Rc::downgrade(target);
        Registration(self.watches.insert(Watch { target, payload }))
    }

    /// Cancel a pending registration. Returns false if it was already
    /// delivered or cancelled.
    pub fn unregister(&mut self, registration: Registration) -> bool {
        self.watches.remove(registration.0).is_some()
    }

    pub fn is_registered(&self, registration: Registration) -> bool {
        self.watches.contains_key(registration.0)
    }

    /// Cancel every registration.
    pub fn clear(&mut self) {
        self.watches.clear();
    }

    /// Registrations whose target is gone but whose payload has not been
    /// delivered yet.
    pub fn pending(&self) -> usize {
        self.watches
            .values()
            .filter(|w| w.target.strong_count() == 0)
            .count()
    }

    /// Deliver the payload of every reclaimed target to `deliver` and retire
    /// those registrations. Returns the number of deliveries.
    pub fn drain_reclaimed<F>(&mut self, mut deliver: F) -> usize
    where
        F: FnMut(P),
    {
        let reclaimed: Vec<DefaultKey> = self
            .watches
            .iter()
            .filter(|(_, w)| w.target.strong_count() == 0)
            .map(|(k, _)| k)
            .collect();

        let mut delivered = 0;
        for k in reclaimed {
            if let Some(watch) = self.watches.remove(k) {
                log::trace!("delivering reclamation notification {:?}", Registration(k));
                deliver(watch.payload);
                delivered += 1;
            }
        }
        delivered
    }
}

impl<T: ?Sized, P> Default for ReclamationRegistry<T, P> {
    fn default() -> Self {
        Self::new()
    }
}
