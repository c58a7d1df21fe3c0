//! When a `WeakValueMap` delivers pending reclamation notifications on its
//! own, without an explicit `sweep`.

use core::num::NonZeroUsize;

/// Automatic sweep schedule, checked at the end of every mutating call
/// (`insert`, `remove`). `sweep` can always be called directly.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SweepPolicy {
    /// Only an explicit `sweep` delivers notifications.
    Manual,
    /// Sweep after every `n`-th mutation.
    Every(NonZeroUsize),
    /// Sweep once the mutations since the last sweep reach the number of
    /// entries that sweep left behind (at least one). The polling cost stays
    /// amortized O(1) per mutation, and between sweeps the table holds at most
    /// twice the entries of the last sweep plus one.
    #[default]
    Amortized,
}

impl SweepPolicy {
    /// `swept_len` is the table length right after the last sweep.
    pub(crate) fn is_due(self, mutations: usize, swept_len: usize) -> bool {
        match self {
            SweepPolicy::Manual => false,
            SweepPolicy::Every(n) => mutations >= n.get(),
            SweepPolicy::Amortized => mutations >= swept_len.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_is_never_due() {
        assert!(!SweepPolicy::Manual.is_due(usize::MAX, 0));
    }

    #[test]
    fn every_counts_mutations() {
        let p = SweepPolicy::Every(NonZeroUsize::new(3).unwrap());
        assert!(!p.is_due(2, 100));
        assert!(p.is_due(3, 100));
    }

    #[test]
    fn amortized_tracks_swept_len() {
        let p = SweepPolicy::default();
        assert_eq!(p, SweepPolicy::Amortized);
        assert!(!p.is_due(3, 4));
        assert!(p.is_due(4, 4));
        assert!(!p.is_due(0, 0));
        assert!(p.is_due(1, 0));
    }
}
