use std::collections::HashMap;

use paxos_pb::{ReplicaID, NEVER_DONE};

use super::instance::Instance;

/// All of a peer's mutable state, held behind one lock. Network I/O never happens while this is
/// locked; see the module docs on `Peer` for the concurrency discipline.
pub(crate) struct PeerState {
    pub(crate) me: ReplicaID,
    pub(crate) peers: Vec<ReplicaID>,
    pub(crate) instances: HashMap<u64, Instance>,
    pub(crate) done: HashMap<ReplicaID, i64>,
    pub(crate) dead: bool,
}

impl PeerState {
    pub(crate) fn new(me: ReplicaID, peers: Vec<ReplicaID>) -> Self {
        let mut done = HashMap::new();
        for peer in &peers {
            done.insert(*peer, NEVER_DONE);
        }
        Self {
            me,
            peers,
            instances: HashMap::new(),
            done,
            dead: false,
        }
    }

    /// `1 + min(done across every peer)`. All instances with `seq < min()` may be forgotten.
    pub(crate) fn min(&self) -> u64 {
        let floor = self
            .done
            .values()
            .copied()
            .min()
            .unwrap_or(NEVER_DONE);
        (floor + 1).max(0) as u64
    }

    /// The highest seq this peer has ever heard of locally, or `None` if it has heard of none.
    pub(crate) fn max(&self) -> Option<u64> {
        self.instances.keys().copied().max()
    }

    /// Record a peer's self-reported done high-water mark and reclaim anything now below `min()`.
    pub(crate) fn observe_done(&mut self, peer: ReplicaID, done: i64) {
        let entry = self.done.entry(peer).or_insert(NEVER_DONE);
        if done > *entry {
            *entry = done;
        }
        self.gc();
    }

    /// Raise this peer's own done high-water mark to `max(current, seq)`.
    pub(crate) fn done(&mut self, seq: u64) {
        self.observe_done(self.me, seq as i64);
    }

    fn gc(&mut self) {
        let min = self.min();
        self.instances.retain(|seq, _| *seq >= min);
    }

    pub(crate) fn instance(&mut self, seq: u64) -> &mut Instance {
        self.instances.entry(seq).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_starts_at_zero_with_nobody_done() {
        let me = ReplicaID::BOTTOM;
        let other = ReplicaID::TOP;
        let state = PeerState::new(me, vec![me, other]);
        assert_eq!(0, state.min());
    }

    #[test]
    fn min_waits_for_the_slowest_peer() {
        let me = ReplicaID::BOTTOM;
        let other = ReplicaID::TOP;
        let mut state = PeerState::new(me, vec![me, other]);
        state.done(10);
        assert_eq!(0, state.min());
        state.observe_done(other, 4);
        assert_eq!(5, state.min());
    }

    #[test]
    fn gc_reclaims_instances_below_min() {
        let me = ReplicaID::BOTTOM;
        let mut state = PeerState::new(me, vec![me]);
        state.instance(1);
        state.instance(2);
        state.done(1);
        assert!(!state.instances.contains_key(&1));
        assert!(state.instances.contains_key(&2));
    }
}
