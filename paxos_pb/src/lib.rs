//! Protocol buffers for the Paxos agreement protocol: ballots, the acceptor's phase1/phase2
//! messages, and the decided broadcast. See `paxos` for the peer that speaks this protocol.

use prototk_derive::Message;

use one_two_eight::{generate_id, generate_id_prototk};

use rpc_pb::service;

use zerror_core::ErrorCore;

///////////////////////////////////////////// Constants ////////////////////////////////////////////

/// Sentinel meaning "this peer has never called `done`".
pub const NEVER_DONE: i64 = -1;

//////////////////////////////////////////////// IDs ///////////////////////////////////////////////

generate_id!(ReplicaID, "replica:");
generate_id_prototk!(ReplicaID);

/////////////////////////////////////////////// Error //////////////////////////////////////////////

#[derive(Message, zerror_derive::Z)]
pub enum Error {
    #[prototk(376832, message)]
    Success {
        #[prototk(1, message)]
        core: ErrorCore,
    },
    #[prototk(376833, message)]
    SerializationError {
        #[prototk(1, message)]
        core: ErrorCore,
        #[prototk(2, message)]
        what: prototk::Error,
    },
    #[prototk(376834, message)]
    RpcError {
        #[prototk(1, message)]
        core: ErrorCore,
        #[prototk(2, message)]
        what: rpc_pb::Error,
    },
    /// `start(j)` was called on this peer after `done(i)` with `j <= i`. Indicates a bug in the
    /// application driving this peer, not a transient fault.
    #[prototk(376835, message)]
    DoneViolation {
        #[prototk(1, message)]
        core: ErrorCore,
        #[prototk(2, uint64)]
        seq: u64,
        #[prototk(3, uint64)]
        done: u64,
    },
}

impl Default for Error {
    fn default() -> Self {
        Self::Success {
            core: ErrorCore::default(),
        }
    }
}

impl From<prototk::Error> for Error {
    fn from(what: prototk::Error) -> Self {
        Self::SerializationError {
            core: ErrorCore::default(),
            what,
        }
    }
}

impl From<rpc_pb::Error> for Error {
    fn from(what: rpc_pb::Error) -> Self {
        Self::RpcError {
            core: ErrorCore::default(),
            what,
        }
    }
}

////////////////////////////////////////////// Ballot //////////////////////////////////////////////

/// A ballot is the proposal number used to order Phase1/Phase2 rounds within one Paxos instance.
/// Ballots are the ordered pair `(number, leader)`, so that no two peers ever contend for the same
/// ballot: only `leader` may issue proposals bearing it. Ballots compare lexicographically by
/// `(number, leader)`, which gives a proposer whose ballot was superseded a way to pick a new one
/// that supersedes both the old ballot and the one that beat it, by jumping its `number` past the
/// competitor's.
#[derive(Clone, Copy, Debug, Eq, Hash, Message, PartialEq, PartialOrd, Ord)]
pub struct Ballot {
    #[prototk(1, uint64)]
    pub number: u64,
    #[prototk(2, message)]
    pub leader: ReplicaID,
}

impl Ballot {
    /// Strictly less than every ballot any peer will ever propose.
    pub const BOTTOM: Ballot = Ballot {
        number: 0,
        leader: ReplicaID::BOTTOM,
    };

    /// The next ballot `leader` may use that is guaranteed to exceed `previous` (the last ballot
    /// `leader` itself proposed for this instance, or [Ballot::BOTTOM] if this is its first
    /// attempt) and every ballot named in `hints`. Ignoring `previous` would let a round that
    /// returned no hints at all — e.g. every remote acceptor timed out rather than rejecting —
    /// reset `number` back to `1`, violating monotonicity across a single proposer's attempts.
    pub fn next(leader: ReplicaID, previous: Ballot, hints: impl IntoIterator<Item = Ballot>) -> Ballot {
        let mut number = previous.number + 1;
        for hint in hints {
            if hint.number >= number {
                number = hint.number + 1;
            }
        }
        Ballot { number, leader }
    }
}

impl Default for Ballot {
    fn default() -> Self {
        Self::BOTTOM
    }
}

////////////////////////////////////////////// Phase1A /////////////////////////////////////////////

/// Phase1A messages rally support for a new ballot on one instance. Answered with [Phase1B].
#[derive(Clone, Debug, Default, Message)]
pub struct Phase1A {
    #[prototk(1, uint64)]
    pub seq: u64,
    #[prototk(2, message)]
    pub ballot: Ballot,
    #[prototk(3, message)]
    pub sender: ReplicaID,
    /// The sender's own highest `done` sequence, or [NEVER_DONE]. Piggybacked so the receiver can
    /// advance its view of `min()` without a dedicated RPC.
    #[prototk(4, int64)]
    pub sender_done: i64,
}

////////////////////////////////////////////// Phase1B /////////////////////////////////////////////

/// An acceptor's answer to [Phase1A]: either a promise, carrying whatever it had already accepted,
/// or a rejection carrying a hint the proposer can jump past.
#[derive(Clone, Debug, Default, Message)]
pub struct Phase1B {
    #[prototk(1, Bool)]
    pub ok: bool,
    #[prototk(2, message)]
    pub ballot: Ballot,
    #[prototk(3, Bool)]
    pub has_accepted: bool,
    #[prototk(4, message)]
    pub highest_accepted: Ballot,
    #[prototk(5, bytes)]
    pub accepted_value: Vec<u8>,
}

////////////////////////////////////////////// Phase2A /////////////////////////////////////////////

/// Phase2A asks acceptors to accept `value` under `ballot`, a ballot previously rallied by
/// [Phase1A]/[Phase1B].
#[derive(Clone, Debug, Default, Message)]
pub struct Phase2A {
    #[prototk(1, uint64)]
    pub seq: u64,
    #[prototk(2, message)]
    pub ballot: Ballot,
    #[prototk(3, bytes)]
    pub value: Vec<u8>,
    #[prototk(4, message)]
    pub sender: ReplicaID,
    #[prototk(5, int64)]
    pub sender_done: i64,
}

////////////////////////////////////////////// Phase2B /////////////////////////////////////////////

/// An acceptor's answer to [Phase2A].
#[derive(Clone, Debug, Default, Message)]
pub struct Phase2B {
    #[prototk(1, Bool)]
    pub ok: bool,
    #[prototk(2, message)]
    pub ballot: Ballot,
}

///////////////////////////////////////////// Decided //////////////////////////////////////////////

/// Broadcast once a proposer observes a majority of [Phase2B] acceptances; tells every peer the
/// instance is settled so they need not run Phase1/Phase2 themselves to learn it.
#[derive(Clone, Debug, Default, Message)]
pub struct Decided {
    #[prototk(1, uint64)]
    pub seq: u64,
    #[prototk(2, bytes)]
    pub value: Vec<u8>,
    #[prototk(3, message)]
    pub sender: ReplicaID,
    #[prototk(4, int64)]
    pub sender_done: i64,
}

/// Acknowledgment of [Decided]. Carries no information; its only purpose is to let the sender's
/// RPC layer know the peer is alive.
#[derive(Clone, Debug, Default, Message)]
pub struct DecidedAck {
    #[prototk(1, Bool)]
    pub ok: bool,
}

///////////////////////////////////////////// Acceptor /////////////////////////////////////////////

// The mutable memory of the system: every peer serves [AcceptorService] so that any peer can play
// proposer against any other peer's acceptor state.
service! {
    name = AcceptorService;
    server = AcceptorServer;
    client = AcceptorClient;
    error = Error;

    rpc phase1(Phase1A) -> Phase1B;
    rpc phase2(Phase2A) -> Phase2B;
    rpc decided(Decided) -> DecidedAck;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ballot_ordering_by_number_then_leader() {
        let a = ReplicaID::BOTTOM;
        let b = ReplicaID::TOP;
        assert!(Ballot { number: 1, leader: a } < Ballot { number: 2, leader: a });
        assert!(Ballot { number: 1, leader: a } < Ballot { number: 1, leader: b });
        assert_eq!(Ballot::BOTTOM, Ballot::default());
    }

    #[test]
    fn next_ballot_beats_every_hint() {
        let me = ReplicaID::BOTTOM;
        let hints = vec![
            Ballot { number: 3, leader: ReplicaID::TOP },
            Ballot { number: 5, leader: me },
        ];
        let next = Ballot::next(me, Ballot::BOTTOM, hints);
        assert!(next.number > 5);
        assert_eq!(next.leader, me);
    }

    #[test]
    fn next_ballot_beats_previous_even_with_no_hints() {
        let me = ReplicaID::BOTTOM;
        let previous = Ballot { number: 7, leader: me };
        let next = Ballot::next(me, previous, std::iter::empty());
        assert!(next.number > previous.number);
    }
}
