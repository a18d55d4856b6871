use std::sync::{Arc, Mutex};

use biometrics::Counter;
use paxos_pb::{Ballot, Decided, DecidedAck, Error, Phase1A, Phase1B, Phase2A, Phase2B};
use rpc_pb::Context;

use super::state::PeerState;

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static PHASE1_PROMISED: Counter = Counter::new("paxos.acceptor.phase1.promised");
static PHASE1_REJECTED: Counter = Counter::new("paxos.acceptor.phase1.rejected");
static PHASE2_ACCEPTED: Counter = Counter::new("paxos.acceptor.phase2.accepted");
static PHASE2_REJECTED: Counter = Counter::new("paxos.acceptor.phase2.rejected");
static DECIDED_APPLIED: Counter = Counter::new("paxos.acceptor.decided");
static BELOW_MIN: Counter = Counter::new("paxos.acceptor.below_min");

pub fn register_biometrics(collector: &mut biometrics::Collector) {
    collector.register_counter(&PHASE1_PROMISED);
    collector.register_counter(&PHASE1_REJECTED);
    collector.register_counter(&PHASE2_ACCEPTED);
    collector.register_counter(&PHASE2_REJECTED);
    collector.register_counter(&DECIDED_APPLIED);
    collector.register_counter(&BELOW_MIN);
}

/// Serves [paxos_pb::AcceptorService] on behalf of a [super::Peer], mutating the same
/// [super::state::PeerState] that proposer threads on this peer read and write.
pub(crate) struct Acceptor {
    pub(crate) state: Arc<Mutex<PeerState>>,
}

impl Clone for Acceptor {
    fn clone(&self) -> Self {
        Acceptor {
            state: Arc::clone(&self.state),
        }
    }
}

impl paxos_pb::AcceptorService for Acceptor {
    fn phase1(&self, _ctx: &Context, req: Phase1A) -> Result<Phase1B, Error> {
        let mut state = self.state.lock().unwrap();
        state.observe_done(req.sender, req.sender_done);
        if req.seq < state.min() {
            BELOW_MIN.click();
            return Ok(Phase1B {
                ok: false,
                ballot: Ballot::BOTTOM,
                has_accepted: false,
                highest_accepted: Ballot::BOTTOM,
                accepted_value: Vec::new(),
            });
        }
        let instance = state.instance(req.seq);
        if instance.prepare(req.ballot) {
            PHASE1_PROMISED.click();
            Ok(Phase1B {
                ok: true,
                ballot: req.ballot,
                has_accepted: instance.accepted_value.is_some(),
                highest_accepted: instance.highest_accepted,
                accepted_value: instance.accepted_value.clone().unwrap_or_default(),
            })
        } else {
            PHASE1_REJECTED.click();
            Ok(Phase1B {
                ok: false,
                ballot: instance.highest_prepared,
                has_accepted: false,
                highest_accepted: Ballot::BOTTOM,
                accepted_value: Vec::new(),
            })
        }
    }

    fn phase2(&self, _ctx: &Context, req: Phase2A) -> Result<Phase2B, Error> {
        let mut state = self.state.lock().unwrap();
        state.observe_done(req.sender, req.sender_done);
        if req.seq < state.min() {
            BELOW_MIN.click();
            return Ok(Phase2B {
                ok: false,
                ballot: Ballot::BOTTOM,
            });
        }
        let instance = state.instance(req.seq);
        if instance.accept(req.ballot, req.value) {
            PHASE2_ACCEPTED.click();
            Ok(Phase2B {
                ok: true,
                ballot: req.ballot,
            })
        } else {
            PHASE2_REJECTED.click();
            Ok(Phase2B {
                ok: false,
                ballot: instance.highest_prepared,
            })
        }
    }

    fn decided(&self, _ctx: &Context, req: Decided) -> Result<DecidedAck, Error> {
        let mut state = self.state.lock().unwrap();
        state.observe_done(req.sender, req.sender_done);
        if req.seq >= state.min() {
            state.instance(req.seq).decide(req.value);
            DECIDED_APPLIED.click();
        }
        Ok(DecidedAck { ok: true })
    }
}
