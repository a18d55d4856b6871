use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use biometrics::{Counter, Gauge, Sensor};
use buffertk::{stack_pack, Unpackable};
use guacamole::{FromGuacamole, Guacamole};
use kvpaxos_pb::{ClientID, Error, GetRequest, GetResponse, Op, OpKind, PutRequest, PutResponse};
use rpc_pb::Context;
use tatl::BelowThreshold;

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static REQUESTS: Counter = Counter::new("kvpaxos.replica.requests");
static CACHE_HITS: Counter = Counter::new("kvpaxos.replica.requests.cache_hit");
static SLOTS_CLAIMED: Counter = Counter::new("kvpaxos.replica.slots_claimed");
static SLOTS_LOST: Counter = Counter::new("kvpaxos.replica.slots_lost_to_another_proposer");
static OPS_APPLIED: Counter = Counter::new("kvpaxos.replica.ops_applied");

static MAX_CLAIM_ROUND: Gauge = Gauge::new("kvpaxos.replica.max_claim_round");

/// Mirrors `paxos::proposer`'s livelock monitor: fires if a single request's slot-claim loop
/// retries past this many rounds without deciding, which is the operator signal for a stuck
/// replica or a partitioned Paxos peer.
const STALL_THRESHOLD: f64 = 40.0;
static STALL_MONITOR: BelowThreshold =
    BelowThreshold::new("kvpaxos.replica.stall", &MAX_CLAIM_ROUND, STALL_THRESHOLD);

pub fn register_biometrics(collector: &mut biometrics::Collector) {
    collector.register_counter(&REQUESTS);
    collector.register_counter(&CACHE_HITS);
    collector.register_counter(&SLOTS_CLAIMED);
    collector.register_counter(&SLOTS_LOST);
    collector.register_counter(&OPS_APPLIED);
    collector.register_gauge(&MAX_CLAIM_ROUND);
}

pub fn register_monitors(hey_listen: &mut tatl::HeyListen) {
    hey_listen.register_below_threshold(&STALL_MONITOR);
}

const INITIAL_BACKOFF: Duration = Duration::from_millis(10);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

///////////////////////////////////////////// CachedReply //////////////////////////////////////////

/// The reply this replica produced the first (and every subsequent) time it applied a given
/// `(client_id, request_id)`. Stored in [ReplicaState::seen] so a replayed request never
/// re-executes against `db`.
#[derive(Clone, Debug)]
enum CachedReply {
    Put,
    Get(Option<Vec<u8>>),
}

////////////////////////////////////////////// ReplicaState ////////////////////////////////////////

struct ReplicaState {
    db: HashMap<String, Vec<u8>>,
    /// The lowest seq not yet applied to `db`.
    next_apply: u64,
    seen: HashMap<(ClientID, u64), CachedReply>,
}

impl ReplicaState {
    fn new() -> Self {
        Self {
            db: HashMap::new(),
            next_apply: 0,
            seen: HashMap::new(),
        }
    }

    /// Apply a decided `op` to `db` if it hasn't been applied before, recording the reply either
    /// way so callers racing to claim the same request are answered identically.
    fn apply(&mut self, op: Op) {
        let key = (op.client_id, op.request_id);
        if self.seen.contains_key(&key) {
            return;
        }
        let reply = match op.kind {
            OpKind::Put { key: k, value } => {
                self.db.insert(k, value);
                CachedReply::Put
            }
            OpKind::Get { key: k } => CachedReply::Get(self.db.get(&k).cloned()),
        };
        OPS_APPLIED.click();
        self.seen.insert(key, reply);
    }
}

////////////////////////////////////////////////// Replica //////////////////////////////////////////

struct ReplicaInner {
    peer: paxos::Peer,
    state: Mutex<ReplicaState>,
    rng: Mutex<Guacamole>,
    dead: AtomicBool,
}

/// A key/value replica that proposes every `put`/`get` as a log entry through a [paxos::Peer] and
/// applies decided entries to a local map in `seq` order. Every replica in a cluster, given the
/// same decided log, converges on the same `db`.
///
/// Holds exactly one lock ([ReplicaState], behind a [Mutex]) across local reads/writes only; the
/// slot-claim loop's calls into [paxos::Peer] and its backoff sleeps happen with the lock
/// released, so one client's slow request never blocks another client's request to the same
/// replica from claiming a different slot.
#[derive(Clone)]
pub struct Replica {
    inner: Arc<ReplicaInner>,
}

impl Replica {
    /// Build a replica driven by `peer`, which must already be wired to the rest of the Paxos
    /// cluster (see [paxos::Peer::new]).
    pub fn new(peer: paxos::Peer) -> Replica {
        let seed = peer.me().id[0..8].try_into().map(u64::from_le_bytes).unwrap_or(0);
        Replica {
            inner: Arc::new(ReplicaInner {
                peer,
                state: Mutex::new(ReplicaState::new()),
                rng: Mutex::new(Guacamole::new(seed)),
                dead: AtomicBool::new(false),
            }),
        }
    }

    /// Stop serving. In-flight slot-claim loops notice on their next poll and abandon the request;
    /// already-decided state is unaffected.
    pub fn kill(&self) {
        self.inner.dead.store(true, Ordering::Release);
    }

    fn execute(&self, op: Op) -> Result<CachedReply, Error> {
        REQUESTS.click();
        let key = (op.client_id, op.request_id);
        {
            let state = self.inner.state.lock().unwrap();
            if let Some(reply) = state.seen.get(&key) {
                CACHE_HITS.click();
                return Ok(reply.clone());
            }
        }
        let op_bytes = stack_pack(op).to_vec();
        let claimed_seq = self.claim_slot(&op_bytes).ok_or(Error::Shutdown {
            core: Default::default(),
        })?;
        SLOTS_CLAIMED.click();
        let reply = self.catch_up(claimed_seq, &key);
        self.inner.peer.done(claimed_seq);
        Ok(reply)
    }

    /// Propose `op_bytes` starting at the lowest slot this replica hasn't yet applied, walking
    /// forward through any slot another proposer (on this or another replica) wins first, until
    /// this replica's own op is the one decided for some slot. Returns `None` if [Self::kill] is
    /// called before that happens, in which case no slot was claimed and the request must be
    /// reported as abandoned rather than answered.
    fn claim_slot(&self, op_bytes: &[u8]) -> Option<u64> {
        let mut seq = self.inner.state.lock().unwrap().next_apply;
        loop {
            self.inner.peer.start(seq, op_bytes.to_vec());
            let mut backoff = INITIAL_BACKOFF;
            let mut round = 0u64;
            loop {
                if self.inner.dead.load(Ordering::Acquire) {
                    return None;
                }
                match self.inner.peer.status(seq) {
                    paxos::Status::Decided(value) => {
                        if value == op_bytes {
                            MAX_CLAIM_ROUND.set(0.0);
                            return Some(seq);
                        }
                        SLOTS_LOST.click();
                        break;
                    }
                    paxos::Status::Pending => {
                        round += 1;
                        MAX_CLAIM_ROUND.set(MAX_CLAIM_ROUND.read().max(round as f64));
                        backoff = self.sleep_with_jitter(backoff);
                    }
                }
            }
            seq += 1;
        }
    }

    /// Apply every decided op in `[next_apply, claimed_seq]` to `db`, in order. By construction of
    /// [Self::claim_slot], every slot in this range is already decided: the claim loop only moves
    /// past a slot once it observes that slot's decision.
    fn catch_up(&self, claimed_seq: u64, key: &(ClientID, u64)) -> CachedReply {
        let mut state = self.inner.state.lock().unwrap();
        while state.next_apply <= claimed_seq {
            let i = state.next_apply;
            if let paxos::Status::Decided(value) = self.inner.peer.status(i) {
                if let Ok((op, _)) = Op::unpack(&value) {
                    state.apply(op);
                }
            }
            state.next_apply = i + 1;
        }
        state
            .seen
            .get(key)
            .cloned()
            .expect("catch_up must have applied the op this request just claimed a slot for")
    }

    fn sleep_with_jitter(&self, backoff: Duration) -> Duration {
        let jitter: f64 = {
            let mut rng = self.inner.rng.lock().unwrap();
            f64::from_guacamole(&mut (), &mut rng)
        };
        std::thread::sleep(backoff.mul_f64(0.5 + jitter));
        Duration::from_secs_f64((backoff.as_secs_f64() * 2.0).min(MAX_BACKOFF.as_secs_f64()))
    }
}

impl kvpaxos_pb::KvPaxosService for Replica {
    fn put(&self, _ctx: &Context, req: PutRequest) -> Result<PutResponse, Error> {
        let op = Op {
            client_id: req.client_id,
            request_id: req.request_id,
            kind: OpKind::Put {
                key: req.key,
                value: req.value,
            },
        };
        self.execute(op)?;
        Ok(PutResponse {})
    }

    fn get(&self, _ctx: &Context, req: GetRequest) -> Result<GetResponse, Error> {
        let key = req.key.clone();
        let op = Op {
            client_id: req.client_id,
            request_id: req.request_id,
            kind: OpKind::Get { key: req.key },
        };
        match self.execute(op)? {
            CachedReply::Get(Some(value)) => Ok(GetResponse { value }),
            CachedReply::Get(None) => Err(Error::ErrNoKey {
                core: Default::default(),
                key,
            }),
            CachedReply::Put => unreachable!("a Get op can never cache a Put reply"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_is_idempotent_per_request_id() {
        let mut state = ReplicaState::new();
        let client = ClientID::BOTTOM;
        state.apply(Op {
            client_id: client,
            request_id: 1,
            kind: OpKind::Put {
                key: "a".to_string(),
                value: b"1".to_vec(),
            },
        });
        state.apply(Op {
            client_id: client,
            request_id: 1,
            kind: OpKind::Put {
                key: "a".to_string(),
                value: b"2".to_vec(),
            },
        });
        assert_eq!(Some(&b"1".to_vec()), state.db.get("a"));
    }

    #[test]
    fn get_reflects_prior_put_in_log_order() {
        let mut state = ReplicaState::new();
        let client = ClientID::BOTTOM;
        state.apply(Op {
            client_id: client,
            request_id: 1,
            kind: OpKind::Put {
                key: "a".to_string(),
                value: b"1".to_vec(),
            },
        });
        state.apply(Op {
            client_id: client,
            request_id: 2,
            kind: OpKind::Get {
                key: "a".to_string(),
            },
        });
        match state.seen.get(&(client, 2)) {
            Some(CachedReply::Get(Some(value))) => assert_eq!(b"1".to_vec(), *value),
            other => panic!("expected a cached Get(Some), got {other:?}"),
        }
    }

    #[test]
    fn get_of_unknown_key_caches_none() {
        let mut state = ReplicaState::new();
        let client = ClientID::BOTTOM;
        state.apply(Op {
            client_id: client,
            request_id: 1,
            kind: OpKind::Get {
                key: "missing".to_string(),
            },
        });
        match state.seen.get(&(client, 1)) {
            Some(CachedReply::Get(None)) => {}
            other => panic!("expected a cached Get(None), got {other:?}"),
        }
    }
}
