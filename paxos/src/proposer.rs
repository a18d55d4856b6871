use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use biometrics::{Counter, Gauge, Sensor};
use guacamole::FromGuacamole;
use paxos_pb::{AcceptorService, Ballot, Decided, Phase1A, Phase1B, Phase2A, Phase2B};
use rpc_pb::Context;
use tatl::BelowThreshold;

use super::peer::PeerInner;

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static ROUNDS_STARTED: Counter = Counter::new("paxos.proposer.rounds");
static ROUNDS_WON: Counter = Counter::new("paxos.proposer.rounds.won");
static ROUNDS_RETRIED: Counter = Counter::new("paxos.proposer.rounds.retried");

static MAX_RETRY_ROUND: Gauge = Gauge::new("paxos.proposer.max_retry_round");

/// Fires once any in-flight proposal has retried past [LIVELOCK_THRESHOLD] rounds without
/// deciding, which is the operator-facing signal for a partition or persistent livelock; the
/// protocol itself does not change behavior in response.
const LIVELOCK_THRESHOLD: f64 = 20.0;
static LIVELOCK_MONITOR: BelowThreshold =
    BelowThreshold::new("paxos.proposer.livelock", &MAX_RETRY_ROUND, LIVELOCK_THRESHOLD);

pub fn register_biometrics(collector: &mut biometrics::Collector) {
    collector.register_counter(&ROUNDS_STARTED);
    collector.register_counter(&ROUNDS_WON);
    collector.register_counter(&ROUNDS_RETRIED);
    collector.register_gauge(&MAX_RETRY_ROUND);
}

pub fn register_monitors(hey_listen: &mut tatl::HeyListen) {
    hey_listen.register_below_threshold(&LIVELOCK_MONITOR);
}

const INITIAL_BACKOFF: Duration = Duration::from_millis(10);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Drive one instance's proposer until it observes `seq` decided, either by winning Phase 2 itself
/// or by learning of another proposer's win. Intended to run on its own thread; spawned by
/// [super::Peer::start].
pub(crate) fn propose(inner: Arc<PeerInner>, seq: u64, value: Vec<u8>) {
    let mut hints: Vec<Ballot> = Vec::new();
    let mut last_ballot = Ballot::BOTTOM;
    let mut backoff = INITIAL_BACKOFF;
    let mut round = 0u64;
    loop {
        if inner.dead.load(Ordering::Acquire) || inner.is_decided(seq) {
            return;
        }
        ROUNDS_STARTED.click();
        round += 1;
        MAX_RETRY_ROUND.set(MAX_RETRY_ROUND.read().max(round as f64));
        let ballot = Ballot::next(inner.me, last_ballot, hints.drain(..));
        last_ballot = ballot;

        let (promised, mut new_hints) = phase1(&inner, seq, ballot);
        if promised.len() < inner.quorum {
            hints.append(&mut new_hints);
            ROUNDS_RETRIED.click();
            backoff = sleep_with_jitter(&inner, backoff);
            continue;
        }

        let chosen = choose_value(&promised, &value);
        let (accepted, mut new_hints) = phase2(&inner, seq, ballot, chosen.clone());
        if accepted < inner.quorum {
            hints.append(&mut new_hints);
            ROUNDS_RETRIED.click();
            backoff = sleep_with_jitter(&inner, backoff);
            continue;
        }

        broadcast_decided(&inner, seq, chosen);
        ROUNDS_WON.click();
        MAX_RETRY_ROUND.set(0.0);
        return;
    }
}

fn choose_value(promised: &[Phase1B], fallback: &[u8]) -> Vec<u8> {
    let mut best: Option<Ballot> = None;
    let mut chosen = fallback.to_vec();
    for reply in promised {
        let supersedes = match best {
            Some(b) => reply.highest_accepted > b,
            None => true,
        };
        if reply.has_accepted && supersedes {
            best = Some(reply.highest_accepted);
            chosen = reply.accepted_value.clone();
        }
    }
    chosen
}

fn phase1(inner: &Arc<PeerInner>, seq: u64, ballot: Ballot) -> (Vec<Phase1B>, Vec<Ballot>) {
    let req = Phase1A {
        seq,
        ballot,
        sender: inner.me,
        sender_done: inner.my_done(),
    };
    let mut promised = Vec::new();
    let mut hints = Vec::new();
    match inner.local.phase1(&Context::default(), req.clone()) {
        Ok(reply) if reply.ok => promised.push(reply),
        Ok(reply) => hints.push(reply.ballot),
        Err(_) => {}
    }
    for (_, client) in &inner.remotes {
        match client.phase1(&Context::default(), req.clone()) {
            Ok(reply) if reply.ok => promised.push(reply),
            Ok(reply) => hints.push(reply.ballot),
            Err(_) => {}
        }
    }
    (promised, hints)
}

fn phase2(inner: &Arc<PeerInner>, seq: u64, ballot: Ballot, value: Vec<u8>) -> (usize, Vec<Ballot>) {
    let req = Phase2A {
        seq,
        ballot,
        value,
        sender: inner.me,
        sender_done: inner.my_done(),
    };
    let mut accepted = 0;
    let mut hints = Vec::new();
    let mut tally = |reply: Result<Phase2B, paxos_pb::Error>| match reply {
        Ok(reply) if reply.ok => accepted += 1,
        Ok(reply) => hints.push(reply.ballot),
        Err(_) => {}
    };
    tally(inner.local.phase2(&Context::default(), req.clone()));
    for (_, client) in &inner.remotes {
        tally(client.phase2(&Context::default(), req.clone()));
    }
    (accepted, hints)
}

fn broadcast_decided(inner: &Arc<PeerInner>, seq: u64, value: Vec<u8>) {
    let req = Decided {
        seq,
        value,
        sender: inner.me,
        sender_done: inner.my_done(),
    };
    let _ = inner.local.decided(&Context::default(), req.clone());
    for (_, client) in &inner.remotes {
        let _ = client.decided(&Context::default(), req.clone());
    }
}

fn sleep_with_jitter(inner: &Arc<PeerInner>, backoff: Duration) -> Duration {
    let jitter: f64 = {
        let mut rng = inner.rng.lock().unwrap();
        f64::from_guacamole(&mut (), &mut rng)
    };
    let jittered = backoff.mul_f64(0.5 + jitter);
    std::thread::sleep(jittered);
    Duration::from_secs_f64((backoff.as_secs_f64() * 2.0).min(MAX_BACKOFF.as_secs_f64()))
}
