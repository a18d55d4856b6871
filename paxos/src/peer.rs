use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use guacamole::Guacamole;
use paxos_pb::{AcceptorClient, AcceptorServer, ReplicaID};
use rpc_pb::Client;

use super::acceptor::Acceptor;
use super::proposer;
use super::state::PeerState;

/// What a peer knows about one instance, as observed by [Peer::status].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Status {
    /// No value has been decided for this instance yet, as far as this peer knows.
    Pending,
    /// This instance has decided on the enclosed value.
    Decided(Vec<u8>),
}

pub(crate) struct PeerInner {
    pub(crate) me: ReplicaID,
    pub(crate) local: Acceptor,
    pub(crate) remotes: Vec<(ReplicaID, AcceptorClient)>,
    pub(crate) state: Arc<Mutex<PeerState>>,
    pub(crate) quorum: usize,
    pub(crate) rng: Mutex<Guacamole>,
    pub(crate) dead: AtomicBool,
}

impl PeerInner {
    pub(crate) fn my_done(&self) -> i64 {
        let state = self.state.lock().unwrap();
        *state.done.get(&self.me).unwrap_or(&paxos_pb::NEVER_DONE)
    }

    pub(crate) fn is_decided(&self, seq: u64) -> bool {
        let state = self.state.lock().unwrap();
        state
            .instances
            .get(&seq)
            .map(|instance| instance.decided)
            .unwrap_or(false)
    }
}

/// A peer in a Paxos peer group: one [Peer] per process, holding one [paxos_pb::AcceptorService]
/// implementation (served to the other peers over RPC) plus however many proposer threads are
/// currently chasing agreement on an instance this peer started.
///
/// All state lives behind a single [Mutex] (see [PeerState]); network calls made by a proposer
/// thread never hold that lock, so a slow or unreachable peer blocks only the thread proposing to
/// it, never the acceptor answering other peers' RPCs.
#[derive(Clone)]
pub struct Peer {
    inner: Arc<PeerInner>,
}

impl Peer {
    /// Construct a peer for `me` among `peers`, given one [AcceptorClient] per peer other than
    /// `me` (ordered to match `peers` with `me` itself omitted). Returns the [Peer] handle and the
    /// [AcceptorServer] to register with a [rpc_sync::server::ServiceRegistry] (or any other
    /// [rpc_pb::Server] host) under the name `"AcceptorService"`.
    pub fn new(
        me: ReplicaID,
        peers: Vec<ReplicaID>,
        clients: Vec<Arc<dyn Client + Send + Sync + 'static>>,
    ) -> (Peer, AcceptorServer<Acceptor>) {
        assert_eq!(
            peers.iter().filter(|&&p| p != me).count(),
            clients.len(),
            "need exactly one client per peer other than `me`",
        );
        let state = Arc::new(Mutex::new(PeerState::new(me, peers.clone())));
        let local = Acceptor {
            state: Arc::clone(&state),
        };
        let remotes = peers
            .iter()
            .copied()
            .filter(|&p| p != me)
            .zip(clients.into_iter().map(AcceptorClient::new))
            .collect();
        let quorum = peers.len() / 2 + 1;
        let seed = u64::from_le_bytes(me.id[0..8].try_into().unwrap());
        let inner = Arc::new(PeerInner {
            me,
            local: local.clone(),
            remotes,
            state,
            quorum,
            rng: Mutex::new(Guacamole::new(seed)),
            dead: AtomicBool::new(false),
        });
        let server = AcceptorServer::bind(local);
        (Peer { inner }, server)
    }

    /// Begin proposing `value` for instance `seq`. Spawns a background thread that runs Paxos
    /// until it observes `seq` decided, whether by winning itself or by learning of another
    /// proposer's win. Calling `start` again for the same `seq` (e.g. with a different `value`)
    /// simply races a second proposer against the first; only one value will ever be decided.
    pub fn start(&self, seq: u64, value: Vec<u8>) {
        // Calling start(j) after done(i) with j <= i is an application bug, not a transient
        // condition, so this is a debug-only check rather than a runtime error.
        debug_assert!(
            seq >= self.min(),
            "start({seq}) called on an instance already forgotten by done()",
        );
        let inner = Arc::clone(&self.inner);
        std::thread::spawn(move || proposer::propose(inner, seq, value));
    }

    /// What this peer currently knows about instance `seq`.
    pub fn status(&self, seq: u64) -> Status {
        let state = self.inner.state.lock().unwrap();
        match state.instances.get(&seq) {
            Some(instance) if instance.decided => {
                Status::Decided(instance.value.clone().unwrap_or_default())
            }
            _ => Status::Pending,
        }
    }

    /// Tell this peer it no longer needs instances `<= seq`; once every peer has called `done`
    /// with at least this `seq`, their memory of it is reclaimed.
    pub fn done(&self, seq: u64) {
        let mut state = self.inner.state.lock().unwrap();
        state.done(seq);
    }

    /// `1 + min(done across every peer this peer has heard from)`.
    pub fn min(&self) -> u64 {
        self.inner.state.lock().unwrap().min()
    }

    /// The highest seq this peer has heard of, via either a proposal or a [paxos_pb::Decided].
    pub fn max(&self) -> Option<u64> {
        self.inner.state.lock().unwrap().max()
    }

    /// Stop proposing. In-flight proposer threads notice on their next round and exit; already
    /// in-flight RPCs are not canceled.
    pub fn kill(&self) {
        self.inner.dead.store(true, Ordering::Release);
    }

    pub fn me(&self) -> ReplicaID {
        self.inner.me
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_lone_peer_decides_immediately() {
        let me = ReplicaID::BOTTOM;
        let (peer, _server) = Peer::new(me, vec![me], vec![]);
        peer.start(1, b"only value".to_vec());
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            if let Status::Decided(value) = peer.status(1) {
                assert_eq!(b"only value".to_vec(), value);
                return;
            }
            assert!(std::time::Instant::now() < deadline, "never decided");
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
    }
}
