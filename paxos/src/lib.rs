//! `paxos` is a peer library implementing classical single-decree Paxos over an unbounded family
//! of independent instances, each identified by a `u64` sequence number. One [Peer] runs the
//! acceptor for every instance this process hosts and spawns one proposer thread per instance a
//! caller starts; agreement on each instance is reached independently of every other instance.
//!
//! See `kvpaxos` for an application built on top of this peer.

mod acceptor;
mod instance;
mod peer;
mod proposer;
mod state;

pub use peer::{Peer, Status};

pub use paxos_pb::{AcceptorClient, AcceptorServer, AcceptorService, Ballot, NEVER_DONE};

/////////////////////////////////////////////// indicio ////////////////////////////////////////////

pub static COLLECTOR: indicio::Collector = indicio::Collector::new();

//////////////////////////////////////////// biometrics /////////////////////////////////////////////

pub fn register_biometrics(collector: &mut biometrics::Collector) {
    acceptor::register_biometrics(collector);
    proposer::register_biometrics(collector);
}

////////////////////////////////////////////// tatl /////////////////////////////////////////////////

pub fn register_monitors(hey_listen: &mut tatl::HeyListen) {
    proposer::register_monitors(hey_listen);
}
