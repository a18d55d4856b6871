//! `kvpaxos` is a replicated key/value service that uses a [paxos::Peer] as a shared log: every
//! client `put`/`get` is proposed as a log entry, and every replica applies decided entries to its
//! own map in the same order, so all replicas' maps converge.
//!
//! See `paxos` for the underlying agreement primitive this crate builds on.

mod clerk;
mod replica;

pub use clerk::Clerk;
pub use replica::Replica;

pub use kvpaxos_pb::{ClientID, Error, KvPaxosClient, KvPaxosServer, KvPaxosService};

/////////////////////////////////////////////// indicio ////////////////////////////////////////////

pub static COLLECTOR: indicio::Collector = indicio::Collector::new();

//////////////////////////////////////////// biometrics /////////////////////////////////////////////

pub fn register_biometrics(collector: &mut biometrics::Collector) {
    replica::register_biometrics(collector);
}

////////////////////////////////////////////// tatl /////////////////////////////////////////////////

pub fn register_monitors(hey_listen: &mut tatl::HeyListen) {
    replica::register_monitors(hey_listen);
}
