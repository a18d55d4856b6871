//! `pbservice` is a primary/backup key/value replica. Each replica pings `viewservice` every
//! `ping_interval` to learn its role; the primary forwards writes to the backup and transfers
//! state on backup change. Unlike `kvpaxos`, `pbservice` keeps no `seen` dedup table: a retried
//! write that actually committed but whose acknowledgment was lost may be applied twice. This is
//! documented, not patched, per the design this replica implements.

mod clerk;
mod replica;

pub use clerk::Clerk;
pub use replica::{Connect, Replica, ReplicaOptions};

pub use pbservice_pb::{Error, PbService, PbServiceClient, PbServiceServer};

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
