//! `viewservice` is a single, trusted sequencer of primary/backup views. Replicas ping it every
//! `ping_interval`; it elects a primary and backup from whoever pings, and advances to a new view
//! only once the current view's primary has acknowledged it, per the acknowledgment rule in
//! [service::Service::tick].
//!
//! See `pbservice` for the primary/backup replica that is this service's principal client.

mod clerk;
mod service;

pub use clerk::Clerk;
pub use service::{Service, ServiceOptions};

pub use viewservice_pb::{Error, View, ViewService, ViewServiceClient, ViewServiceServer};

/////////////////////////////////////////////// indicio ////////////////////////////////////////////

pub static COLLECTOR: indicio::Collector = indicio::Collector::new();

//////////////////////////////////////////// biometrics /////////////////////////////////////////////

pub fn register_biometrics(collector: &mut biometrics::Collector) {
    service::register_biometrics(collector);
}

////////////////////////////////////////////// tatl /////////////////////////////////////////////////

pub fn register_monitors(hey_listen: &mut tatl::HeyListen) {
    service::register_monitors(hey_listen);
}
