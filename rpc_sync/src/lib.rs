//! A synchronous, thread-per-connection implementation of [rpc_pb]'s [rpc_pb::Client] and
//! [rpc_pb::Server] traits, plus an in-process [LocalTransport] used by tests to inject message
//! loss, duplication, and reordering without a real socket.
//!
//! Process bootstrap, TLS, and connection pooling are deliberately left out: the transport here is
//! an untrusted point-to-point request/reply channel, as the services built on top of it expect.

mod client;
mod local;
mod server;
mod wire;

pub use client::{new_client, ClientOptions};
pub use local::{LocalNetwork, LocalTransport, UnreliabilityOptions};
pub use server::{Server, ServerOptions, ServiceRegistry};

use biometrics::Collector;

/// Register every biometric this crate emits.
pub fn register_biometrics(collector: &mut Collector) {
    client::register_biometrics(collector);
    server::register_biometrics(collector);
}

pub static COLLECTOR: indicio::Collector = indicio::Collector::new();
