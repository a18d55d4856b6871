//! An in-process [rpc_pb::Client] that calls directly into a [ServiceRegistry] (see
//! [super::server]) without touching a socket, so tests can inject message loss and duplication
//! deterministically instead of racing real sockets against real timeouts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use guacamole::{FromGuacamole, Guacamole};
use rpc_pb::{Context, Error, Host, HostID, Status};

use super::server::ServiceRegistry;

/////////////////////////////////////////// UnreliabilityOptions ///////////////////////////////////

/// Knobs controlling how badly a [LocalTransport] mistreats the calls it carries. Probabilities
/// are in `[0.0, 1.0]`; all-zero reduces a [LocalTransport] to a reliable in-process call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnreliabilityOptions {
    /// Probability that a call is dropped outright, as if the network partitioned.
    pub drop_probability: f64,
    /// Probability that a delivered call is executed a second time against the server, mimicking
    /// a client that retried a request the server had already applied.
    pub duplicate_probability: f64,
}

impl UnreliabilityOptions {
    /// A transport that never loses or duplicates a call.
    pub fn reliable() -> Self {
        Self::default()
    }
}

////////////////////////////////////////////// LocalNetwork ////////////////////////////////////////

/// A shared, in-process registry of [ServiceRegistry]s addressed by [HostID]. Every [LocalTransport]
/// vended by a [LocalNetwork] can reach any peer registered on it.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    peers: Arc<Mutex<HashMap<HostID, Arc<ServiceRegistry>>>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `services` to answer calls addressed to `host`.
    pub fn register(&self, host: &Host, services: ServiceRegistry) {
        self.peers
            .lock()
            .unwrap()
            .insert(host.host_id(), Arc::new(services));
    }

    /// Remove `host` from the network, simulating a crashed server: calls against it will fail
    /// with [Error::TransportFailure] instead of being dispatched.
    pub fn unregister(&self, host: &Host) {
        self.peers.lock().unwrap().remove(&host.host_id());
    }

    fn lookup(&self, host: HostID) -> Option<Arc<ServiceRegistry>> {
        self.peers.lock().unwrap().get(&host).cloned()
    }

    /// Build a [rpc_pb::Client] that calls `to` in-process, seeded with `guacamole` so an entire
    /// test run's drops and duplicates are reproducible from one seed.
    pub fn transport(
        &self,
        to: Host,
        unreliability: UnreliabilityOptions,
        guacamole: Guacamole,
    ) -> Arc<LocalTransport> {
        Arc::new(LocalTransport {
            network: self.clone(),
            to,
            unreliability,
            guacamole: Mutex::new(guacamole),
        })
    }
}

////////////////////////////////////////////// LocalTransport //////////////////////////////////////

/// A [rpc_pb::Client] bound to a single destination [Host] inside a [LocalNetwork], mirroring how
/// [super::client::new_client] binds a `TcpClient` to one remote address.
pub struct LocalTransport {
    network: LocalNetwork,
    to: Host,
    unreliability: UnreliabilityOptions,
    guacamole: Mutex<Guacamole>,
}

impl LocalTransport {
    fn roll(&self) -> f64 {
        let mut guac = self.guacamole.lock().unwrap();
        f64::from_guacamole(&mut (), &mut guac)
    }
}

impl rpc_pb::Client for LocalTransport {
    fn call(&self, ctx: &Context, server: &str, method: &str, req: &[u8]) -> Status {
        let services = self.network.lookup(self.to.host_id()).ok_or_else(|| {
            Error::TransportFailure {
                core: Default::default(),
                what: format!("{:?} is unreachable on the local network", self.to),
            }
        })?;
        if self.roll() < self.unreliability.drop_probability {
            return Err(Error::TransportFailure {
                core: Default::default(),
                what: "dropped by local network fault injection".to_string(),
            });
        }
        let result = services.dispatch(ctx, server, method, req);
        if self.roll() < self.unreliability.duplicate_probability {
            let _ = services.dispatch(ctx, server, method, req);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use rpc_pb::{Client, HostID};

    use super::*;

    struct Echo;

    impl rpc_pb::Server for Echo {
        fn call(&self, _ctx: &Context, method: &str, req: &[u8]) -> Status {
            if method == "echo" {
                Ok(Ok(req.to_vec()))
            } else {
                Ok(Err(b"no such method".to_vec()))
            }
        }
    }

    fn echo_host() -> Host {
        Host::new(HostID::BOTTOM, "echo".to_string())
    }

    #[test]
    fn reliable_transport_delivers_every_call() {
        let network = LocalNetwork::new();
        let mut registry = ServiceRegistry::new();
        registry.register("Echo", Echo);
        network.register(&echo_host(), registry);
        let transport = network.transport(echo_host(), UnreliabilityOptions::reliable(), Guacamole::new(0));
        let ctx = Context::default();
        let got = transport.call(&ctx, "Echo", "echo", b"ping").unwrap().unwrap();
        assert_eq!(b"ping".to_vec(), got);
    }

    #[test]
    fn unregistered_host_is_unreachable() {
        let network = LocalNetwork::new();
        let transport = network.transport(echo_host(), UnreliabilityOptions::reliable(), Guacamole::new(0));
        let ctx = Context::default();
        assert!(transport.call(&ctx, "Echo", "echo", b"ping").is_err());
    }

    #[test]
    fn unreliable_transport_eventually_drops_a_call() {
        let network = LocalNetwork::new();
        let mut registry = ServiceRegistry::new();
        registry.register("Echo", Echo);
        network.register(&echo_host(), registry);
        let unreliability = UnreliabilityOptions {
            drop_probability: 1.0,
            duplicate_probability: 0.0,
        };
        let transport = network.transport(echo_host(), unreliability, Guacamole::new(0));
        let ctx = Context::default();
        assert!(transport.call(&ctx, "Echo", "echo", b"ping").is_err());
    }
}
