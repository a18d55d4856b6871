use std::collections::HashMap;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use biometrics::{Collector, Counter};
use buffertk::{stack_pack, Unpackable};
use indicio::{clue, INFO};
use rpc_pb::{Context, Host, Request, Response};

use super::wire::{read_message, write_message};
use super::COLLECTOR as LOGGING;

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static ACCEPT: Counter = Counter::new("rpc_sync.server.accept");
static HANDLE_CONNECTION: Counter = Counter::new("rpc_sync.server.connection");
static HANDLE_RPC: Counter = Counter::new("rpc_sync.server.handle_rpc");
static HANDLE_RPC_FAILED: Counter = Counter::new("rpc_sync.server.handle_rpc.error");

pub fn register_biometrics(collector: &mut Collector) {
    collector.register_counter(&ACCEPT);
    collector.register_counter(&HANDLE_CONNECTION);
    collector.register_counter(&HANDLE_RPC);
    collector.register_counter(&HANDLE_RPC_FAILED);
}

/////////////////////////////////////////// ServerOptions //////////////////////////////////////////

/// Options governing a [Server].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "binaries", derive(arrrg_derive::CommandLine))]
pub struct ServerOptions {
    /// Host to bind to, in host:ID=host:port format.
    #[cfg_attr(
        feature = "binaries",
        arrrg(required, "Host to bind to in host:ID=host:port format.")
    )]
    pub bind_to: Host,
}

////////////////////////////////////////// ServiceRegistry /////////////////////////////////////////

/// Maps service names to the [rpc_pb::Server] that implements them.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<&'static str, Box<dyn rpc_pb::Server + Send + Sync + 'static>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `server` to answer calls addressed to service `name`.
    pub fn register<S: rpc_pb::Server + Send + Sync + 'static>(&mut self, name: &'static str, server: S) {
        if self.services.insert(name, Box::new(server)).is_some() {
            panic!("cannot register the same service twice: {name}");
        }
    }

    pub(crate) fn dispatch(&self, ctx: &Context, service: &str, method: &str, body: &[u8]) -> rpc_pb::Status {
        match self.services.get(service) {
            Some(server) => server.call(ctx, method, body),
            None => Err(rpc_pb::Error::UnknownServerName {
                core: Default::default(),
                name: service.to_string(),
            }),
        }
    }
}

////////////////////////////////////////////// Server //////////////////////////////////////////////

/// A synchronous RPC server: one `accept()` loop, one OS thread per connection, requests on a
/// connection handled strictly in order (no pipelining).
pub struct Server {
    options: ServerOptions,
    services: Arc<ServiceRegistry>,
    dead: Arc<AtomicBool>,
}

impl Server {
    pub fn new(options: ServerOptions, services: ServiceRegistry) -> Self {
        Self {
            options,
            services: Arc::new(services),
            dead: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn host(&self) -> Host {
        self.options.bind_to.clone()
    }

    /// Stop accepting connections and unblock `serve`. In-flight requests are abandoned
    /// best-effort.
    pub fn kill(&self) {
        self.dead.store(true, Ordering::Release);
    }

    /// Serve forever, spawning one thread per accepted connection. Returns once [Server::kill] is
    /// called and the listener notices (bounded by its accept timeout).
    pub fn serve(&self) -> Result<(), rpc_pb::Error> {
        let listener = TcpListener::bind(self.options.bind_to.connect()).map_err(|e| {
            rpc_pb::Error::TransportFailure {
                core: Default::default(),
                what: e.to_string(),
            }
        })?;
        listener
            .set_nonblocking(false)
            .map_err(|e| rpc_pb::Error::TransportFailure {
                core: Default::default(),
                what: e.to_string(),
            })?;
        let mut workers = Vec::new();
        for stream in listener.incoming() {
            if self.dead.load(Ordering::Acquire) {
                break;
            }
            let Ok(stream) = stream else {
                continue;
            };
            ACCEPT.click();
            let services = Arc::clone(&self.services);
            let dead = Arc::clone(&self.dead);
            workers.push(std::thread::spawn(move || {
                serve_connection(stream, services, dead);
            }));
        }
        for worker in workers {
            let _ = worker.join();
        }
        Ok(())
    }
}

fn serve_connection(mut stream: TcpStream, services: Arc<ServiceRegistry>, dead: Arc<AtomicBool>) {
    HANDLE_CONNECTION.click();
    let _ = stream.set_read_timeout(Some(Duration::from_secs(1)));
    while !dead.load(Ordering::Acquire) {
        let req_bytes = match read_message(&mut stream) {
            Ok(bytes) => bytes,
            Err(_) => return,
        };
        let (request, _) = match Request::unpack(&req_bytes) {
            Ok(parsed) => parsed,
            Err(_) => return,
        };
        HANDLE_RPC.click();
        let ctx = Context::from(&request);
        let status = services.dispatch(&ctx, request.service, request.method, request.body);
        let (body, service_error, rpc_error) = match status {
            Ok(Ok(body)) => (Some(body), None, None),
            Ok(Err(service_error)) => (None, Some(service_error), None),
            Err(rpc_error) => {
                HANDLE_RPC_FAILED.click();
                (None, None, Some(stack_pack(rpc_error).to_vec()))
            }
        };
        clue!(LOGGING, INFO, {
            service: request.service,
            method: request.method,
            seq_no: request.seq_no,
        });
        let response = Response {
            seq_no: request.seq_no,
            trace: request.trace,
            body: body.as_deref(),
            service_error: service_error.as_deref(),
            rpc_error: rpc_error.as_deref(),
        };
        let resp_bytes = stack_pack(response).to_vec();
        if write_message(&mut stream, &resp_bytes).is_err() {
            return;
        }
    }
}
