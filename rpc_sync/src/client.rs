use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use biometrics::{Collector, Counter};
use buffertk::{stack_pack, Unpackable};
use indicio::{clue, INFO};
use rpc_pb::{Context, Error, Host, Request, Response, Status};

use super::wire::{read_message, write_message};
use super::COLLECTOR as LOGGING;

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static DIAL: Counter = Counter::new("rpc_sync.client.dial");
static DIAL_FAILED: Counter = Counter::new("rpc_sync.client.dial.error");
static CALL: Counter = Counter::new("rpc_sync.client.call");
static CALL_FAILED: Counter = Counter::new("rpc_sync.client.call.error");

pub fn register_biometrics(collector: &mut Collector) {
    collector.register_counter(&DIAL);
    collector.register_counter(&DIAL_FAILED);
    collector.register_counter(&CALL);
    collector.register_counter(&CALL_FAILED);
}

/////////////////////////////////////////// ClientOptions //////////////////////////////////////////

/// Options governing a [TcpClient].
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "binaries", derive(arrrg_derive::CommandLine))]
pub struct ClientOptions {
    /// Timeout, in milliseconds, for establishing a connection.
    #[cfg_attr(feature = "binaries", arrrg(optional, "Dial timeout in milliseconds."))]
    pub dial_timeout_ms: u64,
    /// Timeout, in milliseconds, for a single RPC call.
    #[cfg_attr(feature = "binaries", arrrg(optional, "Call timeout in milliseconds."))]
    pub call_timeout_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            dial_timeout_ms: 1_000,
            call_timeout_ms: 1_000,
        }
    }
}

///////////////////////////////////////////// TcpClient ////////////////////////////////////////////

/// A [rpc_pb::Client] that dials a single remote [Host] lazily and keeps the connection open
/// across calls, redialing whenever the prior connection is found to be dead.
struct TcpClient {
    host: Host,
    options: ClientOptions,
    stream: Mutex<Option<TcpStream>>,
    seq_no: AtomicU64,
}

impl TcpClient {
    fn connect(&self) -> Result<TcpStream, Error> {
        DIAL.click();
        let stream = TcpStream::connect_timeout(
            &self.host.connect().parse().map_err(|_| Error::ResolveFailure {
                core: Default::default(),
                what: format!("could not resolve {:?} as a socket address", self.host.connect()),
            })?,
            Duration::from_millis(self.options.dial_timeout_ms),
        )
        .map_err(|e| {
            DIAL_FAILED.click();
            Error::TransportFailure {
                core: Default::default(),
                what: e.to_string(),
            }
        })?;
        stream
            .set_read_timeout(Some(Duration::from_millis(self.options.call_timeout_ms)))
            .map_err(|e| Error::TransportFailure {
                core: Default::default(),
                what: e.to_string(),
            })?;
        stream
            .set_write_timeout(Some(Duration::from_millis(self.options.call_timeout_ms)))
            .map_err(|e| Error::TransportFailure {
                core: Default::default(),
                what: e.to_string(),
            })?;
        Ok(stream)
    }

    fn call_on(&self, stream: &mut TcpStream, req_bytes: &[u8]) -> Result<Vec<u8>, Error> {
        write_message(stream, req_bytes)?;
        read_message(stream)
    }
}

impl rpc_pb::Client for TcpClient {
    fn call(&self, ctx: &Context, server: &str, method: &str, req: &[u8]) -> Status {
        CALL.click();
        let seq_no = self.seq_no.fetch_add(1, Ordering::Relaxed);
        let request = Request {
            service: server,
            method,
            seq_no,
            body: req,
            caller: ctx.clients(),
            trace: ctx.trace_id(),
        };
        let req_bytes = stack_pack(request).to_vec();
        let mut guard = self.stream.lock().unwrap();
        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        let resp_bytes = {
            let stream = guard.as_mut().unwrap();
            match self.call_on(stream, &req_bytes) {
                Ok(bytes) => bytes,
                Err(err) => {
                    // The connection may have died between calls; drop it so the next call
                    // redials instead of repeating the same failure forever.
                    *guard = None;
                    CALL_FAILED.click();
                    return Err(err);
                }
            }
        };
        drop(guard);
        let (response, _) = Response::unpack(&resp_bytes).map_err(|e| Error::SerializationError {
            core: Default::default(),
            err: e,
            context: "unpacking response".to_string(),
        })?;
        clue!(LOGGING, INFO, {
            service: server,
            method: method,
            seq_no: seq_no,
        });
        if let Some(rpc_error) = response.rpc_error {
            let (err, _) = Error::unpack(rpc_error).map_err(|e| Error::SerializationError {
                core: Default::default(),
                err: e,
                context: "unpacking rpc error".to_string(),
            })?;
            return Err(err);
        }
        if let Some(service_error) = response.service_error {
            return Ok(Err(service_error.to_vec()));
        }
        Ok(Ok(response.body.unwrap_or(&[]).to_vec()))
    }
}

/// Build a [rpc_pb::Client] that makes synchronous, blocking TCP calls to `host`.
pub fn new_client(host: Host, options: ClientOptions) -> Arc<dyn rpc_pb::Client + Send + Sync> {
    Arc::new(TcpClient {
        host,
        options,
        stream: Mutex::new(None),
        seq_no: AtomicU64::new(0),
    })
}
