use std::sync::Arc;

use rpc_pb::{Context, Host};
use viewservice_pb::{Error, GetViewRequest, PingRequest, View, ViewService, ViewServiceClient};

/// A thin wrapper around `Ping`/`Get`. It imposes no retry policy of its own; callers (a
/// `pbservice` replica's ticker, or its own clerk) decide how to react to a failed RPC.
pub struct Clerk {
    me: Host,
    server: ViewServiceClient,
}

impl Clerk {
    pub fn new(me: Host, server: Arc<dyn rpc_pb::Client + Send + Sync>) -> Clerk {
        Clerk {
            me,
            server: ViewServiceClient::new(server),
        }
    }

    /// Report `viewnum` as the caller's current view and learn the service's view in response.
    pub fn ping(&self, viewnum: u64) -> Result<View, Error> {
        let req = PingRequest {
            me: self.me.clone(),
            viewnum,
        };
        Ok(self.server.ping(&Context::default(), req)?.view)
    }

    /// Fetch the current view without asserting liveness.
    pub fn get_view(&self) -> Result<View, Error> {
        Ok(self
            .server
            .get_view(&Context::default(), GetViewRequest {})?
            .view)
    }
}
