//! Protocol buffers for the view service: the `View` triple it hands out, and the `Ping`/`Get`
//! RPCs replicas use to learn the current view and report their own liveness. See `viewservice`
//! for the sequencer that speaks this protocol and `pbservice` for its primary consumer.

use prototk_derive::Message;

use rpc_pb::{service, Host};

use zerror_core::ErrorCore;

/////////////////////////////////////////////// Error //////////////////////////////////////////////

#[derive(Clone, Message, zerror_derive::Z)]
pub enum Error {
    #[prototk(378880, message)]
    Success {
        #[prototk(1, message)]
        core: ErrorCore,
    },
    #[prototk(378881, message)]
    SerializationError {
        #[prototk(1, message)]
        core: ErrorCore,
        #[prototk(2, message)]
        what: prototk::Error,
    },
    #[prototk(378882, message)]
    RpcError {
        #[prototk(1, message)]
        core: ErrorCore,
        #[prototk(2, message)]
        what: rpc_pb::Error,
    },
}

impl Default for Error {
    fn default() -> Self {
        Self::Success {
            core: ErrorCore::default(),
        }
    }
}

impl From<prototk::Error> for Error {
    fn from(what: prototk::Error) -> Self {
        Self::SerializationError {
            core: ErrorCore::default(),
            what,
        }
    }
}

impl From<rpc_pb::Error> for Error {
    fn from(what: rpc_pb::Error) -> Self {
        Self::RpcError {
            core: ErrorCore::default(),
            what,
        }
    }
}

/////////////////////////////////////////////// View ////////////////////////////////////////////////

/// A `(viewnum, primary, backup)` triple. `viewnum` is monotonically non-decreasing across the
/// life of a [crate::ViewService]; view `0` (both `primary` and `backup` absent) is the initial,
/// empty view before any replica has ever pinged.
#[derive(Clone, Debug, Default, Eq, PartialEq, Message)]
pub struct View {
    #[prototk(1, uint64)]
    pub viewnum: u64,
    #[prototk(2, message)]
    pub primary: Option<Host>,
    #[prototk(3, message)]
    pub backup: Option<Host>,
}

impl View {
    /// The view before any replica has ever pinged.
    pub const EMPTY: View = View {
        viewnum: 0,
        primary: None,
        backup: None,
    };

    pub fn is_primary(&self, host: &Host) -> bool {
        self.primary.as_ref() == Some(host)
    }

    pub fn is_backup(&self, host: &Host) -> bool {
        self.backup.as_ref() == Some(host)
    }
}

//////////////////////////////////////////////// Ping ///////////////////////////////////////////////

/// A replica's periodic heartbeat: "I am `me`, and I believe the current view is `viewnum`."
/// `viewnum == 0` sent by a previously-known primary is how the view service detects that replica
/// restarted and lost its view.
#[derive(Clone, Debug, Default, Message)]
pub struct PingRequest {
    #[prototk(1, message)]
    pub me: Host,
    #[prototk(2, uint64)]
    pub viewnum: u64,
}

#[derive(Clone, Debug, Default, Message)]
pub struct PingResponse {
    #[prototk(1, message)]
    pub view: View,
}

///////////////////////////////////////////////// Get ///////////////////////////////////////////////

#[derive(Clone, Debug, Default, Message)]
pub struct GetViewRequest {}

#[derive(Clone, Debug, Default, Message)]
pub struct GetViewResponse {
    #[prototk(1, message)]
    pub view: View,
}

////////////////////////////////////////////// ViewService //////////////////////////////////////////

service! {
    name = ViewService;
    server = ViewServiceServer;
    client = ViewServiceClient;
    error = Error;

    rpc ping(PingRequest) -> PingResponse;
    rpc get_view(GetViewRequest) -> GetViewResponse;
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffertk::{stack_pack, Unpackable};
    use rpc_pb::HostID;

    #[test]
    fn view_round_trips_through_the_wire() {
        let host = Host::new(HostID::BOTTOM, "primary:1".to_string());
        let view = View {
            viewnum: 3,
            primary: Some(host.clone()),
            backup: None,
        };
        let bytes = stack_pack(view.clone()).to_vec();
        let (parsed, rest) = View::unpack(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(view, parsed);
        assert!(parsed.is_primary(&host));
        assert!(!parsed.is_backup(&host));
    }

    #[test]
    fn empty_view_has_no_primary_or_backup() {
        assert_eq!(0, View::EMPTY.viewnum);
        assert_eq!(None, View::EMPTY.primary);
        assert_eq!(None, View::EMPTY.backup);
    }
}
