//! Protocol buffers for the paxos-replicated key/value service: the `Op` log entry that
//! `kvpaxos::Replica` proposes through a `paxos::Peer`, and the `KvPaxosService` RPC surface a
//! client speaks to a replica. See `kvpaxos` for the replica that implements this service.

use prototk_derive::Message;

use one_two_eight::{generate_id, generate_id_prototk};

use rpc_pb::service;

use zerror_core::ErrorCore;

////////////////////////////////////////////// IDs /////////////////////////////////////////////////

generate_id!(ClientID, "kvpaxos-client:");
generate_id_prototk!(ClientID);

/////////////////////////////////////////////// Error //////////////////////////////////////////////

#[derive(Clone, Message, zerror_derive::Z)]
pub enum Error {
    #[prototk(377856, message)]
    Success {
        #[prototk(1, message)]
        core: ErrorCore,
    },
    /// The requested key has no value in the replicated map.
    #[prototk(377857, message)]
    ErrNoKey {
        #[prototk(1, message)]
        core: ErrorCore,
        #[prototk(2, string)]
        key: String,
    },
    #[prototk(377858, message)]
    SerializationError {
        #[prototk(1, message)]
        core: ErrorCore,
        #[prototk(2, message)]
        what: prototk::Error,
    },
    #[prototk(377859, message)]
    RpcError {
        #[prototk(1, message)]
        core: ErrorCore,
        #[prototk(2, message)]
        what: rpc_pb::Error,
    },
    /// The local replica's paxos peer reported a [paxos_pb::Error::DoneViolation]-shaped
    /// condition while claiming a log slot. Never expected in normal operation.
    #[prototk(377860, message)]
    PaxosError {
        #[prototk(1, message)]
        core: ErrorCore,
        #[prototk(2, string)]
        what: String,
    },
    /// `Replica::kill` was called while this request was still claiming its log slot; the
    /// request was abandoned rather than answered. Safe to retry against a live replica.
    #[prototk(377861, message)]
    Shutdown {
        #[prototk(1, message)]
        core: ErrorCore,
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

////////////////////////////////////////////////// Op //////////////////////////////////////////////

/// One client operation as it is logged through paxos. Every replica applies `Op`s to its local
/// map in strictly increasing `seq` order; `client_id`/`request_id` identify the request for
/// dedup in the replica's `seen` table.
#[derive(Clone, Debug, Default, Eq, PartialEq, Message)]
pub struct Op {
    #[prototk(1, message)]
    pub client_id: ClientID,
    #[prototk(2, uint64)]
    pub request_id: u64,
    #[prototk(3, message)]
    pub kind: OpKind,
}

#[derive(Clone, Debug, Eq, PartialEq, Message)]
pub enum OpKind {
    #[prototk(1, message)]
    Get {
        #[prototk(1, string)]
        key: String,
    },
    #[prototk(2, message)]
    Put {
        #[prototk(1, string)]
        key: String,
        #[prototk(2, bytes)]
        value: Vec<u8>,
    },
}

impl Default for OpKind {
    fn default() -> Self {
        Self::Get {
            key: String::new(),
        }
    }
}

/////////////////////////////////////////////// PutRequest /////////////////////////////////////////

#[derive(Clone, Debug, Default, Message)]
pub struct PutRequest {
    #[prototk(1, string)]
    pub key: String,
    #[prototk(2, bytes)]
    pub value: Vec<u8>,
    #[prototk(3, message)]
    pub client_id: ClientID,
    #[prototk(4, uint64)]
    pub request_id: u64,
}

#[derive(Clone, Debug, Default, Message)]
pub struct PutResponse {}

/////////////////////////////////////////////// GetRequest /////////////////////////////////////////

#[derive(Clone, Debug, Default, Message)]
pub struct GetRequest {
    #[prototk(1, string)]
    pub key: String,
    #[prototk(2, message)]
    pub client_id: ClientID,
    #[prototk(3, uint64)]
    pub request_id: u64,
}

#[derive(Clone, Debug, Default, Message)]
pub struct GetResponse {
    #[prototk(1, bytes)]
    pub value: Vec<u8>,
}

///////////////////////////////////////////// KvPaxosService ///////////////////////////////////////

service! {
    name = KvPaxosService;
    server = KvPaxosServer;
    client = KvPaxosClient;
    error = Error;

    rpc put(PutRequest) -> PutResponse;
    rpc get(GetRequest) -> GetResponse;
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffertk::{stack_pack, Unpackable};

    #[test]
    fn op_round_trips_through_the_wire() {
        let op = Op {
            client_id: ClientID::BOTTOM,
            request_id: 7,
            kind: OpKind::Put {
                key: "a".to_string(),
                value: b"1".to_vec(),
            },
        };
        let bytes = stack_pack(op.clone()).to_vec();
        let (parsed, rest) = Op::unpack(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(op, parsed);
    }

    #[test]
    fn get_and_put_ops_are_distinguishable() {
        let get = Op {
            client_id: ClientID::BOTTOM,
            request_id: 1,
            kind: OpKind::Get { key: "x".to_string() },
        };
        let put = Op {
            client_id: ClientID::BOTTOM,
            request_id: 1,
            kind: OpKind::Put {
                key: "x".to_string(),
                value: b"y".to_vec(),
            },
        };
        assert_ne!(get, put);
    }
}
