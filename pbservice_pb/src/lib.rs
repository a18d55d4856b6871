//! Protocol buffers for the primary/backup key/value service: the `Get`/`Put` client RPCs, the
//! `PutBackup`/`RestoreBackup` RPCs a primary issues to its backup, and the errors distinguishing
//! a stale view from a missing key. See `pbservice` for the replica that speaks this protocol and
//! `viewservice` for the sequencer that assigns primary/backup roles.

use prototk_derive::Message;

use rpc_pb::{service, Host};

use zerror_core::ErrorCore;

/////////////////////////////////////////////// Error //////////////////////////////////////////////

#[derive(Clone, Message, zerror_derive::Z)]
pub enum Error {
    #[prototk(379904, message)]
    Success {
        #[prototk(1, message)]
        core: ErrorCore,
    },
    /// The requested key has no value in the replica's map.
    #[prototk(379905, message)]
    ErrNoKey {
        #[prototk(1, message)]
        core: ErrorCore,
        #[prototk(2, string)]
        key: String,
    },
    /// The recipient is not the role the caller believes it to be: a `get`/`put` sent to a
    /// non-primary, a `put_backup`/`restore_backup` sent to a non-backup, or a `restore_backup`
    /// whose claimed sender is not the backup's own last-known primary.
    #[prototk(379906, message)]
    ErrWrongServer {
        #[prototk(1, message)]
        core: ErrorCore,
    },
    #[prototk(379907, message)]
    SerializationError {
        #[prototk(1, message)]
        core: ErrorCore,
        #[prototk(2, message)]
        what: prototk::Error,
    },
    #[prototk(379908, message)]
    RpcError {
        #[prototk(1, message)]
        core: ErrorCore,
        #[prototk(2, message)]
        what: rpc_pb::Error,
    },
    #[prototk(379909, message)]
    ViewServiceError {
        #[prototk(1, message)]
        core: ErrorCore,
        #[prototk(2, message)]
        what: viewservice_pb::Error,
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

impl From<viewservice_pb::Error> for Error {
    fn from(what: viewservice_pb::Error) -> Self {
        Self::ViewServiceError {
            core: ErrorCore::default(),
            what,
        }
    }
}

/////////////////////////////////////////////// Entry ///////////////////////////////////////////////

/// One key/value pair, used only to serialize the whole database across the wire in
/// [RestoreBackupRequest]; `pbservice::Replica` itself keeps its map as a `HashMap`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Message)]
pub struct Entry {
    #[prototk(1, string)]
    pub key: String,
    #[prototk(2, bytes)]
    pub value: Vec<u8>,
}

/////////////////////////////////////////////// Get /////////////////////////////////////////////////

#[derive(Clone, Debug, Default, Message)]
pub struct GetRequest {
    #[prototk(1, string)]
    pub key: String,
}

#[derive(Clone, Debug, Default, Message)]
pub struct GetResponse {
    #[prototk(1, bytes)]
    pub value: Vec<u8>,
}

/////////////////////////////////////////////// Put /////////////////////////////////////////////////

#[derive(Clone, Debug, Default, Message)]
pub struct PutRequest {
    #[prototk(1, string)]
    pub key: String,
    #[prototk(2, bytes)]
    pub value: Vec<u8>,
}

#[derive(Clone, Debug, Default, Message)]
pub struct PutResponse {}

////////////////////////////////////////////// PutBackup ////////////////////////////////////////////

/// Identical payload to [PutRequest]; a distinct RPC name so the backup can tell a
/// primary-forwarded write apart from a (rejected) direct client write.
#[derive(Clone, Debug, Default, Message)]
pub struct PutBackupRequest {
    #[prototk(1, string)]
    pub key: String,
    #[prototk(2, bytes)]
    pub value: Vec<u8>,
}

#[derive(Clone, Debug, Default, Message)]
pub struct PutBackupResponse {}

///////////////////////////////////////////// RestoreBackup /////////////////////////////////////////

/// A full state transfer sent by a primary to a newly-assigned backup. `from` identifies the
/// sender so the backup can reject a transfer from anyone but its own last-known primary.
#[derive(Clone, Debug, Default, Eq, PartialEq, Message)]
pub struct RestoreBackupRequest {
    #[prototk(1, message)]
    pub db: Vec<Entry>,
    #[prototk(2, message)]
    pub from: Host,
}

#[derive(Clone, Debug, Default, Message)]
pub struct RestoreBackupResponse {}

////////////////////////////////////////////// PbService /////////////////////////////////////////////

service! {
    name = PbService;
    server = PbServiceServer;
    client = PbServiceClient;
    error = Error;

    rpc get(GetRequest) -> GetResponse;
    rpc put(PutRequest) -> PutResponse;
    rpc put_backup(PutBackupRequest) -> PutBackupResponse;
    rpc restore_backup(RestoreBackupRequest) -> RestoreBackupResponse;
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffertk::{stack_pack, Unpackable};
    use rpc_pb::HostID;

    #[test]
    fn restore_backup_round_trips_through_the_wire() {
        let req = RestoreBackupRequest {
            db: vec![
                Entry {
                    key: "a".to_string(),
                    value: b"1".to_vec(),
                },
                Entry {
                    key: "b".to_string(),
                    value: b"2".to_vec(),
                },
            ],
            from: Host::new(HostID::BOTTOM, "primary:1".to_string()),
        };
        let bytes = stack_pack(req.clone()).to_vec();
        let (parsed, rest) = RestoreBackupRequest::unpack(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(req, parsed);
    }

    #[test]
    fn err_wrong_server_is_distinguishable_from_err_no_key() {
        let wrong_server = Error::ErrWrongServer {
            core: ErrorCore::default(),
        };
        let no_key = Error::ErrNoKey {
            core: ErrorCore::default(),
            key: "x".to_string(),
        };
        assert!(matches!(wrong_server, Error::ErrWrongServer { .. }));
        assert!(matches!(no_key, Error::ErrNoKey { .. }));
    }
}
