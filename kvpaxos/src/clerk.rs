use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kvpaxos_pb::{ClientID, Error, GetRequest, KvPaxosClient, KvPaxosService, PutRequest};
use rpc_pb::Context;

/// The thin client stub: round-robins over the replicas until one answers, resending the same
/// `(client_id, request_id)` pair on every retry so a request that actually committed but whose
/// reply was lost is answered identically on resend. Deliberately unglamorous, per the design's
/// choice to keep the consensus core and the replica's slot-claim loop as the design-rich parts.
pub struct Clerk {
    client_id: ClientID,
    next_request_id: AtomicU64,
    replicas: Vec<KvPaxosClient>,
    next_replica: AtomicUsize,
}

impl Clerk {
    pub fn new(replicas: Vec<Arc<dyn rpc_pb::Client + Send + Sync>>) -> Clerk {
        assert!(!replicas.is_empty(), "a clerk needs at least one replica to talk to");
        Clerk {
            client_id: ClientID::generate().unwrap_or(ClientID::BOTTOM),
            next_request_id: AtomicU64::new(0),
            replicas: replicas.into_iter().map(KvPaxosClient::new).collect(),
            next_replica: AtomicUsize::new(0),
        }
    }

    /// Write `key = value`, retrying against successive replicas until one acknowledges.
    pub fn put(&self, key: &str, value: Vec<u8>) {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let req = PutRequest {
            key: key.to_string(),
            value,
            client_id: self.client_id,
            request_id,
        };
        loop {
            let client = self.pick_replica();
            if client.put(&Context::default(), req.clone()).is_ok() {
                return;
            }
            self.advance_replica();
            std::thread::sleep(RETRY_DELAY);
        }
    }

    /// Read `key`, retrying against successive replicas until one answers definitively. Returns
    /// `None` for [Error::ErrNoKey], which is not retried against another replica since it is a
    /// definitive (if negative) answer, not a transient failure.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let req = GetRequest {
            key: key.to_string(),
            client_id: self.client_id,
            request_id,
        };
        loop {
            let client = self.pick_replica();
            match client.get(&Context::default(), req.clone()) {
                Ok(resp) => return Some(resp.value),
                Err(Error::ErrNoKey { .. }) => return None,
                Err(_) => {
                    self.advance_replica();
                    std::thread::sleep(RETRY_DELAY);
                }
            }
        }
    }

    fn pick_replica(&self) -> &KvPaxosClient {
        let idx = self.next_replica.load(Ordering::Relaxed) % self.replicas.len();
        &self.replicas[idx]
    }

    fn advance_replica(&self) {
        self.next_replica.fetch_add(1, Ordering::Relaxed);
    }
}

const RETRY_DELAY: Duration = Duration::from_millis(10);
