use std::sync::Mutex;
use std::time::Duration;

use pbservice_pb::{Error, GetRequest, PbService, PbServiceClient, PutRequest};
use rpc_pb::Context;
use viewservice_pb::View;

use super::replica::Connect;

/// The primary/backup client stub. It tracks the last view it learned from `viewservice` and
/// retries against the primary it names, refreshing the view whenever the primary rejects a call
/// or cannot be reached — mirroring the acknowledged-heartbeat protocol's own expectation that a
/// stale view is discovered lazily, by a failed call, rather than pushed.
pub struct Clerk {
    vs: viewservice::Clerk,
    connect: Connect,
    view: Mutex<View>,
}

impl Clerk {
    pub fn new(vs: viewservice::Clerk, connect: Connect) -> Clerk {
        let view = vs.get_view().unwrap_or(View::EMPTY);
        Clerk {
            vs,
            connect,
            view: Mutex::new(view),
        }
    }

    /// Fetch `key`'s value from the current primary, retrying against whatever the view service
    /// next reports as primary until one answers with `OK` or [pbservice_pb::Error::ErrNoKey].
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        loop {
            let primary = self.view.lock().unwrap().primary.clone();
            if let Some(primary) = primary {
                let client = PbServiceClient::new((self.connect)(&primary));
                let req = GetRequest {
                    key: key.to_string(),
                };
                match client.get(&Context::default(), req) {
                    Ok(resp) => return Some(resp.value),
                    Err(Error::ErrNoKey { .. }) => return None,
                    Err(_) => self.refresh_view(),
                }
            } else {
                self.refresh_view();
            }
            std::thread::sleep(RETRY_DELAY);
        }
    }

    /// Write `key = value` to the current primary, retrying until it is acknowledged.
    pub fn put(&self, key: &str, value: Vec<u8>) {
        loop {
            let primary = self.view.lock().unwrap().primary.clone();
            if let Some(primary) = primary {
                let client = PbServiceClient::new((self.connect)(&primary));
                let req = PutRequest {
                    key: key.to_string(),
                    value: value.clone(),
                };
                if client.put(&Context::default(), req).is_ok() {
                    return;
                }
            }
            self.refresh_view();
            std::thread::sleep(RETRY_DELAY);
        }
    }

    fn refresh_view(&self) {
        if let Ok(view) = self.vs.get_view() {
            *self.view.lock().unwrap() = view;
        }
    }
}

const RETRY_DELAY: Duration = Duration::from_millis(10);
