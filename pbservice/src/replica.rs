use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use biometrics::Counter;
use indicio::{clue, INFO, WARNING};
use pbservice_pb::{
    Entry, Error, GetRequest, GetResponse, PbService, PbServiceClient, PutBackupRequest,
    PutBackupResponse, PutRequest, PutResponse, RestoreBackupRequest, RestoreBackupResponse,
};
use rpc_pb::{Context, Host};
use viewservice_pb::View;

use super::COLLECTOR as LOGGING;

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static TICKS: Counter = Counter::new("pbservice.replica.ticks");
static VIEW_CHANGES: Counter = Counter::new("pbservice.replica.view_changes");
static RESTORES_SENT: Counter = Counter::new("pbservice.replica.restores_sent");
static RESTORES_FAILED: Counter = Counter::new("pbservice.replica.restores_failed");
static FORWARDS_SENT: Counter = Counter::new("pbservice.replica.forwards_sent");
static FORWARDS_FAILED: Counter = Counter::new("pbservice.replica.forwards_failed");
static WRONG_SERVER: Counter = Counter::new("pbservice.replica.err_wrong_server");

pub fn register_biometrics(collector: &mut biometrics::Collector) {
    collector.register_counter(&TICKS);
    collector.register_counter(&VIEW_CHANGES);
    collector.register_counter(&RESTORES_SENT);
    collector.register_counter(&RESTORES_FAILED);
    collector.register_counter(&FORWARDS_SENT);
    collector.register_counter(&FORWARDS_FAILED);
    collector.register_counter(&WRONG_SERVER);
}

pub fn register_monitors(_hey_listen: &mut tatl::HeyListen) {}

//////////////////////////////////////////// Connect ////////////////////////////////////////////////

/// Dials an arbitrary [Host], the same shape `rpc_sync::new_client` and
/// `rpc_sync::LocalNetwork::transport` both have. Indirecting through this closure is what lets a
/// replica or clerk reach whichever host the view service currently names as primary or backup,
/// rather than a fixed peer set decided once at construction (as `paxos::Peer` gets away with).
pub type Connect = Arc<dyn Fn(&Host) -> Arc<dyn rpc_pb::Client + Send + Sync> + Send + Sync>;

/////////////////////////////////////////// ReplicaOptions //////////////////////////////////////////

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "binaries", derive(arrrg_derive::CommandLine))]
pub struct ReplicaOptions {
    /// How often to ping the view service, in milliseconds.
    #[cfg_attr(feature = "binaries", arrrg(optional, "Ping interval in milliseconds."))]
    pub ping_interval_ms: u64,
    /// How many times to retry a forwarded write or a state transfer before giving up.
    #[cfg_attr(feature = "binaries", arrrg(optional, "Retries for backup RPCs."))]
    pub backup_retries: u64,
}

impl Default for ReplicaOptions {
    fn default() -> Self {
        Self {
            ping_interval_ms: 100,
            backup_retries: 5,
        }
    }
}

impl ReplicaOptions {
    fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }
}

///////////////////////////////////////////////// Role //////////////////////////////////////////////

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Role {
    Primary,
    Backup,
    Neither,
}

////////////////////////////////////////////// ReplicaState /////////////////////////////////////////

struct ReplicaState {
    db: HashMap<String, Vec<u8>>,
    view: View,
    role: Role,
}

impl ReplicaState {
    fn new() -> Self {
        Self {
            db: HashMap::new(),
            view: View::EMPTY,
            role: Role::Neither,
        }
    }

    fn handle_get(&self, key: &str) -> Result<GetResponse, Error> {
        if self.role != Role::Primary {
            return Err(Error::ErrWrongServer {
                core: Default::default(),
            });
        }
        match self.db.get(key) {
            Some(value) => Ok(GetResponse {
                value: value.clone(),
            }),
            None => Err(Error::ErrNoKey {
                core: Default::default(),
                key: key.to_string(),
            }),
        }
    }

    /// Applies the write locally and returns the backup to forward it to, if any. Returns
    /// `Err` without mutating `db` if this replica does not currently believe it is primary.
    fn handle_put(&mut self, key: &str, value: &[u8]) -> Result<Option<Host>, Error> {
        if self.role != Role::Primary {
            return Err(Error::ErrWrongServer {
                core: Default::default(),
            });
        }
        self.db.insert(key.to_string(), value.to_vec());
        Ok(self.view.backup.clone())
    }

    fn handle_put_backup(&mut self, key: &str, value: &[u8]) -> Result<(), Error> {
        if self.role != Role::Backup {
            return Err(Error::ErrWrongServer {
                core: Default::default(),
            });
        }
        self.db.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    /// Installs a transferred database, rejecting any sender other than the primary of this
    /// replica's own last-known view — the fix for the original's "accept from anyone" gap.
    fn handle_restore_backup(&mut self, db: Vec<Entry>, from: &Host) -> Result<(), Error> {
        if self.role != Role::Backup {
            return Err(Error::ErrWrongServer {
                core: Default::default(),
            });
        }
        if self.view.primary.as_ref() != Some(from) {
            return Err(Error::ErrWrongServer {
                core: Default::default(),
            });
        }
        self.db = db.into_iter().map(|e| (e.key, e.value)).collect();
        Ok(())
    }
}

////////////////////////////////////////////////// Replica //////////////////////////////////////////

struct ReplicaInner {
    me: Host,
    vs: viewservice::Clerk,
    connect: Connect,
    options: ReplicaOptions,
    state: Mutex<ReplicaState>,
    dead: AtomicBool,
}

/// A primary/backup key/value replica. [Replica::new] spawns the background ticker that pings
/// `viewservice` and drives role transitions and state transfer; the RPC surface itself
/// ([PbService]) is implemented directly on `Replica`.
#[derive(Clone)]
pub struct Replica {
    inner: Arc<ReplicaInner>,
}

impl Replica {
    pub fn new(
        me: Host,
        vs: viewservice::Clerk,
        connect: Connect,
        options: ReplicaOptions,
    ) -> Replica {
        let replica = Replica {
            inner: Arc::new(ReplicaInner {
                me,
                vs,
                connect,
                options,
                state: Mutex::new(ReplicaState::new()),
                dead: AtomicBool::new(false),
            }),
        };
        let background = replica.clone();
        std::thread::spawn(move || background.run_ticker());
        replica
    }

    pub fn kill(&self) {
        self.inner.dead.store(true, Ordering::Release);
    }

    pub fn current_view(&self) -> View {
        self.inner.state.lock().unwrap().view.clone()
    }

    fn run_ticker(&self) {
        while !self.inner.dead.load(Ordering::Acquire) {
            self.tick();
            std::thread::sleep(self.inner.options.ping_interval());
        }
    }

    /// Pings the view service, adopts whatever view it reports, and — if this replica is the
    /// primary and the backup changed — transfers the whole database to the new backup before
    /// any further writes are acknowledged as forwarded.
    fn tick(&self) {
        TICKS.click();
        let current_viewnum = self.inner.state.lock().unwrap().view.viewnum;
        let view = match self.inner.vs.ping(current_viewnum) {
            Ok(view) => view,
            Err(err) => {
                clue!(LOGGING, WARNING, { what: "ping to viewservice failed", err: format!("{:?}", err) });
                return;
            }
        };

        let mut restore_to: Option<Host> = None;
        {
            let mut state = self.inner.state.lock().unwrap();
            let old_view = state.view.clone();
            state.view = view.clone();
            state.role = if view.is_primary(&self.inner.me) {
                Role::Primary
            } else if view.is_backup(&self.inner.me) {
                Role::Backup
            } else {
                Role::Neither
            };
            if old_view.viewnum != view.viewnum {
                VIEW_CHANGES.click();
                if state.role == Role::Primary && view.backup != old_view.backup {
                    restore_to = view.backup.clone();
                }
            }
        }

        if let Some(backup) = restore_to {
            self.send_restore_backup(&backup);
        }
    }

    fn send_restore_backup(&self, backup: &Host) {
        let db: Vec<Entry> = {
            let state = self.inner.state.lock().unwrap();
            state
                .db
                .iter()
                .map(|(key, value)| Entry {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect()
        };
        let req = RestoreBackupRequest {
            db,
            from: self.inner.me.clone(),
        };
        let client = PbServiceClient::new((self.inner.connect)(backup));
        for attempt in 0..self.inner.options.backup_retries {
            match client.restore_backup(&Context::default(), req.clone()) {
                Ok(RestoreBackupResponse {}) => {
                    RESTORES_SENT.click();
                    return;
                }
                Err(Error::ErrWrongServer { .. }) => {
                    clue!(LOGGING, INFO, { what: "backup rejected restore, it doesn't believe it's the backup" });
                    RESTORES_FAILED.click();
                    return;
                }
                Err(err) => {
                    clue!(LOGGING, WARNING, { what: "restore_backup failed, retrying", attempt: attempt, err: format!("{:?}", err) });
                    std::thread::sleep(self.inner.options.ping_interval());
                }
            }
        }
        RESTORES_FAILED.click();
    }

    fn forward_to_backup(&self, backup: &Host, key: &str, value: &[u8]) {
        let req = PutBackupRequest {
            key: key.to_string(),
            value: value.to_vec(),
        };
        let client = PbServiceClient::new((self.inner.connect)(backup));
        for attempt in 0..self.inner.options.backup_retries {
            match client.put_backup(&Context::default(), req.clone()) {
                Ok(PutBackupResponse {}) => {
                    FORWARDS_SENT.click();
                    return;
                }
                Err(Error::ErrWrongServer { .. }) => {
                    clue!(LOGGING, INFO, { what: "what I thought was the backup isn't" });
                    FORWARDS_FAILED.click();
                    return;
                }
                Err(err) => {
                    clue!(LOGGING, WARNING, { what: "put_backup failed, retrying", attempt: attempt, err: format!("{:?}", err) });
                    std::thread::sleep(self.inner.options.ping_interval());
                }
            }
        }
        FORWARDS_FAILED.click();
    }
}

impl PbService for Replica {
    fn get(&self, _ctx: &Context, req: GetRequest) -> Result<GetResponse, Error> {
        let result = self.inner.state.lock().unwrap().handle_get(&req.key);
        if result.is_err() {
            WRONG_SERVER.click();
        }
        result
    }

    fn put(&self, _ctx: &Context, req: PutRequest) -> Result<PutResponse, Error> {
        let backup = match self
            .inner
            .state
            .lock()
            .unwrap()
            .handle_put(&req.key, &req.value)
        {
            Ok(backup) => backup,
            Err(err) => {
                WRONG_SERVER.click();
                return Err(err);
            }
        };
        if let Some(backup) = backup {
            self.forward_to_backup(&backup, &req.key, &req.value);
        }
        Ok(PutResponse {})
    }

    fn put_backup(&self, _ctx: &Context, req: PutBackupRequest) -> Result<PutBackupResponse, Error> {
        let result = self
            .inner
            .state
            .lock()
            .unwrap()
            .handle_put_backup(&req.key, &req.value);
        if result.is_err() {
            WRONG_SERVER.click();
        }
        result.map(|()| PutBackupResponse {})
    }

    fn restore_backup(
        &self,
        _ctx: &Context,
        req: RestoreBackupRequest,
    ) -> Result<RestoreBackupResponse, Error> {
        let result = self
            .inner
            .state
            .lock()
            .unwrap()
            .handle_restore_backup(req.db, &req.from);
        if result.is_err() {
            WRONG_SERVER.click();
        }
        result.map(|()| RestoreBackupResponse {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpc_pb::HostID;

    fn host(n: u8) -> Host {
        Host::new(HostID::new([n; 16]), format!("server-{n}"))
    }

    #[test]
    fn non_primary_rejects_get_and_put() {
        let mut state = ReplicaState::new();
        state.role = Role::Neither;
        assert!(matches!(state.handle_get("a"), Err(Error::ErrWrongServer { .. })));
        assert!(matches!(
            state.handle_put("a", b"1"),
            Err(Error::ErrWrongServer { .. })
        ));
    }

    #[test]
    fn primary_serves_put_then_get_and_reports_the_backup_to_forward_to() {
        let mut state = ReplicaState::new();
        state.role = Role::Primary;
        state.view = View {
            viewnum: 1,
            primary: Some(host(1)),
            backup: Some(host(2)),
        };
        let backup = state.handle_put("a", b"1").unwrap();
        assert_eq!(Some(host(2)), backup);
        assert_eq!(b"1".to_vec(), state.handle_get("a").unwrap().value);
    }

    #[test]
    fn get_of_unwritten_key_is_err_no_key() {
        let mut state = ReplicaState::new();
        state.role = Role::Primary;
        assert!(matches!(state.handle_get("never-written"), Err(Error::ErrNoKey { .. })));
    }

    #[test]
    fn non_backup_rejects_put_backup_and_restore_backup() {
        let mut state = ReplicaState::new();
        state.role = Role::Primary;
        assert!(matches!(
            state.handle_put_backup("a", b"1"),
            Err(Error::ErrWrongServer { .. })
        ));
        assert!(matches!(
            state.handle_restore_backup(vec![], &host(1)),
            Err(Error::ErrWrongServer { .. })
        ));
    }

    #[test]
    fn restore_backup_is_rejected_from_an_unrecognized_sender() {
        let mut state = ReplicaState::new();
        state.role = Role::Backup;
        state.view = View {
            viewnum: 1,
            primary: Some(host(1)),
            backup: Some(host(2)),
        };
        let db = vec![Entry {
            key: "a".to_string(),
            value: b"1".to_vec(),
        }];
        assert!(matches!(
            state.handle_restore_backup(db, &host(9)),
            Err(Error::ErrWrongServer { .. })
        ));
        assert!(state.db.is_empty());
    }

    #[test]
    fn restore_backup_installs_the_transferred_database() {
        let mut state = ReplicaState::new();
        state.role = Role::Backup;
        state.view = View {
            viewnum: 1,
            primary: Some(host(1)),
            backup: Some(host(2)),
        };
        let db = vec![Entry {
            key: "a".to_string(),
            value: b"1".to_vec(),
        }];
        state.handle_restore_backup(db, &host(1)).unwrap();
        assert_eq!(Some(&b"1".to_vec()), state.db.get("a"));
    }
}
