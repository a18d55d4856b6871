use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use biometrics::Counter;
use rpc_pb::{Context, Host, HostID};
use viewservice_pb::{Error, GetViewRequest, GetViewResponse, PingRequest, PingResponse, View};

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static PINGS: Counter = Counter::new("viewservice.service.pings");
static VIEW_ADVANCED: Counter = Counter::new("viewservice.service.view_advanced");
static VIEW_FROZEN: Counter = Counter::new("viewservice.service.view_frozen_unacknowledged");

pub fn register_biometrics(collector: &mut biometrics::Collector) {
    collector.register_counter(&PINGS);
    collector.register_counter(&VIEW_ADVANCED);
    collector.register_counter(&VIEW_FROZEN);
}

pub fn register_monitors(_hey_listen: &mut tatl::HeyListen) {}

//////////////////////////////////////////// ServiceOptions /////////////////////////////////////////

/// Options governing a [Service].
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "binaries", derive(arrrg_derive::CommandLine))]
pub struct ServiceOptions {
    /// How often a well-behaved replica is expected to ping, in milliseconds.
    #[cfg_attr(feature = "binaries", arrrg(optional, "Ping interval in milliseconds."))]
    pub ping_interval_ms: u64,
    /// How many missed `ping_interval`s before a replica is considered dead.
    #[cfg_attr(feature = "binaries", arrrg(optional, "Missed pings before a replica is dead."))]
    pub dead_pings: u64,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            ping_interval_ms: 100,
            dead_pings: 5,
        }
    }
}

impl ServiceOptions {
    fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    fn dead_after(&self) -> Duration {
        self.ping_interval() * self.dead_pings as u32
    }
}

/////////////////////////////////////////////// PingRecord //////////////////////////////////////////

struct PingRecord {
    host: Host,
    last_seen: Instant,
    last_viewnum: u64,
}

////////////////////////////////////////////// ServiceState ////////////////////////////////////////

struct ServiceState {
    view: View,
    /// Whether the current view's primary has pinged with `view.viewnum`. While false, [tick]
    /// refuses to advance the view even if it believes the primary or backup has died — this is
    /// the acknowledgment rule that keeps the view service no more than one view ahead of its
    /// clients.
    acknowledged: bool,
    pings: HashMap<HostID, PingRecord>,
}

impl ServiceState {
    fn new() -> Self {
        Self {
            view: View::EMPTY,
            acknowledged: true,
            pings: HashMap::new(),
        }
    }

    fn is_dead(&self, host: &Host, now: Instant, dead_after: Duration) -> bool {
        match self.pings.get(&host.host_id()) {
            Some(record) => now.duration_since(record.last_seen) > dead_after,
            None => true,
        }
    }

    /// A live pinger that is neither the current primary nor the current backup.
    fn find_idle_server(&self, now: Instant, dead_after: Duration) -> Option<Host> {
        self.pings
            .values()
            .find(|record| {
                self.view.primary.as_ref() != Some(&record.host)
                    && self.view.backup.as_ref() != Some(&record.host)
                    && now.duration_since(record.last_seen) <= dead_after
            })
            .map(|record| record.host.clone())
    }

    fn on_ping(&mut self, me: Host, viewnum: u64) -> View {
        let now = Instant::now();
        self.pings.insert(
            me.host_id(),
            PingRecord {
                host: me.clone(),
                last_seen: now,
                last_viewnum: viewnum,
            },
        );

        if self.view.viewnum == 0 && self.view.primary.is_none() {
            self.view = View {
                viewnum: 1,
                primary: Some(me.clone()),
                backup: None,
            };
            self.acknowledged = false;
            VIEW_ADVANCED.click();
        } else if self.view.backup.is_none() && self.view.primary.as_ref() != Some(&me) {
            self.view = View {
                viewnum: self.view.viewnum + 1,
                primary: self.view.primary.clone(),
                backup: Some(me.clone()),
            };
            self.acknowledged = false;
            VIEW_ADVANCED.click();
        }

        if self.view.is_primary(&me) && viewnum == self.view.viewnum {
            self.acknowledged = true;
        }

        self.view.clone()
    }

    /// Runs once per `ping_interval`: notices dead or restarted replicas and, if the current view
    /// is acknowledged, advances to a view that routes around them.
    fn tick(&mut self, options: &ServiceOptions) {
        if !self.acknowledged {
            VIEW_FROZEN.click();
            return;
        }
        let now = Instant::now();
        let dead_after = options.dead_after();

        let primary_restarted = self.view.primary.as_ref().is_some_and(|p| {
            self.view.viewnum > 0
                && self
                    .pings
                    .get(&p.host_id())
                    .is_some_and(|r| r.last_viewnum == 0)
        });
        let primary_dead = self
            .view
            .primary
            .as_ref()
            .is_none_or(|p| self.is_dead(p, now, dead_after));
        let backup_alive = self
            .view
            .backup
            .as_ref()
            .is_some_and(|b| !self.is_dead(b, now, dead_after));

        if self.view.primary.is_some() && (primary_dead || primary_restarted) && backup_alive {
            let idle = self.find_idle_server(now, dead_after);
            self.view = View {
                viewnum: self.view.viewnum + 1,
                primary: self.view.backup.clone(),
                backup: idle,
            };
            self.acknowledged = false;
            VIEW_ADVANCED.click();
            return;
        }

        if self.view.primary.is_some() {
            let backup_dead_or_absent = match &self.view.backup {
                Some(b) => self.is_dead(b, now, dead_after),
                None => true,
            };
            if backup_dead_or_absent {
                if let Some(idle) = self.find_idle_server(now, dead_after) {
                    self.view = View {
                        viewnum: self.view.viewnum + 1,
                        primary: self.view.primary.clone(),
                        backup: Some(idle),
                    };
                    self.acknowledged = false;
                    VIEW_ADVANCED.click();
                }
            }
        }
    }
}

////////////////////////////////////////////////// Service //////////////////////////////////////////

struct ServiceInner {
    state: Mutex<ServiceState>,
    options: ServiceOptions,
    dead: AtomicBool,
}

/// The view sequencer. One [Service] per process; [Service::new] spawns the background ticker
/// thread that drives [ServiceState::tick], matching the source's own internally-spawned tick
/// goroutine.
#[derive(Clone)]
pub struct Service {
    inner: Arc<ServiceInner>,
}

impl Service {
    pub fn new(options: ServiceOptions) -> Service {
        let service = Service {
            inner: Arc::new(ServiceInner {
                state: Mutex::new(ServiceState::new()),
                options,
                dead: AtomicBool::new(false),
            }),
        };
        let background = service.clone();
        std::thread::spawn(move || background.run_ticker());
        service
    }

    fn run_ticker(&self) {
        while !self.inner.dead.load(Ordering::Acquire) {
            std::thread::sleep(self.inner.options.ping_interval());
            self.inner.state.lock().unwrap().tick(&self.inner.options);
        }
    }

    /// Stop the background ticker. RPC handling is unaffected; kill the server hosting this
    /// service separately.
    pub fn kill(&self) {
        self.inner.dead.store(true, Ordering::Release);
    }

    pub fn current_view(&self) -> View {
        self.inner.state.lock().unwrap().view.clone()
    }
}

impl viewservice_pb::ViewService for Service {
    fn ping(&self, _ctx: &Context, req: PingRequest) -> Result<PingResponse, Error> {
        PINGS.click();
        let view = self.inner.state.lock().unwrap().on_ping(req.me, req.viewnum);
        Ok(PingResponse { view })
    }

    fn get_view(&self, _ctx: &Context, _req: GetViewRequest) -> Result<GetViewResponse, Error> {
        Ok(GetViewResponse {
            view: self.inner.state.lock().unwrap().view.clone(),
        })
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
    fn first_pinger_becomes_primary() {
        let mut state = ServiceState::new();
        let view = state.on_ping(host(1), 0);
        assert_eq!(1, view.viewnum);
        assert_eq!(Some(host(1)), view.primary);
        assert_eq!(None, view.backup);
    }

    #[test]
    fn second_distinct_pinger_becomes_backup() {
        let mut state = ServiceState::new();
        state.on_ping(host(1), 0);
        let view = state.on_ping(host(2), 0);
        assert_eq!(2, view.viewnum);
        assert_eq!(Some(host(1)), view.primary);
        assert_eq!(Some(host(2)), view.backup);
    }

    #[test]
    fn view_does_not_advance_past_an_unacknowledged_primary() {
        let mut state = ServiceState::new();
        state.on_ping(host(1), 0);
        state.on_ping(host(2), 0);
        // primary (host(1)) has not yet pinged with viewnum 2.
        assert!(!state.acknowledged);
        let options = ServiceOptions {
            ping_interval_ms: 1,
            dead_pings: 1,
        };
        std::thread::sleep(Duration::from_millis(5));
        state.tick(&options);
        assert_eq!(2, state.view.viewnum, "frozen view must not advance while unacknowledged");
    }

    #[test]
    fn acknowledged_dead_primary_promotes_backup() {
        let mut state = ServiceState::new();
        state.on_ping(host(1), 0);
        state.on_ping(host(2), 0);
        state.on_ping(host(1), 2); // primary acknowledges view 2
        assert!(state.acknowledged);
        let options = ServiceOptions {
            ping_interval_ms: 1,
            dead_pings: 1,
        };
        // host(2) keeps pinging so it stays alive; host(1) stops.
        state.on_ping(host(2), 2);
        std::thread::sleep(Duration::from_millis(5));
        state.tick(&options);
        assert_eq!(3, state.view.viewnum);
        assert_eq!(Some(host(2)), state.view.primary);
        assert_eq!(None, state.view.backup);
    }
}
