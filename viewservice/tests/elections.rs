use std::sync::Arc;
use std::time::Duration;

use guacamole::Guacamole;
use rpc_pb::{Client, Host, HostID};
use rpc_sync::{LocalNetwork, ServiceRegistry, UnreliabilityOptions};
use viewservice::{Clerk, Service, ServiceOptions, ViewServiceServer};

const VIEWSERVICE_HOST: &str = "viewservice-node";

fn nth_host(n: u64) -> Host {
    let mut id = HostID::BOTTOM;
    for _ in 0..n {
        id = id.next();
    }
    Host::new(id, format!("replica-{n}"))
}

/// Wire up a single view service, reachable from `count` distinct replica clerks over a
/// [LocalNetwork].
fn harness(count: u64, options: ServiceOptions) -> (LocalNetwork, Service, Vec<Clerk>) {
    let network = LocalNetwork::new();
    let service = Service::new(options);
    let viewservice_host = Host::new(HostID::TOP, VIEWSERVICE_HOST.to_string());

    let mut registry = ServiceRegistry::new();
    registry.register("ViewService", ViewServiceServer::bind(service.clone()));
    network.register(&viewservice_host, registry);

    let clerks = (0..count)
        .map(|i| {
            let transport: Arc<dyn Client + Send + Sync> = network.transport(
                viewservice_host.clone(),
                UnreliabilityOptions::reliable(),
                Guacamole::new(i + 1),
            );
            Clerk::new(nth_host(i), transport)
        })
        .collect();

    (network, service, clerks)
}

#[test]
fn first_pinger_becomes_primary() {
    let (_network, _service, clerks) = harness(
        2,
        ServiceOptions {
            ping_interval_ms: 10,
            dead_pings: 5,
        },
    );
    let view = clerks[0].ping(0).unwrap();
    assert_eq!(1, view.viewnum);
    assert!(view.is_primary(&nth_host(0)));
    assert_eq!(None, view.backup);
}

#[test]
fn second_pinger_becomes_backup() {
    let (_network, _service, clerks) = harness(
        2,
        ServiceOptions {
            ping_interval_ms: 10,
            dead_pings: 5,
        },
    );
    clerks[0].ping(0).unwrap();
    let view = clerks[1].ping(0).unwrap();
    assert_eq!(2, view.viewnum);
    assert!(view.is_primary(&nth_host(0)));
    assert!(view.is_backup(&nth_host(1)));
}

#[test]
fn view_is_frozen_until_primary_acknowledges() {
    let options = ServiceOptions {
        ping_interval_ms: 10,
        dead_pings: 2,
    };
    let (_network, service, clerks) = harness(2, options);
    clerks[0].ping(0).unwrap();
    clerks[1].ping(0).unwrap();
    assert_eq!(2, service.current_view().viewnum);

    // Primary never acknowledges view 2; even once the backup appears dead, the service must
    // not promote it away, since doing so would strand clients pinned to view 2.
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(2, service.current_view().viewnum, "frozen view must not advance");
}

#[test]
fn acknowledged_primary_failure_promotes_backup() {
    let options = ServiceOptions {
        ping_interval_ms: 10,
        dead_pings: 2,
    };
    let (_network, service, clerks) = harness(3, options);
    clerks[0].ping(0).unwrap();
    clerks[1].ping(0).unwrap();
    clerks[0].ping(2).unwrap(); // primary acknowledges view 2
    assert_eq!(2, service.current_view().viewnum);

    // clerks[1] (the backup) and clerks[2] (an idle spare) keep pinging so they stay alive.
    // clerks[0] (the primary) stops, so it should eventually be declared dead.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        clerks[1].ping(2).unwrap();
        clerks[2].ping(0).unwrap();
        let view = service.current_view();
        if view.viewnum > 2 {
            assert!(view.is_primary(&nth_host(1)));
            break;
        }
        assert!(std::time::Instant::now() < deadline, "view never advanced past the dead primary");
        std::thread::sleep(Duration::from_millis(10));
    }
}
