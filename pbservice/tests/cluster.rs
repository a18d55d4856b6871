use std::sync::Arc;
use std::time::{Duration, Instant};

use guacamole::Guacamole;
use pbservice::{Clerk, PbServiceServer, Replica, ReplicaOptions};
use rpc_pb::{Client, Host, HostID};
use rpc_sync::{LocalNetwork, ServiceRegistry, UnreliabilityOptions};
use viewservice::{Service, ServiceOptions, ViewServiceServer};

fn nth_host(n: u64, label: &str) -> Host {
    let mut id = HostID::BOTTOM;
    for _ in 0..n {
        id = id.next();
    }
    Host::new(id, format!("{label}-{n}"))
}

/// Wire up a view service and `count` pbservice replicas, all reachable on one [LocalNetwork], and
/// return a [Clerk] that resolves the primary dynamically through the same network.
fn cluster(count: u64) -> (LocalNetwork, Service, Vec<Replica>, Clerk) {
    let network = LocalNetwork::new();

    let vs_host = nth_host(0, "viewservice");
    let vs_options = ServiceOptions {
        ping_interval_ms: 10,
        dead_pings: 3,
    };
    let service = Service::new(vs_options);
    let mut vs_registry = ServiceRegistry::new();
    vs_registry.register("ViewService", ViewServiceServer::bind(service.clone()));
    network.register(&vs_host, vs_registry);

    let connect = {
        let network = network.clone();
        Arc::new(move |host: &Host| {
            network.transport(
                host.clone(),
                UnreliabilityOptions::reliable(),
                Guacamole::new(0),
            ) as Arc<dyn Client + Send + Sync>
        })
    };

    let replica_options = ReplicaOptions {
        ping_interval_ms: 10,
        backup_retries: 5,
    };

    let mut replicas = Vec::new();
    for i in 1..=count {
        let me = nth_host(i, "replica");
        let vs_transport = network.transport(
            vs_host.clone(),
            UnreliabilityOptions::reliable(),
            Guacamole::new(i),
        );
        let vs_clerk = viewservice::Clerk::new(me.clone(), vs_transport);
        let replica = Replica::new(me.clone(), vs_clerk, connect.clone(), replica_options.clone());
        let mut registry = ServiceRegistry::new();
        registry.register("PbService", PbServiceServer::bind(replica.clone()));
        network.register(&me, registry);
        replicas.push(replica);
    }

    let clerk_vs_transport = network.transport(
        vs_host.clone(),
        UnreliabilityOptions::reliable(),
        Guacamole::new(9999),
    );
    let clerk_vs_clerk = viewservice::Clerk::new(nth_host(count + 1, "clerk"), clerk_vs_transport);
    let clerk = Clerk::new(clerk_vs_clerk, connect);

    (network, service, replicas, clerk)
}

fn wait_for_primary(service: &Service, deadline: Instant) {
    while service.current_view().primary.is_none() {
        assert!(Instant::now() < deadline, "no primary elected in time");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn put_then_get_round_trips_through_the_primary() {
    let (_network, service, _replicas, clerk) = cluster(2);
    wait_for_primary(&service, Instant::now() + Duration::from_secs(5));
    // Give the backup a chance to be elected and receive its initial state transfer.
    std::thread::sleep(Duration::from_millis(200));

    clerk.put("a", b"1".to_vec());
    assert_eq!(Some(b"1".to_vec()), clerk.get("a"));
}

#[test]
fn get_of_unwritten_key_is_none() {
    let (_network, service, _replicas, clerk) = cluster(2);
    wait_for_primary(&service, Instant::now() + Duration::from_secs(5));
    assert_eq!(None, clerk.get("never-written"));
}

#[test]
fn backup_takes_over_with_the_primarys_data_after_a_failover() {
    let (network, service, replicas, clerk) = cluster(2);
    wait_for_primary(&service, Instant::now() + Duration::from_secs(5));
    // Let the initial view settle (primary + backup both elected, state transferred) before
    // writing, and again afterward so the write is forwarded before the primary dies.
    std::thread::sleep(Duration::from_millis(200));
    clerk.put("a", b"1".to_vec());
    std::thread::sleep(Duration::from_millis(200));

    let dead_primary = service.current_view().primary.clone().unwrap();
    network.unregister(&dead_primary);
    for replica in &replicas {
        if replica.current_view().primary.as_ref() == Some(&dead_primary) {
            replica.kill();
        }
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let view = service.current_view();
        if view.primary.as_ref() != Some(&dead_primary) && view.primary.is_some() {
            break;
        }
        assert!(Instant::now() < deadline, "no new primary was elected after failover");
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(Some(b"1".to_vec()), clerk.get("a"));
}
