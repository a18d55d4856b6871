use std::sync::Arc;
use std::time::Duration;

use guacamole::Guacamole;
use kvpaxos::{Clerk, Replica};
use kvpaxos_pb::KvPaxosServer;
use paxos::Peer;
use paxos_pb::{AcceptorServer, ReplicaID};
use rpc_pb::{Client, Host, HostID};
use rpc_sync::{LocalNetwork, ServiceRegistry, UnreliabilityOptions};

fn nth_id(n: u64) -> HostID {
    let mut id = HostID::BOTTOM;
    for _ in 0..n {
        id = id.next();
    }
    id
}

fn nth_replica(n: u64) -> ReplicaID {
    let mut id = ReplicaID::BOTTOM;
    for _ in 0..n {
        id = id.next();
    }
    id
}

fn nth_host(n: u64) -> Host {
    Host::new(nth_id(n), format!("kvpaxos-node{n}"))
}

/// Wire up `count` kvpaxos replicas, each backed by its own paxos peer, all reachable from one
/// another and from the returned [Clerk] over a [LocalNetwork].
fn cluster(count: u64, unreliability: UnreliabilityOptions) -> (LocalNetwork, Vec<Replica>, Clerk) {
    let network = LocalNetwork::new();
    let replica_ids: Vec<ReplicaID> = (0..count).map(nth_replica).collect();
    let hosts: Vec<Host> = (0..count).map(nth_host).collect();

    let mut peers = Vec::new();
    let mut acceptor_servers = Vec::new();
    for i in 0..count as usize {
        let mut clients: Vec<Arc<dyn Client + Send + Sync>> = Vec::new();
        for j in 0..count as usize {
            if i == j {
                continue;
            }
            let transport = network.transport(
                hosts[j].clone(),
                unreliability.clone(),
                Guacamole::new(i as u64 * 104729),
            );
            clients.push(transport);
        }
        let (peer, server) = Peer::new(replica_ids[i], replica_ids.clone(), clients);
        peers.push(peer);
        acceptor_servers.push(server);
    }

    let replicas: Vec<Replica> = peers.into_iter().map(Replica::new).collect();
    for (i, (replica, acceptor)) in replicas.iter().cloned().zip(acceptor_servers).enumerate() {
        let mut registry = ServiceRegistry::new();
        registry.register("AcceptorService", acceptor);
        registry.register("KvPaxosService", KvPaxosServer::bind(replica));
        network.register(&hosts[i], registry);
    }

    let clerk_transports: Vec<Arc<dyn Client + Send + Sync>> = (0..count as usize)
        .map(|i| {
            network.transport(hosts[i].clone(), UnreliabilityOptions::reliable(), Guacamole::new(i as u64))
                as Arc<dyn Client + Send + Sync>
        })
        .collect();
    let clerk = Clerk::new(clerk_transports);

    (network, replicas, clerk)
}

#[test]
fn put_then_get_round_trips_on_three_replicas() {
    let (_network, _replicas, clerk) = cluster(3, UnreliabilityOptions::reliable());
    clerk.put("a", b"1".to_vec());
    assert_eq!(Some(b"1".to_vec()), clerk.get("a"));
}

#[test]
fn get_of_unwritten_key_is_none() {
    let (_network, _replicas, clerk) = cluster(3, UnreliabilityOptions::reliable());
    assert_eq!(None, clerk.get("never-written"));
}

#[test]
fn five_replicas_tolerate_a_lossy_network() {
    let unreliability = UnreliabilityOptions {
        drop_probability: 0.1,
        duplicate_probability: 0.2,
    };
    let (_network, _replicas, clerk) = cluster(5, unreliability);
    for i in 0..20 {
        clerk.put(&format!("key-{i}"), format!("value-{i}").into_bytes());
    }
    for i in 0..20 {
        assert_eq!(
            Some(format!("value-{i}").into_bytes()),
            clerk.get(&format!("key-{i}")),
        );
    }
}

#[test]
fn kill_mid_request_reports_shutdown_instead_of_panicking() {
    use kvpaxos_pb::{ClientID, KvPaxosService, PutRequest};

    // Drop every inter-replica message so no instance this replica proposes can ever reach
    // quorum; the request's slot-claim loop is guaranteed to still be polling when `kill` lands.
    let unreliability = UnreliabilityOptions {
        drop_probability: 1.0,
        duplicate_probability: 0.0,
    };
    let (_network, replicas, _clerk) = cluster(3, unreliability);
    let stuck = replicas[0].clone();
    let killer = stuck.clone();
    let handle = std::thread::spawn(move || {
        let ctx = rpc_pb::Context::default();
        stuck.put(
            &ctx,
            PutRequest {
                key: "a".to_string(),
                value: b"1".to_vec(),
                client_id: ClientID::BOTTOM,
                request_id: 1,
            },
        )
    });
    std::thread::sleep(Duration::from_millis(50));
    killer.kill();
    let result = handle.join().expect("put thread must not panic");
    assert!(matches!(result, Err(kvpaxos_pb::Error::Shutdown { .. })));
}

#[test]
fn every_replica_converges_on_the_same_db() {
    use kvpaxos_pb::{ClientID, GetRequest, KvPaxosService};

    let (_network, replicas, clerk) = cluster(3, UnreliabilityOptions::reliable());
    clerk.put("a", b"1".to_vec());
    clerk.put("b", b"2".to_vec());

    // Querying every replica directly (bypassing the clerk's round-robin) confirms the decided
    // log, not just whichever replica answered the clerk, converges everywhere.
    let ctx = rpc_pb::Context::default();
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        let mut request_id = 0u64;
        let all_converged = replicas.iter().all(|replica| {
            request_id += 1;
            let a = replica.get(
                &ctx,
                GetRequest {
                    key: "a".to_string(),
                    client_id: ClientID::TOP,
                    request_id,
                },
            );
            let b = replica.get(
                &ctx,
                GetRequest {
                    key: "b".to_string(),
                    client_id: ClientID::TOP,
                    request_id: request_id + 1000,
                },
            );
            matches!(a.map(|r| r.value), Ok(v) if v == b"1".to_vec())
                && matches!(b.map(|r| r.value), Ok(v) if v == b"2".to_vec())
        });
        if all_converged {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "replicas never converged");
        std::thread::sleep(Duration::from_millis(10));
    }
}
