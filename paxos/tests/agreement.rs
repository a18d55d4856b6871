use std::sync::Arc;
use std::time::{Duration, Instant};

use guacamole::Guacamole;
use paxos::{Peer, Status};
use paxos_pb::ReplicaID;
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
    Host::new(nth_id(n), format!("peer{n}"))
}

/// Wire up `count` peers on a [LocalNetwork], each reachable from every other, with the given
/// per-peer [UnreliabilityOptions].
fn cluster(count: u64, unreliability: UnreliabilityOptions) -> (LocalNetwork, Vec<Peer>, Vec<Host>) {
    let network = LocalNetwork::new();
    let replicas: Vec<ReplicaID> = (0..count).map(nth_replica).collect();
    let hosts: Vec<Host> = (0..count).map(nth_host).collect();
    let mut peers = Vec::new();
    let mut servers = Vec::new();
    for i in 0..count as usize {
        let mut clients: Vec<Arc<dyn Client + Send + Sync>> = Vec::new();
        for j in 0..count as usize {
            if i == j {
                continue;
            }
            let transport = network.transport(hosts[j].clone(), unreliability.clone(), Guacamole::new(i as u64 * 7919));
            clients.push(transport);
        }
        let (peer, server) = Peer::new(replicas[i], replicas.clone(), clients);
        peers.push(peer);
        servers.push(server);
    }
    for (i, server) in servers.into_iter().enumerate() {
        let mut registry = ServiceRegistry::new();
        registry.register("AcceptorService", server);
        network.register(&hosts[i], registry);
    }
    (network, peers, hosts)
}

fn wait_for_decision(peer: &Peer, seq: u64, timeout: Duration) -> Vec<u8> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Status::Decided(value) = peer.status(seq) {
            return value;
        }
        assert!(Instant::now() < deadline, "instance {seq} never decided");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn three_peers_agree_on_a_value() {
    let (_network, peers, _hosts) = cluster(3, UnreliabilityOptions::reliable());
    peers[0].start(1, b"hello".to_vec());
    for peer in &peers {
        let value = wait_for_decision(peer, 1, Duration::from_secs(5));
        assert_eq!(b"hello".to_vec(), value);
    }
}

#[test]
fn competing_proposers_converge_on_one_value() {
    let (_network, peers, _hosts) = cluster(3, UnreliabilityOptions::reliable());
    peers[0].start(1, b"from zero".to_vec());
    peers[1].start(1, b"from one".to_vec());
    peers[2].start(1, b"from two".to_vec());
    let decided = wait_for_decision(&peers[0], 1, Duration::from_secs(5));
    for peer in &peers {
        assert_eq!(decided, wait_for_decision(peer, 1, Duration::from_secs(5)));
    }
}

#[test]
fn agreement_survives_a_minority_partition() {
    let (network, peers, hosts) = cluster(3, UnreliabilityOptions::reliable());
    network.unregister(&hosts[2]);
    peers[0].start(7, b"majority rules".to_vec());
    let value = wait_for_decision(&peers[0], 7, Duration::from_secs(5));
    assert_eq!(b"majority rules".to_vec(), value);
    let value = wait_for_decision(&peers[1], 7, Duration::from_secs(5));
    assert_eq!(b"majority rules".to_vec(), value);
}

#[test]
fn agreement_survives_a_lossy_network() {
    let unreliability = UnreliabilityOptions {
        drop_probability: 0.3,
        duplicate_probability: 0.1,
    };
    let (_network, peers, _hosts) = cluster(3, unreliability);
    peers[0].start(1, b"persistent".to_vec());
    for peer in &peers {
        let value = wait_for_decision(peer, 1, Duration::from_secs(10));
        assert_eq!(b"persistent".to_vec(), value);
    }
}

#[test]
fn done_and_min_advance_across_the_cluster() {
    // `done` only reaches other peers piggybacked on messages its own proposer sends, so every
    // peer here takes a turn proposing: otherwise a peer that never proposes is never heard from,
    // and the others can never garbage-collect on its account.
    let (_network, peers, _hosts) = cluster(3, UnreliabilityOptions::reliable());
    for (i, peer) in peers.iter().enumerate() {
        let seq = i as u64 + 1;
        peer.start(seq, format!("value-{seq}").into_bytes());
        for p in &peers {
            wait_for_decision(p, seq, Duration::from_secs(5));
        }
    }
    for peer in &peers {
        peer.done(3);
    }
    for (i, peer) in peers.iter().enumerate() {
        let seq = i as u64 + 4;
        peer.start(seq, b"flush".to_vec());
        for p in &peers {
            wait_for_decision(p, seq, Duration::from_secs(5));
        }
    }
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if peers.iter().all(|peer| peer.min() >= 4) {
            break;
        }
        assert!(Instant::now() < deadline, "min() never advanced past done(3) cluster-wide");
        std::thread::sleep(Duration::from_millis(5));
    }
}
