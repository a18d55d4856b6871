//! Stand up one `kvpaxos` replica: a `paxos::Peer` acceptor plus the key/value log applier built
//! on top of it. Every node in a cluster is started with the same `--peers` list (including
//! itself); `--server.bind-to` picks out which entry in that list this process is.

use std::fs::File;
use std::sync::Arc;
use std::time::SystemTime;

use arrrg::CommandLine;
use arrrg_derive::CommandLine;

use biometrics::{Collector, PlainTextEmitter};
use indicio::{clue, stdio::StdioEmitter, ALWAYS, INFO};

use demos::Peers;
use kvpaxos::{KvPaxosServer, Replica, COLLECTOR as KVPAXOS_LOG};
use paxos::{Peer, COLLECTOR as PAXOS_LOG};
use paxos_pb::ReplicaID;
use rpc_pb::Client;
use rpc_sync::{new_client, ClientOptions, Server, ServerOptions, ServiceRegistry};

#[derive(CommandLine, Debug, Default, Eq, PartialEq)]
struct Options {
    #[arrrg(required, "Every peer in the cluster, including this one, comma-separated.")]
    peers: Peers,
    #[arrrg(nested)]
    client: ClientOptions,
    #[arrrg(nested)]
    server: ServerOptions,
}

fn main() {
    let (options, free) = Options::from_command_line("Usage: kvpaxos-node [OPTIONS]");
    if !free.is_empty() {
        eprintln!("command takes no arguments");
        std::process::exit(1);
    }

    KVPAXOS_LOG.register(StdioEmitter);
    KVPAXOS_LOG.set_verbosity(INFO);
    PAXOS_LOG.register(StdioEmitter);
    PAXOS_LOG.set_verbosity(INFO);
    clue!(KVPAXOS_LOG, ALWAYS, {
        new_process: std::env::args().collect::<Vec<_>>(),
        bind_to: options.server.bind_to.clone(),
    });

    std::thread::spawn(|| {
        let mut collector = Collector::new();
        kvpaxos::register_biometrics(&mut collector);
        paxos::register_biometrics(&mut collector);
        let fout = File::create("/dev/stdout").expect("stdout should be writable");
        let mut emit = PlainTextEmitter::new(fout);
        loop {
            let now = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .expect("clock should never fail")
                .as_millis()
                .try_into()
                .expect("millis since epoch should fit u64");
            if let Err(e) = collector.emit(&mut emit, now) {
                eprintln!("collector error: {e}");
            }
            std::thread::sleep(std::time::Duration::from_millis(249));
        }
    });

    let me = options.server.bind_to.clone();
    let me_id = ReplicaID::new(me.host_id().id);
    let peer_hosts = options.peers.hosts().to_vec();
    let peer_ids: Vec<ReplicaID> = peer_hosts
        .iter()
        .map(|host| ReplicaID::new(host.host_id().id))
        .collect();
    let clients: Vec<Arc<dyn Client + Send + Sync>> = peer_hosts
        .iter()
        .filter(|host| **host != me)
        .map(|host| new_client(host.clone(), options.client.clone()))
        .collect();

    let (peer, acceptor_server) = Peer::new(me_id, peer_ids, clients);
    let replica = Replica::new(peer);

    let mut services = ServiceRegistry::new();
    services.register("AcceptorService", acceptor_server);
    services.register("KvPaxosService", KvPaxosServer::bind(replica));

    let server = Server::new(options.server, services);
    server.serve().expect("server should serve until killed");
}
