//! Stand up one `pbservice` replica. It pings a separately running `viewservice` node to learn
//! whether it is currently primary, backup, or neither, forwards writes and state transfers
//! accordingly, and serves `PbService` over TCP.

use std::fs::File;
use std::sync::Arc;
use std::time::SystemTime;

use arrrg::CommandLine;
use arrrg_derive::CommandLine;

use biometrics::{Collector, PlainTextEmitter};
use indicio::{clue, stdio::StdioEmitter, ALWAYS, INFO};

use pbservice::{PbServiceServer, Replica, ReplicaOptions, COLLECTOR};
use rpc_pb::{Client, Host};
use rpc_sync::{new_client, ClientOptions, Server, ServerOptions, ServiceRegistry};

#[derive(CommandLine, Debug, Default, Eq, PartialEq)]
struct Options {
    #[arrrg(required, "The viewservice host, in host:ID=host:port format.")]
    view_service: Host,
    #[arrrg(nested)]
    client: ClientOptions,
    #[arrrg(nested)]
    replica: ReplicaOptions,
    #[arrrg(nested)]
    server: ServerOptions,
}

fn main() {
    let (options, free) = Options::from_command_line("Usage: pbservice-node [OPTIONS]");
    if !free.is_empty() {
        eprintln!("command takes no arguments");
        std::process::exit(1);
    }

    COLLECTOR.register(StdioEmitter);
    COLLECTOR.set_verbosity(INFO);
    clue!(COLLECTOR, ALWAYS, {
        new_process: std::env::args().collect::<Vec<_>>(),
        bind_to: options.server.bind_to.clone(),
        view_service: options.view_service.clone(),
    });

    std::thread::spawn(|| {
        let mut collector = Collector::new();
        pbservice::register_biometrics(&mut collector);
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
    let client_options = options.client.clone();
    let connect = Arc::new(move |host: &Host| {
        new_client(host.clone(), client_options.clone()) as Arc<dyn Client + Send + Sync>
    });

    let vs_transport = new_client(options.view_service.clone(), options.client.clone());
    let vs_clerk = viewservice::Clerk::new(me.clone(), vs_transport);
    let replica = Replica::new(me, vs_clerk, connect, options.replica);

    let mut services = ServiceRegistry::new();
    services.register("PbService", PbServiceServer::bind(replica));

    let server = Server::new(options.server, services);
    server.serve().expect("server should serve until killed");
}
