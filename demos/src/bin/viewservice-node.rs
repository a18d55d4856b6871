//! Stand up a lone `viewservice` sequencer: the single, trusted process that `pbservice`
//! replicas ping to learn their role.

use std::fs::File;
use std::time::SystemTime;

use arrrg::CommandLine;
use arrrg_derive::CommandLine;

use biometrics::{Collector, PlainTextEmitter};
use indicio::{clue, stdio::StdioEmitter, ALWAYS, INFO};

use rpc_sync::{Server, ServerOptions, ServiceRegistry};
use viewservice::{Service, ServiceOptions, ViewServiceServer, COLLECTOR};

#[derive(CommandLine, Debug, Default, Eq, PartialEq)]
struct Options {
    #[arrrg(nested)]
    server: ServerOptions,
    #[arrrg(nested)]
    view: ServiceOptions,
}

fn main() {
    let (options, free) = Options::from_command_line("Usage: viewservice-node [OPTIONS]");
    if !free.is_empty() {
        eprintln!("command takes no arguments");
        std::process::exit(1);
    }

    COLLECTOR.register(StdioEmitter);
    COLLECTOR.set_verbosity(INFO);
    clue!(COLLECTOR, ALWAYS, {
        new_process: std::env::args().collect::<Vec<_>>(),
        bind_to: options.server.bind_to.clone(),
    });

    std::thread::spawn(|| {
        let mut collector = Collector::new();
        viewservice::register_biometrics(&mut collector);
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

    let service = Service::new(options.view);
    let mut services = ServiceRegistry::new();
    services.register("ViewService", ViewServiceServer::bind(service));

    let server = Server::new(options.server, services);
    server.serve().expect("server should serve until killed");
}
