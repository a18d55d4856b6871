//! `demos` wires the library crates in this workspace into standalone, `arrrg`-configured server
//! binaries: one process per `paxos`/`kvpaxos` replica, one `viewservice` sequencer, and one
//! `pbservice` replica. The libraries own every interesting behavior; these binaries only parse a
//! command line and call `rpc_sync::Server::serve`.

mod peers;

pub use peers::Peers;
