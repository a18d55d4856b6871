use std::str::FromStr;

use rpc_pb::Host;

/// A comma-separated list of `host:ID=connect` entries, parsed into [Host]s. Mirrors
/// `busyrpc::StringResolver`'s connect-string format, generalized from "hosts to round-robin
/// over" to "the full peer set a cluster node is configured with".
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Peers(Vec<Host>);

impl Peers {
    pub fn hosts(&self) -> &[Host] {
        &self.0
    }

    pub fn into_hosts(self) -> Vec<Host> {
        self.0
    }
}

impl FromStr for Peers {
    type Err = rpc_pb::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut hosts = Vec::new();
        for part in s.split(',') {
            hosts.push(part.parse::<Host>()?);
        }
        Ok(Peers(hosts))
    }
}

impl std::fmt::Display for Peers {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(Host::to_string).collect();
        write!(fmt, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_comma_separated_connect_string() {
        let peers: Peers = "host:00000000-0000-0000-0000-000000000000=127.0.0.1:8000,\
             host:00000000-0000-0000-0000-000000000001=127.0.0.1:8001"
            .parse()
            .unwrap();
        assert_eq!(2, peers.hosts().len());
        assert_eq!("127.0.0.1:8000", peers.hosts()[0].connect());
        assert_eq!("127.0.0.1:8001", peers.hosts()[1].connect());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        let peers: Peers = "host:00000000-0000-0000-0000-000000000000=127.0.0.1:8000"
            .parse()
            .unwrap();
        let round_tripped: Peers = peers.to_string().parse().unwrap();
        assert_eq!(peers, round_tripped);
    }
}
