//! Canonical port-mapping string codec.
//!
//! The persisted wire form is `host_ip:host_port->container_port/protocol`
//! and must round-trip: the orchestrator flattens agent-reported mappings
//! into this form for storage and parses it back when rebuilding update
//! command overrides.

use std::fmt;
use std::str::FromStr;

/// A single published port of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub host_ip: String,
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("malformed port mapping: {0}")]
pub struct ParsePortError(pub String);

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{}/{}",
            self.host_ip, self.host_port, self.container_port, self.protocol
        )
    }
}

impl FromStr for PortSpec {
    type Err = ParsePortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, container) = s
            .split_once("->")
            .ok_or_else(|| ParsePortError(s.to_owned()))?;
        // The host half may be an IPv6 literal; the port is always after the
        // last colon.
        let (host_ip, host_port) = host
            .rsplit_once(':')
            .ok_or_else(|| ParsePortError(s.to_owned()))?;
        let (container_port, protocol) = container
            .split_once('/')
            .ok_or_else(|| ParsePortError(s.to_owned()))?;
        if host_ip.is_empty() || protocol.is_empty() {
            return Err(ParsePortError(s.to_owned()));
        }
        let host_port = host_port
            .parse::<u16>()
            .map_err(|_| ParsePortError(s.to_owned()))?;
        let container_port = container_port
            .parse::<u16>()
            .map_err(|_| ParsePortError(s.to_owned()))?;
        Ok(PortSpec {
            host_ip: host_ip.to_owned(),
            host_port,
            container_port,
            protocol: protocol.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_form() {
        let spec: PortSpec = "0.0.0.0:8080->80/tcp".parse().unwrap();
        assert_eq!(spec.host_ip, "0.0.0.0");
        assert_eq!(spec.host_port, 8080);
        assert_eq!(spec.container_port, 80);
        assert_eq!(spec.protocol, "tcp");
    }

    #[test]
    fn round_trips_well_formed_strings() {
        for s in [
            "0.0.0.0:8080->80/tcp",
            "127.0.0.1:53->53/udp",
            "10.1.2.3:65535->1/tcp",
        ] {
            let spec: PortSpec = s.parse().unwrap();
            assert_eq!(spec.to_string(), s);
        }
    }

    #[test]
    fn rejects_missing_arrow() {
        assert!("0.0.0.0:8080/tcp".parse::<PortSpec>().is_err());
    }

    #[test]
    fn rejects_missing_protocol() {
        assert!("0.0.0.0:8080->80".parse::<PortSpec>().is_err());
    }

    #[test]
    fn rejects_non_numeric_ports() {
        assert!("0.0.0.0:http->80/tcp".parse::<PortSpec>().is_err());
        assert!("0.0.0.0:8080->http/tcp".parse::<PortSpec>().is_err());
    }
}
