//! Orchestrator domain types and wire/store conversions.

use chrono::{DateTime, Utc};
use tracing::warn;

use lighthouse_core::ports::PortSpec;
use lighthouse_proto::host_agent::{ContainerInfo, PortMapping};

/// Persisted host row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    pub id: i64,
    pub mac_address: String,
    pub hostname: String,
    pub ip_address: String,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

/// Persisted container row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: i64,
    pub host_id: i64,
    pub container_uid: String,
    pub name: String,
    pub image: String,
    pub digest: String,
    pub ports: Vec<String>,
    pub env_vars: Vec<String>,
    pub volumes: Vec<String>,
    pub network: Option<String>,
    pub watch: bool,
}

/// Inventory upsert payload. Carries no `watch`: that flag is operator-owned
/// and preserved across upserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContainer {
    pub host_id: i64,
    pub container_uid: String,
    pub name: String,
    pub image: String,
    pub digest: String,
    pub ports: Vec<String>,
    pub env_vars: Vec<String>,
    pub volumes: Vec<String>,
    pub network: Option<String>,
}

impl NewContainer {
    pub fn from_report(host_id: i64, info: &ContainerInfo) -> Self {
        NewContainer {
            host_id,
            container_uid: info.container_uid.clone(),
            name: info.name.clone(),
            image: info.image.clone(),
            digest: info.digest.clone(),
            ports: flatten_ports(&info.ports),
            env_vars: info.env_vars.clone(),
            volumes: info.volumes.clone(),
            network: (!info.network.is_empty()).then(|| info.network.clone()),
        }
    }
}

/// Persisted update workflow stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    Starting,
    Pulling,
    Running,
    Rollback,
    Completed,
    Failed,
}

/// Append payload for one status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUpdateStatus {
    pub host_id: i64,
    pub image: String,
    pub stage: UpdateStage,
    pub logs: String,
}

/// Flatten wire port mappings into the canonical persisted strings.
pub fn flatten_ports(ports: &[PortMapping]) -> Vec<String> {
    ports
        .iter()
        .filter_map(|p| {
            let (Ok(host_port), Ok(container_port)) =
                (u16::try_from(p.host_port), u16::try_from(p.container_port))
            else {
                warn!(?p, "dropping out-of-range port mapping");
                return None;
            };
            Some(
                PortSpec {
                    host_ip: p.host_ip.clone(),
                    host_port,
                    container_port,
                    protocol: p.protocol.clone(),
                }
                .to_string(),
            )
        })
        .collect()
}

/// Parse persisted port strings back into wire mappings. Malformed entries
/// are logged and skipped so one bad row cannot block an update dispatch.
pub fn parse_ports(ports: &[String]) -> Vec<PortMapping> {
    ports
        .iter()
        .filter_map(|s| match s.parse::<PortSpec>() {
            Ok(spec) => Some(PortMapping {
                host_ip: spec.host_ip,
                host_port: u32::from(spec.host_port),
                container_port: u32::from(spec.container_port),
                protocol: spec.protocol,
            }),
            Err(e) => {
                warn!(entry = %s, error = %e, "skipping malformed port mapping");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(host_ip: &str, host_port: u32, container_port: u32, protocol: &str) -> PortMapping {
        PortMapping {
            host_ip: host_ip.to_owned(),
            host_port,
            container_port,
            protocol: protocol.to_owned(),
        }
    }

    #[test]
    fn ports_round_trip_through_store_format() {
        let original = vec![
            mapping("0.0.0.0", 8080, 80, "tcp"),
            mapping("127.0.0.1", 5353, 53, "udp"),
        ];
        let stored = flatten_ports(&original);
        assert_eq!(stored, vec!["0.0.0.0:8080->80/tcp", "127.0.0.1:5353->53/udp"]);
        assert_eq!(parse_ports(&stored), original);
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let stored = vec![
            "0.0.0.0:8080->80/tcp".to_owned(),
            "garbage".to_owned(),
            "1.2.3.4:1->2".to_owned(),
        ];
        let parsed = parse_ports(&stored);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].host_port, 8080);
    }

    #[test]
    fn out_of_range_mappings_are_dropped_on_flatten() {
        let stored = flatten_ports(&[mapping("0.0.0.0", 700_000, 80, "tcp")]);
        assert!(stored.is_empty());
    }

    #[test]
    fn report_conversion_keeps_order_and_normalizes_network() {
        let info = ContainerInfo {
            container_uid: "c1".into(),
            name: "nginx".into(),
            image: "nginx:1.25".into(),
            digest: "sha256:aaaa".into(),
            ports: vec![mapping("0.0.0.0", 8080, 80, "tcp")],
            env_vars: vec!["B=2".into(), "A=1".into()],
            volumes: vec!["/v".into()],
            network: String::new(),
            status: 0,
        };
        let new = NewContainer::from_report(7, &info);
        assert_eq!(new.host_id, 7);
        assert_eq!(new.env_vars, vec!["B=2", "A=1"]);
        assert_eq!(new.network, None);
        assert_eq!(new.ports, vec!["0.0.0.0:8080->80/tcp"]);
    }
}
