//! Container inventory collection for registration and heartbeats.

use tracing::warn;

use lighthouse_proto::host_agent::{ContainerInfo, PortMapping, container_info};

use crate::domain::engine::{ContainerDetails, ContainerEngine, ContainerRunState};
use crate::error::AgentError;

/// Enumerate and inspect every container (including stopped ones). A
/// container that fails inspection is skipped so one broken container does
/// not blind the whole report.
pub async fn collect_inventory<E: ContainerEngine>(
    engine: &E,
) -> Result<Vec<ContainerInfo>, AgentError> {
    let summaries = engine.list_containers().await?;

    let mut containers = Vec::with_capacity(summaries.len());
    for summary in summaries {
        match engine.inspect_container(&summary.uid).await {
            Ok(details) => containers.push(to_wire(details)),
            Err(e) => warn!(container = %summary.uid, error = %e, "inspect failed, skipping"),
        }
    }
    Ok(containers)
}

fn to_wire(details: ContainerDetails) -> ContainerInfo {
    let status = match details.state {
        ContainerRunState::Running => container_info::Status::Running,
        ContainerRunState::Stopped => container_info::Status::Stopped,
        ContainerRunState::Paused => container_info::Status::Paused,
        ContainerRunState::Restarting => container_info::Status::Restarting,
        ContainerRunState::Exited => container_info::Status::Exited,
        ContainerRunState::Dead => container_info::Status::Dead,
    };

    ContainerInfo {
        container_uid: details.uid,
        name: details.name,
        image: details.image,
        digest: details.digest,
        ports: details
            .ports
            .into_iter()
            .map(|p| PortMapping {
                host_ip: p.host_ip,
                host_port: u32::from(p.host_port),
                container_port: u32::from(p.container_port),
                protocol: p.protocol,
            })
            .collect(),
        env_vars: details.env,
        volumes: details.volumes,
        network: details.network_mode.unwrap_or_default(),
        status: status.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockEngine, running_container};

    #[tokio::test]
    async fn inventory_reports_every_container() {
        let engine = MockEngine::with_containers(vec![
            running_container("c1", "nginx", "nginx:1.25"),
            running_container("c2", "redis", "redis:7"),
        ]);
        let inventory = collect_inventory(&engine).await.unwrap();
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory[0].container_uid, "c1");
        assert_eq!(inventory[0].name, "nginx");
        assert_eq!(inventory[1].image, "redis:7");
    }

    #[tokio::test]
    async fn ports_flatten_into_wire_mappings() {
        let mut container = running_container("c1", "nginx", "nginx:1.25");
        container.ports = vec!["0.0.0.0:8080->80/tcp".parse().unwrap()];
        let engine = MockEngine::with_containers(vec![container]);

        let inventory = collect_inventory(&engine).await.unwrap();
        let port = &inventory[0].ports[0];
        assert_eq!(port.host_ip, "0.0.0.0");
        assert_eq!(port.host_port, 8080);
        assert_eq!(port.container_port, 80);
        assert_eq!(port.protocol, "tcp");
    }

    #[tokio::test]
    async fn uninspectable_container_is_skipped() {
        let engine = MockEngine::with_containers(vec![
            running_container("c1", "nginx", "nginx:1.25"),
            running_container("c2", "redis", "redis:7"),
        ]);
        engine.fail_inspect("c2");

        let inventory = collect_inventory(&engine).await.unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].container_uid, "c1");
    }
}
