//! Fleet snapshot assembly for the dashboard stream.

use tracing::warn;

use lighthouse_proto::tui::{ContainerStatus, HostInfo};

use crate::domain::repository::{ContainerRepository, HostRepository};
use crate::error::OrchestratorError;

pub struct BuildSnapshotUseCase<H, C> {
    pub hosts: H,
    pub containers: C,
}

impl<H: HostRepository, C: ContainerRepository> BuildSnapshotUseCase<H, C> {
    /// One hosts read followed by per-host container reads, grouped by MAC.
    /// A host whose containers cannot be read still appears, with an empty
    /// list, so one bad row does not blank the whole dashboard.
    pub async fn execute(&self) -> Result<Vec<HostInfo>, OrchestratorError> {
        let hosts = self.hosts.all().await?;

        let mut infos = Vec::with_capacity(hosts.len());
        for host in hosts {
            let containers = match self.containers.list_for_host(host.id).await {
                Ok(containers) => containers
                    .into_iter()
                    .map(|c| ContainerStatus {
                        container_uid: c.container_uid,
                        name: c.name,
                        image: c.image,
                        digest: c.digest,
                        watch: c.watch,
                    })
                    .collect(),
                Err(e) => {
                    warn!(mac = %host.mac_address, error = %e, "container read failed for host");
                    vec![]
                }
            };
            infos.push(HostInfo {
                mac_address: host.mac_address,
                hostname: host.hostname,
                ip_address: host.ip_address,
                last_heartbeat: host
                    .last_heartbeat
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
                containers,
            });
        }
        Ok(infos)
    }
}
