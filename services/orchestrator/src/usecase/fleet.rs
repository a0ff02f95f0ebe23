//! Host registration and heartbeat reconciliation.

use tracing::{info, warn};

use lighthouse_proto::host_agent::{HeartbeatRequest, Host};

use crate::domain::repository::{ContainerRepository, HostRepository};
use crate::domain::types::{HostRecord, NewContainer};
use crate::error::OrchestratorError;

// ── RegisterHost ─────────────────────────────────────────────────────────────

pub struct RegisterHostUseCase<H, C> {
    pub hosts: H,
    pub containers: C,
}

impl<H: HostRepository, C: ContainerRepository> RegisterHostUseCase<H, C> {
    /// Upsert the host, then upsert every reported container. A container
    /// that fails to persist is logged and skipped; registration itself
    /// still succeeds.
    pub async fn execute(&self, host: &Host) -> Result<HostRecord, OrchestratorError> {
        if host.mac_address.is_empty() {
            return Err(OrchestratorError::EmptyMacAddress);
        }

        let record = self
            .hosts
            .upsert(&host.mac_address, &host.hostname, &host.ip_address)
            .await?;
        info!(mac = %record.mac_address, hostname = %record.hostname, "host registered");

        for container in &host.containers {
            let new = NewContainer::from_report(record.id, container);
            if let Err(e) = self.containers.upsert(&new).await {
                warn!(container = %container.name, error = %e, "container upsert failed");
            }
        }
        Ok(record)
    }
}

// ── Heartbeat ────────────────────────────────────────────────────────────────

pub struct HeartbeatUseCase<H, C> {
    pub hosts: H,
    pub containers: C,
}

impl<H: HostRepository, C: ContainerRepository> HeartbeatUseCase<H, C> {
    /// Refresh the host's heartbeat, upsert the reported containers, then
    /// prune rows the agent no longer reports.
    ///
    /// An empty report leaves the stored inventory untouched: a momentarily
    /// blind agent must not flush a live host's history.
    pub async fn execute(&self, req: &HeartbeatRequest) -> Result<usize, OrchestratorError> {
        let host = self
            .hosts
            .find_by_mac(&req.mac_address)
            .await?
            .ok_or_else(|| OrchestratorError::HostNotFound(req.mac_address.clone()))?;

        if let Err(e) = self.hosts.touch_heartbeat(host.id).await {
            warn!(mac = %req.mac_address, error = %e, "heartbeat timestamp update failed");
        }

        let mut active_uids = Vec::with_capacity(req.containers.len());
        for container in &req.containers {
            active_uids.push(container.container_uid.clone());
            let new = NewContainer::from_report(host.id, container);
            if let Err(e) = self.containers.upsert(&new).await {
                warn!(container = %container.name, error = %e, "container upsert failed");
            }
        }

        if !active_uids.is_empty() {
            let removed = self.containers.delete_stale(host.id, &active_uids).await?;
            if removed > 0 {
                info!(mac = %req.mac_address, removed, "pruned stale containers");
            }
        }

        Ok(active_uids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryContainerRepo, MemoryHostRepo, report};
    use lighthouse_proto::host_agent::PortMapping;

    fn host(mac: &str, containers: Vec<lighthouse_proto::host_agent::ContainerInfo>) -> Host {
        Host {
            mac_address: mac.to_owned(),
            hostname: "h1".to_owned(),
            ip_address: "10.0.0.1".to_owned(),
            containers,
        }
    }

    #[tokio::test]
    async fn first_registration_persists_host_and_containers() {
        let hosts = MemoryHostRepo::default();
        let containers = MemoryContainerRepo::default();
        let usecase = RegisterHostUseCase {
            hosts: hosts.clone(),
            containers: containers.clone(),
        };

        let mut info = report("c1", "nginx", "nginx:1.25");
        info.ports = vec![PortMapping {
            host_ip: "0.0.0.0".into(),
            host_port: 8080,
            container_port: 80,
            protocol: "tcp".into(),
        }];
        info.env_vars = vec!["A=1".into()];
        info.volumes = vec!["/v".into()];
        info.network = "bridge".into();

        let record = usecase
            .execute(&host("aa:bb:cc:dd:ee:01", vec![info]))
            .await
            .unwrap();

        assert_eq!(hosts.all().await.unwrap().len(), 1);
        let stored = containers.list_for_host(record.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "nginx");
        assert_eq!(stored[0].ports, vec!["0.0.0.0:8080->80/tcp"]);
        // New containers are never born watched.
        assert!(!stored[0].watch);
    }

    #[tokio::test]
    async fn re_registering_is_idempotent() {
        let hosts = MemoryHostRepo::default();
        let containers = MemoryContainerRepo::default();
        let usecase = RegisterHostUseCase {
            hosts: hosts.clone(),
            containers: containers.clone(),
        };

        let payload = host("aa:bb:cc:dd:ee:01", vec![report("c1", "nginx", "nginx:1.25")]);
        let first = usecase.execute(&payload).await.unwrap();
        let second = usecase.execute(&payload).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(hosts.all().await.unwrap().len(), 1);
        assert_eq!(containers.list_for_host(first.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn registration_preserves_operator_watch() {
        let hosts = MemoryHostRepo::default();
        let containers = MemoryContainerRepo::default();
        let usecase = RegisterHostUseCase {
            hosts: hosts.clone(),
            containers: containers.clone(),
        };

        let payload = host("aa:bb:cc:dd:ee:01", vec![report("c1", "nginx", "nginx:1.25")]);
        let record = usecase.execute(&payload).await.unwrap();
        containers
            .set_watch("nginx", "aa:bb:cc:dd:ee:01", true)
            .await
            .unwrap();

        usecase.execute(&payload).await.unwrap();
        let stored = containers.list_for_host(record.id).await.unwrap();
        assert!(stored[0].watch);
    }

    #[tokio::test]
    async fn empty_mac_is_rejected() {
        let usecase = RegisterHostUseCase {
            hosts: MemoryHostRepo::default(),
            containers: MemoryContainerRepo::default(),
        };
        let err = usecase.execute(&host("", vec![])).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::EmptyMacAddress));
    }

    #[tokio::test]
    async fn heartbeat_prunes_unreported_containers() {
        let hosts = MemoryHostRepo::default();
        let containers = MemoryContainerRepo::default();
        let register = RegisterHostUseCase {
            hosts: hosts.clone(),
            containers: containers.clone(),
        };
        let record = register
            .execute(&host(
                "aa:bb:cc:dd:ee:01",
                vec![
                    report("c1", "nginx", "nginx:1.25"),
                    report("c2", "redis", "redis:7"),
                ],
            ))
            .await
            .unwrap();

        let heartbeat = HeartbeatUseCase {
            hosts: hosts.clone(),
            containers: containers.clone(),
        };
        heartbeat
            .execute(&HeartbeatRequest {
                mac_address: "aa:bb:cc:dd:ee:01".into(),
                containers: vec![report("c1", "nginx", "nginx:1.25")],
            })
            .await
            .unwrap();

        let stored = containers.list_for_host(record.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].container_uid, "c1");
    }

    #[tokio::test]
    async fn empty_heartbeat_leaves_inventory_untouched() {
        let hosts = MemoryHostRepo::default();
        let containers = MemoryContainerRepo::default();
        let register = RegisterHostUseCase {
            hosts: hosts.clone(),
            containers: containers.clone(),
        };
        let record = register
            .execute(&host(
                "aa:bb:cc:dd:ee:01",
                vec![report("c1", "nginx", "nginx:1.25")],
            ))
            .await
            .unwrap();

        let heartbeat = HeartbeatUseCase {
            hosts: hosts.clone(),
            containers: containers.clone(),
        };
        heartbeat
            .execute(&HeartbeatRequest {
                mac_address: "aa:bb:cc:dd:ee:01".into(),
                containers: vec![],
            })
            .await
            .unwrap();

        assert_eq!(containers.list_for_host(record.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn heartbeat_refreshes_last_seen() {
        let hosts = MemoryHostRepo::default();
        let containers = MemoryContainerRepo::default();
        let register = RegisterHostUseCase {
            hosts: hosts.clone(),
            containers: containers.clone(),
        };
        register
            .execute(&host("aa:bb:cc:dd:ee:01", vec![]))
            .await
            .unwrap();
        assert!(
            hosts.all().await.unwrap()[0].last_heartbeat.is_none(),
            "registration alone does not imply a heartbeat"
        );

        let heartbeat = HeartbeatUseCase {
            hosts: hosts.clone(),
            containers,
        };
        heartbeat
            .execute(&HeartbeatRequest {
                mac_address: "aa:bb:cc:dd:ee:01".into(),
                containers: vec![],
            })
            .await
            .unwrap();
        assert!(hosts.all().await.unwrap()[0].last_heartbeat.is_some());
    }

    #[tokio::test]
    async fn heartbeat_from_unknown_host_fails() {
        let heartbeat = HeartbeatUseCase {
            hosts: MemoryHostRepo::default(),
            containers: MemoryContainerRepo::default(),
        };
        let err = heartbeat
            .execute(&HeartbeatRequest {
                mac_address: "ff:ff".into(),
                containers: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::HostNotFound(_)));
    }
}
