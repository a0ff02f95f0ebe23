//! Scheduler tick: find watched containers with newer digests and dispatch
//! update commands to the owning agents.

use std::sync::Arc;

use tracing::{debug, info, warn};

use lighthouse_core::image::ImageRef;
use lighthouse_proto::host_agent::UpdateContainerCommand;
use lighthouse_proto::registry_monitor::ImageInfo;

use crate::domain::repository::{
    CommandSink, ContainerRepository, HostRepository, UpdateCheckPort,
};
use crate::domain::types::{ContainerRecord, parse_ports};
use crate::error::OrchestratorError;
use crate::health::ServiceHealth;
use crate::logstream::LogHub;

pub struct DispatchUpdatesUseCase<H, C, P, S> {
    pub hosts: H,
    pub containers: C,
    pub monitor: P,
    pub sink: S,
    pub logs: LogHub,
    pub health: Arc<ServiceHealth>,
}

impl<H, C, P, S> DispatchUpdatesUseCase<H, C, P, S>
where
    H: HostRepository,
    C: ContainerRepository,
    P: UpdateCheckPort,
    S: CommandSink,
{
    /// One scheduler tick. Never fails: every per-container problem is
    /// logged and skipped, and the next tick retries from scratch.
    pub async fn execute(&self) {
        self.logs.publish("checking watched containers for updates");

        let watched = match self.containers.list_watched().await {
            Ok(watched) => {
                self.health.set_database(true);
                watched
            }
            Err(e) => {
                self.health.set_database(false);
                warn!(error = %e, "update check skipped: store unavailable");
                return;
            }
        };
        if watched.is_empty() {
            debug!("watchlist empty, nothing to check");
            return;
        }

        let images: Vec<ImageInfo> = watched
            .iter()
            .map(|container| {
                let image = ImageRef::parse(&container.image);
                ImageInfo {
                    container_uid: container.container_uid.clone(),
                    repository: image.repository,
                    tag: image.tag,
                    digest: container.digest.clone(),
                }
            })
            .collect();

        let updates = match self.monitor.check_updates(images).await {
            Ok(updates) => {
                self.health.set_registry(true);
                updates
            }
            Err(e) => {
                self.health.set_registry(false);
                warn!(error = %e, "registry monitor unreachable, tick skipped");
                self.logs.publish("update check failed: registry monitor unreachable");
                return;
            }
        };
        info!(candidates = updates.len(), "update check finished");

        for update in updates {
            if let Err(e) = self.dispatch_one(&update.container_uid, &update.new_tag).await {
                // Missing connections and vanished containers are expected
                // mid-churn; the next tick rediscovers them.
                warn!(container = %update.container_uid, error = %e, "dispatch skipped");
            }
        }
    }

    async fn dispatch_one(
        &self,
        container_uid: &str,
        new_tag: &str,
    ) -> Result<(), OrchestratorError> {
        let container = self
            .containers
            .find_by_uid(container_uid)
            .await?
            .ok_or_else(|| OrchestratorError::ContainerNotFound(container_uid.to_owned()))?;
        let host = self
            .hosts
            .find_by_id(container.host_id)
            .await?
            .ok_or_else(|| OrchestratorError::HostNotFound(container.host_id.to_string()))?;

        let cmd = build_command(&container, &host.mac_address, new_tag);
        self.sink.dispatch(&host.mac_address, cmd).await?;

        info!(container = %container.name, host = %host.mac_address, image = new_tag, "update command queued");
        self.logs.publish(format!(
            "queued update of {} to {} on {}",
            container.name, new_tag, host.mac_address
        ));
        Ok(())
    }
}

/// Rebuild the agent-side overrides from the persisted container state so
/// the replacement container keeps its ports, env, volumes, and network.
fn build_command(
    container: &ContainerRecord,
    mac_address: &str,
    new_tag: &str,
) -> UpdateContainerCommand {
    UpdateContainerCommand {
        container_uid: container.container_uid.clone(),
        mac_address: mac_address.to_owned(),
        image: new_tag.to_owned(),
        override_env_vars: container.env_vars.clone(),
        override_ports: parse_ports(&container.ports),
        override_volumes: container.volumes.clone(),
        override_network: container.network.clone().unwrap_or_default(),
    }
}
