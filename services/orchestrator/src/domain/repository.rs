#![allow(async_fn_in_trait)]

//! Store and collaborator ports. sea-orm implementations live in
//! `infra::db`; the registry monitor client lives in `infra::monitor`.

use lighthouse_proto::host_agent::UpdateContainerCommand;
use lighthouse_proto::registry_monitor::{ImageInfo, ImageToUpdate};

use crate::domain::types::{ContainerRecord, HostRecord, NewContainer, NewUpdateStatus};
use crate::error::OrchestratorError;

/// Repository for managed hosts.
pub trait HostRepository: Send + Sync {
    /// Insert or refresh a host by MAC address. Returns the stored row.
    async fn upsert(
        &self,
        mac_address: &str,
        hostname: &str,
        ip_address: &str,
    ) -> Result<HostRecord, OrchestratorError>;

    /// Refresh `last_heartbeat` to now.
    async fn touch_heartbeat(&self, host_id: i64) -> Result<(), OrchestratorError>;

    async fn find_by_mac(&self, mac_address: &str)
    -> Result<Option<HostRecord>, OrchestratorError>;

    async fn find_by_id(&self, host_id: i64) -> Result<Option<HostRecord>, OrchestratorError>;

    async fn all(&self) -> Result<Vec<HostRecord>, OrchestratorError>;
}

/// Repository for container inventory.
pub trait ContainerRepository: Send + Sync {
    /// Upsert one reported container, preserving any operator-set `watch`.
    async fn upsert(&self, container: &NewContainer) -> Result<(), OrchestratorError>;

    /// Delete this host's containers whose uid is not in `active_uids`.
    /// Returns the number of rows removed.
    async fn delete_stale(
        &self,
        host_id: i64,
        active_uids: &[String],
    ) -> Result<u64, OrchestratorError>;

    async fn list_for_host(&self, host_id: i64)
    -> Result<Vec<ContainerRecord>, OrchestratorError>;

    async fn list_watched(&self) -> Result<Vec<ContainerRecord>, OrchestratorError>;

    async fn find_by_uid(
        &self,
        container_uid: &str,
    ) -> Result<Option<ContainerRecord>, OrchestratorError>;

    /// Flip the watch flag for a container named `name` on the host with
    /// `host_mac`. Returns `false` when nothing matched.
    async fn set_watch(
        &self,
        name: &str,
        host_mac: &str,
        watch: bool,
    ) -> Result<bool, OrchestratorError>;
}

/// Append-only repository for update status records.
pub trait UpdateStatusRepository: Send + Sync {
    async fn append(&self, status: &NewUpdateStatus) -> Result<(), OrchestratorError>;
}

/// Port for asking the registry monitor which images have newer digests.
pub trait UpdateCheckPort: Send + Sync {
    async fn check_updates(
        &self,
        images: Vec<ImageInfo>,
    ) -> Result<Vec<ImageToUpdate>, OrchestratorError>;
}

/// Port for dispatching commands to connected agents.
pub trait CommandSink: Send + Sync {
    /// Offer `cmd` to the agent's bounded send queue. Fails when the agent
    /// is not connected or is disconnecting.
    async fn dispatch(
        &self,
        mac_address: &str,
        cmd: UpdateContainerCommand,
    ) -> Result<(), OrchestratorError>;
}
