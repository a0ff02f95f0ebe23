//! In-memory repositories and ports for unit tests. They mirror the store
//! semantics the sea-orm implementations provide, in particular the
//! watch-preserving container upsert.

use std::sync::{Arc, Mutex};

use chrono::Utc;

use lighthouse_proto::host_agent::{ContainerInfo, UpdateContainerCommand};
use lighthouse_proto::registry_monitor::{ImageInfo, ImageToUpdate};

use crate::domain::repository::{
    CommandSink, ContainerRepository, HostRepository, UpdateCheckPort, UpdateStatusRepository,
};
use crate::domain::types::{ContainerRecord, HostRecord, NewContainer, NewUpdateStatus};
use crate::error::OrchestratorError;

pub fn report(uid: &str, name: &str, image: &str) -> ContainerInfo {
    ContainerInfo {
        container_uid: uid.to_owned(),
        name: name.to_owned(),
        image: image.to_owned(),
        digest: String::new(),
        ports: vec![],
        env_vars: vec![],
        volumes: vec![],
        network: String::new(),
        status: 0,
    }
}

// ── Hosts ────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemoryHostRepo {
    hosts: Arc<Mutex<Vec<HostRecord>>>,
}

impl HostRepository for MemoryHostRepo {
    async fn upsert(
        &self,
        mac_address: &str,
        hostname: &str,
        ip_address: &str,
    ) -> Result<HostRecord, OrchestratorError> {
        let mut hosts = self.hosts.lock().unwrap();
        if let Some(host) = hosts.iter_mut().find(|h| h.mac_address == mac_address) {
            host.hostname = hostname.to_owned();
            host.ip_address = ip_address.to_owned();
            return Ok(host.clone());
        }
        let record = HostRecord {
            id: hosts.len() as i64 + 1,
            mac_address: mac_address.to_owned(),
            hostname: hostname.to_owned(),
            ip_address: ip_address.to_owned(),
            last_heartbeat: None,
        };
        hosts.push(record.clone());
        Ok(record)
    }

    async fn touch_heartbeat(&self, host_id: i64) -> Result<(), OrchestratorError> {
        let mut hosts = self.hosts.lock().unwrap();
        if let Some(host) = hosts.iter_mut().find(|h| h.id == host_id) {
            host.last_heartbeat = Some(Utc::now());
        }
        Ok(())
    }

    async fn find_by_mac(
        &self,
        mac_address: &str,
    ) -> Result<Option<HostRecord>, OrchestratorError> {
        Ok(self
            .hosts
            .lock()
            .unwrap()
            .iter()
            .find(|h| h.mac_address == mac_address)
            .cloned())
    }

    async fn find_by_id(&self, host_id: i64) -> Result<Option<HostRecord>, OrchestratorError> {
        Ok(self
            .hosts
            .lock()
            .unwrap()
            .iter()
            .find(|h| h.id == host_id)
            .cloned())
    }

    async fn all(&self) -> Result<Vec<HostRecord>, OrchestratorError> {
        Ok(self.hosts.lock().unwrap().clone())
    }
}

// ── Containers ───────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemoryContainerRepo {
    containers: Arc<Mutex<Vec<ContainerRecord>>>,
    host_macs: Arc<Mutex<Vec<(i64, String)>>>,
}

impl MemoryContainerRepo {
    /// Teach the repo a host's MAC so `set_watch` can match on it.
    pub fn know_host(&self, host_id: i64, mac: &str) {
        self.host_macs.lock().unwrap().push((host_id, mac.to_owned()));
    }

    pub fn insert_watched(&self, record: ContainerRecord) {
        self.containers.lock().unwrap().push(record);
    }
}

impl ContainerRepository for MemoryContainerRepo {
    async fn upsert(&self, new: &NewContainer) -> Result<(), OrchestratorError> {
        let mut containers = self.containers.lock().unwrap();
        if let Some(existing) = containers
            .iter_mut()
            .find(|c| c.host_id == new.host_id && c.container_uid == new.container_uid)
        {
            existing.name = new.name.clone();
            existing.image = new.image.clone();
            existing.digest = new.digest.clone();
            existing.ports = new.ports.clone();
            existing.env_vars = new.env_vars.clone();
            existing.volumes = new.volumes.clone();
            existing.network = new.network.clone();
            // watch deliberately untouched
            return Ok(());
        }
        let new_id = containers.len() as i64 + 1;
        containers.push(ContainerRecord {
            id: new_id,
            host_id: new.host_id,
            container_uid: new.container_uid.clone(),
            name: new.name.clone(),
            image: new.image.clone(),
            digest: new.digest.clone(),
            ports: new.ports.clone(),
            env_vars: new.env_vars.clone(),
            volumes: new.volumes.clone(),
            network: new.network.clone(),
            watch: false,
        });
        Ok(())
    }

    async fn delete_stale(
        &self,
        host_id: i64,
        active_uids: &[String],
    ) -> Result<u64, OrchestratorError> {
        let mut containers = self.containers.lock().unwrap();
        let before = containers.len();
        containers.retain(|c| c.host_id != host_id || active_uids.contains(&c.container_uid));
        Ok((before - containers.len()) as u64)
    }

    async fn list_for_host(
        &self,
        host_id: i64,
    ) -> Result<Vec<ContainerRecord>, OrchestratorError> {
        Ok(self
            .containers
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.host_id == host_id)
            .cloned()
            .collect())
    }

    async fn list_watched(&self) -> Result<Vec<ContainerRecord>, OrchestratorError> {
        Ok(self
            .containers
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.watch)
            .cloned()
            .collect())
    }

    async fn find_by_uid(
        &self,
        container_uid: &str,
    ) -> Result<Option<ContainerRecord>, OrchestratorError> {
        Ok(self
            .containers
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.container_uid == container_uid)
            .cloned())
    }

    async fn set_watch(
        &self,
        name: &str,
        host_mac: &str,
        watch: bool,
    ) -> Result<bool, OrchestratorError> {
        let host_id = self
            .host_macs
            .lock()
            .unwrap()
            .iter()
            .find(|(_, mac)| mac == host_mac)
            .map(|(id, _)| *id)
            // Single-host tests usually skip know_host; default to host 1.
            .unwrap_or(1);
        let mut containers = self.containers.lock().unwrap();
        let mut matched = false;
        for container in containers
            .iter_mut()
            .filter(|c| c.host_id == host_id && c.name == name)
        {
            container.watch = watch;
            matched = true;
        }
        Ok(matched)
    }
}

// ── Update status ────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemoryStatusRepo {
    statuses: Arc<Mutex<Vec<NewUpdateStatus>>>,
}

impl MemoryStatusRepo {
    pub fn appended(&self) -> Vec<NewUpdateStatus> {
        self.statuses.lock().unwrap().clone()
    }
}

impl UpdateStatusRepository for MemoryStatusRepo {
    async fn append(&self, status: &NewUpdateStatus) -> Result<(), OrchestratorError> {
        self.statuses.lock().unwrap().push(status.clone());
        Ok(())
    }
}

// ── Collaborator ports ───────────────────────────────────────────────────────

/// Update check port returning a fixed response.
#[derive(Clone, Default)]
pub struct StaticMonitor {
    pub updates: Vec<ImageToUpdate>,
    pub fail: bool,
    pub requests: Arc<Mutex<Vec<Vec<ImageInfo>>>>,
}

impl UpdateCheckPort for StaticMonitor {
    async fn check_updates(
        &self,
        images: Vec<ImageInfo>,
    ) -> Result<Vec<ImageToUpdate>, OrchestratorError> {
        self.requests.lock().unwrap().push(images);
        if self.fail {
            return Err(OrchestratorError::Internal(anyhow::anyhow!(
                "monitor unreachable"
            )));
        }
        Ok(self.updates.clone())
    }
}

/// Command sink recording every dispatch; optionally scripted to refuse.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub refuse: bool,
    pub dispatched: Arc<Mutex<Vec<(String, UpdateContainerCommand)>>>,
}

impl RecordingSink {
    pub fn dispatched(&self) -> Vec<(String, UpdateContainerCommand)> {
        self.dispatched.lock().unwrap().clone()
    }
}

impl CommandSink for RecordingSink {
    async fn dispatch(
        &self,
        mac_address: &str,
        cmd: UpdateContainerCommand,
    ) -> Result<(), OrchestratorError> {
        if self.refuse {
            return Err(OrchestratorError::AgentNotConnected(mac_address.to_owned()));
        }
        self.dispatched
            .lock()
            .unwrap()
            .push((mac_address.to_owned(), cmd));
        Ok(())
    }
}
