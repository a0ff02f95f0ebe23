//! Container engine seam.
//!
//! Everything the agent does to the container runtime goes through
//! [`ContainerEngine`]; the production implementation wraps the Docker API,
//! and the update state machine's tests substitute a scripted engine.

#![allow(async_fn_in_trait)]

use lighthouse_core::ports::PortSpec;

use crate::error::AgentError;

/// Container run state as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRunState {
    Running,
    Stopped,
    Paused,
    Restarting,
    Exited,
    Dead,
}

/// One row of the engine's container listing.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub uid: String,
    pub name: String,
    pub image: String,
}

/// Full inspection result for one container.
#[derive(Debug, Clone)]
pub struct ContainerDetails {
    pub uid: String,
    /// Container name with the engine's leading `/` stripped.
    pub name: String,
    /// Image reference the container was created from (`repo[:tag]`).
    pub image: String,
    /// Registry content digest of the image; empty when unresolved.
    pub digest: String,
    pub env: Vec<String>,
    /// Container-side exposed ports (`80/tcp`), bound or not.
    pub exposed_ports: Vec<String>,
    /// Host-side port bindings.
    pub ports: Vec<PortSpec>,
    /// Host bind specifications (`/host/path:/container/path`).
    pub binds: Vec<String>,
    /// Mount source paths.
    pub volumes: Vec<String>,
    pub network_mode: Option<String>,
    pub state: ContainerRunState,
}

/// Everything needed to (re)create a container. Doubles as the rollback
/// snapshot: it is captured from [`ContainerDetails`] before any mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<String>,
    pub exposed_ports: Vec<String>,
    pub port_bindings: Vec<PortSpec>,
    pub binds: Vec<String>,
    pub network_mode: Option<String>,
}

impl From<&ContainerDetails> for ContainerSpec {
    fn from(details: &ContainerDetails) -> Self {
        ContainerSpec {
            name: details.name.clone(),
            image: details.image.clone(),
            env: details.env.clone(),
            exposed_ports: details.exposed_ports.clone(),
            port_bindings: details.ports.clone(),
            binds: details.binds.clone(),
            network_mode: details.network_mode.clone(),
        }
    }
}

/// Interface to the container runtime.
pub trait ContainerEngine: Send + Sync {
    /// List all containers, including stopped ones.
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, AgentError>;

    /// Inspect one container. Returns [`AgentError::ContainerNotFound`] when
    /// the uid does not resolve.
    async fn inspect_container(&self, uid: &str) -> Result<ContainerDetails, AgentError>;

    async fn pull_image(&self, image: &str) -> Result<(), AgentError>;

    async fn stop_container(&self, uid: &str, timeout_secs: i32) -> Result<(), AgentError>;

    /// Remove a container. `force` is reserved for cleaning up a
    /// half-created container during rollback.
    async fn remove_container(&self, uid: &str, force: bool) -> Result<(), AgentError>;

    /// Create a container and return its new uid.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, AgentError>;

    async fn start_container(&self, uid: &str) -> Result<(), AgentError>;

    async fn remove_image(&self, image: &str) -> Result<(), AgentError>;
}
