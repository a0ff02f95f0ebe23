//! Docker implementation of the container engine.

use std::collections::HashMap;

use anyhow::Context as _;
use bollard::Docker;
use bollard::models::{ContainerCreateBody, ContainerStateStatusEnum, HostConfig, PortBinding};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, RemoveImageOptions, StartContainerOptions, StopContainerOptions,
};
use futures::TryStreamExt as _;
use tracing::{debug, warn};

use lighthouse_core::ports::PortSpec;

use crate::domain::engine::{
    ContainerDetails, ContainerEngine, ContainerRunState, ContainerSpec, ContainerSummary,
};
use crate::error::AgentError;

#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    pub fn connect() -> Result<Self, AgentError> {
        let docker =
            Docker::connect_with_local_defaults().context("connect to container engine")?;
        Ok(Self { docker })
    }

    /// Resolve the registry content digest for an image reference via its
    /// repo digests. Best effort: an unresolvable digest is reported empty
    /// and re-resolved by the registry monitor instead.
    async fn repo_digest(&self, image: &str) -> String {
        match self.docker.inspect_image(image).await {
            Ok(inspect) => inspect
                .repo_digests
                .unwrap_or_default()
                .first()
                .and_then(|d| d.split_once('@').map(|(_, digest)| digest.to_owned()))
                .unwrap_or_default(),
            Err(e) => {
                debug!(image, error = %e, "image digest unavailable");
                String::new()
            }
        }
    }
}

fn not_found(uid: &str, err: bollard::errors::Error) -> AgentError {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => AgentError::ContainerNotFound(uid.to_owned()),
        other => AgentError::Internal(anyhow::Error::new(other).context("inspect container")),
    }
}

fn run_state(status: Option<ContainerStateStatusEnum>) -> ContainerRunState {
    match status {
        Some(ContainerStateStatusEnum::RUNNING) => ContainerRunState::Running,
        Some(ContainerStateStatusEnum::PAUSED) => ContainerRunState::Paused,
        Some(ContainerStateStatusEnum::RESTARTING) => ContainerRunState::Restarting,
        Some(ContainerStateStatusEnum::EXITED) => ContainerRunState::Exited,
        Some(ContainerStateStatusEnum::DEAD) => ContainerRunState::Dead,
        _ => ContainerRunState::Stopped,
    }
}

/// Flatten the engine's port map (`"80/tcp" -> [bindings]`) into specs.
/// Sorted for stable heartbeat payloads.
fn collect_port_specs(ports: &HashMap<String, Option<Vec<PortBinding>>>) -> Vec<PortSpec> {
    let mut specs = Vec::new();
    for (container_port, bindings) in ports {
        let Some((port, protocol)) = container_port.split_once('/') else {
            continue;
        };
        let Ok(container_port) = port.parse::<u16>() else {
            continue;
        };
        for binding in bindings.as_deref().unwrap_or(&[]) {
            let host_port = binding
                .host_port
                .as_deref()
                .and_then(|p| p.parse::<u16>().ok());
            let Some(host_port) = host_port else {
                continue;
            };
            specs.push(PortSpec {
                host_ip: binding
                    .host_ip
                    .clone()
                    .filter(|ip| !ip.is_empty())
                    .unwrap_or_else(|| "0.0.0.0".to_owned()),
                host_port,
                container_port,
                protocol: protocol.to_owned(),
            });
        }
    }
    specs.sort_by(|a, b| {
        (a.container_port, a.host_port, &a.host_ip).cmp(&(b.container_port, b.host_port, &b.host_ip))
    });
    specs
}

impl ContainerEngine for DockerEngine {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, AgentError> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                ..Default::default()
            }))
            .await
            .context("list containers")?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerSummary {
                uid: c.id.unwrap_or_default(),
                name: c
                    .names
                    .as_ref()
                    .and_then(|names| names.first())
                    .map(|n| n.trim_start_matches('/').to_owned())
                    .unwrap_or_default(),
                image: c.image.unwrap_or_default(),
            })
            .collect())
    }

    async fn inspect_container(&self, uid: &str) -> Result<ContainerDetails, AgentError> {
        let inspect = self
            .docker
            .inspect_container(uid, None::<InspectContainerOptions>)
            .await
            .map_err(|e| not_found(uid, e))?;

        let config = inspect.config.unwrap_or_default();
        let host_config = inspect.host_config.unwrap_or_default();
        let image = config.image.unwrap_or_default();

        let mut exposed_ports: Vec<String> = config.exposed_ports.unwrap_or_default();
        exposed_ports.sort();

        let ports = inspect
            .network_settings
            .and_then(|settings| settings.ports)
            .map(|ports| collect_port_specs(&ports))
            .unwrap_or_default();

        let volumes = inspect
            .mounts
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.source)
            .collect();

        let digest = self.repo_digest(&image).await;

        Ok(ContainerDetails {
            uid: inspect.id.unwrap_or_else(|| uid.to_owned()),
            name: inspect
                .name
                .map(|n| n.trim_start_matches('/').to_owned())
                .unwrap_or_default(),
            image,
            digest,
            env: config.env.unwrap_or_default(),
            exposed_ports,
            ports,
            binds: host_config.binds.unwrap_or_default(),
            volumes,
            network_mode: host_config.network_mode,
            state: run_state(inspect.state.and_then(|s| s.status)),
        })
    }

    async fn pull_image(&self, image: &str) -> Result<(), AgentError> {
        let mut pull = self.docker.create_image(
            Some(CreateImageOptions {
                from_image: Some(image.to_owned()),
                ..Default::default()
            }),
            None,
            None,
        );
        while let Some(progress) = pull
            .try_next()
            .await
            .with_context(|| format!("pull image {image}"))?
        {
            if let Some(status) = progress.status {
                debug!(image, status, "pull progress");
            }
        }
        Ok(())
    }

    async fn stop_container(&self, uid: &str, timeout_secs: i32) -> Result<(), AgentError> {
        self.docker
            .stop_container(
                uid,
                Some(StopContainerOptions {
                    signal: None,
                    t: Some(timeout_secs),
                }),
            )
            .await
            .with_context(|| format!("stop container {uid}"))?;
        Ok(())
    }

    async fn remove_container(&self, uid: &str, force: bool) -> Result<(), AgentError> {
        self.docker
            .remove_container(
                uid,
                Some(RemoveContainerOptions {
                    force,
                    v: false,
                    link: false,
                }),
            )
            .await
            .with_context(|| format!("remove container {uid}"))?;
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, AgentError> {
        let exposed_ports: Vec<String> = spec.exposed_ports.clone();

        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        for binding in &spec.port_bindings {
            port_bindings
                .entry(format!("{}/{}", binding.container_port, binding.protocol))
                .or_insert_with(|| Some(Vec::new()))
                .get_or_insert_with(Vec::new)
                .push(PortBinding {
                    host_ip: Some(binding.host_ip.clone()),
                    host_port: Some(binding.host_port.to_string()),
                });
        }

        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
            host_config: Some(HostConfig {
                binds: (!spec.binds.is_empty()).then(|| spec.binds.clone()),
                port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
                network_mode: spec.network_mode.clone(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: Some(spec.name.clone()),
                    ..Default::default()
                }),
                body,
            )
            .await
            .with_context(|| format!("create container {}", spec.name))?;

        for warning in &created.warnings {
            warn!(container = %spec.name, warning, "container create warning");
        }
        Ok(created.id)
    }

    async fn start_container(&self, uid: &str) -> Result<(), AgentError> {
        self.docker
            .start_container(uid, None::<StartContainerOptions>)
            .await
            .with_context(|| format!("start container {uid}"))?;
        Ok(())
    }

    async fn remove_image(&self, image: &str) -> Result<(), AgentError> {
        self.docker
            .remove_image(image, None::<RemoveImageOptions>, None)
            .await
            .with_context(|| format!("remove image {image}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_specs_are_flattened_and_sorted() {
        let mut ports = HashMap::new();
        ports.insert(
            "80/tcp".to_owned(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_owned()),
                host_port: Some("8080".to_owned()),
            }]),
        );
        ports.insert(
            "53/udp".to_owned(),
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some("53".to_owned()),
            }]),
        );
        // Exposed but unbound: not a published port.
        ports.insert("9000/tcp".to_owned(), None);

        let specs = collect_port_specs(&ports);
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].to_string(), "0.0.0.0:53->53/udp");
        assert_eq!(specs[1].to_string(), "0.0.0.0:8080->80/tcp");
    }

    #[test]
    fn unknown_state_maps_to_stopped() {
        assert_eq!(run_state(None), ContainerRunState::Stopped);
        assert_eq!(
            run_state(Some(ContainerStateStatusEnum::CREATED)),
            ContainerRunState::Stopped
        );
    }
}
