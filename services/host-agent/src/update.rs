//! Transactional container update state machine.
//!
//! ```text
//! INSPECT -> PULLING -> STARTING -> RUNNING(create) -> RUNNING(start) -> COMPLETED
//!     |         |           |            |                  |
//!     +---------+-----------+------------+------------------+--> ROLLBACK -> COMPLETED | FAILED
//! ```
//!
//! The original container's full configuration is snapshotted before any
//! mutation. Any failure at or past the stop step triggers the rollback
//! sequence: force-remove the half-created container if there is one,
//! recreate the original under its original name, start it.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use lighthouse_core::ports::PortSpec;
use lighthouse_proto::host_agent::update_status::Stage;
use lighthouse_proto::host_agent::{UpdateContainerCommand, UpdateStatus};

use crate::domain::engine::{ContainerEngine, ContainerSpec};
use crate::error::AgentError;

const STOP_TIMEOUT_SECS: i32 = 10;
const PRUNE_GRACE: Duration = Duration::from_secs(10);

/// Emits stage transitions onto the agent's command stream.
#[derive(Clone)]
pub struct StatusReporter {
    tx: mpsc::Sender<UpdateStatus>,
    mac_address: String,
}

impl StatusReporter {
    pub fn new(tx: mpsc::Sender<UpdateStatus>, mac_address: String) -> Self {
        Self { tx, mac_address }
    }

    pub async fn emit(&self, container_uid: &str, image: &str, stage: Stage, logs: String) {
        let status = UpdateStatus {
            container_uid: container_uid.to_owned(),
            mac_address: self.mac_address.clone(),
            image: image.to_owned(),
            stage: stage.into(),
            logs,
            timestamp: Utc::now().to_rfc3339(),
        };
        if self.tx.send(status).await.is_err() {
            warn!(container = container_uid, "status stream closed, update continues");
        }
    }
}

/// Run one update command to completion. Every exit path has emitted a
/// terminal COMPLETED or FAILED status.
pub async fn run_update<E: ContainerEngine>(
    engine: &E,
    reporter: &StatusReporter,
    cmd: &UpdateContainerCommand,
) {
    let uid = &cmd.container_uid;
    info!(container = %uid, image = %cmd.image, "update command received");

    // Snapshot before touching anything. Without a snapshot there is nothing
    // to restore, so a missing container fails immediately with no rollback.
    let snapshot: ContainerSpec = match engine.inspect_container(uid).await {
        Ok(details) => (&details).into(),
        Err(AgentError::ContainerNotFound(_)) => {
            reporter
                .emit(
                    uid,
                    &cmd.image,
                    Stage::Failed,
                    format!("container {uid} not found, nothing to update"),
                )
                .await;
            return;
        }
        Err(e) => {
            reporter
                .emit(uid, &cmd.image, Stage::Failed, format!("inspect failed: {e}"))
                .await;
            return;
        }
    };

    reporter
        .emit(uid, &cmd.image, Stage::Pulling, format!("pulling {}", cmd.image))
        .await;
    if let Err(e) = engine.pull_image(&cmd.image).await {
        // Nothing has been mutated yet: fail without rollback.
        reporter
            .emit(uid, &cmd.image, Stage::Failed, format!("image pull failed: {e}"))
            .await;
        return;
    }

    reporter
        .emit(
            uid,
            &cmd.image,
            Stage::Starting,
            format!("stopping {}", snapshot.name),
        )
        .await;
    if let Err(e) = engine.stop_container(uid, STOP_TIMEOUT_SECS).await {
        rollback(engine, reporter, cmd, &snapshot, None, &format!("stop failed: {e}")).await;
        return;
    }
    if let Err(e) = engine.remove_container(uid, false).await {
        rollback(engine, reporter, cmd, &snapshot, None, &format!("remove failed: {e}")).await;
        return;
    }

    reporter
        .emit(
            uid,
            &cmd.image,
            Stage::Running,
            format!("creating {} from {}", snapshot.name, cmd.image),
        )
        .await;
    let desired = apply_overrides(&snapshot, cmd);
    let new_uid = match engine.create_container(&desired).await {
        Ok(new_uid) => new_uid,
        Err(e) => {
            rollback(engine, reporter, cmd, &snapshot, None, &format!("create failed: {e}")).await;
            return;
        }
    };

    reporter
        .emit(uid, &cmd.image, Stage::Running, format!("starting {}", snapshot.name))
        .await;
    if let Err(e) = engine.start_container(&new_uid).await {
        rollback(
            engine,
            reporter,
            cmd,
            &snapshot,
            Some(&new_uid),
            &format!("start failed: {e}"),
        )
        .await;
        return;
    }

    reporter
        .emit(
            uid,
            &cmd.image,
            Stage::Completed,
            format!("{} updated to {}", snapshot.name, cmd.image),
        )
        .await;

    prune_old_image(engine, &snapshot.image, &cmd.image).await;
}

/// Compensating sequence restoring the pre-update container.
async fn rollback<E: ContainerEngine>(
    engine: &E,
    reporter: &StatusReporter,
    cmd: &UpdateContainerCommand,
    snapshot: &ContainerSpec,
    created_uid: Option<&str>,
    cause: &str,
) {
    let uid = &cmd.container_uid;
    warn!(container = %uid, cause, "update failed, rolling back");
    reporter
        .emit(uid, &cmd.image, Stage::Rollback, format!("update failed ({cause}), rolling back"))
        .await;

    if let Some(created) = created_uid {
        if let Err(e) = engine.remove_container(created, true).await {
            warn!(container = created, error = %e, "removing half-created container failed");
        }
    }

    let restored = match engine.create_container(snapshot).await {
        Ok(restored) => restored,
        Err(e) => {
            error!(container = %uid, error = %e, "rollback recreate failed");
            reporter
                .emit(uid, &cmd.image, Stage::Failed, format!("rollback failed: {e}"))
                .await;
            return;
        }
    };
    if let Err(e) = engine.start_container(&restored).await {
        error!(container = %uid, error = %e, "rollback start failed");
        reporter
            .emit(uid, &cmd.image, Stage::Failed, format!("rollback failed: {e}"))
            .await;
        return;
    }

    reporter
        .emit(
            uid,
            &cmd.image,
            Stage::Completed,
            format!("rollback successful, {} restored to {}", snapshot.name, snapshot.image),
        )
        .await;
}

/// Overrides replace the corresponding snapshot field wholesale; empty
/// override fields inherit. A port override rebuilds both the exposed set
/// and the binding map, skipping invalid entries.
fn apply_overrides(snapshot: &ContainerSpec, cmd: &UpdateContainerCommand) -> ContainerSpec {
    let mut spec = snapshot.clone();
    spec.image = cmd.image.clone();

    if !cmd.override_env_vars.is_empty() {
        spec.env = cmd.override_env_vars.clone();
    }
    if !cmd.override_volumes.is_empty() {
        // Binds replace the volume configuration entirely; a structured
        // mounts list would conflict with them.
        spec.binds = cmd.override_volumes.clone();
    }
    if !cmd.override_network.is_empty() {
        spec.network_mode = Some(cmd.override_network.clone());
    }
    if !cmd.override_ports.is_empty() {
        let mut exposed = Vec::new();
        let mut bindings = Vec::new();
        for mapping in &cmd.override_ports {
            let (Ok(host_port), Ok(container_port)) = (
                u16::try_from(mapping.host_port),
                u16::try_from(mapping.container_port),
            ) else {
                warn!(?mapping, "skipping invalid port override");
                continue;
            };
            if host_port == 0 || container_port == 0 || mapping.protocol.is_empty() {
                warn!(?mapping, "skipping invalid port override");
                continue;
            }
            exposed.push(format!("{}/{}", container_port, mapping.protocol));
            bindings.push(PortSpec {
                host_ip: mapping.host_ip.clone(),
                host_port,
                container_port,
                protocol: mapping.protocol.clone(),
            });
        }
        spec.exposed_ports = exposed;
        spec.port_bindings = bindings;
    }
    spec
}

/// Remove the replaced image once nothing references it. The grace delay
/// lets unrelated workflows that are mid-create against the old image settle
/// before the reference scan.
async fn prune_old_image<E: ContainerEngine>(engine: &E, old_image: &str, new_image: &str) {
    if old_image == new_image || old_image.is_empty() {
        return;
    }
    tokio::time::sleep(PRUNE_GRACE).await;

    match engine.list_containers().await {
        Ok(containers) => {
            if containers.iter().any(|c| c.image == old_image) {
                info!(image = old_image, "old image still referenced, keeping");
                return;
            }
            if let Err(e) = engine.remove_image(old_image).await {
                warn!(image = old_image, error = %e, "image prune failed");
            } else {
                info!(image = old_image, "pruned replaced image");
            }
        }
        Err(e) => warn!(error = %e, "image prune skipped: list failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockEngine, running_container};
    use lighthouse_proto::host_agent::PortMapping;

    fn command(uid: &str, image: &str) -> UpdateContainerCommand {
        UpdateContainerCommand {
            container_uid: uid.to_owned(),
            mac_address: "aa:bb:cc:dd:ee:01".to_owned(),
            image: image.to_owned(),
            override_env_vars: vec![],
            override_ports: vec![],
            override_volumes: vec![],
            override_network: String::new(),
        }
    }

    async fn run(engine: &MockEngine, cmd: &UpdateContainerCommand) -> Vec<(Stage, String)> {
        let (tx, mut rx) = mpsc::channel(64);
        let reporter = StatusReporter::new(tx, "aa:bb:cc:dd:ee:01".to_owned());
        run_update(engine, &reporter, cmd).await;
        let mut stages = Vec::new();
        while let Ok(status) = rx.try_recv() {
            stages.push((status.stage(), status.logs));
        }
        stages
    }

    fn stage_names(stages: &[(Stage, String)]) -> Vec<Stage> {
        stages.iter().map(|(stage, _)| *stage).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn happy_path_replaces_container_under_original_name() {
        let engine = MockEngine::with_containers(vec![running_container(
            "c1", "nginx", "nginx:1.25",
        )]);
        let stages = run(&engine, &command("c1", "nginx:latest")).await;

        assert_eq!(
            stage_names(&stages),
            vec![
                Stage::Pulling,
                Stage::Starting,
                Stage::Running,
                Stage::Running,
                Stage::Completed
            ]
        );
        assert_eq!(engine.pulled_images(), vec!["nginx:latest"]);
        assert_eq!(engine.stopped(), vec![("c1".to_owned(), 10)]);
        // Normal removal of the original is never forced.
        assert_eq!(engine.removed(), vec![("c1".to_owned(), false)]);

        let containers = engine.containers();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].name, "nginx");
        assert_eq!(containers[0].image, "nginx:latest");
        // Old image unreferenced after the grace delay: pruned.
        assert_eq!(engine.removed_images(), vec!["nginx:1.25"]);
    }

    #[tokio::test(start_paused = true)]
    async fn old_image_kept_while_still_referenced() {
        let engine = MockEngine::with_containers(vec![
            running_container("c1", "nginx", "nginx:1.25"),
            running_container("c2", "nginx-canary", "nginx:1.25"),
        ]);
        run(&engine, &command("c1", "nginx:latest")).await;
        assert!(engine.removed_images().is_empty());
    }

    #[tokio::test]
    async fn missing_container_fails_without_rollback() {
        let engine = MockEngine::default();
        let stages = run(&engine, &command("ghost", "nginx:latest")).await;

        assert_eq!(stage_names(&stages), vec![Stage::Failed]);
        assert!(engine.created().is_empty());
        assert!(engine.pulled_images().is_empty());
    }

    #[tokio::test]
    async fn pull_failure_fails_without_rollback() {
        let engine = MockEngine::with_containers(vec![running_container(
            "c1", "nginx", "nginx:1.25",
        )]);
        engine.fail_pull();
        let stages = run(&engine, &command("c1", "nginx:latest")).await;

        assert_eq!(stage_names(&stages), vec![Stage::Pulling, Stage::Failed]);
        // No mutation happened: the original container is untouched.
        assert_eq!(engine.containers()[0].uid, "c1");
        assert!(engine.removed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn create_failure_rolls_back_to_snapshot() {
        let mut original = running_container("c1", "nginx", "nginx:1.25");
        original.env = vec!["A=1".to_owned()];
        original.binds = vec!["/v:/v".to_owned()];
        let engine = MockEngine::with_containers(vec![original]);
        engine.fail_next_creates(1);

        let stages = run(&engine, &command("c1", "nginx:latest")).await;

        assert_eq!(
            stage_names(&stages),
            vec![
                Stage::Pulling,
                Stage::Starting,
                Stage::Running,
                Stage::Rollback,
                Stage::Completed
            ]
        );
        let (_, last_log) = stages.last().unwrap();
        assert!(last_log.contains("rollback successful"));

        // The restored container carries the snapshot config and image.
        let containers = engine.containers();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].name, "nginx");
        assert_eq!(containers[0].image, "nginx:1.25");
        assert_eq!(containers[0].env, vec!["A=1"]);
        assert_eq!(containers[0].binds, vec!["/v:/v"]);
        assert_eq!(engine.started(), vec![containers[0].uid.clone()]);
        // Rollback never prunes the old image.
        assert!(engine.removed_images().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn start_failure_force_removes_new_container_then_restores() {
        let engine = MockEngine::with_containers(vec![running_container(
            "c1", "nginx", "nginx:1.25",
        )]);
        engine.fail_next_starts(1);

        let stages = run(&engine, &command("c1", "nginx:latest")).await;

        assert_eq!(
            stage_names(&stages),
            vec![
                Stage::Pulling,
                Stage::Starting,
                Stage::Running,
                Stage::Running,
                Stage::Rollback,
                Stage::Completed
            ]
        );
        // Original removed gently, half-created replacement removed by force.
        let removed = engine.removed();
        assert_eq!(removed[0], ("c1".to_owned(), false));
        assert!(removed[1].1);

        let containers = engine.containers();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].image, "nginx:1.25");
    }

    #[tokio::test(start_paused = true)]
    async fn rollback_failure_is_terminal() {
        let engine = MockEngine::with_containers(vec![running_container(
            "c1", "nginx", "nginx:1.25",
        )]);
        // Both the update create and the rollback recreate fail.
        engine.fail_next_creates(2);

        let stages = run(&engine, &command("c1", "nginx:latest")).await;
        assert_eq!(*stage_names(&stages).last().unwrap(), Stage::Failed);
        let (_, last_log) = stages.last().unwrap();
        assert!(last_log.contains("rollback failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn overrides_replace_fields_wholesale() {
        let mut original = running_container("c1", "nginx", "nginx:1.25");
        original.env = vec!["OLD=1".to_owned()];
        original.exposed_ports = vec!["80/tcp".to_owned()];
        original.ports = vec!["0.0.0.0:8080->80/tcp".parse().unwrap()];
        let engine = MockEngine::with_containers(vec![original]);

        let mut cmd = command("c1", "nginx:latest");
        cmd.override_env_vars = vec!["A=1".to_owned()];
        cmd.override_volumes = vec!["/v".to_owned()];
        cmd.override_network = "host".to_owned();
        cmd.override_ports = vec![
            PortMapping {
                host_ip: "0.0.0.0".to_owned(),
                host_port: 9090,
                container_port: 90,
                protocol: "tcp".to_owned(),
            },
            // Invalid: port out of range, must be skipped.
            PortMapping {
                host_ip: "0.0.0.0".to_owned(),
                host_port: 700_000,
                container_port: 90,
                protocol: "tcp".to_owned(),
            },
        ];
        run(&engine, &cmd).await;

        let created = engine.created();
        assert_eq!(created.len(), 1);
        let spec = &created[0];
        assert_eq!(spec.env, vec!["A=1"]);
        assert_eq!(spec.binds, vec!["/v"]);
        assert_eq!(spec.network_mode.as_deref(), Some("host"));
        assert_eq!(spec.exposed_ports, vec!["90/tcp"]);
        assert_eq!(spec.port_bindings.len(), 1);
        assert_eq!(spec.port_bindings[0].to_string(), "0.0.0.0:9090->90/tcp");
    }

    #[tokio::test(start_paused = true)]
    async fn omitted_overrides_inherit_snapshot() {
        let mut original = running_container("c1", "nginx", "nginx:1.25");
        original.env = vec!["KEEP=1".to_owned()];
        original.exposed_ports = vec!["80/tcp".to_owned()];
        original.ports = vec!["0.0.0.0:8080->80/tcp".parse().unwrap()];
        original.binds = vec!["/data:/data".to_owned()];
        let engine = MockEngine::with_containers(vec![original]);

        run(&engine, &command("c1", "nginx:latest")).await;

        let spec = &engine.created()[0];
        assert_eq!(spec.env, vec!["KEEP=1"]);
        assert_eq!(spec.binds, vec!["/data:/data"]);
        assert_eq!(spec.network_mode.as_deref(), Some("bridge"));
        assert_eq!(spec.exposed_ports, vec!["80/tcp"]);
        assert_eq!(spec.image, "nginx:latest");
    }
}
