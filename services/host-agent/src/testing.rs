//! Scripted in-memory container engine for unit tests.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::domain::engine::{
    ContainerDetails, ContainerEngine, ContainerRunState, ContainerSpec, ContainerSummary,
};
use crate::error::AgentError;

pub fn running_container(uid: &str, name: &str, image: &str) -> ContainerDetails {
    ContainerDetails {
        uid: uid.to_owned(),
        name: name.to_owned(),
        image: image.to_owned(),
        digest: String::new(),
        env: vec![],
        exposed_ports: vec![],
        ports: vec![],
        binds: vec![],
        volumes: vec![],
        network_mode: Some("bridge".to_owned()),
        state: ContainerRunState::Running,
    }
}

#[derive(Default)]
struct MockState {
    containers: Vec<ContainerDetails>,
    fail_inspect: HashSet<String>,
    fail_pull: bool,
    fail_stop: bool,
    fail_next_creates: usize,
    fail_next_starts: usize,
    pulled_images: Vec<String>,
    stopped: Vec<(String, i32)>,
    removed: Vec<(String, bool)>,
    created: Vec<ContainerSpec>,
    started: Vec<String>,
    removed_images: Vec<String>,
    create_counter: usize,
}

/// Engine whose state mutates like a real runtime (remove deletes, create
/// inserts) and whose failures are scripted per scenario.
#[derive(Default)]
pub struct MockEngine {
    state: Mutex<MockState>,
}

impl MockEngine {
    pub fn with_containers(containers: Vec<ContainerDetails>) -> Self {
        let engine = MockEngine::default();
        engine.state.lock().unwrap().containers = containers;
        engine
    }

    pub fn fail_inspect(&self, uid: &str) {
        self.state.lock().unwrap().fail_inspect.insert(uid.to_owned());
    }

    pub fn fail_pull(&self) {
        self.state.lock().unwrap().fail_pull = true;
    }

    pub fn fail_stop(&self) {
        self.state.lock().unwrap().fail_stop = true;
    }

    pub fn fail_next_creates(&self, n: usize) {
        self.state.lock().unwrap().fail_next_creates = n;
    }

    pub fn fail_next_starts(&self, n: usize) {
        self.state.lock().unwrap().fail_next_starts = n;
    }

    pub fn containers(&self) -> Vec<ContainerDetails> {
        self.state.lock().unwrap().containers.clone()
    }

    pub fn pulled_images(&self) -> Vec<String> {
        self.state.lock().unwrap().pulled_images.clone()
    }

    pub fn stopped(&self) -> Vec<(String, i32)> {
        self.state.lock().unwrap().stopped.clone()
    }

    pub fn removed(&self) -> Vec<(String, bool)> {
        self.state.lock().unwrap().removed.clone()
    }

    pub fn created(&self) -> Vec<ContainerSpec> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn removed_images(&self) -> Vec<String> {
        self.state.lock().unwrap().removed_images.clone()
    }
}

impl ContainerEngine for MockEngine {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, AgentError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .containers
            .iter()
            .map(|c| ContainerSummary {
                uid: c.uid.clone(),
                name: c.name.clone(),
                image: c.image.clone(),
            })
            .collect())
    }

    async fn inspect_container(&self, uid: &str) -> Result<ContainerDetails, AgentError> {
        let state = self.state.lock().unwrap();
        if state.fail_inspect.contains(uid) {
            return Err(AgentError::Internal(anyhow::anyhow!("inspect refused")));
        }
        state
            .containers
            .iter()
            .find(|c| c.uid == uid)
            .cloned()
            .ok_or_else(|| AgentError::ContainerNotFound(uid.to_owned()))
    }

    async fn pull_image(&self, image: &str) -> Result<(), AgentError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_pull {
            return Err(AgentError::Internal(anyhow::anyhow!("pull refused")));
        }
        state.pulled_images.push(image.to_owned());
        Ok(())
    }

    async fn stop_container(&self, uid: &str, timeout_secs: i32) -> Result<(), AgentError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_stop {
            return Err(AgentError::Internal(anyhow::anyhow!("stop refused")));
        }
        state.stopped.push((uid.to_owned(), timeout_secs));
        Ok(())
    }

    async fn remove_container(&self, uid: &str, force: bool) -> Result<(), AgentError> {
        let mut state = self.state.lock().unwrap();
        state.removed.push((uid.to_owned(), force));
        let before = state.containers.len();
        state.containers.retain(|c| c.uid != uid);
        if state.containers.len() == before {
            return Err(AgentError::ContainerNotFound(uid.to_owned()));
        }
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, AgentError> {
        let mut state = self.state.lock().unwrap();
        state.created.push(spec.clone());
        if state.fail_next_creates > 0 {
            state.fail_next_creates -= 1;
            return Err(AgentError::Internal(anyhow::anyhow!("create refused")));
        }
        state.create_counter += 1;
        let uid = format!("{}-{}", spec.name, state.create_counter);
        state.containers.push(ContainerDetails {
            uid: uid.clone(),
            name: spec.name.clone(),
            image: spec.image.clone(),
            digest: String::new(),
            env: spec.env.clone(),
            exposed_ports: spec.exposed_ports.clone(),
            ports: spec.port_bindings.clone(),
            binds: spec.binds.clone(),
            volumes: vec![],
            network_mode: spec.network_mode.clone(),
            state: ContainerRunState::Stopped,
        });
        Ok(uid)
    }

    async fn start_container(&self, uid: &str) -> Result<(), AgentError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_starts > 0 {
            state.fail_next_starts -= 1;
            return Err(AgentError::Internal(anyhow::anyhow!("start refused")));
        }
        state.started.push(uid.to_owned());
        if let Some(container) = state.containers.iter_mut().find(|c| c.uid == uid) {
            container.state = ContainerRunState::Running;
        }
        Ok(())
    }

    async fn remove_image(&self, image: &str) -> Result<(), AgentError> {
        self.state
            .lock()
            .unwrap()
            .removed_images
            .push(image.to_owned());
        Ok(())
    }
}
