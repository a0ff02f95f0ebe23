//! Per-agent connection registry.
//!
//! One entry per connected agent, keyed by MAC address. Readers (scheduler
//! dispatch) take the shared lock; the stream lifecycle takes the exclusive
//! lock on insert and on the deferred removal when the read loop exits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use lighthouse_proto::host_agent::UpdateContainerCommand;

use crate::domain::repository::CommandSink;
use crate::error::OrchestratorError;

/// Bounded per-agent send queue: decouples dispatch latency from network
/// latency without letting a dead agent absorb unbounded commands.
pub const COMMAND_QUEUE_CAPACITY: usize = 10;

struct AgentConnection {
    commands: mpsc::Sender<UpdateContainerCommand>,
    done: CancellationToken,
    id: u64,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    agents: RwLock<HashMap<String, AgentConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly connected agent stream. A reconnect under the same
    /// MAC replaces the previous entry and signals its `done` token.
    ///
    /// Returns the connection id (for the paired [`Self::deregister`]), the
    /// command queue receiver to drain to the wire, and the done token.
    pub async fn register(
        &self,
        mac_address: &str,
    ) -> (
        u64,
        mpsc::Receiver<UpdateContainerCommand>,
        CancellationToken,
    ) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let done = CancellationToken::new();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut agents = self.agents.write().await;
        if let Some(previous) = agents.insert(
            mac_address.to_owned(),
            AgentConnection {
                commands: tx,
                done: done.clone(),
                id,
            },
        ) {
            info!(agent = mac_address, "replacing stale agent connection");
            previous.done.cancel();
        }
        (id, rx, done)
    }

    /// Remove the connection installed under `id`. A newer connection that
    /// already replaced it is left untouched, so the deferred cleanup of a
    /// dead stream cannot clobber a live reconnect.
    pub async fn deregister(&self, mac_address: &str, id: u64) {
        let mut agents = self.agents.write().await;
        if agents.get(mac_address).is_some_and(|conn| conn.id == id) {
            if let Some(conn) = agents.remove(mac_address) {
                conn.done.cancel();
            }
        }
    }

    /// Offer a command to the agent's send queue, racing the disconnect
    /// signal so a disconnecting agent does not trap the sender.
    pub async fn send_command(
        &self,
        mac_address: &str,
        cmd: UpdateContainerCommand,
    ) -> Result<(), OrchestratorError> {
        let (commands, done) = {
            let agents = self.agents.read().await;
            let Some(conn) = agents.get(mac_address) else {
                return Err(OrchestratorError::AgentNotConnected(mac_address.to_owned()));
            };
            (conn.commands.clone(), conn.done.clone())
        };

        tokio::select! {
            sent = commands.send(cmd) => {
                sent.map_err(|_| OrchestratorError::AgentNotConnected(mac_address.to_owned()))
            }
            _ = done.cancelled() => {
                Err(OrchestratorError::AgentNotConnected(mac_address.to_owned()))
            }
        }
    }

    pub async fn connected_count(&self) -> usize {
        self.agents.read().await.len()
    }
}

impl CommandSink for std::sync::Arc<ConnectionRegistry> {
    async fn dispatch(
        &self,
        mac_address: &str,
        cmd: UpdateContainerCommand,
    ) -> Result<(), OrchestratorError> {
        self.send_command(mac_address, cmd).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(uid: &str) -> UpdateContainerCommand {
        UpdateContainerCommand {
            container_uid: uid.to_owned(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn commands_arrive_in_dispatch_order() {
        let registry = ConnectionRegistry::new();
        let (_id, mut rx, _done) = registry.register("aa:bb").await;

        registry.send_command("aa:bb", command("c1")).await.unwrap();
        registry.send_command("aa:bb", command("c2")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().container_uid, "c1");
        assert_eq!(rx.recv().await.unwrap().container_uid, "c2");
    }

    #[tokio::test]
    async fn unknown_agent_is_rejected() {
        let registry = ConnectionRegistry::new();
        let err = registry
            .send_command("aa:bb", command("c1"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::AgentNotConnected(_)));
    }

    #[tokio::test]
    async fn deregister_drops_the_connection() {
        let registry = ConnectionRegistry::new();
        let (id, _rx, done) = registry.register("aa:bb").await;

        registry.deregister("aa:bb", id).await;
        assert!(done.is_cancelled());
        assert_eq!(registry.connected_count().await, 0);
        assert!(registry.send_command("aa:bb", command("c1")).await.is_err());
    }

    #[tokio::test]
    async fn stale_deregister_leaves_reconnect_untouched() {
        let registry = ConnectionRegistry::new();
        let (old_id, _old_rx, _old_done) = registry.register("aa:bb").await;
        let (_new_id, mut new_rx, new_done) = registry.register("aa:bb").await;

        // The dead stream's deferred cleanup fires after the reconnect.
        registry.deregister("aa:bb", old_id).await;

        assert!(!new_done.is_cancelled());
        registry.send_command("aa:bb", command("c1")).await.unwrap();
        assert_eq!(new_rx.recv().await.unwrap().container_uid, "c1");
    }

    #[tokio::test]
    async fn disconnecting_agent_does_not_trap_sender() {
        let registry = ConnectionRegistry::new();
        let (id, rx, _done) = registry.register("aa:bb").await;

        // Fill the queue with no reader draining it.
        for i in 0..COMMAND_QUEUE_CAPACITY {
            registry
                .send_command("aa:bb", command(&format!("c{i}")))
                .await
                .unwrap();
        }

        // A full queue plus a disconnect must fail the send, not hang it.
        let send = registry.send_command("aa:bb", command("overflow"));
        let disconnect = registry.deregister("aa:bb", id);
        let (sent, ()) = tokio::join!(send, disconnect);
        assert!(matches!(
            sent.unwrap_err(),
            OrchestratorError::AgentNotConnected(_)
        ));
        drop(rx);
    }
}
