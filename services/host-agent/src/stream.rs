//! Command stream between the agent and the orchestrator.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use tracing::{info, warn};

use lighthouse_core::backoff::ExponentialBackoff;
use lighthouse_proto::host_agent::UpdateStatus;
use lighthouse_proto::host_agent::host_agent_service_client::HostAgentServiceClient;
use lighthouse_proto::host_agent::update_status::Stage;

use crate::domain::engine::ContainerEngine;
use crate::error::AgentError;
use crate::update::{StatusReporter, run_update};

/// Synthetic first frame announcing the agent: it carries the MAC address
/// that becomes the stream identity on the orchestrator side.
fn hello(mac_address: &str) -> UpdateStatus {
    UpdateStatus {
        container_uid: "init-container".to_owned(),
        mac_address: mac_address.to_owned(),
        image: "init-image".to_owned(),
        stage: Stage::Completed.into(),
        logs: "agent connected".to_owned(),
        timestamp: Utc::now().to_rfc3339(),
    }
}

/// Hold the command stream open for the life of the process, reconnecting
/// with exponential backoff on transient failures.
pub async fn run_command_stream<E: ContainerEngine>(
    engine: Arc<E>,
    client: HostAgentServiceClient<Channel>,
    mac_address: String,
    cancel: CancellationToken,
) {
    let mut backoff = ExponentialBackoff::reconnect();
    loop {
        match serve_stream(engine.as_ref(), client.clone(), &mac_address, &cancel).await {
            Ok(()) => backoff.reset(),
            Err(e) => warn!(error = %e, "command stream failed"),
        }
        if cancel.is_cancelled() {
            info!("command stream stopped");
            return;
        }
        let delay = backoff.next_delay();
        info!(delay_secs = delay.as_secs(), "reconnecting command stream");
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// One stream lifetime: connect, announce, then execute inbound commands
/// until EOF, error, or shutdown. Commands run sequentially per agent so
/// status transitions stay ordered.
async fn serve_stream<E: ContainerEngine>(
    engine: &E,
    mut client: HostAgentServiceClient<Channel>,
    mac_address: &str,
    cancel: &CancellationToken,
) -> Result<(), AgentError> {
    let (tx, rx) = mpsc::channel::<UpdateStatus>(16);
    tx.send(hello(mac_address))
        .await
        .map_err(|_| AgentError::Internal(anyhow::anyhow!("status channel closed")))?;

    let response = client
        .connect_agent_stream(ReceiverStream::new(rx))
        .await?;
    let mut inbound = response.into_inner();
    info!("connected to orchestrator command stream");

    let reporter = StatusReporter::new(tx, mac_address.to_owned());
    loop {
        tokio::select! {
            // On shutdown the reporter (and the hello sender) drop, which
            // closes the send half of the stream.
            _ = cancel.cancelled() => return Ok(()),
            msg = inbound.message() => match msg? {
                Some(cmd) => run_update(engine, &reporter, &cmd).await,
                None => {
                    info!("command stream closed by orchestrator");
                    return Ok(());
                }
            }
        }
    }
}
