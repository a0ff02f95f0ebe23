//! Registration and heartbeat reporting.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use tracing::{info, warn};

use lighthouse_proto::host_agent::host_agent_service_client::HostAgentServiceClient;
use lighthouse_proto::host_agent::{HeartbeatRequest, Host, RegisterHostRequest};

use crate::domain::engine::ContainerEngine;
use crate::error::AgentError;
use crate::identity::HostIdentity;
use crate::inventory::collect_inventory;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Register this host with the orchestrator, once, at process start.
/// Registration shares the heartbeat's inventory payload and additionally
/// carries the hostname and IP.
pub async fn register_host<E: ContainerEngine>(
    engine: &E,
    client: &mut HostAgentServiceClient<Channel>,
    identity: &HostIdentity,
) -> Result<(), AgentError> {
    let register = async {
        let containers = collect_inventory(engine).await?;
        let request = RegisterHostRequest {
            host: Some(Host {
                mac_address: identity.mac_address.clone(),
                hostname: identity.hostname.clone(),
                ip_address: identity.ip_address.clone(),
                containers,
            }),
        };
        let response = client.register_host(request).await?.into_inner();
        if !response.success {
            return Err(AgentError::Internal(anyhow::anyhow!(
                "orchestrator rejected registration: {}",
                response.message
            )));
        }
        Ok(())
    };

    match tokio::time::timeout(REGISTRATION_TIMEOUT, register).await {
        Ok(result) => result,
        Err(_) => Err(AgentError::RegistrationTimeout),
    }
}

/// Report the full container inventory every heartbeat interval until
/// shutdown. Send failures are logged and retried next tick.
pub async fn run_heartbeat_loop<E: ContainerEngine>(
    engine: std::sync::Arc<E>,
    mut client: HostAgentServiceClient<Channel>,
    mac_address: String,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("heartbeat loop stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        let containers = match collect_inventory(engine.as_ref()).await {
            Ok(containers) => containers,
            Err(e) => {
                warn!(error = %e, "inventory collection failed, skipping heartbeat");
                continue;
            }
        };
        let count = containers.len();
        let request = HeartbeatRequest {
            mac_address: mac_address.clone(),
            containers,
        };
        match client.heartbeat(request).await {
            Ok(response) => {
                let response = response.into_inner();
                if response.success {
                    info!(containers = count, "heartbeat acknowledged");
                } else {
                    warn!(message = %response.message, "heartbeat rejected");
                }
            }
            Err(e) => warn!(error = %e, "heartbeat send failed"),
        }
    }
}
