//! Agent-facing gRPC service: registration, heartbeats, and the
//! bidirectional command stream.

use std::pin::Pin;

use futures::Stream;
use futures::StreamExt as _;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{info, warn};

use lighthouse_proto::host_agent::host_agent_service_server::HostAgentService;
use lighthouse_proto::host_agent::{
    HeartbeatRequest, HeartbeatResponse, RegisterHostRequest, RegisterHostResponse,
    UpdateContainerCommand, UpdateStatus, update_status,
};

use crate::domain::repository::{HostRepository as _, UpdateStatusRepository as _};
use crate::domain::types::{NewUpdateStatus, UpdateStage};
use crate::error::OrchestratorError;
use crate::state::AppState;
use crate::usecase::fleet::{HeartbeatUseCase, RegisterHostUseCase};

#[derive(Clone)]
pub struct AgentGrpcServer {
    pub state: AppState,
}

#[tonic::async_trait]
impl HostAgentService for AgentGrpcServer {
    async fn register_host(
        &self,
        request: Request<RegisterHostRequest>,
    ) -> Result<Response<RegisterHostResponse>, Status> {
        let Some(host) = request.into_inner().host else {
            return Ok(Response::new(RegisterHostResponse {
                success: false,
                message: "invalid request: host is missing".to_owned(),
            }));
        };

        let usecase = RegisterHostUseCase {
            hosts: self.state.host_repo(),
            containers: self.state.container_repo(),
        };
        match usecase.execute(&host).await {
            Ok(record) => {
                self.state
                    .logs
                    .publish(format!("host {} ({}) registered", record.hostname, record.mac_address));
                Ok(Response::new(RegisterHostResponse {
                    success: true,
                    message: "host registered".to_owned(),
                }))
            }
            Err(e) => {
                warn!(error = %e, "host registration failed");
                Ok(Response::new(RegisterHostResponse {
                    success: false,
                    message: e.to_string(),
                }))
            }
        }
    }

    async fn heartbeat(
        &self,
        request: Request<HeartbeatRequest>,
    ) -> Result<Response<HeartbeatResponse>, Status> {
        let req = request.into_inner();
        let usecase = HeartbeatUseCase {
            hosts: self.state.host_repo(),
            containers: self.state.container_repo(),
        };
        match usecase.execute(&req).await {
            Ok(synced) => {
                self.state
                    .logs
                    .publish(format!("synced {synced} containers from {}", req.mac_address));
                Ok(Response::new(HeartbeatResponse {
                    success: true,
                    message: "heartbeat processed".to_owned(),
                }))
            }
            Err(e) => {
                warn!(mac = %req.mac_address, error = %e, "heartbeat failed");
                Ok(Response::new(HeartbeatResponse {
                    success: false,
                    message: e.to_string(),
                }))
            }
        }
    }

    type ConnectAgentStreamStream =
        Pin<Box<dyn Stream<Item = Result<UpdateContainerCommand, Status>> + Send>>;

    async fn connect_agent_stream(
        &self,
        request: Request<Streaming<UpdateStatus>>,
    ) -> Result<Response<Self::ConnectAgentStreamStream>, Status> {
        let mut inbound = request.into_inner();

        // The first frame is the agent's hello; it identifies the stream.
        let hello = inbound
            .message()
            .await?
            .ok_or_else(|| Status::invalid_argument("stream closed before hello"))?;
        let mac_address = hello.mac_address;
        if mac_address.is_empty() {
            return Err(Status::invalid_argument("empty agent id"));
        }

        let (conn_id, commands, _done) = self.state.registry.register(&mac_address).await;
        info!(agent = %mac_address, "agent stream connected");
        self.state
            .logs
            .publish(format!("agent stream connected: {mac_address}"));

        let state = self.state.clone();
        tokio::spawn(async move {
            loop {
                match inbound.message().await {
                    Ok(Some(status)) => {
                        if let Err(e) = persist_status(&state, &mac_address, &status).await {
                            warn!(agent = %mac_address, error = %e, "status persistence failed");
                        }
                    }
                    Ok(None) => {
                        info!(agent = %mac_address, "agent stream closed");
                        break;
                    }
                    Err(e) => {
                        warn!(agent = %mac_address, error = %e, "agent stream receive failed");
                        break;
                    }
                }
            }
            // Deferred cleanup: runs exactly once per stream, and never
            // clobbers a newer connection under the same MAC.
            state.registry.deregister(&mac_address, conn_id).await;
            state
                .logs
                .publish(format!("agent stream disconnected: {mac_address}"));
        });

        let outbound = ReceiverStream::new(commands).map(Ok::<_, Status>);
        Ok(Response::new(Box::pin(outbound)))
    }
}

async fn persist_status(
    state: &AppState,
    mac_address: &str,
    status: &UpdateStatus,
) -> Result<(), OrchestratorError> {
    let host = state
        .host_repo()
        .find_by_mac(mac_address)
        .await?
        .ok_or_else(|| OrchestratorError::HostNotFound(mac_address.to_owned()))?;

    state
        .update_status_repo()
        .append(&NewUpdateStatus {
            host_id: host.id,
            image: status.image.clone(),
            stage: stage_from_wire(status.stage()),
            logs: status.logs.trim().to_owned(),
        })
        .await?;

    state.logs.publish(format!(
        "{}: {} {:?}",
        mac_address,
        status.image,
        status.stage()
    ));
    Ok(())
}

fn stage_from_wire(stage: update_status::Stage) -> UpdateStage {
    match stage {
        update_status::Stage::Starting => UpdateStage::Starting,
        update_status::Stage::Pulling => UpdateStage::Pulling,
        update_status::Stage::Running => UpdateStage::Running,
        update_status::Stage::Rollback => UpdateStage::Rollback,
        update_status::Stage::Completed => UpdateStage::Completed,
        update_status::Stage::Failed | update_status::Stage::Unknown => UpdateStage::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_wire_stage_collapses_to_failed() {
        assert_eq!(
            stage_from_wire(update_status::Stage::Unknown),
            UpdateStage::Failed
        );
        assert_eq!(
            stage_from_wire(update_status::Stage::Rollback),
            UpdateStage::Rollback
        );
    }
}
