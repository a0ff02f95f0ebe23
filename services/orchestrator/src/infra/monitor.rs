use anyhow::Context as _;
use tonic::transport::Channel;

use lighthouse_proto::registry_monitor::registry_monitor_service_client::RegistryMonitorServiceClient;
use lighthouse_proto::registry_monitor::{CheckUpdatesRequest, ImageInfo, ImageToUpdate};

use crate::domain::repository::UpdateCheckPort;
use crate::error::OrchestratorError;

/// gRPC client implementing `UpdateCheckPort` against the registry monitor.
/// Connects lazily so the orchestrator can start before the monitor does.
#[derive(Clone)]
pub struct GrpcMonitorClient {
    client: RegistryMonitorServiceClient<Channel>,
}

impl GrpcMonitorClient {
    pub fn lazy(url: &str) -> Result<Self, OrchestratorError> {
        let channel = Channel::from_shared(url.to_owned())
            .context("invalid registry monitor URL")?
            .connect_lazy();
        Ok(Self {
            client: RegistryMonitorServiceClient::new(channel),
        })
    }
}

impl UpdateCheckPort for GrpcMonitorClient {
    async fn check_updates(
        &self,
        images: Vec<ImageInfo>,
    ) -> Result<Vec<ImageToUpdate>, OrchestratorError> {
        let response = self
            .client
            .clone()
            .check_updates(CheckUpdatesRequest { images })
            .await
            .context("gRPC CheckUpdates")?;
        Ok(response.into_inner().images_to_update)
    }
}
