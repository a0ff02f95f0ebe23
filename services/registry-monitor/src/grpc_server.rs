use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::info;

use lighthouse_proto::registry_monitor::registry_monitor_service_server::RegistryMonitorService;
use lighthouse_proto::registry_monitor::{CheckUpdatesRequest, CheckUpdatesResponse};

use crate::hub::DigestSource;
use crate::prober::Prober;

pub struct MonitorGrpcServer<S> {
    pub prober: Arc<Prober<S>>,
}

impl<S> Clone for MonitorGrpcServer<S> {
    fn clone(&self) -> Self {
        Self {
            prober: Arc::clone(&self.prober),
        }
    }
}

#[tonic::async_trait]
impl<S: DigestSource + 'static> RegistryMonitorService for MonitorGrpcServer<S> {
    async fn check_updates(
        &self,
        request: Request<CheckUpdatesRequest>,
    ) -> Result<Response<CheckUpdatesResponse>, Status> {
        let images = request.into_inner().images;
        info!(batch = images.len(), "checking for updates");

        let images_to_update = self.prober.check_updates(images).await;
        info!(updates = images_to_update.len(), "update check finished");

        Ok(Response::new(CheckUpdatesResponse { images_to_update }))
    }
}
