//! Dashboard-facing gRPC service: snapshot stream, log stream, and the
//! watch/period controls.

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use futures::StreamExt as _;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, warn};
use uuid::Uuid;

use lighthouse_proto::tui::tui_service_server::TuiService;
use lighthouse_proto::tui::{
    DataStreamReceived, DataStreamSend, LogLine, ServiceStatus, SetCronTimeRequest,
    SetCronTimeResponse, SetWatchlistRequest, SetWatchlistResponse, service_status,
};

use crate::domain::repository::ContainerRepository as _;
use crate::state::AppState;
use crate::usecase::snapshot::BuildSnapshotUseCase;

const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct TuiGrpcServer {
    pub state: AppState,
}

async fn build_snapshot(state: &AppState, reason: &str) -> DataStreamSend {
    let usecase = BuildSnapshotUseCase {
        hosts: state.host_repo(),
        containers: state.container_repo(),
    };
    let hosts = match usecase.execute().await {
        Ok(hosts) => {
            state.health.set_database(true);
            hosts
        }
        Err(e) => {
            state.health.set_database(false);
            warn!(error = %e, "snapshot build failed, sending empty host list");
            vec![]
        }
    };

    let (orchestrator, database, registry) = state.health.snapshot();
    let services_status = vec![
        ServiceStatus {
            component: service_status::Component::Orchestrator.into(),
            up: orchestrator,
        },
        ServiceStatus {
            component: service_status::Component::Database.into(),
            up: database,
        },
        ServiceStatus {
            component: service_status::Component::RegistryMonitor.into(),
            up: registry,
        },
    ];

    let logs = format!("snapshot reason={reason} hosts={}", hosts.len());
    DataStreamSend {
        hosts,
        services_status,
        cron_time_hours: state.scheduler.period_hours() as i32,
        logs,
    }
}

#[tonic::async_trait]
impl TuiService for TuiGrpcServer {
    type SendDatastreamStream =
        Pin<Box<dyn Stream<Item = Result<DataStreamSend, Status>> + Send>>;

    async fn send_datastream(
        &self,
        request: Request<Streaming<DataStreamReceived>>,
    ) -> Result<Response<Self::SendDatastreamStream>, Status> {
        let mut inbound = request.into_inner();
        let (tx, rx) = mpsc::channel::<Result<DataStreamSend, Status>>(8);
        let state = self.state.clone();
        let client_id = Uuid::new_v4();
        info!(client = %client_id, "dashboard stream connected");

        tokio::spawn(async move {
            // Acks arrive on their own small channel so a chatty client
            // cannot outpace the snapshot builder.
            let (ack_tx, mut ack_rx) = mpsc::channel::<()>(8);
            let reader = tokio::spawn(async move {
                while let Ok(Some(frame)) = inbound.message().await {
                    if !frame.ack.is_empty() {
                        let _ = ack_tx.try_send(());
                    }
                }
            });

            let snapshot = build_snapshot(&state, "initial").await;
            if tx.send(Ok(snapshot)).await.is_err() {
                reader.abort();
                return;
            }

            let mut ticker = tokio::time::interval(SNAPSHOT_INTERVAL);
            ticker.tick().await;
            loop {
                let reason = tokio::select! {
                    _ = ticker.tick() => "ticker",
                    ack = ack_rx.recv() => match ack {
                        Some(()) => "heartbeat",
                        None => break,
                    },
                };
                let snapshot = build_snapshot(&state, reason).await;
                if tx.send(Ok(snapshot)).await.is_err() {
                    // Client cannot receive: evict it, others are unaffected.
                    break;
                }
            }
            reader.abort();
            info!(client = %client_id, "dashboard stream closed");
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    type StreamLogsStream = Pin<Box<dyn Stream<Item = Result<LogLine, Status>> + Send>>;

    async fn stream_logs(
        &self,
        request: Request<Streaming<DataStreamReceived>>,
    ) -> Result<Response<Self::StreamLogsStream>, Status> {
        let mut inbound = request.into_inner();
        let lines = self.state.logs.subscribe();
        debug!("log stream subscriber attached");

        // Drain client keepalives; the stream ends when the client goes away
        // and the broadcaster then evicts the dead subscriber.
        tokio::spawn(async move { while let Ok(Some(_)) = inbound.message().await {} });

        Ok(Response::new(Box::pin(
            ReceiverStream::new(lines).map(Ok::<_, Status>),
        )))
    }

    async fn set_watch(
        &self,
        request: Request<SetWatchlistRequest>,
    ) -> Result<Response<SetWatchlistResponse>, Status> {
        let req = request.into_inner();
        info!(container = %req.container_name, host = %req.host_mac, watch = req.watch, "watch change requested");

        match self
            .state
            .container_repo()
            .set_watch(&req.container_name, &req.host_mac, req.watch)
            .await
        {
            Ok(true) => {
                self.state.logs.publish(format!(
                    "watch for {} on {} set to {}",
                    req.container_name, req.host_mac, req.watch
                ));
                Ok(Response::new(SetWatchlistResponse {
                    success: true,
                    message: format!("watch set to {}", req.watch),
                }))
            }
            Ok(false) => Ok(Response::new(SetWatchlistResponse {
                success: false,
                message: format!(
                    "no container named {} on host {}",
                    req.container_name, req.host_mac
                ),
            })),
            Err(e) => {
                warn!(error = %e, "watch update failed");
                Ok(Response::new(SetWatchlistResponse {
                    success: false,
                    message: e.to_string(),
                }))
            }
        }
    }

    async fn set_cron_time(
        &self,
        request: Request<SetCronTimeRequest>,
    ) -> Result<Response<SetCronTimeResponse>, Status> {
        let hours = request.into_inner().hours.max(0) as u32;
        let applied = self.state.scheduler.set_period_hours(hours);
        self.state
            .logs
            .publish(format!("update check period set to {applied}h"));
        Ok(Response::new(SetCronTimeResponse {
            success: true,
            message: format!("update check period set to {applied} hours"),
        }))
    }
}
