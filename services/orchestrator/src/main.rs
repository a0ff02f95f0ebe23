use std::sync::Arc;

use clap::Parser;
use sea_orm::Database;
use tokio_util::sync::CancellationToken;
use tracing::info;

use lighthouse_core::shutdown::shutdown_signal;
use lighthouse_core::tracing::init_tracing;
use lighthouse_proto::host_agent::host_agent_service_server::HostAgentServiceServer;
use lighthouse_proto::tui::tui_service_server::TuiServiceServer;

use lighthouse_orchestrator::config::OrchestratorConfig;
use lighthouse_orchestrator::grpc::agent::AgentGrpcServer;
use lighthouse_orchestrator::grpc::tui::TuiGrpcServer;
use lighthouse_orchestrator::health::ServiceHealth;
use lighthouse_orchestrator::infra::db::{DbContainerRepository, DbHostRepository};
use lighthouse_orchestrator::infra::monitor::GrpcMonitorClient;
use lighthouse_orchestrator::logstream::log_channel;
use lighthouse_orchestrator::registry::ConnectionRegistry;
use lighthouse_orchestrator::scheduler::Scheduler;
use lighthouse_orchestrator::state::AppState;
use lighthouse_orchestrator::usecase::dispatch::DispatchUpdatesUseCase;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_tracing("orchestrator");

    let config = OrchestratorConfig::parse();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let registry = Arc::new(ConnectionRegistry::new());
    let health = Arc::new(ServiceHealth::new());
    let (logs, broadcaster) = log_channel();

    let monitor = GrpcMonitorClient::lazy(&config.registry_monitor_address)
        .expect("invalid registry monitor address");

    let scheduler = Arc::new(Scheduler::new(DispatchUpdatesUseCase {
        hosts: DbHostRepository { db: db.clone() },
        containers: DbContainerRepository { db: db.clone() },
        monitor,
        sink: Arc::clone(&registry),
        logs: logs.clone(),
        health: Arc::clone(&health),
    }));
    scheduler.start();

    let state = AppState {
        db,
        registry,
        health,
        logs,
        scheduler: Arc::clone(&scheduler),
    };

    let cancel = CancellationToken::new();
    let log_task = tokio::spawn(broadcaster.run(cancel.child_token()));

    let addr = config
        .listen_address
        .parse()
        .expect("invalid listen address");
    let shutdown = shutdown_signal()?;
    info!("orchestrator listening on {addr}");
    state.logs.publish("orchestrator started");

    tonic::transport::Server::builder()
        .add_service(HostAgentServiceServer::new(AgentGrpcServer {
            state: state.clone(),
        }))
        .add_service(TuiServiceServer::new(TuiGrpcServer {
            state: state.clone(),
        }))
        .serve_with_shutdown(addr, shutdown)
        .await
        .expect("gRPC server error");

    scheduler.stop();
    cancel.cancel();
    let _ = log_task.await;
    info!("orchestrator stopped");
    Ok(())
}
