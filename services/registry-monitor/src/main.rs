use std::sync::Arc;

use clap::Parser;
use tracing::info;

use lighthouse_core::shutdown::shutdown_signal;
use lighthouse_core::tracing::init_tracing;
use lighthouse_proto::registry_monitor::registry_monitor_service_server::RegistryMonitorServiceServer;

use lighthouse_registry_monitor::config::MonitorConfig;
use lighthouse_registry_monitor::grpc_server::MonitorGrpcServer;
use lighthouse_registry_monitor::hub::HubClient;
use lighthouse_registry_monitor::prober::Prober;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_tracing("registry-monitor");

    let config = MonitorConfig::parse();

    let hub = HubClient::new().expect("failed to build Docker Hub client");
    let server = MonitorGrpcServer {
        prober: Arc::new(Prober::new(hub)),
    };

    let addr = config
        .listen_address
        .parse()
        .expect("invalid listen address");
    let shutdown = shutdown_signal()?;

    info!("registry monitor listening on {addr}");
    tonic::transport::Server::builder()
        .add_service(RegistryMonitorServiceServer::new(server))
        .serve_with_shutdown(addr, shutdown)
        .await
        .expect("gRPC server error");

    info!("registry monitor stopped");
    Ok(())
}
