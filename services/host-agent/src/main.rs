use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use tracing::info;

use lighthouse_core::shutdown::shutdown_signal;
use lighthouse_core::tracing::init_tracing;
use lighthouse_proto::host_agent::host_agent_service_client::HostAgentServiceClient;

use lighthouse_host_agent::config::AgentConfig;
use lighthouse_host_agent::heartbeat::{register_host, run_heartbeat_loop};
use lighthouse_host_agent::identity;
use lighthouse_host_agent::infra::docker::DockerEngine;
use lighthouse_host_agent::stream::run_command_stream;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_tracing("host-agent");

    let config = AgentConfig::parse();

    let identity = identity::detect().expect("failed to detect host identity");
    info!(
        mac = %identity.mac_address,
        hostname = %identity.hostname,
        ip = %identity.ip_address,
        "host identity detected"
    );

    let engine = Arc::new(DockerEngine::connect().expect("failed to connect to container engine"));

    let channel = Channel::from_shared(config.orchestrator_address.clone())
        .expect("invalid orchestrator address")
        .connect_lazy();
    let mut client = HostAgentServiceClient::new(channel);

    register_host(engine.as_ref(), &mut client, &identity)
        .await
        .expect("host registration failed");
    info!("registered with orchestrator at {}", config.orchestrator_address);

    let shutdown = shutdown_signal()?;
    let cancel = CancellationToken::new();

    let heartbeat = tokio::spawn(run_heartbeat_loop(
        Arc::clone(&engine),
        client.clone(),
        identity.mac_address.clone(),
        cancel.child_token(),
    ));
    let stream = tokio::spawn(run_command_stream(
        engine,
        client,
        identity.mac_address.clone(),
        cancel.child_token(),
    ));

    shutdown.await;
    cancel.cancel();

    let _ = heartbeat.await;
    let _ = stream.await;
    info!("host agent stopped");
    Ok(())
}
