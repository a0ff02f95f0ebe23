use clap::Parser;

/// Host agent configuration. The flag overrides the env var.
#[derive(Debug, Parser)]
#[command(name = "host-agent", about = "Lighthouse host agent")]
pub struct AgentConfig {
    /// Orchestrator gRPC endpoint, e.g. "http://orchestrator:50051".
    #[arg(
        short = 'o',
        long,
        env = "LIGHTHOUSE_ORCHESTRATOR_ADDR",
        default_value = "http://127.0.0.1:50051"
    )]
    pub orchestrator_address: String,
}
