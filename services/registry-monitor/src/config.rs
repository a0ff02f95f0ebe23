use clap::Parser;

/// Registry monitor configuration. Flags override env vars.
#[derive(Debug, Parser)]
#[command(name = "registry-monitor", about = "Lighthouse registry monitor")]
pub struct MonitorConfig {
    /// Listen address for the gRPC server.
    #[arg(
        long,
        env = "LIGHTHOUSE_MONITOR_LISTEN",
        default_value = "0.0.0.0:50052"
    )]
    pub listen_address: String,
}
