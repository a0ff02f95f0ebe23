use clap::Parser;

/// Orchestrator configuration. Flags override env vars.
#[derive(Debug, Parser)]
#[command(name = "orchestrator", about = "Lighthouse orchestrator")]
pub struct OrchestratorConfig {
    /// Listen address for the gRPC server.
    #[arg(long, env = "LIGHTHOUSE_LISTEN_ADDR", default_value = "0.0.0.0:50051")]
    pub listen_address: String,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Registry monitor gRPC endpoint.
    #[arg(
        long,
        env = "LIGHTHOUSE_MONITOR_ADDR",
        default_value = "http://127.0.0.1:50052"
    )]
    pub registry_monitor_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cfg = OrchestratorConfig::parse_from([
            "orchestrator",
            "--database-url",
            "postgres://localhost/lighthouse",
            "--listen-address",
            "0.0.0.0:6000",
        ]);
        assert_eq!(cfg.listen_address, "0.0.0.0:6000");
        assert_eq!(cfg.registry_monitor_address, "http://127.0.0.1:50052");
    }
}
