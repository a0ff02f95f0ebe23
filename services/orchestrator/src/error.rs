/// Orchestrator error variants. Domain preconditions surface as
/// `success=false` responses or typed gRPC statuses; one host's failure
/// never affects another.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("host not found: {0}")]
    HostNotFound(String),
    #[error("container not found: {0}")]
    ContainerNotFound(String),
    #[error("agent {0} not connected")]
    AgentNotConnected(String),
    #[error("empty agent id")]
    EmptyMacAddress,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}
