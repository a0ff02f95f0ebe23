/// Host agent error variants.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),
    #[error("no usable network interface")]
    NoMacAddress,
    #[error("registration deadline exceeded")]
    RegistrationTimeout,
    #[error("rpc failed: {0}")]
    Rpc(#[from] tonic::Status),
    #[error("transport error")]
    Transport(#[from] tonic::transport::Error),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}
