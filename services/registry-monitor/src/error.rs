/// Registry monitor error variants. Probe failures are always scoped to a
/// single image and never fail a whole batch.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("auth request for {repository} returned status {status}")]
    AuthRejected { repository: String, status: u16 },
    #[error("manifest request for {repository}:{tag} returned status {status}")]
    ManifestRejected {
        repository: String,
        tag: String,
        status: u16,
    },
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}
