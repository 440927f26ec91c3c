use relay_core::CabinKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CabinError {
    #[error("cabin already exists: {0}")]
    AlreadyExists(CabinKey),

    #[error("cabin not found: {0}")]
    NotFound(CabinKey),

    #[error("failed to register cabin with the shared socket hub: {0}")]
    SocketRegistration(#[from] relay_socket::SocketHubError),

    #[error("worker task did not shut down within the destroy timeout")]
    WorkerShutdownTimeout,
}

pub type Result<T> = std::result::Result<T, CabinError>;
