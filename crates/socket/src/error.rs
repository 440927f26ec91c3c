use thiserror::Error;

#[derive(Debug, Error)]
pub enum SocketHubError {
    #[error("failed to bind receive socket on {addr}: {source}")]
    BindReceive {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind send socket: {0}")]
    BindSend(#[source] std::io::Error),

    #[error("port allocation failed while registering cabin")]
    PortAllocation(#[from] relay_ports::PortError),

    #[error("cabin is already registered")]
    AlreadyRegistered,
}

pub type Result<T> = std::result::Result<T, SocketHubError>;
