use thiserror::Error;

/// The error type for OT sessions
#[allow(clippy::enum_variant_names)]
#[derive(Debug, Error)]
pub enum Error {
    #[error("channel disconnected")]
    ChannelDisconnected,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Bincode(#[from] bincode::Error),
    #[error("expected message of {expected} bytes, got {actual}")]
    UnexpectedLength { expected: usize, actual: usize },
    #[error("invalid group element")]
    InvalidPoint,
    #[error("decommitment does not match commitment")]
    InvalidDecommitment,
    #[error("peer sent an invalid row permutation")]
    InvalidPermutation,
    #[error("consistency check on the extension matrix failed")]
    ConsistencyCheckFailed,
    #[error("peer aborted the transfer")]
    PeerAborted,
    #[error("session is unusable after a failed consistency check")]
    SessionAborted,
}

/// [`Result`] type with OT [`enum@Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
