use crate::channel::ChannelError;
use crate::reader::DocumentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("identifier {0:?} is reserved")]
    ReservedIdentifier(String),
    #[error("security document unavailable: {0}")]
    DocumentUnavailable(#[from] DocumentError),
    #[error("command channel unavailable: {0}")]
    ChannelUnavailable(#[from] ChannelError),
}

pub type SyncResult<T> = Result<T, SyncError>;
