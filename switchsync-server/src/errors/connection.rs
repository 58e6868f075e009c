use std::io;
use std::time::Duration;

use switchsync_api::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection was not established within {0:?}")]
    Timeout(Duration),

    #[error("Connection I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame codec error: {0}")]
    Codec(#[from] CodecError),
}
