use switchsync_api::Id;

use super::ConnectionError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Device {0} not found")]
    DeviceNotFound(Id),

    #[error("Device {0} does not support this command")]
    UnsupportedDevice(Id),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
