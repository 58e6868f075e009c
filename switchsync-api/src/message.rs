use serde::{Deserialize, Serialize};

use crate::CodecError;
use crate::models::{Control, Device, Image};
use crate::protocols::{JsonLineProtocol, Protocol, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    /// Request or delivery of device and control state
    Report,
    /// Apply the requested status and/or cycle list of a device
    Commit,
    /// Positive acknowledgment of a commit
    Success,
    /// Negative acknowledgment, also synthesized for unreadable frames
    Error,
    /// Graceful termination request
    Close,
}

/// Envelope exchanged between the control unit and its client, one per frame.
///
/// Absent sections mean "no update"; receivers never treat them as an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<Control>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<Device>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<Image>>,
}

impl Message {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            message: None,
            control: None,
            devices: None,
            images: None,
        }
    }

    pub fn report() -> Self {
        Self::new(Action::Report)
    }

    pub fn commit(device: Device) -> Self {
        Self::new(Action::Commit).with_device(device)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(Action::Success).with_message(text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Action::Error).with_message(text)
    }

    pub fn close() -> Self {
        Self::new(Action::Close)
    }

    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        self.message = Some(text.into());
        self
    }

    pub fn with_control(mut self, control: Control) -> Self {
        self.control = Some(control);
        self
    }

    pub fn with_devices(mut self, devices: Vec<Device>) -> Self {
        self.devices = Some(devices);
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.devices.get_or_insert_with(Vec::new).push(device);
        self
    }

    pub fn with_images(mut self, images: Vec<Image>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn first_device(&self) -> Option<&Device> {
        self.devices.as_ref().and_then(|devices| devices.first())
    }

    /// Serializes into one newline-terminated frame.
    pub fn encode_frame(&self) -> Result<String> {
        let bytes = JsonLineProtocol.serialize(self)?;
        String::from_utf8(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
    }

    /// Parses one frame; a trailing line terminator is accepted.
    pub fn decode_frame(frame: &str) -> Result<Self> {
        JsonLineProtocol.deserialize(frame.as_bytes())
    }
}
