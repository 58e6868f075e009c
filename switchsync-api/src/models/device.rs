use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Cycle, Id};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceType {
    /// The control unit itself
    #[default]
    Raspberry,
    /// Switchable power socket
    Socket,
    /// Network camera
    Camera,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Stable device identifier
    pub id: Id,
    /// Actuator reference resolved by the device inventory, never sent on the wire
    #[serde(skip)]
    pub aid: String,
    /// Device category
    #[serde(rename = "type", default)]
    pub device_type: DeviceType,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Whether the device is currently reachable
    #[serde(default)]
    pub connected: bool,
    /// 0 = off, 1 = on, other positive values for multi-state devices
    #[serde(default)]
    pub status: i32,
    /// Temperature reading in Celsius
    #[serde(rename = "temp", default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Current power draw
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f32>,
    /// Accumulated energy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f32>,
    /// Configured cycles, `None` when the sender did not include any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycles: Option<Vec<Cycle>>,
}

impl Device {
    pub const STATUS_OFF: i32 = 0;
    pub const STATUS_ON: i32 = 1;

    pub fn new(id: Id, device_type: DeviceType, name: impl Into<String>) -> Self {
        Self {
            id,
            device_type,
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_aid(mut self, aid: impl Into<String>) -> Self {
        self.aid = aid.into();
        self
    }

    pub fn with_status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    pub fn with_cycles(mut self, cycles: Vec<Cycle>) -> Self {
        self.cycles = Some(cycles);
        self
    }

    pub fn is_off(&self) -> bool {
        self.status == Self::STATUS_OFF
    }

    pub fn is_on(&self) -> bool {
        self.status == Self::STATUS_ON
    }

    pub fn has_cycles(&self) -> bool {
        self.cycles.as_ref().is_some_and(|cycles| !cycles.is_empty())
    }

    /// Copies connectivity and telemetry of `other`.
    ///
    /// Identity, cycles and the switching status stay as recorded.
    pub fn refresh_from(&mut self, other: &Device) {
        self.connected = other.connected;
        self.temperature = other.temperature;
        self.power = other.power;
        self.energy = other.energy;
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
