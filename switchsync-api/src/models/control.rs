use serde::{Deserialize, Serialize};

/// Telemetry snapshot of the control unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Control {
    /// Operating system description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    /// Per-processor load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Vec<Processor>>,
    /// Physical memory usage
    #[serde(rename = "mem", default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Memory>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Processor {
    /// Number of cores
    pub core: u32,
    /// Load between 0 and 1
    pub work: f32,
    /// Temperature in Celsius
    #[serde(rename = "temp")]
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    /// Used bytes
    pub used: u64,
    /// Free bytes
    pub free: u64,
}
