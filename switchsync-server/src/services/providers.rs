use std::fs;
use std::thread;

use async_trait::async_trait;
use switchsync_api::{Control, Device, Image, Memory, Processor};

use crate::errors::SessionError;

/// Latest environment values; `None` means unavailable, never stale.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnvironmentReading {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
}

impl EnvironmentReading {
    pub fn new(temperature: Option<f32>, humidity: Option<f32>) -> Self {
        Self {
            temperature,
            humidity,
        }
    }
}

/// Source of the current device list with resolved actuator references.
#[async_trait]
pub trait DeviceInventory: Send + Sync {
    async fn devices(&self) -> Result<Vec<Device>, SessionError>;

    /// Whether `devices` carries the real switching status.
    fn reports_status(&self) -> bool {
        false
    }
}

pub trait TelemetryProvider: Send + Sync {
    fn snapshot(&self) -> Control;
}

pub trait EnvironmentSensor: Send + Sync {
    fn reading(&self) -> EnvironmentReading;
}

/// Physically switches a device.
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn switch(&self, device: &Device, on: bool) -> Result<(), SessionError>;
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn capture(&self, device: &Device) -> Result<Image, SessionError>;
}

/// Inventory backed by the `[[devices]]` configuration.
pub struct StaticInventory {
    devices: Vec<Device>,
}

impl StaticInventory {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }
}

#[async_trait]
impl DeviceInventory for StaticInventory {
    async fn devices(&self) -> Result<Vec<Device>, SessionError> {
        Ok(self.devices.clone())
    }
}

/// Reads host information from the operating system.
#[derive(Debug, Default)]
pub struct SystemTelemetry;

impl TelemetryProvider for SystemTelemetry {
    fn snapshot(&self) -> Control {
        let cores = thread::available_parallelism().map_or(1, |cores| cores.get() as u32);
        let work = fs::read_to_string("/proc/loadavg")
            .ok()
            .and_then(|content| parse_loadavg(&content))
            .map_or(0.0, |load| (load / cores as f32).clamp(0.0, 1.0));

        Control {
            info: Some(format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)),
            cpu: Some(vec![Processor {
                core: cores,
                work,
                temperature: read_thermal_zone().unwrap_or_default(),
            }]),
            memory: fs::read_to_string("/proc/meminfo")
                .ok()
                .and_then(|content| parse_meminfo(&content)),
        }
    }
}

fn parse_loadavg(content: &str) -> Option<f32> {
    content.split_whitespace().next()?.parse().ok()
}

fn read_thermal_zone() -> Option<f32> {
    let millis: f32 = fs::read_to_string("/sys/class/thermal/thermal_zone0/temp")
        .ok()?
        .trim()
        .parse()
        .ok()?;
    Some(millis / 1000.0)
}

/// Extracts used and free bytes from `/proc/meminfo`.
pub(crate) fn parse_meminfo(content: &str) -> Option<Memory> {
    let field = |name: &str| -> Option<u64> {
        content
            .lines()
            .find_map(|line| line.strip_prefix(name)?.strip_prefix(':'))?
            .split_whitespace()
            .next()?
            .parse::<u64>()
            .ok()
            .map(|kib| kib * 1024)
    };

    let total = field("MemTotal")?;
    let free = field("MemAvailable").or_else(|| field("MemFree"))?;

    Some(Memory {
        used: total.saturating_sub(free),
        free,
    })
}

/// Records switch requests without touching hardware.
#[derive(Debug, Default)]
pub struct LogActuator;

#[async_trait]
impl Actuator for LogActuator {
    async fn switch(&self, device: &Device, on: bool) -> Result<(), SessionError> {
        tracing::info!(
            device_id = device.id,
            aid = %device.aid,
            "Switching {} {}",
            device,
            if on { "on" } else { "off" }
        );
        Ok(())
    }
}
