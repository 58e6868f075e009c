pub mod settings;

pub use settings::{DeviceEntry, Environment, Logger, Scheduler, Server, Settings};
