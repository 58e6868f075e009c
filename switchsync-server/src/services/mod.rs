pub mod controller;
pub mod environment;
pub mod providers;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod transport;

pub use controller::Controller;
pub use environment::EnvironmentMonitor;
pub use registry::{DeviceRegistry, SharedDevice};
pub use scheduler::Scheduler;
pub use session::{RemoteSession, SessionReporter, serve};
