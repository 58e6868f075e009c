use std::sync::Arc;
use std::time::Duration;

use switchsync_api::Device;

use crate::configs::Settings;
use crate::errors::SessionError;
use crate::services::providers::{
    Actuator, DeviceInventory, ImageSource, LogActuator, StaticInventory, SystemTelemetry,
    TelemetryProvider,
};
use crate::services::scheduler::Clock;
use crate::services::{Controller, DeviceRegistry, EnvironmentMonitor, Scheduler};

/// External collaborators the controller talks to.
pub struct Providers {
    pub inventory: Arc<dyn DeviceInventory>,
    pub telemetry: Arc<dyn TelemetryProvider>,
    pub actuator: Arc<dyn Actuator>,
    pub images: Option<Arc<dyn ImageSource>>,
}

/// Everything one controller process owns, built once and shared by every session.
pub struct AppContext {
    pub registry: DeviceRegistry,
    pub scheduler: Scheduler,
    pub environment: Arc<EnvironmentMonitor>,
    pub controller: Arc<Controller>,
    pub inventory: Arc<dyn DeviceInventory>,
    pub telemetry: Arc<dyn TelemetryProvider>,
    pub actuator: Arc<dyn Actuator>,
    pub images: Option<Arc<dyn ImageSource>>,
}

impl AppContext {
    pub async fn create(settings: &Settings, clock: Arc<dyn Clock>) -> Result<Arc<Self>, SessionError> {
        let environment = Arc::new(EnvironmentMonitor::new());
        if let Some(url) = &settings.environment.url {
            environment.enable(url.clone(), settings.poll_period());
        }

        let providers = Providers {
            inventory: Arc::new(StaticInventory::new(
                settings.devices.iter().map(Device::from).collect(),
            )),
            telemetry: Arc::new(SystemTelemetry),
            actuator: Arc::new(LogActuator),
            images: None,
        };

        Self::from_providers(providers, clock, environment, settings.scan_period()).await
    }

    /// Loads the inventory and schedules every device that already carries cycles.
    pub async fn from_providers(
        providers: Providers,
        clock: Arc<dyn Clock>,
        environment: Arc<EnvironmentMonitor>,
        scan_period: Duration,
    ) -> Result<Arc<Self>, SessionError> {
        let registry = DeviceRegistry::load(providers.inventory.devices().await?);
        let scheduler = Scheduler::new(clock, environment.clone(), scan_period);
        let controller = Arc::new(Controller::new(providers.actuator.clone()));

        for device in registry.all().await {
            if device.read().await.has_cycles() {
                scheduler.register(controller.clone(), &device).await;
            }
        }

        let devices = registry.all().await.len();
        let scheduled = scheduler.registered_devices().await.len();
        tracing::info!(devices, scheduled, "Controller context ready");

        Ok(Arc::new(Self {
            registry,
            scheduler,
            environment,
            controller,
            inventory: providers.inventory,
            telemetry: providers.telemetry,
            actuator: providers.actuator,
            images: providers.images,
        }))
    }

    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        self.environment.disable();
        tracing::info!("Controller context shut down");
    }
}
