use std::sync::Arc;

use async_trait::async_trait;
use switchsync_api::{Device, DeviceType};

use crate::services::providers::Actuator;
use crate::services::registry::SharedDevice;
use crate::services::scheduler::{CycleListener, ListenerError};

/// Switches devices when their cycles start or stop.
///
/// Stays registered for the lifetime of the process, so schedules keep
/// running while no client is connected.
pub struct Controller {
    actuator: Arc<dyn Actuator>,
}

impl Controller {
    pub fn new(actuator: Arc<dyn Actuator>) -> Self {
        Self { actuator }
    }

    async fn apply(&self, device: &SharedDevice, on: bool) -> Result<(), ListenerError> {
        let mut device = device.write().await;

        let switched = match device.device_type {
            DeviceType::Socket => self.actuator.switch(&device, on).await,
            _ => Ok(()),
        };
        device.status = if on { Device::STATUS_ON } else { Device::STATUS_OFF };

        switched.map_err(Into::into)
    }
}

#[async_trait]
impl CycleListener for Controller {
    async fn on_cycle_start(&self, device: &SharedDevice) -> Result<(), ListenerError> {
        self.apply(device, true).await
    }

    async fn on_cycle_stop(&self, device: &SharedDevice) -> Result<(), ListenerError> {
        self.apply(device, false).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use switchsync_api::Id;
    use tokio::sync::RwLock;

    use super::*;
    use crate::errors::SessionError;

    #[derive(Default)]
    struct RecordingActuator {
        calls: Mutex<Vec<(Id, bool)>>,
        fail: bool,
    }

    #[async_trait]
    impl Actuator for RecordingActuator {
        async fn switch(&self, device: &Device, on: bool) -> Result<(), SessionError> {
            self.calls.lock().unwrap().push((device.id, on));
            if self.fail {
                return Err(SessionError::Provider("gateway offline".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_switches_sockets_only() {
        let actuator = Arc::new(RecordingActuator::default());
        let controller = Controller::new(actuator.clone());
        let socket = Arc::new(RwLock::new(Device::new(1, DeviceType::Socket, "Lamp")));
        let camera = Arc::new(RwLock::new(Device::new(2, DeviceType::Camera, "Door")));

        controller.on_cycle_start(&socket).await.unwrap();
        controller.on_cycle_start(&camera).await.unwrap();
        controller.on_cycle_stop(&socket).await.unwrap();

        assert_eq!(*actuator.calls.lock().unwrap(), vec![(1, true), (1, false)]);
        assert!(socket.read().await.is_off());
        assert!(camera.read().await.is_on());
    }

    #[tokio::test]
    async fn test_failed_switch_still_records_status() {
        let actuator = Arc::new(RecordingActuator {
            fail: true,
            ..Default::default()
        });
        let controller = Controller::new(actuator);
        let socket = Arc::new(RwLock::new(Device::new(1, DeviceType::Socket, "Lamp")));

        assert!(controller.on_cycle_start(&socket).await.is_err());
        assert!(socket.read().await.is_on());
    }
}
