use std::collections::BTreeMap;
use std::sync::Arc;

use switchsync_api::{Device, Id};
use tokio::sync::RwLock;

use crate::errors::SessionError;
use crate::services::providers::DeviceInventory;

/// A device shared between the session, the scheduler and its listeners.
pub type SharedDevice = Arc<RwLock<Device>>;

/// Process-lifetime store of every known device, keyed by id.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<BTreeMap<Id, SharedDevice>>,
}

impl DeviceRegistry {
    pub fn load(devices: impl IntoIterator<Item = Device>) -> Self {
        let devices = devices
            .into_iter()
            .map(|device| (device.id, Arc::new(RwLock::new(device))))
            .collect();

        Self {
            devices: RwLock::new(devices),
        }
    }

    pub async fn get(&self, id: Id) -> Option<SharedDevice> {
        self.devices.read().await.get(&id).cloned()
    }

    pub async fn all(&self) -> Vec<SharedDevice> {
        self.devices.read().await.values().cloned().collect()
    }

    pub async fn snapshot(&self) -> Vec<Device> {
        let mut snapshot = Vec::new();
        for device in self.all().await {
            snapshot.push(device.read().await.clone());
        }
        snapshot
    }

    /// Pulls the current readings of one device from `inventory`.
    pub async fn refresh(
        &self,
        id: Id,
        inventory: &dyn DeviceInventory,
    ) -> Result<Device, SessionError> {
        let shared = self.get(id).await.ok_or(SessionError::DeviceNotFound(id))?;
        let fresh = inventory
            .devices()
            .await?
            .into_iter()
            .find(|device| device.id == id)
            .ok_or(SessionError::DeviceNotFound(id))?;

        let mut device = shared.write().await;
        device.refresh_from(&fresh);
        if inventory.reports_status() {
            device.status = fresh.status;
        }
        if !fresh.aid.is_empty() {
            device.aid = fresh.aid;
        }

        Ok(device.clone())
    }
}

#[cfg(test)]
mod tests {
    use switchsync_api::DeviceType;

    use super::*;
    use crate::services::providers::StaticInventory;

    #[tokio::test]
    async fn test_refresh_from_inventory() {
        let registry = DeviceRegistry::load([Device::new(2, DeviceType::Socket, "Heater")]);
        let mut fresh = Device::new(2, DeviceType::Socket, "Heater").with_aid("0815");
        fresh.connected = true;
        fresh.power = Some(850.0);
        let inventory = StaticInventory::new(vec![fresh]);

        let device = registry.refresh(2, &inventory).await.unwrap();

        assert!(device.connected);
        assert_eq!(device.aid, "0815");
        assert_eq!(device.power, Some(850.0));
        assert!(matches!(
            registry.refresh(9, &inventory).await,
            Err(SessionError::DeviceNotFound(9))
        ));
    }

    struct GatewayInventory(Vec<Device>);

    #[async_trait::async_trait]
    impl DeviceInventory for GatewayInventory {
        async fn devices(&self) -> Result<Vec<Device>, SessionError> {
            Ok(self.0.clone())
        }

        fn reports_status(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_refresh_keeps_status_unless_reported() {
        let registry = DeviceRegistry::load([Device::new(2, DeviceType::Socket, "Heater")]);
        registry.get(2).await.unwrap().write().await.status = Device::STATUS_ON;

        let unaware = StaticInventory::new(vec![Device::new(2, DeviceType::Socket, "Heater")]);
        assert!(registry.refresh(2, &unaware).await.unwrap().is_on());

        let gateway = GatewayInventory(vec![Device::new(2, DeviceType::Socket, "Heater")]);
        assert!(registry.refresh(2, &gateway).await.unwrap().is_off());
    }
}
