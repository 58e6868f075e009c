use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::oneshot;
use tokio::time;

use crate::services::providers::{EnvironmentReading, EnvironmentSensor};

/// Payload served by the sensor endpoint.
#[derive(Debug, Deserialize)]
struct SensorPayload {
    #[serde(rename = "Temp")]
    temperature: Option<f32>,
    #[serde(rename = "Hum")]
    humidity: Option<f32>,
}

/// Holds the latest temperature and humidity, optionally polled from an HTTP sensor.
#[derive(Default)]
pub struct EnvironmentMonitor {
    reading: Arc<RwLock<EnvironmentReading>>,
    poller: Mutex<Option<oneshot::Sender<()>>>,
}

impl EnvironmentMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, reading: EnvironmentReading) {
        store(&self.reading, reading);
    }

    pub fn invalidate(&self) {
        store(&self.reading, EnvironmentReading::default());
    }

    /// Starts polling `url` every `period`, replacing any running poller.
    pub fn enable(&self, url: String, period: Duration) {
        self.disable();

        let http_client = reqwest::Client::builder()
            .timeout(period.min(Duration::from_secs(10)))
            .no_proxy()
            .build()
            .unwrap_or_default();
        let reading = self.reading.clone();
        let (stop_tx, mut stop_rx) = oneshot::channel();

        tokio::spawn(async move {
            tracing::info!("Polling environment sensor {} every {:?}", url, period);

            loop {
                match fetch(&http_client, &url).await {
                    Ok(payload) => {
                        let fresh = EnvironmentReading::new(payload.temperature, payload.humidity);
                        tracing::debug!("Environment reading {:?}", fresh);
                        store(&reading, fresh);
                    }
                    Err(e) => {
                        tracing::warn!("Environment sensor unavailable: {}", e);
                        store(&reading, EnvironmentReading::default());
                    }
                }

                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = time::sleep(period) => {}
                }
            }

            tracing::info!("Environment polling stopped");
        });

        *self.poller.lock().unwrap_or_else(PoisonError::into_inner) = Some(stop_tx);
    }

    /// Stops polling and forgets the last reading.
    pub fn disable(&self) {
        if let Some(stop_tx) = self.poller.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = stop_tx.send(());
            self.invalidate();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|stop_tx| !stop_tx.is_closed())
    }
}

impl EnvironmentSensor for EnvironmentMonitor {
    fn reading(&self) -> EnvironmentReading {
        *self.reading.read().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn fetch(http_client: &reqwest::Client, url: &str) -> Result<SensorPayload, reqwest::Error> {
    http_client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<SensorPayload>()
        .await
}

fn store(target: &RwLock<EnvironmentReading>, reading: EnvironmentReading) {
    *target.write().unwrap_or_else(PoisonError::into_inner) = reading;
}
