mod clock;
mod evaluation;

use std::collections::BTreeMap;
use std::error::Error;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use switchsync_api::Id;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time;

pub use clock::{Clock, FixedClock, LocalClock};
pub use evaluation::{Transition, evaluate};

use crate::services::providers::EnvironmentSensor;
use crate::services::registry::SharedDevice;

pub type ListenerError = Box<dyn Error + Send + Sync>;

/// Reacts to a device entering or leaving its cycles.
///
/// Listeners are called from the scan task, one device after another.
#[async_trait]
pub trait CycleListener: Send + Sync {
    async fn on_cycle_start(&self, device: &SharedDevice) -> Result<(), ListenerError>;

    async fn on_cycle_stop(&self, device: &SharedDevice) -> Result<(), ListenerError>;
}

struct Entry {
    device: SharedDevice,
    listeners: Vec<Arc<dyn CycleListener>>,
}

struct ScanTask {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    entries: BTreeMap<Id, Entry>,
    task: Option<ScanTask>,
    retired: Vec<JoinHandle<()>>,
}

impl Registry {
    fn stop_task(&mut self) {
        self.retired.retain(|handle| !handle.is_finished());

        if let Some(task) = self.task.take() {
            let _ = task.stop_tx.send(());
            self.retired.push(task.handle);
            tracing::debug!("Cycle scan stopping, no devices left");
        }
    }
}

struct Inner {
    clock: Arc<dyn Clock>,
    sensor: Arc<dyn EnvironmentSensor>,
    scan_period: Duration,
    registry: Mutex<Registry>,
}

/// Watches registered devices and tells their listeners when a cycle starts or stops.
///
/// The scan task runs only while at least one device is registered.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        clock: Arc<dyn Clock>,
        sensor: Arc<dyn EnvironmentSensor>,
        scan_period: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock,
                sensor,
                scan_period,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    pub fn scan_period(&self) -> Duration {
        self.inner.scan_period
    }

    /// Adds `listener` for `device`; returns `false` if it was already registered.
    pub async fn register(&self, listener: Arc<dyn CycleListener>, device: &SharedDevice) -> bool {
        let id = device.read().await.id;

        let mut registry = self.inner.registry.lock().await;
        let entry = registry.entries.entry(id).or_insert_with(|| Entry {
            device: device.clone(),
            listeners: Vec::new(),
        });

        let added = if entry.listeners.iter().any(|known| same_listener(known, &listener)) {
            false
        } else {
            entry.listeners.push(listener);
            true
        };

        if registry.task.is_none() {
            registry.task = Some(self.spawn_scan_task());
        }

        tracing::debug!(device_id = id, added, "Registered cycle listener");
        added
    }

    /// Removes `listener` from one device. The device is dropped with its last listener.
    pub async fn deregister(&self, listener: &Arc<dyn CycleListener>, device_id: Id) -> bool {
        let mut registry = self.inner.registry.lock().await;

        let Some(entry) = registry.entries.get_mut(&device_id) else {
            return false;
        };

        let before = entry.listeners.len();
        entry.listeners.retain(|known| !same_listener(known, listener));
        let removed = entry.listeners.len() != before;

        if entry.listeners.is_empty() {
            registry.entries.remove(&device_id);
        }
        if registry.entries.is_empty() {
            registry.stop_task();
        }

        tracing::debug!(device_id, removed, "Deregistered cycle listener");
        removed
    }

    /// Removes `listener` from every device and returns how many it was registered for.
    pub async fn deregister_all(&self, listener: &Arc<dyn CycleListener>) -> usize {
        let mut registry = self.inner.registry.lock().await;

        let mut removed = 0;
        registry.entries.retain(|_, entry| {
            let before = entry.listeners.len();
            entry.listeners.retain(|known| !same_listener(known, listener));
            removed += before - entry.listeners.len();
            !entry.listeners.is_empty()
        });

        if registry.entries.is_empty() {
            registry.stop_task();
        }

        tracing::debug!(removed, "Deregistered cycle listener everywhere");
        removed
    }

    pub async fn is_running(&self) -> bool {
        let registry = self.inner.registry.lock().await;
        registry
            .task
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    pub async fn is_registered(&self, device_id: Id) -> bool {
        self.inner.registry.lock().await.entries.contains_key(&device_id)
    }

    pub async fn registered_devices(&self) -> Vec<Id> {
        self.inner.registry.lock().await.entries.keys().copied().collect()
    }

    pub async fn listener_count(&self, device_id: Id) -> usize {
        self.inner
            .registry
            .lock()
            .await
            .entries
            .get(&device_id)
            .map_or(0, |entry| entry.listeners.len())
    }

    /// Evaluates every registered device once and returns the number of edges raised.
    pub async fn scan_once(&self) -> usize {
        let snapshot: Vec<(SharedDevice, Vec<Arc<dyn CycleListener>>)> = {
            let registry = self.inner.registry.lock().await;
            registry
                .entries
                .values()
                .map(|entry| (entry.device.clone(), entry.listeners.clone()))
                .collect()
        };

        let now = self.inner.clock.now();
        let reading = self.inner.sensor.reading();
        let mut edges = 0;

        for (device, listeners) in &snapshot {
            let (id, transition) = {
                let device = device.read().await;
                (device.id, evaluate(&device, now, reading))
            };

            if transition == Transition::Unchanged {
                continue;
            }

            edges += 1;
            tracing::info!(device_id = id, "Cycle {:?} at {}", transition, now);

            for listener in listeners {
                notify(listener.as_ref(), transition, device).await;
            }
        }

        tracing::trace!(devices = snapshot.len(), edges, "Cycle scan finished");
        edges
    }

    /// Stops the scan task, forgets every device and waits for the task to end.
    pub async fn shutdown(&self) {
        let retired = {
            let mut registry = self.inner.registry.lock().await;
            registry.entries.clear();
            registry.stop_task();
            std::mem::take(&mut registry.retired)
        };

        for handle in retired {
            if let Err(e) = handle.await {
                tracing::error!("Cycle scan task failed: {}", e);
            }
        }
    }

    fn spawn_scan_task(&self) -> ScanTask {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let inner = Arc::downgrade(&self.inner);
        let period = self.inner.scan_period;

        let handle = tokio::spawn(async move {
            tracing::debug!("Cycle scan started, period {:?}", period);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = time::sleep(period) => {}
                }

                let Some(inner) = inner.upgrade() else {
                    break;
                };
                Scheduler { inner }.scan_once().await;
            }

            tracing::debug!("Cycle scan stopped");
        });

        ScanTask { stop_tx, handle }
    }
}

async fn notify(listener: &dyn CycleListener, transition: Transition, device: &SharedDevice) {
    let call = async {
        match transition {
            Transition::Start => listener.on_cycle_start(device).await,
            Transition::Stop => listener.on_cycle_stop(device).await,
            Transition::Unchanged => Ok(()),
        }
    };

    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Cycle listener failed: {}", e),
        Err(_) => tracing::error!("Cycle listener panicked"),
    }
}

fn same_listener(left: &Arc<dyn CycleListener>, right: &Arc<dyn CycleListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(left), Arc::as_ptr(right))
}
