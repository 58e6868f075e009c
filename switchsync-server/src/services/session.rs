use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use switchsync_api::{Action, Cycle, Device, DeviceType, Message};
use tokio::sync::mpsc;
use tokio::time;
use uuid::Uuid;

use crate::app::AppContext;
use crate::errors::{ConnectionError, SessionError};
use crate::services::providers::TelemetryProvider;
use crate::services::registry::SharedDevice;
use crate::services::scheduler::{CycleListener, ListenerError};
use crate::services::transport::{Connection, ConnectionState, Connector, MessageObserver};

const REPORT_SUBMITTED: &str = "Report is submitted!";
const REPORT_FAILED: &str = "Report is not submitted!";
const COMMIT_SUCCEEDED: &str = "Process was successful!";
const COMMIT_FAILED: &str = "Process was not successful!";
const NO_DEVICE: &str = "No device found!";
const UNRECOGNIZED: &str = "Command was not recognized!";

const REBIND_DELAY: Duration = Duration::from_secs(1);

/// Answers the requests of one connected client.
pub struct RemoteSession {
    id: Uuid,
    context: Arc<AppContext>,
    reporter: OnceLock<Arc<SessionReporter>>,
}

impl RemoteSession {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self {
            id: Uuid::new_v4(),
            context,
            reporter: OnceLock::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Starts reporting state changes of every scheduled device to `connection`.
    pub async fn attach(&self, connection: &Connection) {
        let reporter = self.reporter_for(connection);
        let scheduler = &self.context.scheduler;

        for id in scheduler.registered_devices().await {
            if let Some(device) = self.context.registry.get(id).await {
                scheduler.register(reporter.clone(), &device).await;
            }
        }

        tracing::info!(session = %self.id, "Session attached to {}", connection.peer_addr());
    }

    /// Stops reporting; the controller keeps its registrations.
    pub async fn detach(&self) {
        if let Some(reporter) = self.reporter.get() {
            let reporter: Arc<dyn CycleListener> = reporter.clone();
            self.context.scheduler.deregister_all(&reporter).await;
        }

        tracing::info!(session = %self.id, "Session detached");
    }

    fn reporter_for(&self, connection: &Connection) -> Arc<dyn CycleListener> {
        self.reporter
            .get_or_init(|| {
                Arc::new(SessionReporter::new(
                    connection.clone(),
                    self.context.telemetry.clone(),
                ))
            })
            .clone()
    }

    async fn handle_report(&self, request: &Message) -> Message {
        let Some(requested) = request.first_device() else {
            return Message::report()
                .with_message(REPORT_SUBMITTED)
                .with_devices(self.context.registry.snapshot().await);
        };

        match self
            .context
            .registry
            .refresh(requested.id, self.context.inventory.as_ref())
            .await
        {
            Ok(device) => Message::report()
                .with_message(REPORT_SUBMITTED)
                .with_device(device),
            Err(e) => {
                tracing::warn!(session = %self.id, "Report failed: {}", e);
                Message::error(REPORT_FAILED)
            }
        }
    }

    async fn handle_commit(&self, connection: &Connection, request: &Message) -> Message {
        let Some(requested) = request.first_device() else {
            return Message::error(NO_DEVICE);
        };

        match self.commit(connection, requested).await {
            Ok(reply) => reply,
            Err(SessionError::DeviceNotFound(_) | SessionError::UnsupportedDevice(_)) => {
                Message::error(NO_DEVICE)
            }
            Err(e) => {
                tracing::warn!(session = %self.id, "Commit failed: {}", e);
                Message::error(COMMIT_FAILED)
            }
        }
    }

    async fn commit(&self, connection: &Connection, requested: &Device) -> Result<Message, SessionError> {
        let shared = self
            .context
            .registry
            .get(requested.id)
            .await
            .ok_or(SessionError::DeviceNotFound(requested.id))?;

        // The registry knows the real type, the wire copy may be stale
        let device_type = shared.read().await.device_type;

        match device_type {
            DeviceType::Socket => {
                self.switch_socket(&shared, requested).await?;
                if let Some(cycles) = &requested.cycles {
                    self.replace_cycles(connection, &shared, cycles.clone()).await;
                }
                Ok(Message::success(COMMIT_SUCCEEDED))
            }
            DeviceType::Camera => {
                let images = self.context.images.as_ref().ok_or_else(|| {
                    SessionError::Provider("no image source configured".to_string())
                })?;
                let device = shared.read().await.clone();
                let image = images.capture(&device).await?;

                Ok(Message::success(COMMIT_SUCCEEDED)
                    .with_images(vec![image])
                    .with_device(device))
            }
            DeviceType::Raspberry => Err(SessionError::UnsupportedDevice(requested.id)),
        }
    }

    async fn switch_socket(&self, shared: &SharedDevice, requested: &Device) -> Result<(), SessionError> {
        if !(requested.is_on() || requested.is_off()) {
            return Ok(());
        }

        let mut device = shared.write().await;
        self.context.actuator.switch(&device, requested.is_on()).await?;
        device.status = requested.status;
        Ok(())
    }

    /// Replaces the cycles of a device and re-registers it; an empty list unschedules it.
    async fn replace_cycles(&self, connection: &Connection, shared: &SharedDevice, cycles: Vec<Cycle>) {
        let scheduled = !cycles.is_empty();
        let id = {
            let mut device = shared.write().await;
            device.cycles = Some(cycles);
            device.id
        };

        let scheduler = &self.context.scheduler;
        let controller: Arc<dyn CycleListener> = self.context.controller.clone();
        let reporter = self.reporter_for(connection);

        scheduler.deregister(&controller, id).await;
        scheduler.deregister(&reporter, id).await;

        if scheduled {
            scheduler.register(controller, shared).await;
            scheduler.register(reporter, shared).await;
        }

        tracing::info!(session = %self.id, device_id = id, scheduled, "Cycles replaced");
    }
}

#[async_trait]
impl MessageObserver for RemoteSession {
    async fn on_message(&self, connection: &Connection, message: Message) {
        let reply = match message.action {
            Action::Report => self.handle_report(&message).await,
            Action::Commit => self.handle_commit(connection, &message).await,
            Action::Close => {
                tracing::info!(session = %self.id, "Peer requested close");
                connection.close().await;
                return;
            }
            Action::Success | Action::Error => {
                if let Some(text) = &message.message {
                    tracing::debug!(session = %self.id, "Peer sent {:?}: {}", message.action, text);
                }
                Message::error(UNRECOGNIZED)
            }
        };

        let reply = reply.with_control(self.context.telemetry.snapshot());
        if let Err(e) = connection.send(&reply).await {
            tracing::warn!(session = %self.id, "Failed to reply: {}", e);
        }
    }
}

/// Pushes an unsolicited `REPORT` to the client after every start or stop.
pub struct SessionReporter {
    connection: Connection,
    telemetry: Arc<dyn TelemetryProvider>,
}

impl SessionReporter {
    pub fn new(connection: Connection, telemetry: Arc<dyn TelemetryProvider>) -> Self {
        Self {
            connection,
            telemetry,
        }
    }

    async fn report(&self, device: &SharedDevice) -> Result<(), ListenerError> {
        let device = device.read().await.clone();
        let id = device.id;
        let message = Message::report()
            .with_device(device)
            .with_control(self.telemetry.snapshot());

        if !self.connection.send(&message).await? {
            tracing::debug!(device_id = id, "Session closed, state report dropped");
        }
        Ok(())
    }
}

#[async_trait]
impl CycleListener for SessionReporter {
    async fn on_cycle_start(&self, device: &SharedDevice) -> Result<(), ListenerError> {
        self.report(device).await
    }

    async fn on_cycle_stop(&self, device: &SharedDevice) -> Result<(), ListenerError> {
        self.report(device).await
    }
}

/// Accepts one client at a time on `addr`, forever.
pub async fn serve(context: Arc<AppContext>, addr: SocketAddr, accept_timeout: Duration) {
    loop {
        let (state_tx, mut state_rx) = mpsc::unbounded_channel();
        let session = Arc::new(RemoteSession::new(context.clone()));

        let established = Connector::new()
            .with_callback(Arc::new(state_tx))
            .with_observer(session.clone())
            .connect_as_acceptor(addr, accept_timeout)
            .await;

        match established {
            Ok(connection) => {
                session.attach(&connection).await;

                while let Some(state) = state_rx.recv().await {
                    if state == ConnectionState::Closed {
                        break;
                    }
                }

                session.detach().await;
            }
            Err(ConnectionError::Timeout(_)) => {
                tracing::debug!("No client within {:?}, accepting again", accept_timeout);
            }
            Err(e) => {
                tracing::error!("Failed to accept a client on {}: {}", addr, e);
                time::sleep(REBIND_DELAY).await;
            }
        }
    }
}
