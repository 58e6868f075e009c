use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use switchsync_api::{Cycle, CycleType, Device, DeviceType, Id, Image, ImageFormat, Message};
use switchsync_server::app::{AppContext, Providers};
use switchsync_server::errors::SessionError;
use switchsync_server::services::providers::{
    Actuator, ImageSource, StaticInventory, SystemTelemetry,
};
use switchsync_server::services::scheduler::{CycleListener, FixedClock, ListenerError};
use switchsync_server::services::transport::{Connection, ConnectionState, Connector};
use switchsync_server::services::{EnvironmentMonitor, RemoteSession, SharedDevice};
use ::time::{Date, Month, PrimitiveDateTime, Time};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::time;

pub const WAIT: Duration = Duration::from_secs(5);

/// 2024-06-03 is a Monday.
pub fn monday(hour: u8, minute: u8, second: u8) -> PrimitiveDateTime {
    PrimitiveDateTime::new(
        Date::from_calendar_date(2024, Month::June, 3).unwrap(),
        Time::from_hms(hour, minute, second).unwrap(),
    )
}

pub fn time_cycle(start: &str, stop: &str) -> Cycle {
    let mut cycle = Cycle::new("Morning", CycleType::Time);
    cycle.set_start_time(start).unwrap();
    cycle.set_stop_time(stop).unwrap();
    cycle
}

pub fn sample_devices() -> Vec<Device> {
    vec![
        Device::new(1, DeviceType::Raspberry, "Control Unit"),
        Device::new(2, DeviceType::Socket, "Lamp").with_aid("11630 0123456"),
        Device::new(3, DeviceType::Camera, "Door"),
    ]
}

pub fn shared(device: Device) -> SharedDevice {
    Arc::new(tokio::sync::RwLock::new(device))
}

/// Counts edges and updates the device status the way the controller does.
#[derive(Default)]
pub struct RecordingListener {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl RecordingListener {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CycleListener for RecordingListener {
    async fn on_cycle_start(&self, device: &SharedDevice) -> Result<(), ListenerError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        device.write().await.status = Device::STATUS_ON;
        Ok(())
    }

    async fn on_cycle_stop(&self, device: &SharedDevice) -> Result<(), ListenerError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        device.write().await.status = Device::STATUS_OFF;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingActuator {
    calls: Mutex<Vec<(Id, bool)>>,
}

impl RecordingActuator {
    pub fn calls(&self) -> Vec<(Id, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Actuator for RecordingActuator {
    async fn switch(&self, device: &Device, on: bool) -> Result<(), SessionError> {
        self.calls.lock().unwrap().push((device.id, on));
        Ok(())
    }
}

pub struct StubImageSource;

#[async_trait]
impl ImageSource for StubImageSource {
    async fn capture(&self, _device: &Device) -> Result<Image, SessionError> {
        Ok(Image::encode(ImageFormat::Jpg, &[0xFF, 0xD8, 0xFF, 0xE0]))
    }
}

pub struct MockApp {
    pub context: Arc<AppContext>,
    pub clock: Arc<FixedClock>,
    pub environment: Arc<EnvironmentMonitor>,
    pub actuator: Arc<RecordingActuator>,
}

impl MockApp {
    pub async fn new() -> Self {
        Self::with_images(None).await
    }

    pub async fn with_images(images: Option<Arc<dyn ImageSource>>) -> Self {
        let clock = Arc::new(FixedClock::new(monday(9, 30, 0)));
        let environment = Arc::new(EnvironmentMonitor::new());
        let actuator = Arc::new(RecordingActuator::default());

        let providers = Providers {
            inventory: Arc::new(StaticInventory::new(sample_devices())),
            telemetry: Arc::new(SystemTelemetry),
            actuator: actuator.clone(),
            images,
        };

        // Scans are driven by the tests
        let context = AppContext::from_providers(
            providers,
            clock.clone(),
            environment.clone(),
            Duration::from_secs(3600),
        )
        .await
        .unwrap();

        Self {
            context,
            clock,
            environment,
            actuator,
        }
    }

    /// Accepts one peer on a loopback port and attaches a fresh session to it.
    pub async fn open_session(&self) -> (Arc<RemoteSession>, Connection, Peer) {
        let session = Arc::new(RemoteSession::new(self.context.clone()));
        let acceptor = Connector::new()
            .with_observer(session.clone())
            .bind(loopback())
            .await
            .unwrap();
        let addr = acceptor.local_addr().unwrap();

        let accepting = tokio::spawn(acceptor.accept(WAIT));
        let peer = Peer::connect(addr).await;
        let connection = accepting.await.unwrap().unwrap();
        session.attach(&connection).await;

        (session, connection, peer)
    }
}

pub fn loopback() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

/// A bare socket speaking the line protocol, standing in for the client app.
pub struct Peer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Peer {
    pub async fn connect(addr: SocketAddr) -> Self {
        Self::from_stream(TcpStream::connect(addr).await.unwrap())
    }

    /// Keeps dialing until the controller listens again.
    pub async fn connect_retrying(addr: SocketAddr) -> Self {
        let stream = time::timeout(WAIT, async {
            loop {
                match TcpStream::connect(addr).await {
                    Ok(stream) => break stream,
                    Err(_) => time::sleep(Duration::from_millis(20)).await,
                }
            }
        })
        .await
        .expect("controller did not listen within the wait limit");

        Self::from_stream(stream)
    }

    fn from_stream(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    pub async fn send(&mut self, message: &Message) {
        let frame = message.encode_frame().unwrap();
        self.writer.write_all(frame.as_bytes()).await.unwrap();
    }

    pub async fn send_raw(&mut self, bytes: impl AsRef<[u8]>) {
        self.writer.write_all(bytes.as_ref()).await.unwrap();
    }

    /// Next message, or `None` once the other side closed.
    pub async fn recv(&mut self) -> Option<Message> {
        let mut line = String::new();
        let read = time::timeout(WAIT, self.reader.read_line(&mut line))
            .await
            .expect("no frame within the wait limit")
            .unwrap();

        if read == 0 {
            return None;
        }
        Some(Message::decode_frame(&line).unwrap())
    }

    pub async fn shutdown(mut self) {
        self.writer.shutdown().await.unwrap();
    }
}

/// Collects states until `target` shows up.
pub async fn wait_for_state(
    states: &mut mpsc::UnboundedReceiver<ConnectionState>,
    target: ConnectionState,
) -> Vec<ConnectionState> {
    let mut seen = Vec::new();
    time::timeout(WAIT, async {
        while let Some(state) = states.recv().await {
            seen.push(state);
            if state == target {
                break;
            }
        }
    })
    .await
    .expect("state not reached within the wait limit");
    seen
}

/// Returns whatever further states arrive within a short grace period.
pub async fn late_states(states: &mut mpsc::UnboundedReceiver<ConnectionState>) -> Vec<ConnectionState> {
    time::sleep(Duration::from_millis(100)).await;
    let mut seen = Vec::new();
    while let Ok(state) = states.try_recv() {
        seen.push(state);
    }
    seen
}
