//! In-process virtual MIDI driver.
//!
//! A [`VirtualPort`] is a named endpoint owned by one side of the process. Applications see
//! every port twice through the driver's [`Transport`] implementation:
//!
//! - as an **output** device: whatever an application sends arrives at the port's read loop;
//! - as an **input** device: whatever the port writes is delivered to every open input handle.
//!
//! With loopback on (the default) the port writes each received command straight back, so an
//! output device and an input device opened on the same port talk to each other.

use arc_swap::ArcSwap;
use crossbeam_channel::{unbounded, Receiver, Sender};
use dashmap::DashMap;
use midiport_msg::packed;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::VirtualPortConfig;
use crate::error::{Error, Result};
use crate::events::Subscribers;
use crate::info::{DeviceType, RawDeviceCaps};
use crate::transport::{
    BufferId, Dispatcher, HandleQueue, Transport, TransportCallback, TransportCode,
    TransportEvent, TransportHandle, TransportResult,
};

mod port;
pub use port::{PortEvent, VirtualPort};

/// Port creation flags.
pub mod flags {
    /// The driver splits received data into complete commands.
    pub const PARSE_RX: u32 = 1;
    /// The driver checks written data for complete commands.
    pub const PARSE_TX: u32 = 2;
    /// Applications can only send to the port.
    pub const INSTANTIATE_RX_ONLY: u32 = 4;
    /// Applications can only receive from the port.
    pub const INSTANTIATE_TX_ONLY: u32 = 8;

    const ALL: u32 = PARSE_RX | PARSE_TX | INSTANTIATE_RX_ONLY | INSTANTIATE_TX_ONLY;

    pub fn is_valid(flags: u32) -> bool {
        flags & !ALL == 0
            && !(flags & INSTANTIATE_RX_ONLY != 0 && flags & INSTANTIATE_TX_ONLY != 0)
    }
}

/// Native reason codes reported by virtual-port operations.
pub mod reason {
    pub const PATH_NOT_FOUND: u32 = 3;
    pub const INVALID_HANDLE: u32 = 6;
    pub const TOO_MANY_CMDS: u32 = 56;
    pub const TOO_MANY_SESSIONS: u32 = 69;
    pub const INVALID_NAME: u32 = 123;
    pub const MOD_NOT_FOUND: u32 = 126;
    pub const BAD_ARGUMENTS: u32 = 160;
    pub const ALREADY_EXISTS: u32 = 183;
    pub const OLD_OS_VERSION: u32 = 1150;
    pub const REVISION_MISMATCH: u32 = 1306;
    pub const ALIAS_EXISTS: u32 = 1379;

    pub fn describe(code: u32) -> String {
        match code {
            PATH_NOT_FOUND => "virtual MIDI driver is not installed".into(),
            INVALID_HANDLE => "port not enabled".into(),
            TOO_MANY_CMDS => "MIDI command too large".into(),
            TOO_MANY_SESSIONS => "maximum number of ports reached".into(),
            INVALID_NAME => "port name must contain at least one character".into(),
            MOD_NOT_FOUND => "virtual MIDI driver library could not be loaded".into(),
            BAD_ARGUMENTS => "invalid flags specified".into(),
            ALREADY_EXISTS | ALIAS_EXISTS => "port name is already in use".into(),
            OLD_OS_VERSION => "operating system is too old for dynamic port creation".into(),
            REVISION_MISMATCH => "driver library and driver version differ".into(),
            _ => format!("unspecified virtual MIDI error: {code}"),
        }
    }
}

/// Bytes of one command travelling from an application to a port.
type Command = SmallVec<[u8; 3]>;

/// Most ports one driver will host.
pub const MAX_PORTS: usize = 64;

const DRIVER_VERSION: u32 = 0x0100;

/// One open application handle.
struct Endpoint {
    device_type: DeviceType,
    port: Arc<PortShared>,
    queue: HandleQueue,
}

/// State shared between a [`VirtualPort`] and the driver.
pub(crate) struct PortShared {
    name: String,
    config: VirtualPortConfig,
    enabled: AtomicBool,
    loopback: AtomicBool,
    stop: AtomicBool,
    inbound_tx: Sender<Command>,
    inbound_rx: Receiver<Command>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    shutdown_rx: Receiver<()>,
    listeners: ArcSwap<Vec<Arc<Endpoint>>>,
    subscribers: Subscribers<PortEvent>,
}

impl PortShared {
    fn new(name: String, config: VirtualPortConfig) -> Self {
        let (inbound_tx, inbound_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = unbounded();
        Self {
            name,
            config,
            enabled: AtomicBool::new(true),
            loopback: AtomicBool::new(config.loopback),
            stop: AtomicBool::new(false),
            inbound_tx,
            inbound_rx,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            shutdown_rx,
            listeners: ArcSwap::from_pointee(Vec::new()),
            subscribers: Subscribers::new(),
        }
    }

    fn caps(&self) -> RawDeviceCaps {
        RawDeviceCaps {
            name: self.name.clone(),
            manufacturer_id: 0,
            product_id: 0,
            driver_version: DRIVER_VERSION,
        }
    }

    fn visible_as(&self, device_type: DeviceType) -> bool {
        match device_type {
            DeviceType::Input => self.config.flags & flags::INSTANTIATE_RX_ONLY == 0,
            DeviceType::Output => self.config.flags & flags::INSTANTIATE_TX_ONLY == 0,
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Block until an application sends a command or the port shuts down.
    fn read_command(&self) -> Result<Vec<u8>> {
        if !self.is_enabled() {
            return Err(Error::native_port(reason::INVALID_HANDLE));
        }
        crossbeam_channel::select! {
            recv(self.inbound_rx) -> command => {
                command
                    .map(Command::into_vec)
                    .map_err(|_| Error::native_port(reason::INVALID_HANDLE))
            }
            recv(self.shutdown_rx) -> _ => Err(Error::native_port(reason::INVALID_HANDLE)),
        }
    }

    /// Send a command to every application that has the port open as input.
    fn write_command(&self, command: &[u8]) -> Result<()> {
        if command.is_empty() {
            return Ok(());
        }
        if !self.is_enabled() {
            return Err(Error::native_port(reason::INVALID_HANDLE));
        }
        if command.len() > self.config.max_sysex_length as usize {
            return Err(Error::native_port(reason::TOO_MANY_CMDS));
        }
        let parse = self.config.flags & flags::PARSE_TX != 0 && command[0] != 0xF7;
        if parse && midiport_msg::MidiMessage::from_bytes(command).is_none() {
            return Err(Error::native_port(reason::TOO_MANY_CMDS));
        }
        for endpoint in self.listeners.load().iter() {
            endpoint.queue.deliver(command);
        }
        Ok(())
    }

    /// Accept a command sent by an application.
    fn receive(&self, command: Command) -> TransportResult<()> {
        if !self.is_enabled() {
            return Err(TransportCode::NO_DEVICE);
        }
        if command.len() > self.config.max_sysex_length as usize {
            return Err(TransportCode::INVALID_PARAM);
        }
        self.inbound_tx
            .send(command)
            .map_err(|_| TransportCode::NO_DEVICE)
    }

    fn add_listener(&self, endpoint: Arc<Endpoint>) {
        self.listeners.rcu(|current| {
            let mut next = (**current).clone();
            next.push(Arc::clone(&endpoint));
            next
        });
    }

    fn remove_listener(&self, endpoint: &Arc<Endpoint>) {
        self.listeners.rcu(|current| {
            current
                .iter()
                .filter(|e| !Arc::ptr_eq(e, endpoint))
                .cloned()
                .collect::<Vec<_>>()
        });
    }
}

pub(crate) struct DriverInner {
    ports: ArcSwap<Vec<Arc<PortShared>>>,
    register_lock: Mutex<()>,
    endpoints: DashMap<u64, Arc<Endpoint>>,
    next_id: AtomicU64,
}

impl DriverInner {
    fn register_port(&self, name: &str, config: VirtualPortConfig) -> Result<Arc<PortShared>> {
        if name.trim().is_empty() {
            return Err(Error::native_port(reason::INVALID_NAME));
        }
        if !flags::is_valid(config.flags) || config.max_sysex_length == 0 {
            return Err(Error::native_port(reason::BAD_ARGUMENTS));
        }

        let _guard = self.register_lock.lock();
        let ports = self.ports.load();
        if ports.len() >= MAX_PORTS {
            return Err(Error::native_port(reason::TOO_MANY_SESSIONS));
        }
        if ports.iter().any(|p| p.name.eq_ignore_ascii_case(name)) {
            return Err(Error::native_port(reason::ALREADY_EXISTS));
        }

        let shared = Arc::new(PortShared::new(name.to_string(), config));
        let mut next = (**ports).clone();
        next.push(Arc::clone(&shared));
        self.ports.store(Arc::new(next));
        debug!("Created virtual MIDI port '{}'", name);
        Ok(shared)
    }

    fn unregister_port(&self, port: &Arc<PortShared>) {
        let _guard = self.register_lock.lock();
        let next: Vec<_> = self
            .ports
            .load()
            .iter()
            .filter(|p| !Arc::ptr_eq(p, port))
            .cloned()
            .collect();
        self.ports.store(Arc::new(next));
        debug!("Removed virtual MIDI port '{}'", port.name);
    }

    fn visible(&self, device_type: DeviceType) -> Vec<Arc<PortShared>> {
        self.ports
            .load()
            .iter()
            .filter(|p| p.visible_as(device_type))
            .cloned()
            .collect()
    }

    fn endpoint(&self, handle: TransportHandle) -> TransportResult<Arc<Endpoint>> {
        self.endpoints
            .get(&handle.0)
            .map(|e| Arc::clone(e.value()))
            .ok_or(TransportCode::INVALID_HANDLE)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Driver hosting virtual ports, usable as a [`Transport`].
///
/// Cloning is cheap; clones share the same ports and handles.
#[derive(Clone)]
pub struct VirtualMidiDriver {
    inner: Arc<DriverInner>,
}

impl VirtualMidiDriver {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DriverInner {
                ports: ArcSwap::from_pointee(Vec::new()),
                register_lock: Mutex::new(()),
                endpoints: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn create_port(&self, name: &str, config: VirtualPortConfig) -> Result<VirtualPort> {
        VirtualPort::create(self, name, config)
    }

    /// Names of all live ports, in creation order.
    pub fn port_names(&self) -> Vec<String> {
        self.inner.ports.load().iter().map(|p| p.name.clone()).collect()
    }

    /// Number of application handles currently open.
    pub fn open_handles(&self) -> usize {
        self.inner.endpoints.len()
    }

    pub(crate) fn inner(&self) -> &Arc<DriverInner> {
        &self.inner
    }
}

impl Default for VirtualMidiDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for VirtualMidiDriver {
    fn enumerate(&self, device_type: DeviceType) -> Vec<RawDeviceCaps> {
        self.inner
            .visible(device_type)
            .iter()
            .map(|p| p.caps())
            .collect()
    }

    fn open(
        &self,
        device_type: DeviceType,
        id: u32,
        callback: TransportCallback,
    ) -> TransportResult<TransportHandle> {
        let port = self
            .inner
            .visible(device_type)
            .into_iter()
            .nth(id as usize)
            .ok_or(TransportCode::BAD_DEVICE_ID)?;
        if !port.is_enabled() {
            return Err(TransportCode::NO_DEVICE);
        }

        let handle = self.inner.next_id();
        let name = format!("virtual-midi-{}-{}", device_type, handle).to_lowercase();
        let dispatcher = Dispatcher::spawn(name, callback).map_err(|e| {
            warn!("Failed to spawn callback thread: {}", e);
            TransportCode::NO_MEMORY
        })?;

        let endpoint = Arc::new(Endpoint {
            device_type,
            port: Arc::clone(&port),
            queue: HandleQueue::new(port.name.clone(), dispatcher),
        });
        if device_type == DeviceType::Input {
            port.add_listener(Arc::clone(&endpoint));
        }
        self.inner.endpoints.insert(handle, endpoint);
        debug!("Opened {} handle {} on '{}'", device_type, handle, port.name);
        Ok(TransportHandle(handle))
    }

    fn close(&self, handle: TransportHandle) -> TransportResult<()> {
        let endpoint = self.inner.endpoint(handle)?;
        if endpoint.queue.has_queued() {
            return Err(TransportCode::STILL_PLAYING);
        }
        self.inner.endpoints.remove(&handle.0);
        if endpoint.device_type == DeviceType::Input {
            endpoint.port.remove_listener(&endpoint);
        }
        endpoint.queue.shutdown();
        Ok(())
    }

    fn reset(&self, handle: TransportHandle) -> TransportResult<()> {
        let endpoint = self.inner.endpoint(handle)?;
        endpoint.queue.reset();
        Ok(())
    }

    fn start(&self, handle: TransportHandle) -> TransportResult<()> {
        let endpoint = self.inner.endpoint(handle)?;
        if endpoint.device_type != DeviceType::Input {
            return Err(TransportCode::NOT_SUPPORTED);
        }
        endpoint.queue.start();
        Ok(())
    }

    fn send_short(&self, handle: TransportHandle, message: u32) -> TransportResult<()> {
        let endpoint = self.inner.endpoint(handle)?;
        if endpoint.device_type != DeviceType::Output {
            return Err(TransportCode::NOT_SUPPORTED);
        }
        let status = packed::status(message);
        let bytes = [status, packed::data1(message), packed::data2(message)];
        let len = 1 + packed::data_len(status);
        endpoint.port.receive(Command::from_slice(&bytes[..len]))
    }

    fn prepare_buffer(&self, handle: TransportHandle, data: Vec<u8>) -> TransportResult<BufferId> {
        Ok(self.inner.endpoint(handle)?.queue.prepare(data))
    }

    fn add_buffer(&self, handle: TransportHandle, buffer: BufferId) -> TransportResult<()> {
        let endpoint = self.inner.endpoint(handle)?;
        if endpoint.device_type != DeviceType::Input {
            return Err(TransportCode::NOT_SUPPORTED);
        }
        endpoint.queue.add(buffer)
    }

    fn send_long(&self, handle: TransportHandle, buffer: BufferId) -> TransportResult<()> {
        let endpoint = self.inner.endpoint(handle)?;
        if endpoint.device_type != DeviceType::Output {
            return Err(TransportCode::NOT_SUPPORTED);
        }
        let data = endpoint.queue.data(buffer)?;
        endpoint.port.receive(Command::from_vec(data))?;
        endpoint.queue.post(TransportEvent::Done { buffer });
        Ok(())
    }

    fn unprepare_buffer(&self, handle: TransportHandle, buffer: BufferId) -> TransportResult<()> {
        self.inner.endpoint(handle)?.queue.unprepare(buffer)
    }
}
