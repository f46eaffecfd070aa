//! The port side of a virtual MIDI port.

use crossbeam_channel::Receiver;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

use super::{reason, DriverInner, PortShared, VirtualMidiDriver};
use crate::config::VirtualPortConfig;
use crate::error::{Error, Result};

/// Notifications from a port's read loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortEvent {
    /// An application sent this command to the port.
    CommandReceived(Vec<u8>),
    Error(Error),
}

/// A named virtual MIDI port.
///
/// Creating the port starts a read loop thread that collects every command applications send
/// to it, reports it to subscribers and, with loopback on, writes it straight back. The port
/// disappears from the driver when it is shut down or dropped.
pub struct VirtualPort {
    shared: Arc<PortShared>,
    driver: Arc<DriverInner>,
    thread: Option<JoinHandle<()>>,
}

impl VirtualPort {
    pub fn create(driver: &VirtualMidiDriver, name: &str, config: VirtualPortConfig) -> Result<Self> {
        let driver = Arc::clone(driver.inner());
        let shared = driver.register_port(name, config)?;

        let loop_shared = Arc::clone(&shared);
        let spawned = thread::Builder::new()
            .name(format!("virtual-midi-{}", name))
            .spawn(move || read_loop(loop_shared));

        match spawned {
            Ok(thread) => Ok(Self {
                shared,
                driver,
                thread: Some(thread),
            }),
            Err(e) => {
                shared.enabled.store(false, Ordering::Release);
                driver.unregister_port(&shared);
                Err(Error::from(e))
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &VirtualPortConfig {
        &self.shared.config
    }

    pub fn loopback(&self) -> bool {
        self.shared.loopback.load(Ordering::Relaxed)
    }

    pub fn set_loopback(&self, enabled: bool) {
        self.shared.loopback.store(enabled, Ordering::Relaxed);
    }

    /// Send a command to every application listening on the port.
    ///
    /// Empty commands are ignored.
    pub fn write(&self, command: &[u8]) -> Result<()> {
        self.shared.write_command(command)
    }

    pub fn subscribe(&self) -> Receiver<PortEvent> {
        self.shared.subscribers.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.thread.is_some()
    }

    /// Stop the read loop and remove the port from the driver.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.shared.stop.store(true, Ordering::Release);
        self.shared.shutdown_tx.lock().take();

        if thread.thread().id() != thread::current().id() && thread.join().is_err() {
            warn!("Read loop of virtual port '{}' panicked", self.shared.name);
        }

        self.shared.enabled.store(false, Ordering::Release);
        self.driver.unregister_port(&self.shared);
    }
}

impl Drop for VirtualPort {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for VirtualPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualPort")
            .field("name", &self.shared.name)
            .field("loopback", &self.loopback())
            .field("active", &self.is_active())
            .finish()
    }
}

fn read_loop(shared: Arc<PortShared>) {
    debug!("Virtual port '{}' read loop started", shared.name);

    while !shared.stop.load(Ordering::Acquire) {
        match shared.read_command() {
            Ok(command) => {
                trace!("'{}' received {} bytes", shared.name, command.len());
                if shared.loopback.load(Ordering::Relaxed) {
                    if let Err(e) = shared.write_command(&command) {
                        warn!("Loopback on '{}' failed: {}", shared.name, e);
                        shared.subscribers.broadcast(PortEvent::Error(e));
                    }
                }
                shared
                    .subscribers
                    .broadcast(PortEvent::CommandReceived(command));
            }
            Err(e) => {
                if shared.stop.load(Ordering::Acquire) {
                    break;
                }
                warn!("Reading from '{}' failed: {}", shared.name, e);
                let fatal = matches!(
                    e,
                    Error::NativePort {
                        reason_code: reason::INVALID_HANDLE,
                        ..
                    }
                );
                shared.subscribers.broadcast(PortEvent::Error(e));
                if fatal {
                    break;
                }
            }
        }
    }

    debug!("Virtual port '{}' read loop stopped", shared.name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::DeviceType;
    use crate::transport::{Transport, TransportEvent};
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[test]
    fn test_write_empty_is_ignored() {
        let driver = VirtualMidiDriver::new();
        let port = driver.create_port("quiet", VirtualPortConfig::default()).unwrap();
        assert!(port.write(&[]).is_ok());
    }

    #[test]
    fn test_write_too_long() {
        let driver = VirtualMidiDriver::new();
        let config = VirtualPortConfig {
            max_sysex_length: 4,
            ..Default::default()
        };
        let port = driver.create_port("small", config).unwrap();
        let err = port.write(&[0xF0, 1, 2, 3, 0xF7]).unwrap_err();
        assert!(matches!(err, Error::NativePort { reason_code: 56, .. }));
    }

    #[test]
    fn test_write_after_shutdown() {
        let driver = VirtualMidiDriver::new();
        let mut port = driver.create_port("gone", VirtualPortConfig::default()).unwrap();
        port.shutdown();
        assert!(!port.is_active());
        assert!(driver.port_names().is_empty());
        let err = port.write(&[0x90, 60, 100]).unwrap_err();
        assert!(matches!(err, Error::NativePort { reason_code: 6, .. }));
    }

    #[test]
    fn test_name_is_free_after_drop() {
        let driver = VirtualMidiDriver::new();
        drop(driver.create_port("again", VirtualPortConfig::default()).unwrap());
        assert!(driver.create_port("again", VirtualPortConfig::default()).is_ok());
    }

    #[test]
    fn test_received_commands_are_reported() {
        let driver = VirtualMidiDriver::new();
        let config = VirtualPortConfig {
            loopback: false,
            ..Default::default()
        };
        let port = driver.create_port("sink", config).unwrap();
        let events = port.subscribe();

        let handle = driver
            .open(DeviceType::Output, 0, Arc::new(|_| {}))
            .unwrap();
        driver.send_short(handle, 0x00_40_3C_92).unwrap();
        driver.send_short(handle, 0x00_00_05_C1).unwrap();

        assert_eq!(
            events.recv_timeout(TIMEOUT).unwrap(),
            PortEvent::CommandReceived(vec![0x92, 0x3C, 0x40])
        );
        assert_eq!(
            events.recv_timeout(TIMEOUT).unwrap(),
            PortEvent::CommandReceived(vec![0xC1, 0x05])
        );
        driver.close(handle).unwrap();
    }

    #[test]
    fn test_loopback_reaches_started_inputs() {
        let driver = VirtualMidiDriver::new();
        let _port = driver.create_port("echo", VirtualPortConfig::default()).unwrap();

        let (tx, rx) = unbounded();
        let input = driver
            .open(
                DeviceType::Input,
                0,
                Arc::new(move |event| {
                    let _ = tx.send(event);
                }),
            )
            .unwrap();
        driver.start(input).unwrap();
        let output = driver
            .open(DeviceType::Output, 0, Arc::new(|_| {}))
            .unwrap();

        driver.send_short(output, 0x00_7F_40_B0).unwrap();
        match rx.recv_timeout(TIMEOUT).unwrap() {
            TransportEvent::Data { message, .. } => assert_eq!(message, 0x00_7F_40_B0),
            other => panic!("unexpected {other:?}"),
        }

        driver.close(output).unwrap();
        driver.close(input).unwrap();
        assert_eq!(driver.open_handles(), 0);
    }
}
