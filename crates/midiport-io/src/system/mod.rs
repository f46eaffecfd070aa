//! Host entry point owning the transport and both device pools.
//!
//! ## Quick Start
//!
//! ```
//! use midiport_io::{MidiDevice, MidiHost};
//! use midiport_msg::{ChannelMessage, MidiMessage};
//!
//! let host = MidiHost::builder().build()?;
//! let _port = host.create_virtual_port("Loop")?;
//!
//! let input = host.open_input("Loop")?;
//! let output = host.open_output("Loop")?;
//! let events = input.subscribe();
//!
//! output.send(&MidiMessage::from(ChannelMessage::note_on(0, 60, 100)))?;
//! # let _ = events;
//! host.close_input(&input, false)?;
//! host.close_output(&output, false)?;
//! # Ok::<(), midiport_io::Error>(())
//! ```

mod builder;

pub use builder::MidiHostBuilder;

use std::sync::Arc;
use tracing::warn;

use crate::config::VirtualPortConfig;
use crate::device::{InputDevice, MidiDevice, OutputDevice};
use crate::error::{Error, Result};
use crate::info::DeviceInfo;
use crate::pipe::MidiPipe;
use crate::pool::DevicePool;
use crate::transport::Transport;
use crate::virtual_port::{VirtualMidiDriver, VirtualPort};

/// The main entry point for midiport.
///
/// Clone is cheap (Arc internally). There is no global instance; every host owns its own
/// transport and pools.
#[derive(Clone)]
pub struct MidiHost {
    inner: Arc<MidiHostInner>,
}

pub(crate) struct MidiHostInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) inputs: DevicePool<InputDevice>,
    pub(crate) outputs: DevicePool<OutputDevice>,
    pub(crate) virtual_driver: Option<VirtualMidiDriver>,
    pub(crate) port_config: VirtualPortConfig,
}

impl MidiHost {
    pub fn builder() -> MidiHostBuilder {
        MidiHostBuilder::default()
    }

    // ==================== Devices ====================

    pub fn list_inputs(&self) -> Vec<DeviceInfo> {
        self.inner.inputs.enumerate()
    }

    pub fn list_outputs(&self) -> Vec<DeviceInfo> {
        self.inner.outputs.enumerate()
    }

    /// Open (or share) the input device with this name.
    pub fn open_input(&self, name: &str) -> Result<Arc<InputDevice>> {
        self.inner.inputs.open_name(name)
    }

    pub fn open_input_id(&self, id: u32) -> Result<Arc<InputDevice>> {
        self.inner.inputs.open_id(id)
    }

    /// Open (or share) the output device with this name.
    pub fn open_output(&self, name: &str) -> Result<Arc<OutputDevice>> {
        self.inner.outputs.open_name(name)
    }

    pub fn open_output_id(&self, id: u32) -> Result<Arc<OutputDevice>> {
        self.inner.outputs.open_id(id)
    }

    pub fn close_input(&self, device: &Arc<InputDevice>, force: bool) -> Result<bool> {
        self.inner.inputs.close(device, force)
    }

    pub fn close_output(&self, device: &Arc<OutputDevice>, force: bool) -> Result<bool> {
        self.inner.outputs.close(device, force)
    }

    pub fn inputs(&self) -> &DevicePool<InputDevice> {
        &self.inner.inputs
    }

    pub fn outputs(&self) -> &DevicePool<OutputDevice> {
        &self.inner.outputs
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Close every pooled device, inputs first.
    pub fn close_all(&self) -> Result<()> {
        let inputs = self.inner.inputs.close_all();
        let outputs = self.inner.outputs.close_all();
        inputs.and(outputs)
    }

    // ==================== Virtual Ports ====================

    pub fn virtual_driver(&self) -> Option<&VirtualMidiDriver> {
        self.inner.virtual_driver.as_ref()
    }

    /// Create a virtual port with the host's port settings.
    pub fn create_virtual_port(&self, name: &str) -> Result<VirtualPort> {
        self.create_virtual_port_with(name, self.inner.port_config)
    }

    pub fn create_virtual_port_with(&self, name: &str, config: VirtualPortConfig) -> Result<VirtualPort> {
        let driver = self
            .inner
            .virtual_driver
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("host has no virtual MIDI driver".into()))?;
        driver.create_port(name, config)
    }

    // ==================== Pipes ====================

    /// Forward everything from the named input to the named output.
    ///
    /// Both devices come from the pools and the pipe is returned running. Dropping the pipe
    /// closes its two pool references again.
    pub fn pipe(&self, input: &str, output: &str) -> Result<MidiPipe> {
        let input = self.open_input(input)?;
        let output = match self.open_output(output) {
            Ok(output) => output,
            Err(e) => {
                self.close_input(&input, false)?;
                return Err(e);
            }
        };
        let host = Arc::downgrade(&self.inner);
        let (pooled_input, pooled_output) = (Arc::clone(&input), Arc::clone(&output));
        let pipe = MidiPipe::new(input, output).on_drop(move || {
            let Some(inner) = host.upgrade() else {
                return;
            };
            if let Err(e) = inner.inputs.close(&pooled_input, false) {
                warn!("Failed to release pipe input {}: {}", pooled_input.name(), e);
            }
            if let Err(e) = inner.outputs.close(&pooled_output, false) {
                warn!("Failed to release pipe output {}: {}", pooled_output.name(), e);
            }
        });
        pipe.open()?;
        Ok(pipe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_shares_pool_entry() {
        let host = MidiHost::builder().build().unwrap();
        let _port = host.create_virtual_port("Keys").unwrap();

        let first = host.open_input("keys").unwrap();
        let second = host.open_input("KEYS").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(host.inputs().open_count(first.id()), 2);

        assert!(!host.close_input(&first, false).unwrap());
        assert!(host.close_input(&second, false).unwrap());
        assert!(!first.is_open());
    }

    #[test]
    fn test_dropped_pipe_returns_pool_references() {
        let host = MidiHost::builder().build().unwrap();
        let _port = host.create_virtual_port("Through").unwrap();
        let held = host.open_input("Through").unwrap();

        let pipe = host.pipe("Through", "Through").unwrap();
        assert!(pipe.is_running());
        assert_eq!(host.inputs().open_count(held.id()), 2);
        let output = Arc::clone(pipe.output());
        assert_eq!(host.outputs().open_count(output.id()), 1);

        drop(pipe);
        assert_eq!(host.inputs().open_count(held.id()), 1);
        assert!(held.is_open());
        assert_eq!(host.outputs().open_count(output.id()), 0);
        assert!(!output.is_open());
    }

    #[test]
    fn test_pipe_to_unknown_output_releases_input() {
        let host = MidiHost::builder().build().unwrap();
        let _port = host.create_virtual_port("Keys").unwrap();
        assert!(matches!(
            host.pipe("Keys", "nowhere"),
            Err(Error::DeviceNotFound(_))
        ));
        assert_eq!(host.inputs().open_count(0), 0);
    }

    #[test]
    fn test_open_unknown_name() {
        let host = MidiHost::builder().build().unwrap();
        assert!(matches!(
            host.open_output("nowhere"),
            Err(Error::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_no_virtual_driver() {
        let transport: Arc<dyn Transport> = Arc::new(VirtualMidiDriver::new());
        let host = MidiHost::builder().transport(transport).build().unwrap();
        assert!(host.virtual_driver().is_none());
        assert!(matches!(
            host.create_virtual_port("x"),
            Err(Error::InvalidConfig(_))
        ));
    }
}
