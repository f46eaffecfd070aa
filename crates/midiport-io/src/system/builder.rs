//! MidiHost builder for choosing the transport and buffer settings.

use std::sync::Arc;

use crate::config::{DeviceConfig, VirtualPortConfig};
use crate::device::{InputDevice, OutputDevice};
use crate::error::Result;
use crate::pool::DevicePool;
use crate::transport::Transport;
use crate::virtual_port::VirtualMidiDriver;

#[cfg(feature = "midi-io")]
use crate::transport::MidirTransport;

use super::{MidiHost, MidiHostInner};

#[derive(Default)]
pub struct MidiHostBuilder {
    transport: Option<Arc<dyn Transport>>,
    virtual_driver: Option<VirtualMidiDriver>,
    #[cfg(feature = "midi-io")]
    midir_client: Option<String>,
    device_config: DeviceConfig,
    port_config: VirtualPortConfig,
}

impl MidiHostBuilder {
    /// Drive devices through a custom transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Host virtual ports on this driver. Without another transport it also serves the devices.
    pub fn virtual_driver(mut self, driver: VirtualMidiDriver) -> Self {
        self.virtual_driver = Some(driver);
        self
    }

    /// Drive devices through the operating system's MIDI ports.
    #[cfg(feature = "midi-io")]
    pub fn midir(mut self, client_name: impl Into<String>) -> Self {
        self.midir_client = Some(client_name.into());
        self
    }

    pub fn device_config(mut self, config: DeviceConfig) -> Self {
        self.device_config = config;
        self
    }

    pub fn receive_buffers(mut self, count: usize) -> Self {
        self.device_config.receive_buffers = count;
        self
    }

    pub fn sysex_buffer_size(mut self, size: usize) -> Self {
        self.device_config.sysex_buffer_size = size;
        self
    }

    /// Settings used by [`MidiHost::create_virtual_port`].
    pub fn virtual_port_config(mut self, config: VirtualPortConfig) -> Self {
        self.port_config = config;
        self
    }

    pub fn build(self) -> Result<MidiHost> {
        self.device_config.validate()?;
        self.port_config.validate()?;

        #[cfg(feature = "midi-io")]
        let hardware: Option<Arc<dyn Transport>> = match self.midir_client {
            Some(client) => Some(Arc::new(MidirTransport::new(&client)?)),
            None => None,
        };
        #[cfg(not(feature = "midi-io"))]
        let hardware: Option<Arc<dyn Transport>> = None;

        let (transport, virtual_driver) = match (self.transport.or(hardware), self.virtual_driver) {
            (Some(transport), driver) => (transport, driver),
            (None, driver) => {
                let driver = driver.unwrap_or_default();
                (Arc::new(driver.clone()) as Arc<dyn Transport>, Some(driver))
            }
        };

        Ok(MidiHost {
            inner: Arc::new(MidiHostInner {
                inputs: DevicePool::<InputDevice>::new(Arc::clone(&transport), self.device_config),
                outputs: DevicePool::<OutputDevice>::new(Arc::clone(&transport), self.device_config),
                transport,
                virtual_driver,
                port_config: self.port_config,
            }),
        })
    }
}
