//! Device handles and their open/close/reset lifecycle.
//!
//! ```text
//! Closed -> Opening -> Open -> Resetting -> Open -> Closing -> Closed
//! ```
//!
//! Every device keeps a counter of buffers it has handed to the transport and not yet had
//! back. A reset asks the transport to return them all and blocks until the counter is zero.

use std::sync::Arc;
use tracing::warn;

use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::info::{DeviceInfo, DeviceType};
use crate::transport::{BufferId, Transport, TransportHandle, TransportResult};

mod input;
mod output;

pub use input::InputDevice;
pub use output::OutputDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    Closed,
    Opening,
    Open,
    Resetting,
    Closing,
}

/// Common surface of input and output devices, used by [`DevicePool`](crate::DevicePool).
pub trait MidiDevice: Send + Sync + 'static {
    const DEVICE_TYPE: DeviceType;

    fn new(transport: Arc<dyn Transport>, info: DeviceInfo, config: DeviceConfig) -> Result<Self>
    where
        Self: Sized;

    fn info(&self) -> &DeviceInfo;

    fn state(&self) -> DeviceState;

    fn open(&self) -> Result<()>;

    fn close(&self) -> Result<()>;

    fn reset(&self) -> Result<()>;

    fn id(&self) -> u32 {
        self.info().id
    }

    fn name(&self) -> &str {
        &self.info().name
    }

    fn is_open(&self) -> bool {
        matches!(self.state(), DeviceState::Open | DeviceState::Resetting)
    }
}

pub(crate) fn check_type(info: &DeviceInfo, expected: DeviceType) -> Result<()> {
    if info.device_type == expected {
        Ok(())
    } else {
        Err(Error::DeviceTypeMismatch {
            expected,
            actual: info.device_type,
        })
    }
}

/// A buffer registered with the transport.
///
/// Unprepared again on drop unless [`commit`](Self::commit) hands ownership to the driver.
pub(crate) struct PreparedBuffer<'a> {
    transport: &'a dyn Transport,
    handle: TransportHandle,
    id: BufferId,
    committed: bool,
}

impl<'a> PreparedBuffer<'a> {
    pub(crate) fn prepare(
        transport: &'a dyn Transport,
        handle: TransportHandle,
        data: Vec<u8>,
    ) -> TransportResult<Self> {
        let id = transport.prepare_buffer(handle, data)?;
        Ok(Self {
            transport,
            handle,
            id,
            committed: false,
        })
    }

    pub(crate) fn id(&self) -> BufferId {
        self.id
    }

    pub(crate) fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PreparedBuffer<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(code) = self.transport.unprepare_buffer(self.handle, self.id) {
            warn!("Failed to unprepare buffer {:?}: {}", self.id, code);
        }
    }
}
