//! Device and virtual-port configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::virtual_port::flags;

/// Largest SysEx receive buffer a device may ask the transport for.
pub const MAX_SYSEX_BUFFER_SIZE: usize = 64 * 1024;

/// Per-device buffer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Receive buffers an input device keeps submitted while open.
    pub receive_buffers: usize,
    /// Size in bytes of each receive buffer.
    pub sysex_buffer_size: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            receive_buffers: 4,
            sysex_buffer_size: 4096,
        }
    }
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.receive_buffers == 0 {
            return Err(Error::InvalidConfig(
                "receive_buffers must be at least 1".into(),
            ));
        }
        if self.sysex_buffer_size == 0 || self.sysex_buffer_size > MAX_SYSEX_BUFFER_SIZE {
            return Err(Error::InvalidConfig(format!(
                "sysex_buffer_size must be between 1 and {MAX_SYSEX_BUFFER_SIZE}, got {}",
                self.sysex_buffer_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualPortConfig {
    /// Longest command the port accepts in either direction.
    pub max_sysex_length: u32,
    /// Combination of [`flags`] values.
    pub flags: u32,
    /// Echo every received command back to the applications.
    pub loopback: bool,
}

impl Default for VirtualPortConfig {
    fn default() -> Self {
        Self {
            max_sysex_length: 65535,
            flags: flags::PARSE_RX,
            loopback: true,
        }
    }
}

impl VirtualPortConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_sysex_length == 0 {
            return Err(Error::InvalidConfig(
                "max_sysex_length must be greater than 0".into(),
            ));
        }
        if !flags::is_valid(self.flags) {
            return Err(Error::InvalidConfig(format!(
                "invalid virtual port flags 0x{:X}",
                self.flags
            )));
        }
        Ok(())
    }
}
