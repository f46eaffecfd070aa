//! Error types for MIDI device I/O.

use thiserror::Error;

use crate::info::DeviceType;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("MIDI device not found: {0}")]
    DeviceNotFound(String),

    #[error("The device must be an {expected} device, got {actual}")]
    DeviceTypeMismatch {
        expected: DeviceType,
        actual: DeviceType,
    },

    #[error("The device is not open: {0}")]
    DeviceNotOpen(String),

    #[error("{device_type} device error {code}: {message}")]
    Transport {
        code: u32,
        device_type: DeviceType,
        message: String,
    },

    #[error("Virtual MIDI error {reason_code}: {message}")]
    NativePort { reason_code: u32, message: String },

    #[error(transparent)]
    Message(#[from] midiport_msg::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl Error {
    /// Build a virtual-port error with the message for `reason_code`.
    pub fn native_port(reason_code: u32) -> Self {
        Error::NativePort {
            reason_code,
            message: crate::virtual_port::reason::describe(reason_code),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
