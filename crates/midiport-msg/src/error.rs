//! Error types for the MIDI message model.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid SysEx data: {0}")]
    InvalidSysExData(String),

    #[error("Index {index} out of range for SysEx message of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
