//! Centralized error type for the midiport umbrella crate.
//!
//! Wraps both subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Message: {0}")]
    Msg(#[from] midiport_msg::Error),

    #[error(transparent)]
    Io(#[from] midiport_io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
