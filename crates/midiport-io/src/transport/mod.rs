//! The driver seam.
//!
//! A [`Transport`] is the only thing that talks to a MIDI driver. Devices hold an
//! `Arc<dyn Transport>` and drive it through open/prepare/submit/reset/close; the transport
//! answers asynchronously through the [`TransportCallback`] registered at open time.
//!
//! Callbacks are never invoked from inside a transport call. Both bundled transports queue
//! events onto a per-handle [`Dispatcher`] thread, so a device may hold its own lock while
//! calling into the transport.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::info::{DeviceType, RawDeviceCaps};

mod dispatch;
pub use dispatch::Dispatcher;

mod queue;
pub(crate) use queue::HandleQueue;

#[cfg(feature = "midi-io")]
mod hardware;
#[cfg(feature = "midi-io")]
pub use hardware::MidirTransport;

/// Opaque token for an open device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportHandle(pub u64);

/// Opaque token for a prepared long-message buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferId(pub u64);

/// Status code returned by a transport operation.
///
/// Values follow the MMSYSERR/MIDIERR numbering so that codes from a native driver can be
/// passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportCode(pub u32);

impl TransportCode {
    pub const ERROR: Self = Self(1);
    pub const BAD_DEVICE_ID: Self = Self(2);
    pub const NOT_ENABLED: Self = Self(3);
    pub const ALLOCATED: Self = Self(4);
    pub const INVALID_HANDLE: Self = Self(5);
    pub const NO_DRIVER: Self = Self(6);
    pub const NO_MEMORY: Self = Self(7);
    pub const NOT_SUPPORTED: Self = Self(8);
    pub const INVALID_PARAM: Self = Self(11);
    pub const UNPREPARED: Self = Self(64);
    pub const STILL_PLAYING: Self = Self(65);
    pub const NOT_READY: Self = Self(67);
    pub const NO_DEVICE: Self = Self(68);

    /// Standard text for well-known codes.
    pub fn description(self) -> Option<&'static str> {
        Some(match self.0 {
            1 => "unspecified error",
            2 => "device ID out of range",
            3 => "driver failed enable",
            4 => "device already allocated",
            5 => "device handle is invalid",
            6 => "no device driver present",
            7 => "memory allocation error",
            8 => "function isn't supported",
            11 => "invalid parameter passed",
            64 => "header not prepared",
            65 => "still something playing",
            67 => "hardware is still busy",
            68 => "port no longer connected",
            _ => return None,
        })
    }
}

impl fmt::Display for TransportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(text) => write!(f, "{} ({})", text, self.0),
            None => write!(f, "code {}", self.0),
        }
    }
}

pub type TransportResult<T> = std::result::Result<T, TransportCode>;

/// Asynchronous notification from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A short message arrived.
    Data { message: u32, timestamp: u32 },
    /// The driver received a malformed short message.
    Error { message: u32, timestamp: u32 },
    /// An input buffer came back. `data` holds the bytes recorded into it, possibly none when
    /// the buffer is returned by a reset.
    LongData {
        buffer: BufferId,
        data: Vec<u8>,
        timestamp: u32,
    },
    /// An input buffer came back holding invalid SysEx data.
    LongError {
        buffer: BufferId,
        data: Vec<u8>,
        timestamp: u32,
    },
    /// An output buffer finished sending.
    Done { buffer: BufferId },
}

pub type TransportCallback = Arc<dyn Fn(TransportEvent) + Send + Sync>;

pub trait Transport: Send + Sync {
    /// Capabilities of every device of `device_type`, indexed by device id.
    fn enumerate(&self, device_type: DeviceType) -> Vec<RawDeviceCaps>;

    fn device_caps(&self, device_type: DeviceType, id: u32) -> TransportResult<RawDeviceCaps> {
        self.enumerate(device_type)
            .into_iter()
            .nth(id as usize)
            .ok_or(TransportCode::BAD_DEVICE_ID)
    }

    fn open(
        &self,
        device_type: DeviceType,
        id: u32,
        callback: TransportCallback,
    ) -> TransportResult<TransportHandle>;

    /// Release a handle. Must not be called while the device lock is held: closing joins the
    /// dispatcher, which may be waiting on that lock.
    fn close(&self, handle: TransportHandle) -> TransportResult<()>;

    /// Stop activity and hand every outstanding buffer back through the callback.
    fn reset(&self, handle: TransportHandle) -> TransportResult<()>;

    /// Begin delivering input.
    fn start(&self, handle: TransportHandle) -> TransportResult<()>;

    fn send_short(&self, handle: TransportHandle, message: u32) -> TransportResult<()>;

    /// Register a buffer with the driver. Input devices pass a zeroed buffer of the receive
    /// size; output devices pass the bytes to send.
    fn prepare_buffer(&self, handle: TransportHandle, data: Vec<u8>)
        -> TransportResult<BufferId>;

    /// Queue a prepared buffer for receiving.
    fn add_buffer(&self, handle: TransportHandle, buffer: BufferId) -> TransportResult<()>;

    /// Send a prepared buffer. Completion is reported with [`TransportEvent::Done`].
    fn send_long(&self, handle: TransportHandle, buffer: BufferId) -> TransportResult<()>;

    fn unprepare_buffer(&self, handle: TransportHandle, buffer: BufferId) -> TransportResult<()>;

    fn error_text(&self, code: TransportCode) -> Option<String> {
        code.description().map(str::to_string)
    }
}

/// Convert a transport status code into a device error, using the transport's own text.
pub(crate) fn transport_error(
    transport: &dyn Transport,
    device_type: DeviceType,
    code: TransportCode,
) -> Error {
    Error::Transport {
        code: code.0,
        device_type,
        message: transport
            .error_text(code)
            .unwrap_or_else(|| "unknown error".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    impl Transport for Silent {
        fn enumerate(&self, _: DeviceType) -> Vec<RawDeviceCaps> {
            vec![RawDeviceCaps::named("a"), RawDeviceCaps::named("b")]
        }
        fn open(&self, _: DeviceType, _: u32, _: TransportCallback) -> TransportResult<TransportHandle> {
            Err(TransportCode::NOT_SUPPORTED)
        }
        fn close(&self, _: TransportHandle) -> TransportResult<()> {
            Ok(())
        }
        fn reset(&self, _: TransportHandle) -> TransportResult<()> {
            Ok(())
        }
        fn start(&self, _: TransportHandle) -> TransportResult<()> {
            Ok(())
        }
        fn send_short(&self, _: TransportHandle, _: u32) -> TransportResult<()> {
            Ok(())
        }
        fn prepare_buffer(&self, _: TransportHandle, _: Vec<u8>) -> TransportResult<BufferId> {
            Ok(BufferId(0))
        }
        fn add_buffer(&self, _: TransportHandle, _: BufferId) -> TransportResult<()> {
            Ok(())
        }
        fn send_long(&self, _: TransportHandle, _: BufferId) -> TransportResult<()> {
            Ok(())
        }
        fn unprepare_buffer(&self, _: TransportHandle, _: BufferId) -> TransportResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_device_caps_indexes_enumeration() {
        let transport = Silent;
        assert_eq!(transport.device_caps(DeviceType::Input, 1).unwrap().name, "b");
        assert_eq!(
            transport.device_caps(DeviceType::Input, 2),
            Err(TransportCode::BAD_DEVICE_ID)
        );
    }

    #[test]
    fn test_transport_error_text() {
        let err = transport_error(&Silent, DeviceType::Output, TransportCode::NO_DEVICE);
        assert_eq!(
            err,
            Error::Transport {
                code: 68,
                device_type: DeviceType::Output,
                message: "port no longer connected".into(),
            }
        );

        let err = transport_error(&Silent, DeviceType::Input, TransportCode(999));
        match err {
            Error::Transport { message, .. } => assert_eq!(message, "unknown error"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
