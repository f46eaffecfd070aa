//! MIDI device I/O for midiport.
//!
//! Opens input and output devices through a [`Transport`], keeps receive buffers armed,
//! reassembles SysEx, and shares open devices through reference-counted pools. Bundled
//! transports: an in-process [`VirtualMidiDriver`] and, with the `midi-io` feature, OS ports
//! through midir.
//!
//! Feature gates: `midi-io` (hardware I/O via midir).

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{DeviceConfig, VirtualPortConfig, MAX_SYSEX_BUFFER_SIZE};

mod info;
pub use info::{DeviceInfo, DeviceType, DriverVersion, RawDeviceCaps};

pub mod transport;
pub use transport::{
    BufferId, Dispatcher, Transport, TransportCallback, TransportCode, TransportEvent,
    TransportHandle, TransportResult,
};

#[cfg(feature = "midi-io")]
pub use transport::MidirTransport;

mod events;
pub use events::{InputEvent, OutputEvent, Subscribers};

mod reassembly;
pub use reassembly::SysExAccumulator;

mod device;
pub use device::{DeviceState, InputDevice, MidiDevice, OutputDevice};

mod pool;
pub use pool::DevicePool;

pub mod virtual_port;
pub use virtual_port::{PortEvent, VirtualMidiDriver, VirtualPort};

mod pipe;
pub use pipe::{MidiPipe, PipeEvent, PipeFilter, PipeRewrite};

mod system;
pub use system::{MidiHost, MidiHostBuilder};

pub use midiport_msg::MidiMessage;
