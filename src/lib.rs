//! # midiport - Host-side MIDI device access
//!
//! Typed MIDI 1.0 messages and the device plumbing to move them in and out of a host.
//!
//! ## Architecture
//!
//! midiport is an umbrella crate that coordinates:
//! - **midiport-msg** - Message model (packed short messages, SysEx, message builder)
//! - **midiport-io** - Device I/O (transport seam, device lifecycle, SysEx reassembly, pools,
//!   virtual ports, pipes)
//!
//! ## Quick Start
//!
//! ```
//! use midiport::prelude::*;
//!
//! let host = MidiHost::builder().build()?;
//! let _port = host.create_virtual_port("Loop")?;
//!
//! let input = host.open_input("Loop")?;
//! let output = host.open_output("Loop")?;
//! let events = input.subscribe();
//!
//! output.send(&ChannelMessage::note_on(0, 60, 100).into())?;
//! # let _ = events;
//! host.close_all()?;
//! # Ok::<(), midiport::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Message model, virtual driver, pools and pipes
//! - `midi-io` - Hardware MIDI ports through midir
//! - `full` - Everything enabled

/// Re-export of midiport-msg for direct access
pub use midiport_msg as msg;

/// Re-export of midiport-io for direct access
pub use midiport_io as io;

// Messages
pub use midiport_msg::{
    ChannelCommand, ChannelMessage, MessageBuilder, MidiMessage, ShortBytes, SysCommonMessage,
    SysCommonType, SysExMessage, SysExType, SysRealtimeMessage, SysRealtimeType,
};

// Devices
pub use midiport_io::{
    DeviceConfig, DeviceInfo, DevicePool, DeviceState, DeviceType, InputDevice, InputEvent,
    MidiDevice, MidiHost, MidiHostBuilder, MidiPipe, OutputDevice, OutputEvent, PipeEvent,
    PortEvent, Transport, TransportCode, VirtualMidiDriver, VirtualPort, VirtualPortConfig,
};

#[cfg(feature = "midi-io")]
pub use midiport_io::MidirTransport;

pub mod error;
pub use error::{Error, Result};

/// Convenience prelude for common imports
pub mod prelude {
    // Entry point
    pub use crate::{MidiHost, MidiHostBuilder};

    // Messages
    pub use crate::{ChannelCommand, ChannelMessage, MidiMessage, SysExMessage};

    // Devices
    pub use crate::{InputEvent, MidiDevice, MidiPipe, VirtualPort};
}
