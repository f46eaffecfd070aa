//! MIDI 1.0 message model for midiport.
//!
//! Pure data and codec logic, no I/O:
//!
//! - **Packed short messages**: status in the low byte, data1 above it, data2 above that
//! - **Typed variants**: channel, system common, system realtime and system exclusive
//! - **Message builder**: classifies a packed status value into the right variant
//!
//! # Example
//!
//! ```
//! use midiport_msg::{ChannelCommand, ChannelMessage, MessageBuilder, MidiMessage};
//!
//! let note = ChannelMessage::new(ChannelCommand::NoteOn, 3, 60, 100);
//! let packed = note.packed();
//! assert_eq!(MessageBuilder::build(packed), MidiMessage::Channel(note));
//! assert_eq!(MidiMessage::from(note).to_hex_string(), "93 3C 64");
//! ```

pub mod error;
pub use error::{Error, Result};

mod builder;
pub use builder::MessageBuilder;

mod channel;
pub use channel::{ChannelCommand, ChannelMessage};

mod message;
pub use message::{MidiMessage, ShortBytes};

pub mod packed;

mod sysex;
pub use sysex::{SysExMessage, SysExType};

mod system;
pub use system::{SysCommonMessage, SysCommonType, SysRealtimeMessage, SysRealtimeType};

/// Highest value a 7-bit data byte may carry.
pub const DATA_MAX_VALUE: u8 = 0x7F;

/// Highest zero-based MIDI channel.
pub const CHANNEL_MAX_VALUE: u8 = 0x0F;

/// Highest 14-bit value (song position, pitch wheel).
pub const FOURTEEN_BIT_MAX_VALUE: u16 = 0x3FFF;
