//! Channel voice messages.

use serde::{Deserialize, Serialize};
use smallvec::smallvec;
use std::fmt;

use crate::message::ShortBytes;
use crate::packed;
use crate::{CHANNEL_MAX_VALUE, DATA_MAX_VALUE};

/// Upper nibble of a channel message status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChannelCommand {
    NoteOff = 0x80,
    NoteOn = 0x90,
    PolyPressure = 0xA0,
    Controller = 0xB0,
    ProgramChange = 0xC0,
    ChannelPressure = 0xD0,
    PitchWheel = 0xE0,
}

impl ChannelCommand {
    /// Command encoded in a status byte, or `None` outside `0x80..=0xEF`.
    pub fn from_status(status: u8) -> Option<Self> {
        match status & 0xF0 {
            0x80 => Some(Self::NoteOff),
            0x90 => Some(Self::NoteOn),
            0xA0 => Some(Self::PolyPressure),
            0xB0 => Some(Self::Controller),
            0xC0 => Some(Self::ProgramChange),
            0xD0 => Some(Self::ChannelPressure),
            0xE0 => Some(Self::PitchWheel),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Data bytes carried on the wire: 1 for program change and channel pressure, else 2.
    #[inline]
    pub fn max_data_bytes(self) -> usize {
        match self {
            Self::ProgramChange | Self::ChannelPressure => 1,
            _ => 2,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::NoteOff => "NoteOff",
            Self::NoteOn => "NoteOn",
            Self::PolyPressure => "PolyPressure",
            Self::Controller => "Controller",
            Self::ProgramChange => "ProgramChange",
            Self::ChannelPressure => "ChannelPressure",
            Self::PitchWheel => "PitchWheel",
        }
    }
}

impl fmt::Display for ChannelCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A channel voice message.
///
/// Out-of-range fields are masked the way hardware truncates them: the channel keeps its low
/// nibble and data bytes keep their low seven bits. For one-data-byte commands `data2` is
/// always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelMessage {
    command: ChannelCommand,
    channel: u8,
    data1: u8,
    data2: u8,
}

impl ChannelMessage {
    pub fn new(command: ChannelCommand, channel: u8, data1: u8, data2: u8) -> Self {
        let data2 = if command.max_data_bytes() == 1 {
            0
        } else {
            data2 & DATA_MAX_VALUE
        };
        Self {
            command,
            channel: channel & CHANNEL_MAX_VALUE,
            data1: data1 & DATA_MAX_VALUE,
            data2,
        }
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(ChannelCommand::NoteOn, channel, note, velocity)
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(ChannelCommand::NoteOff, channel, note, velocity)
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::new(ChannelCommand::Controller, channel, controller, value)
    }

    pub fn program_change(channel: u8, program: u8) -> Self {
        Self::new(ChannelCommand::ProgramChange, channel, program, 0)
    }

    pub fn channel_pressure(channel: u8, pressure: u8) -> Self {
        Self::new(ChannelCommand::ChannelPressure, channel, pressure, 0)
    }

    /// `value`: unsigned 14-bit, 8192 = center.
    pub fn pitch_wheel(channel: u8, value: u16) -> Self {
        Self::new(
            ChannelCommand::PitchWheel,
            channel,
            (value & 0x7F) as u8,
            ((value >> 7) & 0x7F) as u8,
        )
    }

    /// Decode a packed short message. Returns `None` when the status is not a channel status.
    pub fn from_packed(message: u32) -> Option<Self> {
        let status = packed::status(message);
        let command = ChannelCommand::from_status(status)?;
        Some(Self::new(
            command,
            status & CHANNEL_MAX_VALUE,
            packed::data1(message),
            packed::data2(message),
        ))
    }

    #[inline]
    pub fn command(&self) -> ChannelCommand {
        self.command
    }

    #[inline]
    pub fn channel(&self) -> u8 {
        self.channel
    }

    #[inline]
    pub fn data1(&self) -> u8 {
        self.data1
    }

    #[inline]
    pub fn data2(&self) -> u8 {
        self.data2
    }

    #[inline]
    pub fn status(&self) -> u8 {
        self.command.as_u8() | self.channel
    }

    #[inline]
    pub fn max_data_bytes(&self) -> usize {
        self.command.max_data_bytes()
    }

    #[inline]
    pub fn packed(&self) -> u32 {
        packed::pack(self.status(), self.data1, self.data2)
    }

    pub fn to_bytes(&self) -> ShortBytes {
        let mut bytes: ShortBytes = smallvec![self.status(), self.data1];
        if self.max_data_bytes() == 2 {
            bytes.push(self.data2);
        }
        bytes
    }
}

impl fmt::Display for ChannelMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} (Ch{}): {}",
            self.command,
            self.data1,
            self.channel + 1,
            self.data2
        )
    }
}
