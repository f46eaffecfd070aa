//! The `MidiMessage` sum type.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::builder::MessageBuilder;
use crate::channel::ChannelMessage;
use crate::packed;
use crate::sysex::{SysExMessage, SysExType};
use crate::system::{SysCommonMessage, SysRealtimeMessage};

/// Wire bytes of a short message (never more than three).
pub type ShortBytes = SmallVec<[u8; 3]>;

/// Any MIDI 1.0 message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MidiMessage {
    Channel(ChannelMessage),
    SysCommon(SysCommonMessage),
    SysRealtime(SysRealtimeMessage),
    SysEx(SysExMessage),
}

impl MidiMessage {
    /// Decode raw wire bytes.
    ///
    /// A leading `0xF0` is taken as SysEx. Otherwise one to four bytes are packed little end
    /// first and classified by [`MessageBuilder`]. Any other length yields `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.first() == Some(&(SysExType::Start as u8)) {
            return SysExMessage::from_slice(bytes).ok().map(Self::SysEx);
        }
        packed::from_bytes(bytes).map(MessageBuilder::build)
    }

    pub fn status(&self) -> u8 {
        match self {
            Self::Channel(m) => m.status(),
            Self::SysCommon(m) => m.status(),
            Self::SysRealtime(m) => m.status(),
            Self::SysEx(m) => m.as_bytes()[0],
        }
    }

    /// The packed form, or `None` for SysEx.
    pub fn packed(&self) -> Option<u32> {
        match self {
            Self::Channel(m) => Some(m.packed()),
            Self::SysCommon(m) => Some(m.packed()),
            Self::SysRealtime(m) => Some(m.packed()),
            Self::SysEx(_) => None,
        }
    }

    #[inline]
    pub fn is_short(&self) -> bool {
        !matches!(self, Self::SysEx(_))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Channel(m) => m.to_bytes().to_vec(),
            Self::SysCommon(m) => m.to_bytes().to_vec(),
            Self::SysRealtime(m) => m.to_bytes().to_vec(),
            Self::SysEx(m) => m.as_bytes().to_vec(),
        }
    }

    /// Uppercase hex bytes separated by single spaces, e.g. `"90 3C 64"`.
    pub fn to_hex_string(&self) -> String {
        let bytes = self.to_bytes();
        let mut out = String::with_capacity(bytes.len() * 3);
        for (i, byte) in bytes.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&format!("{byte:02X}"));
        }
        out
    }
}

impl From<ChannelMessage> for MidiMessage {
    fn from(m: ChannelMessage) -> Self {
        Self::Channel(m)
    }
}

impl From<SysCommonMessage> for MidiMessage {
    fn from(m: SysCommonMessage) -> Self {
        Self::SysCommon(m)
    }
}

impl From<SysRealtimeMessage> for MidiMessage {
    fn from(m: SysRealtimeMessage) -> Self {
        Self::SysRealtime(m)
    }
}

impl From<SysExMessage> for MidiMessage {
    fn from(m: SysExMessage) -> Self {
        Self::SysEx(m)
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(m) => fmt::Display::fmt(m, f),
            Self::SysCommon(m) => fmt::Display::fmt(m, f),
            Self::SysRealtime(m) => fmt::Display::fmt(m, f),
            Self::SysEx(m) => write!(f, "SysEx: {m}"),
        }
    }
}
