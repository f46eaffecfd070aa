//! System common and system realtime messages.

use serde::{Deserialize, Serialize};
use smallvec::smallvec;
use std::fmt;

use crate::message::ShortBytes;
use crate::{packed, DATA_MAX_VALUE, FOURTEEN_BIT_MAX_VALUE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SysCommonType {
    MidiTimeCode = 0xF1,
    SongPositionPointer = 0xF2,
    SongSelect = 0xF3,
    TuneRequest = 0xF6,
}

impl SysCommonType {
    pub fn from_status(status: u8) -> Option<Self> {
        match status {
            0xF1 => Some(Self::MidiTimeCode),
            0xF2 => Some(Self::SongPositionPointer),
            0xF3 => Some(Self::SongSelect),
            0xF6 => Some(Self::TuneRequest),
            _ => None,
        }
    }
}

/// A system common message.
///
/// Each variant carries only the data bytes its type puts on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SysCommonMessage {
    /// Quarter-frame MTC piece (one data byte).
    MidiTimeCode { data: u8 },
    /// 14-bit position in MIDI beats (sixteenth notes).
    SongPositionPointer { position: u16 },
    SongSelect { song: u8 },
    TuneRequest,
}

impl SysCommonMessage {
    pub fn midi_time_code(data: u8) -> Self {
        Self::MidiTimeCode {
            data: data & DATA_MAX_VALUE,
        }
    }

    pub fn song_position(position: u16) -> Self {
        Self::SongPositionPointer {
            position: position & FOURTEEN_BIT_MAX_VALUE,
        }
    }

    pub fn song_select(song: u8) -> Self {
        Self::SongSelect {
            song: song & DATA_MAX_VALUE,
        }
    }

    /// Build from a type and its raw data bytes; unused bytes are ignored.
    pub fn from_parts(kind: SysCommonType, data1: u8, data2: u8) -> Self {
        match kind {
            SysCommonType::MidiTimeCode => Self::midi_time_code(data1),
            SysCommonType::SongPositionPointer => Self::parse_song_position(data1, data2),
            SysCommonType::SongSelect => Self::song_select(data1),
            SysCommonType::TuneRequest => Self::TuneRequest,
        }
    }

    /// Combine the two 7-bit halves of a song position pointer: `(data2 << 7) | data1`.
    pub fn parse_song_position(data1: u8, data2: u8) -> Self {
        let position =
            (u16::from(data2 & DATA_MAX_VALUE) << 7) | u16::from(data1 & DATA_MAX_VALUE);
        Self::SongPositionPointer { position }
    }

    pub fn kind(&self) -> SysCommonType {
        match self {
            Self::MidiTimeCode { .. } => SysCommonType::MidiTimeCode,
            Self::SongPositionPointer { .. } => SysCommonType::SongPositionPointer,
            Self::SongSelect { .. } => SysCommonType::SongSelect,
            Self::TuneRequest => SysCommonType::TuneRequest,
        }
    }

    #[inline]
    pub fn status(&self) -> u8 {
        self.kind() as u8
    }

    fn data(&self) -> (u8, u8) {
        match *self {
            Self::MidiTimeCode { data } => (data, 0),
            Self::SongPositionPointer { position } => {
                ((position & 0x7F) as u8, ((position >> 7) & 0x7F) as u8)
            }
            Self::SongSelect { song } => (song, 0),
            Self::TuneRequest => (0, 0),
        }
    }

    pub fn packed(&self) -> u32 {
        let (data1, data2) = self.data();
        packed::pack(self.status(), data1, data2)
    }

    pub fn to_bytes(&self) -> ShortBytes {
        let (data1, data2) = self.data();
        let mut bytes: ShortBytes = smallvec![self.status()];
        match packed::data_len(self.status()) {
            1 => bytes.push(data1),
            2 => bytes.extend_from_slice(&[data1, data2]),
            _ => {}
        }
        bytes
    }
}

impl fmt::Display for SysCommonMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MidiTimeCode { data } => write!(f, "MidiTimeCode: {data}"),
            Self::SongPositionPointer { position } => write!(f, "SongPositionPointer: {position}"),
            Self::SongSelect { song } => write!(f, "SongSelect: {song}"),
            Self::TuneRequest => f.write_str("TuneRequest"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SysRealtimeType {
    Clock = 0xF8,
    Start = 0xFA,
    Continue = 0xFB,
    Stop = 0xFC,
    ActiveSense = 0xFE,
    Reset = 0xFF,
}

impl SysRealtimeType {
    pub fn from_status(status: u8) -> Option<Self> {
        match status {
            0xF8 => Some(Self::Clock),
            0xFA => Some(Self::Start),
            0xFB => Some(Self::Continue),
            0xFC => Some(Self::Stop),
            0xFE => Some(Self::ActiveSense),
            0xFF => Some(Self::Reset),
            _ => None,
        }
    }
}

/// A single-status-byte message.
///
/// Devices occasionally emit status bytes outside the standard realtime set; those are kept
/// verbatim and report `kind() == None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SysRealtimeMessage {
    status: u8,
}

impl SysRealtimeMessage {
    pub fn new(kind: SysRealtimeType) -> Self {
        Self { status: kind as u8 }
    }

    /// Wrap any status byte, standard or not.
    pub fn from_status(status: u8) -> Self {
        Self { status }
    }

    #[inline]
    pub fn status(&self) -> u8 {
        self.status
    }

    #[inline]
    pub fn kind(&self) -> Option<SysRealtimeType> {
        SysRealtimeType::from_status(self.status)
    }

    #[inline]
    pub fn packed(&self) -> u32 {
        u32::from(self.status)
    }

    pub fn to_bytes(&self) -> ShortBytes {
        smallvec![self.status]
    }
}

impl From<SysRealtimeType> for SysRealtimeMessage {
    fn from(kind: SysRealtimeType) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for SysRealtimeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{kind:?}"),
            None => write!(f, "Realtime(0x{:02X})", self.status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_song_position_parse() {
        let msg = SysCommonMessage::parse_song_position(0x01, 0x02);
        assert_eq!(msg, SysCommonMessage::SongPositionPointer { position: 0x101 });
    }

    #[test]
    fn test_song_position_bytes() {
        let msg = SysCommonMessage::song_position(16383);
        assert_eq!(msg.to_bytes().as_slice(), &[0xF2, 0x7F, 0x7F]);

        let msg = SysCommonMessage::song_position(1);
        assert_eq!(msg.to_bytes().as_slice(), &[0xF2, 0x01, 0x00]);
    }

    #[test]
    fn test_song_position_is_masked_to_fourteen_bits() {
        let msg = SysCommonMessage::song_position(0xFFFF);
        assert_eq!(msg, SysCommonMessage::SongPositionPointer { position: 0x3FFF });
    }

    #[test]
    fn test_sys_common_lengths() {
        assert_eq!(SysCommonMessage::midi_time_code(0x35).to_bytes().as_slice(), &[0xF1, 0x35]);
        assert_eq!(SysCommonMessage::song_select(7).to_bytes().as_slice(), &[0xF3, 7]);
        assert_eq!(SysCommonMessage::TuneRequest.to_bytes().as_slice(), &[0xF6]);
    }

    #[test]
    fn test_from_parts_ignores_unused_bytes() {
        let msg = SysCommonMessage::from_parts(SysCommonType::TuneRequest, 5, 6);
        assert_eq!(msg, SysCommonMessage::TuneRequest);
        let msg = SysCommonMessage::from_parts(SysCommonType::SongSelect, 5, 6);
        assert_eq!(msg.packed(), 0x05F3);
    }

    #[test]
    fn test_realtime_known_and_unknown() {
        let start = SysRealtimeMessage::new(SysRealtimeType::Start);
        assert_eq!(start.status(), 0xFA);
        assert_eq!(start.kind(), Some(SysRealtimeType::Start));
        assert_eq!(start.to_string(), "Start");

        let odd = SysRealtimeMessage::from_status(0xF9);
        assert_eq!(odd.kind(), None);
        assert_eq!(odd.to_bytes().as_slice(), &[0xF9]);
        assert_eq!(odd.to_string(), "Realtime(0xF9)");
    }
}
