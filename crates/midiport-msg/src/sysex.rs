//! System exclusive messages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Leading byte of a SysEx message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SysExType {
    /// `0xF0`: a complete message, or the first packet of a split one.
    Start = 0xF0,
    /// `0xF7`: a continuation packet (or escaped realtime data).
    Continuation = 0xF7,
}

/// Terminator of a complete SysEx message.
pub(crate) const SYSEX_END: u8 = 0xF7;

/// A system exclusive message with its receive timestamp.
///
/// The data always starts with `0xF0` or `0xF7`. Whether it also ends with `0xF7` is up to the
/// sender; [`SysExMessage::is_complete`] reports it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SysExMessage {
    data: Vec<u8>,
    timestamp: u32,
}

impl SysExMessage {
    pub fn new(data: Vec<u8>, timestamp: u32) -> Result<Self> {
        match data.first() {
            None => Err(Error::InvalidSysExData("message is empty".into())),
            Some(&first) if first == SysExType::Start as u8 || first == SYSEX_END => {
                Ok(Self { data, timestamp })
            }
            Some(&first) => Err(Error::InvalidSysExData(format!(
                "first byte 0x{first:02X} is neither 0xF0 nor 0xF7"
            ))),
        }
    }

    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Self::new(data.to_vec(), 0)
    }

    pub fn sysex_type(&self) -> SysExType {
        if self.data[0] == SYSEX_END {
            SysExType::Continuation
        } else {
            SysExType::Start
        }
    }

    /// `true` when the message opens with `0xF0` and closes with `0xF7`.
    pub fn is_complete(&self) -> bool {
        self.data.len() > 1
            && self.data[0] == SysExType::Start as u8
            && self.data[self.data.len() - 1] == SYSEX_END
    }

    pub fn get(&self, index: usize) -> Result<u8> {
        self.data.get(index).copied().ok_or(Error::IndexOutOfRange {
            index,
            len: self.data.len(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Never true: construction rejects empty data.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, u8> {
        self.data.iter()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl AsRef<[u8]> for SysExMessage {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl<'a> IntoIterator for &'a SysExMessage {
    type Item = &'a u8;
    type IntoIter = std::slice::Iter<'a, u8>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

impl TryFrom<Vec<u8>> for SysExMessage {
    type Error = Error;

    fn try_from(data: Vec<u8>) -> Result<Self> {
        Self::new(data, 0)
    }
}

impl fmt::Display for SysExMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.data.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

/// Parse whitespace-separated hex bytes, e.g. `"F0 7E 7F 06 01 F7"`.
impl FromStr for SysExMessage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let data = s
            .split_whitespace()
            .map(|token| {
                u8::from_str_radix(token, 16)
                    .map_err(|_| Error::InvalidSysExData(format!("'{token}' is not a hex byte")))
            })
            .collect::<Result<Vec<u8>>>()?;
        Self::new(data, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_first_byte() {
        let err = SysExMessage::new(vec![0x90, 0x01], 0).unwrap_err();
        assert!(matches!(err, Error::InvalidSysExData(_)));
        assert!(SysExMessage::new(Vec::new(), 0).is_err());
    }

    #[test]
    fn test_accepts_start_and_continuation() {
        let start = SysExMessage::new(vec![0xF0, 0x01, 0xF7], 12).unwrap();
        assert_eq!(start.sysex_type(), SysExType::Start);
        assert_eq!(start.timestamp(), 12);
        assert!(start.is_complete());

        let cont = SysExMessage::new(vec![0xF7, 0x02], 0).unwrap();
        assert_eq!(cont.sysex_type(), SysExType::Continuation);
        assert!(!cont.is_complete());
    }

    #[test]
    fn test_single_start_byte_is_not_complete() {
        let msg = SysExMessage::from_slice(&[0xF0]).unwrap();
        assert!(!msg.is_complete());
    }

    #[test]
    fn test_indexed_access() {
        let msg = SysExMessage::from_slice(&[0xF0, 0x43, 0xF7]).unwrap();
        assert_eq!(msg.get(1).unwrap(), 0x43);
        assert_eq!(
            msg.get(3).unwrap_err(),
            Error::IndexOutOfRange { index: 3, len: 3 }
        );
        assert_eq!(msg.iter().copied().collect::<Vec<_>>(), vec![0xF0, 0x43, 0xF7]);
    }

    #[test]
    fn test_hex_parse_and_display() {
        let msg: SysExMessage = "F0 7e 7F 06 01 F7".parse().unwrap();
        assert_eq!(msg.as_bytes(), &[0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7]);
        assert_eq!(msg.to_string(), "F0 7E 7F 06 01 F7");

        assert!("F0 ZZ".parse::<SysExMessage>().is_err());
        assert!("12 34".parse::<SysExMessage>().is_err());
    }
}
