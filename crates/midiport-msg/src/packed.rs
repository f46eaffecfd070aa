//! Packed short-message helpers.
//!
//! A short message travels to and from the transport as a single `u32`:
//!
//! ```text
//! bits 0..8   status
//! bits 8..16  data1
//! bits 16..24 data2
//! ```

#[inline]
pub fn pack(status: u8, data1: u8, data2: u8) -> u32 {
    u32::from(status) | (u32::from(data1) << 8) | (u32::from(data2) << 16)
}

#[inline]
pub fn status(packed: u32) -> u8 {
    (packed & 0xFF) as u8
}

#[inline]
pub fn data1(packed: u32) -> u8 {
    ((packed >> 8) & 0xFF) as u8
}

#[inline]
pub fn data2(packed: u32) -> u8 {
    ((packed >> 16) & 0xFF) as u8
}

/// Rebuild a packed value from 1-4 raw bytes, little end first.
///
/// Missing bytes are zero. Returns `None` for empty input or more than four bytes.
pub fn from_bytes(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 4 {
        return None;
    }
    let mut word = [0u8; 4];
    word[..bytes.len()].copy_from_slice(bytes);
    Some(u32::from_le_bytes(word))
}

/// Number of data bytes that follow `status` on the wire.
///
/// SysEx start/end and undefined status values report zero.
pub fn data_len(status: u8) -> usize {
    match status & 0xF0 {
        0x80 | 0x90 | 0xA0 | 0xB0 | 0xE0 => 2,
        0xC0 | 0xD0 => 1,
        _ => match status {
            0xF1 | 0xF3 => 1,
            0xF2 => 2,
            _ => 0,
        },
    }
}
