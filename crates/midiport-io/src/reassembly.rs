//! SysEx reassembly from receive-buffer fragments.

use midiport_msg::SysExMessage;
use tracing::trace;

const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;

/// Collects SysEx fragments until a complete `F0 .. F7` message is buffered.
///
/// Fragments are appended as they arrive. Once the buffer holds more than one byte, opens with
/// `0xF0` and closes with `0xF7`, the message is handed out and the buffer starts over.
///
/// A fragment that itself starts with `0xF0` begins a new message, so leftovers of a broken
/// one (a stray `0xF7` continuation, a message cut short) never hold up the next.
#[derive(Debug, Default)]
pub struct SysExAccumulator {
    data: Vec<u8>,
}

impl SysExAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment. Returns the completed message, stamped with `timestamp`, if this
    /// fragment finished one.
    pub fn push(&mut self, fragment: &[u8], timestamp: u32) -> Option<SysExMessage> {
        if fragment.first() == Some(&SYSEX_START) && !self.data.is_empty() {
            trace!("Discarding {} bytes of unfinished SysEx", self.data.len());
            self.data.clear();
        }
        self.data.extend_from_slice(fragment);
        if !self.is_complete() {
            return None;
        }
        let data = std::mem::take(&mut self.data);
        SysExMessage::new(data, timestamp).ok()
    }

    fn is_complete(&self) -> bool {
        self.data.len() > 1
            && self.data[0] == SYSEX_START
            && self.data[self.data.len() - 1] == SYSEX_END
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
