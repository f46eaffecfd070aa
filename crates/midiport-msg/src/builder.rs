//! Classification of packed short messages.

use crate::channel::ChannelMessage;
use crate::message::MidiMessage;
use crate::packed;
use crate::system::{SysCommonMessage, SysCommonType, SysRealtimeMessage};

/// Turns a packed status/data word into the matching [`MidiMessage`] variant.
///
/// Never fails: status bytes outside the channel and system common ranges are wrapped as
/// realtime messages, known or not.
pub struct MessageBuilder;

impl MessageBuilder {
    pub fn build(message: u32) -> MidiMessage {
        Self::build_parts(
            packed::status(message),
            packed::data1(message),
            packed::data2(message),
        )
    }

    pub fn build_parts(status: u8, data1: u8, data2: u8) -> MidiMessage {
        if let Some(channel) = ChannelMessage::from_packed(packed::pack(status, data1, data2)) {
            return MidiMessage::Channel(channel);
        }
        match SysCommonType::from_status(status) {
            Some(kind) => MidiMessage::SysCommon(SysCommonMessage::from_parts(kind, data1, data2)),
            None => MidiMessage::SysRealtime(SysRealtimeMessage::from_status(status)),
        }
    }
}
