//! Property tests for the packed codec and message classification.

use midiport_msg::{
    packed, ChannelCommand, ChannelMessage, MessageBuilder, MidiMessage, SysCommonMessage,
    SysExMessage, SysRealtimeMessage,
};
use proptest::prelude::*;

fn command_strategy() -> impl Strategy<Value = ChannelCommand> {
    prop_oneof![
        Just(ChannelCommand::NoteOff),
        Just(ChannelCommand::NoteOn),
        Just(ChannelCommand::PolyPressure),
        Just(ChannelCommand::Controller),
        Just(ChannelCommand::ProgramChange),
        Just(ChannelCommand::ChannelPressure),
        Just(ChannelCommand::PitchWheel),
    ]
}

fn sys_common_strategy() -> impl Strategy<Value = SysCommonMessage> {
    prop_oneof![
        (0u8..=0x7F).prop_map(SysCommonMessage::midi_time_code),
        (0u16..=0x3FFF).prop_map(SysCommonMessage::song_position),
        (0u8..=0x7F).prop_map(SysCommonMessage::song_select),
        Just(SysCommonMessage::TuneRequest),
    ]
}

proptest! {
    /// Property: packing then rebuilding a channel message yields the same message
    #[test]
    fn prop_channel_round_trip(
        command in command_strategy(),
        channel in 0u8..16,
        data1 in 0u8..=0x7F,
        data2 in 0u8..=0x7F,
    ) {
        let msg = ChannelMessage::new(command, channel, data1, data2);
        prop_assert_eq!(MessageBuilder::build(msg.packed()), MidiMessage::Channel(msg));
    }

    /// Property: wire bytes decode back to the same channel message
    #[test]
    fn prop_channel_wire_round_trip(
        command in command_strategy(),
        channel in any::<u8>(),
        data1 in any::<u8>(),
        data2 in any::<u8>(),
    ) {
        let msg = MidiMessage::from(ChannelMessage::new(command, channel, data1, data2));
        let bytes = msg.to_bytes();
        prop_assert_eq!(bytes.len(), 1 + command.max_data_bytes());
        prop_assert_eq!(MidiMessage::from_bytes(&bytes), Some(msg));
    }

    /// Property: system common messages survive the packed form
    #[test]
    fn prop_sys_common_round_trip(msg in sys_common_strategy()) {
        prop_assert_eq!(MessageBuilder::build(msg.packed()), MidiMessage::SysCommon(msg));
    }

    /// Property: every 14-bit song position survives serialization
    #[test]
    fn prop_song_position_round_trip(position in 0u16..=16383) {
        let msg = SysCommonMessage::song_position(position);
        let bytes = msg.to_bytes();
        let back = SysCommonMessage::parse_song_position(bytes[1], bytes[2]);
        prop_assert_eq!(back, SysCommonMessage::SongPositionPointer { position });
    }

    /// Property: any status byte outside the channel and system common sets is kept verbatim
    #[test]
    fn prop_unknown_status_is_wrapped(status in any::<u8>()) {
        prop_assume!(!(0x80..=0xEF).contains(&status));
        prop_assume!(![0xF1, 0xF2, 0xF3, 0xF6].contains(&status));
        let msg = MessageBuilder::build(u32::from(status));
        prop_assert_eq!(msg, MidiMessage::SysRealtime(SysRealtimeMessage::from_status(status)));
    }

    /// Property: classification only looks at the low three bytes
    #[test]
    fn prop_high_byte_is_ignored(word in any::<u32>()) {
        prop_assert_eq!(MessageBuilder::build(word), MessageBuilder::build(word & 0x00FF_FFFF));
        prop_assert_eq!(packed::status(word), (word & 0xFF) as u8);
    }

    /// Property: SysEx construction accepts exactly the F0/F7 leading bytes
    #[test]
    fn prop_sysex_leading_byte(data in prop::collection::vec(any::<u8>(), 1..64)) {
        let valid = data[0] == 0xF0 || data[0] == 0xF7;
        prop_assert_eq!(SysExMessage::from_slice(&data).is_ok(), valid);
    }
}
