//! Hardware integration tests over a loopback MIDI port.
//!
//! Requires a loopback port (IAC Driver on macOS, `snd-virmidi` or a midir virtual port on
//! Linux) whose name contains `MIDIPORT_LOOPBACK` (default "IAC").
//! All tests are `#[ignore]` so CI doesn't fail without hardware.
//!
//! Run with:
//!   cargo test -p midiport-io --test hardware --features midi-io -- --ignored --test-threads=1

#![cfg(feature = "midi-io")]

mod helpers;

use helpers::{init_tracing, recv};
use midiport_io::{DeviceInfo, InputEvent, MidiDevice, MidiHost};
use midiport_msg::{ChannelMessage, MidiMessage, SysExMessage};
use std::thread;
use std::time::Duration;

const SETTLE: Duration = Duration::from_millis(200);

fn loopback_name() -> String {
    std::env::var("MIDIPORT_LOOPBACK").unwrap_or_else(|_| "IAC".to_string())
}

fn find(devices: &[DeviceInfo]) -> String {
    let wanted = loopback_name();
    devices
        .iter()
        .find(|d| d.name.contains(&wanted))
        .map(|d| d.name.clone())
        .unwrap_or_else(|| panic!("no device named like '{wanted}'"))
}

fn setup() -> MidiHost {
    init_tracing();
    MidiHost::builder()
        .midir("midiport-hardware-test")
        .build()
        .expect("Failed to create MIDI host")
}

#[test]
#[ignore]
fn test_hardware_enumeration() {
    let host = setup();
    let inputs = host.list_inputs();
    let outputs = host.list_outputs();
    println!("inputs: {inputs:#?}\noutputs: {outputs:#?}");
    find(&inputs);
    find(&outputs);
}

#[test]
#[ignore]
fn test_hardware_note_round_trip() {
    let host = setup();
    let input = host.open_input(&find(&host.list_inputs())).unwrap();
    let output = host.open_output(&find(&host.list_outputs())).unwrap();
    let events = input.subscribe();
    thread::sleep(SETTLE);

    let note = ChannelMessage::note_on(2, 64, 99);
    output.send(&MidiMessage::from(note)).unwrap();
    assert_eq!(recv(&events), InputEvent::MessageReceived(note.into()));

    host.close_all().unwrap();
}

#[test]
#[ignore]
fn test_hardware_sysex_round_trip() {
    let host = setup();
    let input = host.open_input(&find(&host.list_inputs())).unwrap();
    let output = host.open_output(&find(&host.list_outputs())).unwrap();
    let events = input.subscribe();
    thread::sleep(SETTLE);

    let bytes = vec![0xF0, 0x7D, 0x01, 0x02, 0x03, 0xF7];
    let sysex = SysExMessage::new(bytes.clone(), 0).unwrap();
    output.send(&MidiMessage::SysEx(sysex)).unwrap();

    match recv(&events) {
        InputEvent::MessageReceived(MidiMessage::SysEx(received)) => {
            assert_eq!(received.as_bytes(), &bytes[..]);
        }
        other => panic!("unexpected {other:?}"),
    }

    input.reset().unwrap();
    host.close_all().unwrap();
}
