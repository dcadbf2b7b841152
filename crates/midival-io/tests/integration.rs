//! Integration tests for midival-io.
//!
//! These tests exercise multi-component workflows over virtual ports, without
//! hardware MIDI devices.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use midival_io::{
    DeviceFilter, InputEvent, InputEventKind, MidiContext, MidiInput, MidiInputOptions,
    MidiOutput, Pattern, VirtualInputPort, VirtualMidiAccess, VirtualOutputPort,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn hex(messages: &[Vec<u8>]) -> String {
    messages
        .iter()
        .map(|m| {
            m.iter()
                .map(|b| format!("{b:02X}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Output wired back into an input, as a cable from OUT to IN would be.
fn loopback() -> (Arc<VirtualOutputPort>, MidiOutput, MidiInput) {
    let in_port = Arc::new(VirtualInputPort::new("loop-in", "Loopback"));
    let out_port = Arc::new(VirtualOutputPort::new("loop-out", "Loopback"));
    out_port.connect_loopback(Arc::clone(&in_port));
    let output = MidiOutput::new(out_port.clone());
    let input = MidiInput::new(in_port, MidiInputOptions::default().with_clock_tempo(true)).unwrap();
    (out_port, output, input)
}

// ---------------------------------------------------------------------------
// 1. Output -> input round trip
// ---------------------------------------------------------------------------

#[test]
fn test_channel_messages_round_trip() {
    let (_port, output, input) = loopback();
    let events = Arc::new(Mutex::new(Vec::new()));

    for kind in [
        InputEventKind::NoteOn,
        InputEventKind::NoteOff,
        InputEventKind::ControlChange,
        InputEventKind::ProgramChange,
        InputEventKind::PitchBend,
    ] {
        let events = Arc::clone(&events);
        let _ = input.on(kind, move |event| events.lock().push(event.clone()));
    }

    output.set_channel(5).unwrap();
    output.send_note_on(60, 100, None).unwrap();
    output.send_control_change(7, 90, None).unwrap();
    output.send_program_change(12, Some(9)).unwrap();
    output.send_pitch_bend(0.0, None).unwrap();
    output.send_note_off(60, None).unwrap();

    let events = events.lock();
    assert_eq!(events.len(), 5);
    let note_on = events[0].as_note().unwrap();
    assert_eq!((note_on.channel, note_on.note, note_on.velocity), (5, 60, 100));
    let cc = events[1].as_control_change().unwrap();
    assert_eq!((cc.channel, cc.control, cc.value), (5, 7, 90));
    assert_eq!(events[2].as_program_change().unwrap().channel, 9);
    assert_eq!(events[3].as_pitch_bend().unwrap().channel, 5);
    assert!(matches!(events[4], InputEvent::NoteOff(_)));
}

#[test]
fn test_pitch_bend_sensitivity_reaches_input() {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();

    let (port, output, input) = loopback();
    let received = Arc::new(Mutex::new(Vec::new()));
    let received_clone = Arc::clone(&received);
    let _sub = input.on_pitch_bend_sensitivity(move |event| {
        received_clone
            .lock()
            .push((event.channel, event.msb, event.lsb))
    });

    rt.block_on(output.set_pitch_bend_sensitivity_with_delay(
        12,
        50,
        Some(3),
        Duration::from_millis(1),
    ))
    .unwrap();

    assert_eq!(
        *received.lock(),
        vec![(3, Some(12), None), (3, None, Some(50))]
    );
    insta::assert_snapshot!(
        hex(&port.sent()),
        @"B2 65 00 | B2 64 00 | B2 06 0C | B2 26 32 | B2 65 7F | B2 64 7F"
    );
}

#[test]
fn test_data_entry_after_null_is_dropped() {
    let (_port, output, input) = loopback();
    let count = Arc::new(Mutex::new(0));
    let count_clone = Arc::clone(&count);
    let _sub = input.on_registered_parameter(move |_| *count_clone.lock() += 1);

    output.send_rpn_null(Some(1)).unwrap();
    output.send_rp_data_msb(64, Some(1)).unwrap();
    assert_eq!(*count.lock(), 0);
}

#[test]
fn test_clock_stream_drives_tempo() {
    let in_port = Arc::new(VirtualInputPort::new("clock-in", "Clock"));
    let input = MidiInput::new(
        in_port.clone(),
        MidiInputOptions::default().with_clock_tempo(true),
    )
    .unwrap();

    let starts = Arc::new(Mutex::new(Vec::new()));
    let starts_clone = Arc::clone(&starts);
    let _sub = input.on_clock_start(move |time| starts_clone.lock().push(time));

    in_port.inject(0.0, &[0xFA]);
    // 120 BPM: 24 pulses per quarter note, 500 ms per quarter note
    let pulse_ms = 500.0 / 24.0;
    for i in 0..48 {
        in_port.inject(i as f64 * pulse_ms, &[0xF8]);
    }

    assert_eq!(*starts.lock(), vec![0.0]);
    approx::assert_relative_eq!(input.tempo().unwrap(), 120.0, epsilon = 0.01);
}

// ---------------------------------------------------------------------------
// 2. Context: lookup and hot-plug
// ---------------------------------------------------------------------------

#[test]
fn test_context_lookup_and_hotplug() {
    let access = Arc::new(VirtualMidiAccess::new());
    let keyboard = access.add_input(
        VirtualInputPort::new("in-1", "Keystation 49").with_manufacturer("M-Audio"),
    );
    access.add_output(VirtualOutputPort::new("out-1", "Synth"));

    let context = MidiContext::new(access.clone());
    let input = context
        .input_from_name("Keystation 49", MidiInputOptions::default())
        .unwrap();
    assert_eq!(input.manufacturer(), "M-Audio");
    assert!(context.output_from_id("out-1").is_ok());
    assert!(context.output_from_name("Missing").is_err());

    let opened = Arc::new(Mutex::new(Vec::new()));
    let opened_clone = Arc::clone(&opened);
    let filter = DeviceFilter::new().with_name(Pattern::regex("^Keystation").unwrap());
    let _sub = context.on_input_device_with_config_connected(
        filter,
        MidiInputOptions::default(),
        move |input| opened_clone.lock().push(input.id().to_string()),
        true,
    );
    assert_eq!(*opened.lock(), vec!["in-1".to_string()]);

    access.add_input(VirtualInputPort::new("in-2", "Launchpad"));
    access.add_input(VirtualInputPort::new("in-3", "Keystation 61"));
    assert_eq!(*opened.lock(), vec!["in-1".to_string(), "in-3".to_string()]);

    let notes = Arc::new(Mutex::new(Vec::new()));
    let notes_clone = Arc::clone(&notes);
    let _notes = input.on_all_note_on(move |msg| notes_clone.lock().push(msg.note));
    keyboard.inject(0.0, &[0x90, 48, 80]);
    assert_eq!(*notes.lock(), vec![48]);
}

#[test]
fn test_disconnect_releases_port_listener() {
    let port = Arc::new(VirtualInputPort::new("in", "Input"));
    let input = MidiInput::new(port.clone(), MidiInputOptions::default()).unwrap();
    assert_eq!(port.listener_count(), 1);

    input.disconnect();
    assert_eq!(port.listener_count(), 0);
    assert_eq!(port.inject(0.0, &[0x90, 60, 100]), 0);
}

// ---------------------------------------------------------------------------
// 3. MPE over a loopback cable
// ---------------------------------------------------------------------------

#[cfg(feature = "mpe")]
mod mpe {
    use super::*;
    use midival_io::mpe::{MpeInput, MpeOutput, MpeZoneSizes};

    #[tokio::test(start_paused = true)]
    async fn test_mpe_output_configures_mpe_input() {
        let (_port, output, input) = loopback();
        let mpe_in = MpeInput::new(input, MpeZoneSizes::default());
        assert!(!mpe_in.is_mpe_enabled());

        let mpe_out = MpeOutput::connect(output, MpeZoneSizes::new(3, 0))
            .await
            .unwrap();
        let in_zone = mpe_in.lower_zone().unwrap();
        assert_eq!(in_zone.member_channels(), 2..=4);
        assert!(mpe_in.upper_zone().is_none());

        let timbres = Arc::new(Mutex::new(Vec::new()));
        let timbres_clone = Arc::clone(&timbres);
        let _sub = in_zone.on_member_timbre(move |value| {
            timbres_clone
                .lock()
                .push((value.channel, value.member, value.master))
        });

        let out_zone = mpe_out.lower_zone().unwrap();
        out_zone.set_master_timbre(10).unwrap();
        let first = out_zone.send_note_on(60, 100).unwrap();
        let second = out_zone.send_note_on(64, 100).unwrap();
        first.set_y(70).unwrap();
        second.set_y(90).unwrap();

        assert_eq!(*timbres.lock(), vec![(2, 70, 10), (3, 90, 10)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mpe_output_disconnect_removes_input_zones() {
        let (_port, output, input) = loopback();
        let mpe_in = MpeInput::new(input, MpeZoneSizes::default());

        let updates = Arc::new(Mutex::new(Vec::new()));
        let updates_clone = Arc::clone(&updates);
        let _sub = mpe_in.on_upper_zone_update(move |zone| {
            updates_clone.lock().push(zone.is_some())
        });

        let mut mpe_out = MpeOutput::connect(output, MpeZoneSizes::new(0, 6))
            .await
            .unwrap();
        assert!(mpe_in.upper_zone().is_some());

        mpe_out.disconnect().await.unwrap();
        assert!(!mpe_in.is_mpe_enabled());
        assert_eq!(*updates.lock(), vec![true, false]);
    }
}
