//! End-to-end tests through the umbrella crate.
//!
//! A virtual keyboard and a virtual synth are wired together the way an
//! application would wire hardware, and the tests drive both ends.
//!
//! Run with:
//! ```bash
//! cargo test -p midival --test midi_integration
//! ```

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use midival::prelude::*;
use midival::{MidiMessage, NoteMessage, RegisteredParameter};
use parking_lot::Mutex;

struct Rig {
    access: Arc<VirtualMidiAccess>,
    keys: Arc<VirtualInputPort>,
    synth: Arc<VirtualOutputPort>,
    context: MidiContext,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

fn rig() -> Rig {
    init_tracing();
    let access = Arc::new(VirtualMidiAccess::new());
    let keys = access.add_input(
        VirtualInputPort::new("keys-1", "Keyboard").with_manufacturer("Acme"),
    );
    let synth = access.add_output(VirtualOutputPort::new("synth-1", "Synth"));
    let context = MidiContext::new(access.clone());
    Rig {
        access,
        keys,
        synth,
        context,
    }
}

#[test]
fn test_decoder_scenarios() {
    let Some(MidiMessage::ChannelVoice(on)) = MidiMessage::parse(&[0x90, 60, 100]) else {
        panic!("expected a channel voice message");
    };
    let on = NoteMessage::from(on);
    assert_eq!((on.channel, on.note, on.velocity), (1, 60, 100));

    let Some(MidiMessage::ChannelVoice(off)) = MidiMessage::parse(&[0x80, 60, 0]) else {
        panic!("expected a channel voice message");
    };
    let off = NoteMessage::from(off);
    assert_eq!((off.channel, off.note, off.velocity), (1, 60, 0));
}

#[test]
fn test_keyboard_to_synth_thru() {
    let rig = rig();
    let input = rig
        .context
        .input_from_id("keys-1", MidiInputOptions::default())
        .unwrap();
    let output = rig.context.output_from_name("Synth").unwrap();

    // Forward everything on channel 1 to channel 10
    let thru = output.clone();
    let _on = input.on_all_note_on(move |msg| {
        let _ = thru.send_note_on(msg.note, msg.velocity, Some(10));
    });
    let thru = output.clone();
    let _off = input.on_all_note_off(move |msg| {
        let _ = thru.send_note_off(msg.note, Some(10));
    });

    rig.keys.inject(0.0, &[0x90, 36, 127]);
    rig.keys.inject(5.0, &[0x80, 36, 64]);

    assert_eq!(
        rig.synth.take_sent(),
        vec![vec![0x99, 36, 127], vec![0x89, 36, 0]]
    );
}

#[test]
fn test_filtered_subscriptions() {
    let rig = rig();
    let input = rig
        .context
        .input_from_name("Keyboard", MidiInputOptions::default())
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_c = Arc::clone(&seen);
    let _cc = input.on_control_change(1, move |cc| seen_c.lock().push(("mod", cc.value)));
    let seen_c = Arc::clone(&seen);
    let _pc = input.on_program_change(5, move |pc| seen_c.lock().push(("program", pc.program)));
    let seen_c = Arc::clone(&seen);
    let _local = input.on_local_control_change(move |on, _| {
        seen_c.lock().push(("local", u8::from(on)))
    });

    rig.keys.inject(0.0, &[0xB0, 1, 64]);
    rig.keys.inject(0.0, &[0xB0, 2, 64]);
    rig.keys.inject(0.0, &[0xC0, 5]);
    rig.keys.inject(0.0, &[0xC0, 6]);
    rig.keys.inject(0.0, &[0xB0, 122, 127]);
    rig.keys.inject(0.0, &[0xB0, 122, 0]);

    assert_eq!(
        *seen.lock(),
        vec![("mod", 64), ("program", 5), ("local", 1), ("local", 0)]
    );
}

#[test]
fn test_unsubscribe_inside_callback() {
    let rig = rig();
    let input = rig
        .context
        .input_from_name("Keyboard", MidiInputOptions::default())
        .unwrap();

    let count = Arc::new(Mutex::new(0));
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let count_c = Arc::clone(&count);
    let slot_c = Arc::clone(&slot);
    let sub = input.on_all_note_on(move |_| {
        *count_c.lock() += 1;
        if let Some(sub) = slot_c.lock().take() {
            sub.unsubscribe();
        }
    });
    *slot.lock() = Some(sub);

    rig.keys.inject(0.0, &[0x90, 60, 1]);
    rig.keys.inject(0.0, &[0x90, 61, 1]);
    assert_eq!(*count.lock(), 1);
}

#[test]
fn test_rpn_events_by_parameter() {
    let rig = rig();
    let input = rig
        .context
        .input_from_name("Keyboard", MidiInputOptions::default())
        .unwrap();

    let params = Arc::new(Mutex::new(Vec::new()));
    let params_c = Arc::clone(&params);
    let _sub = input.on_registered_parameter(move |event| {
        params_c.lock().push((event.parameter, event.msb))
    });

    // Coarse tuning, then fine tuning, each followed by Data Entry MSB
    for [msb, lsb, value] in [[0u8, 2, 64], [0, 1, 70]] {
        rig.keys.inject(0.0, &[0xB0, 101, msb]);
        rig.keys.inject(0.0, &[0xB0, 100, lsb]);
        rig.keys.inject(0.0, &[0xB0, 6, value]);
    }

    assert_eq!(
        *params.lock(),
        vec![
            (RegisteredParameter::ChannelCoarseTuning, Some(64)),
            (RegisteredParameter::ChannelFineTuning, Some(70)),
        ]
    );
}

#[test]
fn test_hotplug_through_context() {
    let rig = rig();
    let events = Arc::new(Mutex::new(Vec::new()));

    let events_c = Arc::clone(&events);
    let _connected = rig.context.on_output_device_connected(
        move |port| events_c.lock().push(format!("+{}", port.id())),
        true,
    );
    let events_c = Arc::clone(&events);
    let _disconnected = rig
        .context
        .on_output_device_disconnected(move |port| events_c.lock().push(format!("-{}", port.id())));

    rig.access.add_output(VirtualOutputPort::new("synth-2", "Second Synth"));
    rig.access.remove_output("synth-1");

    assert_eq!(*events.lock(), vec!["+synth-1", "+synth-2", "-synth-1"]);
    assert!(rig.context.output_from_id("synth-1").is_err());
}

#[cfg(feature = "mpe")]
#[tokio::test(start_paused = true)]
async fn test_mpe_voice_allocation() {
    let rig = rig();
    let output = rig.context.output_from_name("Synth").unwrap();
    let mpe = MpeOutput::connect(output, MpeZoneSizes::new(3, 0))
        .await
        .unwrap();
    rig.synth.take_sent();

    let zone = mpe.lower_zone().unwrap();
    let first = zone.send_note_on(60, 100).unwrap();
    let second = zone.send_note_on(64, 100).unwrap();
    assert_eq!(first.channel(), 2);
    assert_ne!(second.channel(), first.channel());

    second.change_bend(-0.25).unwrap();
    let sent = rig.synth.take_sent();
    assert_eq!(sent[0][0], 0xE0 | (second.channel() - 1));
    let decoded = midival::core::pitch_bend::from_bend(sent[0][1], sent[0][2]);
    assert_abs_diff_eq!(decoded, -0.25, epsilon = 1e-2);
    assert_abs_diff_eq!(second.pitch_bend(), -0.25);

    first.note_off().unwrap();
    rig.synth.take_sent();
    first.change_bend(0.5).unwrap();
    assert!(rig.synth.sent().is_empty());
    assert_abs_diff_eq!(first.pitch_bend(), 0.0);
}
