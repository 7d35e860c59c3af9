mod common;

use modsynth_engine::{TestOp, TransportEvent};
use modsynth_types::ArpDirection;

fn arp_notes(events: &[TransportEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            TransportEvent::Arp(step) => Some(step.note.to_string()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_add_note_starts_from_index_zero() {
    let (mut ws, backend) = common::make_workstation();
    assert!(!ws.transport().arpeggiator().is_running());

    assert!(ws.arp_add(common::note("C4")));
    assert!(ws.transport().arpeggiator().is_running());
    assert_eq!(ws.transport().arpeggiator().current_index(), 0);

    ws.start_transport().unwrap();
    let events = common::drive_until(&mut ws, 0.0);
    assert_eq!(arp_notes(&events), vec!["C4"]);
    assert_eq!(backend.attacks(), vec![common::note("C4")]);
}

#[test]
fn test_removing_last_note_stops_and_releases() {
    let (mut ws, backend) = common::make_workstation();
    ws.arp_add(common::note("C4"));
    ws.start_transport().unwrap();
    common::drive_until(&mut ws, 0.1);
    // the same pitch held on the keyboard
    ws.note_on(common::note("C4")).unwrap();
    backend.clear();

    assert!(ws.arp_remove(common::note("C4")));
    assert!(!ws.transport().arpeggiator().is_running());
    assert_eq!(
        backend.count(|op| matches!(op, TestOp::Release { note: Some(_), .. })),
        1
    );

    // past the arp gate: the key is still down
    let events = common::drive_until(&mut ws, 2.0);
    assert!(arp_notes(&events).is_empty());
    assert_eq!(ws.voices().current().unwrap().active_note_count, 1);
    assert_eq!(
        backend.count(|op| matches!(op, TestOp::Release { note: Some(_), .. })),
        1
    );
}

#[test]
fn test_removal_after_gate_keeps_keyboard_note() {
    let (mut ws, backend) = common::make_workstation();
    ws.arp_add(common::note("C4"));
    ws.start_transport().unwrap();
    common::drive_until(&mut ws, 0.3); // gate closed at 0.25
    assert_eq!(ws.transport().arpeggiator().sounding(ws.voices()), None);

    ws.note_on(common::note("C4")).unwrap();
    backend.clear();
    assert!(ws.arp_remove(common::note("C4")));
    assert!(backend.operations().is_empty());

    common::drive_until(&mut ws, 1.0);
    assert_eq!(ws.voices().current().unwrap().active_note_count, 1);
}

#[test]
fn test_update_octave_keeps_order_and_is_silent() {
    let (mut ws, backend) = common::make_workstation();
    for name in ["C4", "E4", "G4"] {
        ws.arp_add(common::note(name));
    }
    ws.start_transport().unwrap();
    common::drive_until(&mut ws, 0.5); // two arp ticks: C4, E4
    let index = ws.transport().arpeggiator().current_index();
    let attacks_before = backend.attacks().len();

    assert!(ws.arp_update_octave(4, 5));
    let pool: Vec<String> = ws.transport().arpeggiator().pool().iter().map(|n| n.to_string()).collect();
    assert_eq!(pool, vec!["C5", "E5", "G5"]);
    assert_eq!(ws.transport().arpeggiator().current_index(), index);
    assert_eq!(backend.attacks().len(), attacks_before);

    let events = common::drive_until(&mut ws, 1.0);
    assert_eq!(arp_notes(&events), vec!["G5"]);
}

#[test]
fn test_arp_runs_on_its_own_rate() {
    let (mut ws, _backend) = common::make_workstation();
    ws.transport_mut().arpeggiator_mut().set_direction(ArpDirection::UpDown);
    for name in ["C4", "E4", "G4"] {
        ws.arp_add(common::note(name));
    }
    ws.start_transport().unwrap();
    ws.set_arp_rate(240.0);

    // re-armed one new interval after the change: 0.25, 0.5, .. 1.5
    let events = common::drive_until(&mut ws, 1.5);
    assert_eq!(arp_notes(&events), vec!["C4", "E4", "G4", "E4", "C4", "E4"]);
    // the step clock is untouched: 120 BPM eighths
    assert_eq!(common::steps(&events).len(), 7);
}

#[test]
fn test_stop_releases_sounding_arp_note() {
    let (mut ws, backend) = common::make_workstation();
    ws.transport_mut().arpeggiator_mut().set_gate(100.0);
    ws.arp_add(common::note("A3"));
    ws.start_transport().unwrap();
    common::drive_until(&mut ws, 0.1);
    assert_eq!(ws.voices().current().unwrap().active_note_count, 1);

    ws.stop_transport();
    assert_eq!(ws.voices().current().unwrap().active_note_count, 0);
    assert!(backend
        .operations()
        .iter()
        .any(|op| matches!(op, TestOp::Release { note: Some(n), .. } if n.to_string() == "A3")));
}
