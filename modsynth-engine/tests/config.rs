mod common;

use std::io::Write;

use modsynth_engine::Config;
use modsynth_types::{ArpDirection, LfoShape, Waveform};

#[test]
fn test_user_file_overrides_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "[transport]\nbpm = 96\n\n[arpeggiator]\ndirection = \"updown\"\nswing = 30\n\n[lfo]\nshape = \"saw\"\n\n[voice]\nwaveform = \"square\""
    )
    .unwrap();

    let config = Config::load_from(Some(&path));
    assert_eq!(config.bpm(), 96.0);
    let arp = config.arpeggiator();
    assert_eq!(arp.direction(), ArpDirection::UpDown);
    assert_eq!(arp.swing(), 30.0);
    assert_eq!(arp.rate(), 120.0);
    assert_eq!(config.lfo().shape, LfoShape::Sawtooth);
    assert_eq!(config.voice().waveform, Waveform::Square);

    let (ws, _backend) = common::make_workstation_with(&config);
    assert_eq!(ws.transport().bpm(), 96.0);
}

#[test]
fn test_malformed_user_file_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[transport\nbpm = fast").unwrap();

    let config = Config::load_from(Some(&path));
    assert_eq!(config.bpm(), 120.0);
}

#[test]
fn test_missing_user_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(Some(&dir.path().join("absent.toml")));
    assert_eq!(config.frame_throttle_ms(), 16);
}
