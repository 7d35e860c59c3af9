use std::fs::File;
use std::path::PathBuf;

use modsynth_engine::{Config, LogBackend, ManualClock, NoteEvent, PresetState, TransportEvent, Workstation};
use modsynth_types::{DrumLane, LfoSettings, LfoShape, Note};

const FRAME_SECS: f64 = 1.0 / 60.0;

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("modsynth")
        .join("modsynth.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path) {
        Ok(file) => file,
        Err(_) => match File::create(std::env::temp_dir().join("modsynth.log")) {
            Ok(file) => file,
            Err(e) => {
                eprintln!("modsynth: cannot create log file: {}", e);
                return;
            }
        },
    };

    if let Err(e) = WriteLogger::init(log_level, Config::default(), log_file) {
        eprintln!("modsynth: failed to initialize logger: {}", e);
        return;
    }

    log::info!("modsynth starting (log level: {:?})", log_level);
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Pattern used when no preset is given: four-on-the-floor drums, a short
/// bass line and the LFO sweeping the filter.
fn load_demo(ws: &mut Workstation<ManualClock>) {
    {
        let seq = ws.transport_mut().sequencer_mut();
        for (step, name) in [(0, "C3"), (3, "C3"), (6, "G3"), (10, "A#2"), (12, "F3")] {
            if let Ok(note) = name.parse::<Note>() {
                seq.set_note(step, note);
                seq.set_enabled(step, true);
            }
        }
        seq.set_gate(80.0);
    }
    {
        let drums = ws.transport_mut().drums_mut();
        for step in 0..16 {
            drums.set(DrumLane::Kick, step, step % 4 == 0);
            drums.set(DrumLane::HiHat, step, step % 2 == 1);
        }
        drums.set(DrumLane::Snare, 4, true);
        drums.set(DrumLane::Clap, 12, true);
    }
    ws.set_lfo(LfoSettings {
        rate_hz: 0.5,
        shape: LfoShape::Sine,
        amount_percent: 60.0,
    });
    if let Err(e) = ws.select_lfo_destination(Some("filter.frequency")) {
        log::warn!("demo LFO not bound: {}", e);
    }
}

fn main() -> std::io::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    init_logging(verbose);

    let bars: u32 = arg_value(&args, "--bars").and_then(|s| s.parse().ok()).unwrap_or(2);
    let arp_notes: Vec<Note> = arg_value(&args, "--arp")
        .map(|s| s.split(',').filter_map(|n| n.trim().parse().ok()).collect())
        .unwrap_or_default();

    let config = Config::load();
    let mut ws = Workstation::new(&config, Box::new(LogBackend::new()), ManualClock::new());

    match arg_value(&args, "--preset") {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            match PresetState::from_json(&json) {
                Ok(preset) => ws.apply_preset(&preset),
                Err(e) => {
                    eprintln!("modsynth: invalid preset {}: {}", path, e);
                    std::process::exit(1);
                }
            }
        }
        None => load_demo(&mut ws),
    }
    if let Some(bpm) = arg_value(&args, "--bpm").and_then(|s| s.parse().ok()) {
        ws.set_bpm(bpm);
    }
    for note in &arp_notes {
        ws.arp_add(*note);
    }

    let notes_rx = ws.subscribe_notes();
    let transport_rx = ws.subscribe_transport();

    if let Err(e) = ws.start_transport() {
        eprintln!("modsynth: {}", e);
        std::process::exit(1);
    }
    let mut frame = ws.start_frames();

    // a bar is 16 eighth-note steps
    let end = ws.transport().step_interval_secs() * 16.0 * bars as f64;
    let mut now = 0.0;
    let mut frames_run = 0u64;
    while now < end {
        now += FRAME_SECS;
        for firing in ws.clock_mut().advance_to(now) {
            ws.on_clock_tick(firing.handle, firing.time);
        }
        ws.poll(now);
        if let Some(request) = frame {
            if ws.on_animation_frame(request, now) {
                frames_run += 1;
            }
            frame = ws.pending_frame();
        }
    }
    ws.stop_transport();
    ws.stop_frames();
    ws.poll(now + 1.0);

    let mut attacks = 0;
    for event in notes_rx.try_iter() {
        if let NoteEvent::Attack { note, time, .. } = event {
            attacks += 1;
            if verbose {
                println!("{:>8.3}  {}", time, note);
            }
        }
    }
    let (mut steps, mut hits, mut arps) = (0, 0, 0);
    for event in transport_rx.try_iter() {
        match event {
            TransportEvent::Step { .. } => steps += 1,
            TransportEvent::Drum { .. } => hits += 1,
            TransportEvent::Arp(_) => arps += 1,
        }
    }

    println!(
        "{} bars at {:.0} BPM: {} steps, {} notes ({} arpeggiated), {} drum hits, {} modulation frames",
        bars,
        ws.transport().bpm(),
        steps,
        attacks,
        arps,
        hits,
        frames_run
    );
    if let Some(binding) = ws.router().binding() {
        println!(
            "LFO -> {} (baseline {:.1}, last output {:+.3})",
            binding.destination_id,
            binding.baseline_value,
            ws.router().current_output()
        );
    }
    Ok(())
}
