//! LFO waveform evaluation.
//!
//! The LFO has no running phase. Its value is a pure function of wall-clock
//! time, rate and shape, so the audio write and any visualizer sampling the
//! same instant agree, and a suspended frame loop resumes in phase.

use std::f64::consts::PI;

use modsynth_types::LfoShape;

/// Segments per cycle for the random (sample-and-hold) shape.
pub const RANDOM_SEGMENTS: u32 = 8;

/// Fractional cycle position in `[0, 1)`.
pub fn phase(time_secs: f64, rate_hz: f64) -> f64 {
    let cycles = time_secs * rate_hz;
    if !cycles.is_finite() {
        return 0.0;
    }
    let p = cycles - cycles.floor();
    // guards the 1.0 that rounding can produce for tiny negatives
    if p >= 1.0 { 0.0 } else { p }
}

/// Evaluate the LFO at `time_secs`. Output is in `[-1, 1]`.
pub fn sample(time_secs: f64, rate_hz: f64, shape: LfoShape) -> f64 {
    let phase = phase(time_secs, rate_hz);
    match shape {
        LfoShape::Sine => (2.0 * PI * phase).sin(),
        LfoShape::Triangle => 1.0 - (((phase * 4.0) % 4.0) - 2.0).abs(),
        LfoShape::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        LfoShape::Sawtooth => phase * 2.0 - 1.0,
        LfoShape::Random => segment_value(random_segment(phase)),
    }
}

/// Segment index of the random shape for a given phase.
pub fn random_segment(phase: f64) -> u32 {
    ((phase * RANDOM_SEGMENTS as f64).floor() as u32).min(RANDOM_SEGMENTS - 1)
}

/// Held value for one random segment: `sin(segment * 1000)`.
fn segment_value(segment: u32) -> f64 {
    (segment as f64 * 1000.0).sin()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTINUOUS: [LfoShape; 4] = [
        LfoShape::Sine,
        LfoShape::Triangle,
        LfoShape::Square,
        LfoShape::Sawtooth,
    ];

    #[test]
    fn sample_is_deterministic() {
        for shape in LfoShape::all() {
            for i in 0..200 {
                let t = i as f64 * 0.0173;
                assert_eq!(sample(t, 3.7, shape), sample(t, 3.7, shape));
            }
        }
    }

    #[test]
    fn shapes_stay_in_unit_range() {
        for shape in LfoShape::all() {
            for i in 0..5000 {
                let t = i as f64 * 0.00731 - 3.0;
                let v = sample(t, 5.3, shape);
                assert!((-1.0..=1.0).contains(&v), "{:?} at {} gave {}", shape, t, v);
            }
        }
    }

    #[test]
    fn waveform_landmarks() {
        // rate 1 Hz: time == phase
        assert!(sample(0.0, 1.0, LfoShape::Sine).abs() < 1e-12);
        assert!((sample(0.25, 1.0, LfoShape::Sine) - 1.0).abs() < 1e-12);

        assert!((sample(0.0, 1.0, LfoShape::Triangle) + 1.0).abs() < 1e-12);
        assert!((sample(0.5, 1.0, LfoShape::Triangle) - 1.0).abs() < 1e-12);
        assert!((sample(0.25, 1.0, LfoShape::Triangle)).abs() < 1e-12);

        assert_eq!(sample(0.1, 1.0, LfoShape::Square), 1.0);
        assert_eq!(sample(0.6, 1.0, LfoShape::Square), -1.0);

        assert!((sample(0.0, 1.0, LfoShape::Sawtooth) + 1.0).abs() < 1e-12);
        assert!((sample(0.75, 1.0, LfoShape::Sawtooth) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn random_holds_within_a_segment() {
        // 1 Hz, segment 3 spans [0.375, 0.5)
        let a = sample(0.38, 1.0, LfoShape::Random);
        let b = sample(0.49, 1.0, LfoShape::Random);
        assert_eq!(a, b);
        assert_eq!(a, (3000.0f64).sin());
        assert_ne!(a, sample(0.51, 1.0, LfoShape::Random));
    }

    #[test]
    fn random_repeats_each_cycle() {
        assert_eq!(
            sample(0.3, 2.0, LfoShape::Random),
            sample(0.8, 2.0, LfoShape::Random)
        );
    }

    #[test]
    fn phase_is_continuous_across_gaps() {
        // a value sampled after a long pause only depends on the timestamp
        for shape in CONTINUOUS {
            let before = sample(12.345, 0.8, shape);
            let _ = sample(13.0, 0.8, shape);
            assert_eq!(sample(12.345, 0.8, shape), before);
        }
    }

    #[test]
    fn phase_handles_non_finite_input() {
        assert_eq!(phase(f64::INFINITY, 1.0), 0.0);
        assert_eq!(phase(1.0, f64::NAN), 0.0);
        assert!((phase(-0.25, 1.0) - 0.75).abs() < 1e-12);
    }
}
