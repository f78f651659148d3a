//! Waveform geometry for one rendered frame.
//!
//! Pure functions: given the tap layout, the canvas size and (when live) the
//! per-tap levels and a timestamp, produce one polyline per tap.  Drawing is
//! left to the caller.

use std::f64::consts::TAU;

use super::tap::AnalysisTapConfig;

/// One tap's line, in canvas coordinates (origin top-left, y down).
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    pub points: Vec<[f32; 2]>,
    pub color: [u8; 4],
}

/// Canvas and sweep parameters shared by every line of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    pub width: f32,
    pub height: f32,
    /// Horizontal distance between vertices.
    pub sweep_step: f32,
    /// Displacement for a level of 255.
    pub motion_scale: f32,
}

impl FrameGeometry {
    fn xs(&self) -> impl Iterator<Item = f32> {
        let step = self.sweep_step.max(1.0);
        let count = if self.width > 0.0 {
            (self.width / step).ceil() as usize
        } else {
            0
        };
        (0..count).map(move |i| i as f32 * step)
    }

    fn mid(&self) -> f32 {
        self.height / 2.0
    }
}

/// Vertical displacement for a mean magnitude in `[0, 255]`.
pub fn motion_amplitude(mean: f32, scale: f32) -> f32 {
    mean / 255.0 * scale
}

/// Flat lines at each tap's baseline, drawn while no capture is active.
pub fn static_frame(taps: &[AnalysisTapConfig], geom: &FrameGeometry) -> Vec<Polyline> {
    taps.iter()
        .map(|tap| {
            let y = geom.mid() + tap.offset;
            Polyline {
                points: geom.xs().map(|x| [x, y]).collect(),
                color: tap.color,
            }
        })
        .collect()
}

/// Swept sine lines driven by live levels.
///
/// `levels[i]` is tap `i`'s mean magnitude; a missing level counts as
/// silence.  `time_ms` advances the phase of tap `i` at `tap.speed`.
pub fn live_frame(
    taps: &[AnalysisTapConfig],
    levels: &[f32],
    time_ms: f64,
    geom: &FrameGeometry,
) -> Vec<Polyline> {
    taps.iter()
        .enumerate()
        .map(|(i, tap)| {
            let level = levels.get(i).copied().unwrap_or(0.0);
            let motion = motion_amplitude(level, geom.motion_scale) as f64;
            let baseline = (geom.mid() + tap.offset) as f64;
            let phase = time_ms * tap.speed;
            let width = geom.width.max(f32::EPSILON) as f64;

            let points = geom
                .xs()
                .map(|x| {
                    let angle = x as f64 / width * TAU + phase;
                    [x, (baseline + angle.sin() * motion) as f32]
                })
                .collect();

            Polyline {
                points,
                color: tap.color,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VisualizerConfig;

    fn layout() -> Vec<AnalysisTapConfig> {
        AnalysisTapConfig::layout(&VisualizerConfig::default())
    }

    fn geom() -> FrameGeometry {
        FrameGeometry {
            width: 100.0,
            height: 250.0,
            sweep_step: 10.0,
            motion_scale: 60.0,
        }
    }

    #[test]
    fn motion_amplitude_scales_linearly() {
        assert_eq!(motion_amplitude(0.0, 60.0), 0.0);
        assert_eq!(motion_amplitude(255.0, 60.0), 60.0);
        assert!((motion_amplitude(127.5, 60.0) - 30.0).abs() < 1e-4);
    }

    #[test]
    fn static_lines_sit_on_their_baselines() {
        let lines = static_frame(&layout(), &geom());
        assert_eq!(lines.len(), 6);
        // Centre 125, offsets (i - 3) * 5.
        let ys: Vec<f32> = lines.iter().map(|l| l.points[0][1]).collect();
        assert_eq!(ys, vec![110.0, 115.0, 120.0, 125.0, 130.0, 135.0]);
        for line in &lines {
            assert_eq!(line.points.len(), 10);
            assert!(line.points.iter().all(|p| p[1] == line.points[0][1]));
        }
    }

    #[test]
    fn vertices_step_across_the_width() {
        let lines = static_frame(&layout(), &geom());
        let xs: Vec<f32> = lines[0].points.iter().map(|p| p[0]).collect();
        assert_eq!(xs.first(), Some(&0.0));
        assert_eq!(xs.last(), Some(&90.0));
        assert!(xs.windows(2).all(|w| w[1] - w[0] == 10.0));
    }

    #[test]
    fn silent_live_frame_matches_static_frame() {
        let taps = layout();
        let live = live_frame(&taps, &[0.0; 6], 12_345.0, &geom());
        assert_eq!(live, static_frame(&taps, &geom()));
    }

    #[test]
    fn live_displacement_is_bounded_by_motion() {
        let taps = layout();
        let lines = live_frame(&taps, &[255.0; 6], 0.0, &geom());
        for (line, tap) in lines.iter().zip(&taps) {
            let baseline = 125.0 + tap.offset;
            let max_dev = line
                .points
                .iter()
                .map(|p| (p[1] - baseline).abs())
                .fold(0.0f32, f32::max);
            assert!(max_dev <= 60.0 + 1e-3);
            assert!(max_dev > 50.0, "line should swing close to full scale");
        }
    }

    #[test]
    fn phase_advances_with_time_at_per_tap_rate() {
        let taps = layout();
        let g = geom();
        let at = |t: f64| live_frame(&taps, &[255.0; 6], t, &g);

        // At x = 0 the angle is time * speed, so y - baseline = sin(t * speed) * 60.
        let t = 10_000.0;
        let lines = at(t);
        for (line, tap) in lines.iter().zip(&taps) {
            let expected = 125.0 + tap.offset + ((t * tap.speed).sin() * 60.0) as f32;
            assert!((line.points[0][1] - expected).abs() < 1e-3);
        }
        assert_ne!(at(0.0), at(t));
    }

    #[test]
    fn missing_levels_count_as_silence() {
        let taps = layout();
        let lines = live_frame(&taps, &[], 500.0, &geom());
        assert_eq!(lines, static_frame(&taps, &geom()));
    }

    #[test]
    fn zero_width_canvas_has_no_vertices() {
        let g = FrameGeometry { width: 0.0, ..geom() };
        assert!(static_frame(&layout(), &g).iter().all(|l| l.points.is_empty()));
    }
}
