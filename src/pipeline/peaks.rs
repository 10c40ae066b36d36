/// Peak picking and region quantitation
///
/// Peaks are interior local maxima above `noise × k`, where the noise level
/// is the 10th percentile of absolute intensities. Widths, signal-to-noise
/// and areas are measured on the half-height window around each maximum.

use serde::{Deserialize, Serialize};

use crate::config::{
    internal_cf2_window, organofluorine_window, terminal_cf3_window, DetectionParams, ShiftRange,
};
use crate::data::spectrum::{ChemicalShiftTrace, Heuristic};

/// Percentile of `|intensity|` taken as the noise level.
pub const NOISE_PERCENTILE: f64 = 0.10;
/// Noise floor relative to the largest absolute intensity.
pub const NOISE_FLOOR_FRACTION: f64 = 1e-4;

/// A detected resonance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub position_ppm: f64,
    pub intensity: f64,
    /// Full width at half maximum in Hz
    pub width_hz: f64,
    pub signal_to_noise: f64,
    /// Trapezoidal integral over the half-height window (ppm × intensity)
    pub area: f64,
}

impl std::fmt::Display for Peak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.2} ppm (I={:.3e}, FWHM={:.1} Hz, S/N={:.1})",
            self.position_ppm, self.intensity, self.width_hz, self.signal_to_noise
        )
    }
}

/// Result of [`detect`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Sorted by position, most downfield first
    pub peaks: Vec<Peak>,
    pub noise_level: f64,
    pub heuristics: Vec<Heuristic>,
}

// =========================================================================
//  Noise
// =========================================================================

/// 10th percentile of `|I|`, floored. Returns the level and whether the
/// floor was used.
pub fn estimate_noise(intensities: &[f64]) -> (f64, bool) {
    if intensities.is_empty() {
        return (f64::MIN_POSITIVE, true);
    }
    let mut abs: Vec<f64> = intensities.iter().map(|v| v.abs()).collect();
    abs.sort_by(|a, b| a.total_cmp(b));
    let idx = ((abs.len() - 1) as f64 * NOISE_PERCENTILE).floor() as usize;
    let percentile = abs[idx];

    let max_abs = abs[abs.len() - 1];
    let floor = (max_abs * NOISE_FLOOR_FRACTION).max(f64::MIN_POSITIVE);
    if percentile < floor {
        (floor, true)
    } else {
        (percentile, false)
    }
}

// =========================================================================
//  Peak Detection
// =========================================================================

/// Find peaks in `trace`. Traces shorter than three points have no
/// interior maxima and yield an empty list.
pub fn detect(trace: &ChemicalShiftTrace, params: &DetectionParams) -> Detection {
    let ints = trace.intensities();
    let pos = trace.positions();
    let (noise, floored) = estimate_noise(ints);

    let mut heuristics = Vec::new();
    if floored {
        log::debug!("Noise percentile below floor, using {:.3e}", noise);
        heuristics.push(Heuristic::NoiseFloorApplied { floor: noise });
    }

    let n = ints.len();
    if n < 3 {
        return Detection {
            peaks: Vec::new(),
            noise_level: noise,
            heuristics,
        };
    }

    let threshold = noise * params.sensitivity;
    let mut peaks: Vec<Peak> = Vec::new();
    for i in 1..n - 1 {
        let val = ints[i];
        if val > ints[i - 1] && val >= ints[i + 1] && val > threshold {
            peaks.push(measure(pos, ints, i, noise, params.frequency_mhz));
        }
    }

    // NMR convention: high ppm first
    peaks.sort_by(|a, b| b.position_ppm.total_cmp(&a.position_ppm));
    log::info!(
        "Detected {} peaks (noise {:.3e}, k={})",
        peaks.len(),
        noise,
        params.sensitivity
    );

    Detection {
        peaks,
        noise_level: noise,
        heuristics,
    }
}

/// Width, SNR and area of the maximum at `i`.
fn measure(pos: &[f64], ints: &[f64], i: usize, noise: f64, frequency_mhz: f64) -> Peak {
    let n = ints.len();
    let half = ints[i] / 2.0;

    // Walk out to the first point at or below half height on each side.
    let mut lo = i;
    while lo > 0 && ints[lo] > half {
        lo -= 1;
    }
    let mut hi = i;
    while hi < n - 1 && ints[hi] > half {
        hi += 1;
    }

    let left = crossing(pos, ints, lo, lo + 1, half);
    let right = crossing(pos, ints, hi, hi - 1, half);
    let width_ppm = (right - left).abs();

    let area: f64 = (lo..hi)
        .map(|j| 0.5 * (ints[j] + ints[j + 1]) * (pos[j + 1] - pos[j]).abs())
        .sum();

    Peak {
        position_ppm: pos[i],
        intensity: ints[i],
        width_hz: width_ppm * frequency_mhz,
        signal_to_noise: ints[i] / noise,
        area,
    }
}

/// Interpolated position where the line from `outer` to `inner` reaches
/// `level`. Falls back to the outer point when it never dropped below.
fn crossing(pos: &[f64], ints: &[f64], outer: usize, inner: usize, level: f64) -> f64 {
    let (y0, y1) = (ints[outer], ints[inner]);
    if y0 > level || (y1 - y0).abs() < f64::EPSILON {
        return pos[outer];
    }
    let frac = (level - y0) / (y1 - y0);
    pos[outer] + frac * (pos[inner] - pos[outer])
}

// =========================================================================
//  Quantitation
// =========================================================================

/// Totals for one chemical-shift window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub label: String,
    pub upper_ppm: f64,
    pub lower_ppm: f64,
    pub peak_count: usize,
    pub total_area: f64,
    pub total_intensity: f64,
}

impl RegionSummary {
    pub fn from_peaks(range: &ShiftRange, peaks: &[Peak]) -> Self {
        let inside: Vec<&Peak> = peaks.iter().filter(|p| range.contains(p.position_ppm)).collect();
        Self {
            label: range.label.clone(),
            upper_ppm: range.upper_ppm,
            lower_ppm: range.lower_ppm,
            peak_count: inside.len(),
            total_area: inside.iter().map(|p| p.area).sum(),
            total_intensity: inside.iter().map(|p| p.intensity).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantitation {
    pub terminal_cf3: RegionSummary,
    pub internal_cf2: RegionSummary,
    pub targets: Vec<RegionSummary>,
    pub total_area: f64,
    /// Area of peaks inside any target range, each peak counted once
    pub target_area: f64,
    pub cf3_to_cf2_ratio: Option<f64>,
    pub pfas_percent: f64,
    pub fluorine_percent: f64,
    pub estimated_pfas_concentration: Option<f64>,
}

fn percent(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        100.0 * part / total
    } else {
        0.0
    }
}

/// Region totals and PFAS percentages for `peaks`.
pub fn quantify(peaks: &[Peak], targets: &[ShiftRange], concentration: Option<f64>) -> Quantitation {
    let terminal_cf3 = RegionSummary::from_peaks(&terminal_cf3_window(), peaks);
    let internal_cf2 = RegionSummary::from_peaks(&internal_cf2_window(), peaks);
    let target_summaries: Vec<RegionSummary> = targets
        .iter()
        .map(|r| RegionSummary::from_peaks(r, peaks))
        .collect();

    let total_area: f64 = peaks.iter().map(|p| p.area).sum();
    let target_area: f64 = peaks
        .iter()
        .filter(|p| targets.iter().any(|r| r.contains(p.position_ppm)))
        .map(|p| p.area)
        .sum();
    let organofluorine = organofluorine_window();
    let fluorine_area: f64 = peaks
        .iter()
        .filter(|p| organofluorine.contains(p.position_ppm))
        .map(|p| p.area)
        .sum();

    let cf3_to_cf2_ratio = if internal_cf2.total_area > 0.0 {
        Some(terminal_cf3.total_area / internal_cf2.total_area)
    } else {
        None
    };

    let pfas_percent = percent(target_area, total_area);
    Quantitation {
        terminal_cf3,
        internal_cf2,
        targets: target_summaries,
        total_area,
        target_area,
        cf3_to_cf2_ratio,
        pfas_percent,
        fluorine_percent: percent(fluorine_area, total_area),
        estimated_pfas_concentration: concentration.map(|c| c * pfas_percent / 100.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::spectrum::linear_axis;

    /// Lorentzian lines on a 0.01 ppm grid from -60 to -140 ppm.
    fn synthetic(lines: &[(f64, f64)]) -> ChemicalShiftTrace {
        let axis = linear_axis(-60.0, -140.0, 8001);
        let ints = axis
            .iter()
            .map(|&x| {
                lines
                    .iter()
                    .map(|&(c, h)| h / (1.0 + ((x - c) / 0.05).powi(2)))
                    .sum()
            })
            .collect();
        ChemicalShiftTrace::new(axis, ints).unwrap()
    }

    fn params(k: f64) -> DetectionParams {
        DetectionParams {
            sensitivity: k,
            frequency_mhz: 376.0,
        }
    }

    #[test]
    fn test_finds_lines_in_descending_order() {
        let trace = synthetic(&[(-121.9, 800.0), (-80.7, 1000.0), (-118.0, 400.0)]);
        let det = detect(&trace, &params(3.0));
        let ppms: Vec<f64> = det.peaks.iter().map(|p| p.position_ppm).collect();
        assert_eq!(ppms.len(), 3);
        assert!((ppms[0] + 80.7).abs() < 1e-6);
        assert!((ppms[1] + 118.0).abs() < 1e-6);
        assert!((ppms[2] + 121.9).abs() < 1e-6);
    }

    #[test]
    fn test_width_and_snr() {
        let trace = synthetic(&[(-100.0, 1000.0)]);
        let det = detect(&trace, &params(3.0));
        assert_eq!(det.peaks.len(), 1);
        let p = &det.peaks[0];
        // Lorentzian half-width 0.05 ppm -> FWHM 0.1 ppm
        assert!((p.width_hz - 0.1 * 376.0).abs() < 0.5, "width {}", p.width_hz);
        assert!((p.signal_to_noise - p.intensity / det.noise_level).abs() < 1e-9);
        assert!(p.area > 0.0);
    }

    #[test]
    fn test_threshold_monotone_in_k() {
        let trace = synthetic(&[(-80.0, 1000.0), (-100.0, 50.0), (-120.0, 5.0), (-130.0, 1.0)]);
        let mut last = usize::MAX;
        for k in [1.0, 3.0, 10.0, 100.0, 1000.0] {
            let count = detect(&trace, &params(k)).peaks.len();
            assert!(count <= last, "k={} gave {} > {}", k, count, last);
            last = count;
        }
    }

    #[test]
    fn test_short_traces_have_no_peaks() {
        let one = ChemicalShiftTrace::new(vec![-80.0], vec![5.0]).unwrap();
        assert!(detect(&one, &params(3.0)).peaks.is_empty());
        let two = ChemicalShiftTrace::new(vec![-80.0, -81.0], vec![5.0, 1.0]).unwrap();
        assert!(detect(&two, &params(3.0)).peaks.is_empty());
    }

    #[test]
    fn test_noise_floor_heuristic() {
        let noisy = ChemicalShiftTrace::new(
            vec![-1.0, -2.0, -3.0, -4.0, -5.0],
            vec![2.0, 1.0, 10.0, 1.5, 2.0],
        )
        .unwrap();
        let det = detect(&noisy, &params(3.0));
        assert!(det.heuristics.is_empty());
        assert!((det.noise_level - 1.0).abs() < 1e-12);

        let flat = ChemicalShiftTrace::new(
            vec![-1.0, -2.0, -3.0, -4.0, -5.0],
            vec![0.0, 0.0, 10.0, 0.0, 0.0],
        )
        .unwrap();
        let det = detect(&flat, &params(3.0));
        assert!((det.noise_level - 10.0 * NOISE_FLOOR_FRACTION).abs() < 1e-12);
        assert!(matches!(
            det.heuristics.as_slice(),
            [Heuristic::NoiseFloorApplied { .. }]
        ));
        assert_eq!(det.peaks.len(), 1);
    }

    #[test]
    fn test_ascending_axis() {
        let desc = synthetic(&[(-80.0, 1000.0), (-120.0, 500.0)]);
        let (mut pos, mut ints) = desc.into_parts();
        pos.reverse();
        ints.reverse();
        let asc = ChemicalShiftTrace::new(pos, ints).unwrap();
        let det = detect(&asc, &params(3.0));
        assert_eq!(det.peaks.len(), 2);
        assert!(det.peaks[0].position_ppm > det.peaks[1].position_ppm);
        assert!(det.peaks[0].width_hz > 0.0);
    }

    fn peak(ppm: f64, area: f64) -> Peak {
        Peak {
            position_ppm: ppm,
            intensity: area * 10.0,
            width_hz: 5.0,
            signal_to_noise: 50.0,
            area,
        }
    }

    #[test]
    fn test_quantify_percentages() {
        let peaks = vec![peak(-80.7, 3.0), peak(-121.9, 6.0), peak(-20.0, 1.0)];
        let targets = vec![terminal_cf3_window(), internal_cf2_window()];
        let q = quantify(&peaks, &targets, Some(10.0));
        assert!((q.total_area - 10.0).abs() < 1e-12);
        assert!((q.target_area - 9.0).abs() < 1e-12);
        assert!((q.pfas_percent - 90.0).abs() < 1e-9);
        assert!((q.fluorine_percent - 90.0).abs() < 1e-9);
        assert!((q.cf3_to_cf2_ratio.unwrap() - 0.5).abs() < 1e-12);
        assert!((q.estimated_pfas_concentration.unwrap() - 9.0).abs() < 1e-9);
        assert_eq!(q.terminal_cf3.peak_count, 1);
        assert_eq!(q.targets.len(), 2);
    }

    #[test]
    fn test_quantify_empty() {
        let q = quantify(&[], &[terminal_cf3_window()], None);
        assert_eq!(q.total_area, 0.0);
        assert_eq!(q.pfas_percent, 0.0);
        assert_eq!(q.cf3_to_cf2_ratio, None);
        assert_eq!(q.estimated_pfas_concentration, None);
    }
}
