/// Time-domain to frequency-domain conversion
///
/// Each step works on a plain sample buffer and records itself in the
/// processing log. Spectra that arrive already transformed pass through
/// untouched.

use std::f64::consts::PI;

use num_complex::Complex;
use rustfft::FftPlanner;

use crate::config::ProcessingOptions;
use crate::data::spectrum::{AcquisitionParameters, ChemicalShiftTrace, Heuristic, RawSpectrum};
use crate::error::{AnalysisError, Result};
use crate::log::reproducibility::ProcessingLog;

/// Intensity the strongest point is scaled to.
pub const NORMALIZED_MAXIMUM: f64 = 1_000_000.0;

/// Fraction of the trace at each end used to estimate the baseline.
pub const BASELINE_EDGE_FRACTION: f64 = 0.10;

/// Output of [`to_spectrum`].
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub trace: ChemicalShiftTrace,
    pub heuristics: Vec<Heuristic>,
}

/// Produce a ppm trace from whatever the reader returned.
pub fn to_spectrum(
    raw: RawSpectrum,
    opts: &ProcessingOptions,
    log: &mut ProcessingLog,
) -> Result<Processed> {
    match raw {
        RawSpectrum::FrequencyDomain(trace) => {
            log.add_entry(
                "Frequency-domain input",
                &format!("Spectrum used as read ({} points)", trace.len()),
                "",
            );
            Ok(Processed {
                trace,
                heuristics: Vec::new(),
            })
        }
        RawSpectrum::TimeDomain { samples, params } => {
            transform_fid(samples, &params, opts, log)
        }
    }
}

fn transform_fid(
    mut samples: Vec<Complex<f64>>,
    params: &AcquisitionParameters,
    opts: &ProcessingOptions,
    log: &mut ProcessingLog,
) -> Result<Processed> {
    if samples.is_empty() {
        return Err(AnalysisError::corrupt("FID has no samples"));
    }
    log::info!(
        "Transforming {}-point {} FID ({:.1} MHz, SW {:.1} ppm)",
        samples.len(),
        params.nucleus,
        params.observe_frequency_mhz,
        params.sweep_width_ppm
    );

    let mut heuristics = Vec::new();

    let target_len = next_power_of_two(2 * samples.len());
    zero_fill(&mut samples, target_len, log);
    apply_exponential(&mut samples, opts.line_broadening_hz, params.sweep_width_hz(), log);
    let mut real = fourier_transform(samples, log);

    if let Some(ratio) = correct_polarity(&mut real, opts.polarity_ratio, log) {
        log::warn!("Spectrum was predominantly negative (ratio {:.2}), inverted", ratio);
        heuristics.push(Heuristic::PolarityInverted { ratio });
    }
    baseline_correct(&mut real, log);
    normalize(&mut real, log);

    let axis = params.ppm_axis(real.len());
    let trace = ChemicalShiftTrace::new(axis, real)?;
    Ok(Processed { trace, heuristics })
}

// =========================================================================
//  Zero Filling
// =========================================================================

/// Zero-fill the FID to the target size (no-op if already that long)
pub fn zero_fill(samples: &mut Vec<Complex<f64>>, target_size: usize, log: &mut ProcessingLog) {
    let current = samples.len();
    if target_size <= current {
        return;
    }
    samples.resize(target_size, Complex::new(0.0, 0.0));
    log.add_entry(
        "Zero fill",
        &format!("Zero-filled from {} to {} points", current, target_size),
        &format!("size={}", target_size),
    );
}

/// Next power of two >= n
pub fn next_power_of_two(n: usize) -> usize {
    let mut p = 1;
    while p < n {
        p <<= 1;
    }
    p
}

// =========================================================================
//  Apodization
// =========================================================================

/// Exponential multiplication: `exp(-π·lb·t)` with `t = i / sweep_hz`.
pub fn apply_exponential(
    samples: &mut [Complex<f64>],
    lb_hz: f64,
    sweep_hz: f64,
    log: &mut ProcessingLog,
) {
    let n = samples.len();
    if n == 0 || lb_hz == 0.0 {
        return;
    }
    let dwell = if sweep_hz > 0.0 { 1.0 / sweep_hz } else { 1.0 / n as f64 };
    for (i, s) in samples.iter_mut().enumerate() {
        let t = i as f64 * dwell;
        *s *= (-PI * lb_hz * t).exp();
    }
    log.add_entry(
        "Apodization",
        &format!("Exponential window over {} points", n),
        &format!("lb={:.3} dwell={:.3e}", lb_hz, dwell),
    );
}

// =========================================================================
//  Fourier Transform
// =========================================================================

/// Complex FFT of the FID. Returns the real part, index 0 downfield.
pub fn fourier_transform(mut buffer: Vec<Complex<f64>>, log: &mut ProcessingLog) -> Vec<f64> {
    let n = buffer.len();
    if n == 0 {
        return Vec::new();
    }

    // First-point correction removes the DC offset ridge.
    buffer[0] *= 0.5;

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    // Swap halves so 0 Hz sits in the centre, then reverse so that
    // index 0 is the highest frequency.
    let half = n / 2;
    let mut real: Vec<f64> = (0..n).map(|i| buffer[(i + half) % n].re).collect();
    real.reverse();

    log.add_entry(
        "Fourier transform",
        &format!("Complex FFT of {} points with shift, real part kept", n),
        &format!("n={}", n),
    );
    real
}

// =========================================================================
//  Polarity / Baseline / Scaling
// =========================================================================

/// Negate the trace when `|min| > ratio·|max|`. Returns the observed
/// ratio when an inversion happened.
pub fn correct_polarity(real: &mut [f64], ratio: f64, log: &mut ProcessingLog) -> Option<f64> {
    if real.is_empty() {
        return None;
    }
    let max = real.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = real.iter().cloned().fold(f64::INFINITY, f64::min);
    if min.abs() <= ratio * max.abs() {
        return None;
    }
    for v in real.iter_mut() {
        *v = -*v;
    }
    let observed = min.abs() / max.abs();
    let observed = if observed.is_finite() { observed } else { f64::MAX };
    log.add_entry(
        "Polarity inversion",
        &format!("Trace negated, |min|/|max| = {:.3}", observed),
        &format!("ratio={}", ratio),
    );
    Some(observed)
}

/// Subtract a straight line through the means of the outer edges, each
/// mean placed at the centre of its window.
pub fn baseline_correct(real: &mut [f64], log: &mut ProcessingLog) {
    let n = real.len();
    if n < 2 {
        return;
    }
    let edge = ((n as f64 * BASELINE_EDGE_FRACTION) as usize).clamp(1, n / 2);

    let left_mean: f64 = real[..edge].iter().sum::<f64>() / edge as f64;
    let right_mean: f64 = real[n - edge..].iter().sum::<f64>() / edge as f64;

    let left_x = (edge - 1) as f64 / 2.0;
    let right_x = (n - 1) as f64 - left_x;
    let slope = (right_mean - left_mean) / (right_x - left_x);
    for (i, v) in real.iter_mut().enumerate() {
        *v -= left_mean + slope * (i as f64 - left_x);
    }

    log.add_entry(
        "Baseline correction",
        &format!(
            "Linear baseline correction (left={:.4}, right={:.4})",
            left_mean, right_mean
        ),
        &format!("edge_fraction={}", BASELINE_EDGE_FRACTION),
    );
}

/// Scale so the global maximum is [`NORMALIZED_MAXIMUM`].
pub fn normalize(real: &mut [f64], log: &mut ProcessingLog) {
    let max = real.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !(max > 0.0) {
        log::warn!("Spectrum maximum is {} - skipping normalization", max);
        return;
    }
    let scale = NORMALIZED_MAXIMUM / max;
    for v in real.iter_mut() {
        *v *= scale;
    }
    log.add_entry(
        "Normalization",
        &format!("Scaled maximum {:.4e} to {:.0}", max, NORMALIZED_MAXIMUM),
        &format!("scale={:.6e}", scale),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::spectrum::Nucleus;

    fn params() -> AcquisitionParameters {
        AcquisitionParameters::new(Nucleus::F19, 376.0, 250.0, -100.0 * 376.0, 1, 1.0).unwrap()
    }

    /// Single decaying complex exponential at `ppm`.
    fn fid_at(ppm: f64, n: usize, p: &AcquisitionParameters) -> Vec<Complex<f64>> {
        let offset_hz = (ppm - p.reference_shift_ppm()) * p.observe_frequency_mhz;
        let dwell = 1.0 / p.sweep_width_hz();
        (0..n)
            .map(|i| {
                let t = i as f64 * dwell;
                let phase = 2.0 * PI * offset_hz * t;
                Complex::new(phase.cos(), phase.sin()) * (-1000.0 * t).exp()
            })
            .collect()
    }

    fn peak_ppm(trace: &ChemicalShiftTrace) -> f64 {
        let (i, _) = trace
            .intensities()
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        trace.positions()[i]
    }

    #[test]
    fn test_next_power_of_two() {
        assert_eq!(next_power_of_two(1), 1);
        assert_eq!(next_power_of_two(5), 8);
        assert_eq!(next_power_of_two(1024), 1024);
        assert_eq!(next_power_of_two(2000), 2048);
    }

    #[test]
    fn test_frequency_domain_passthrough() {
        let trace = ChemicalShiftTrace::new(vec![-80.0, -81.0, -82.0], vec![1.0, 5.0, 2.0]).unwrap();
        let mut log = ProcessingLog::new();
        let out = to_spectrum(
            RawSpectrum::FrequencyDomain(trace.clone()),
            &ProcessingOptions::default(),
            &mut log,
        )
        .unwrap();
        assert_eq!(out.trace, trace);
        assert!(out.heuristics.is_empty());
    }

    #[test]
    fn test_single_frequency_fid() {
        let p = params();
        let samples = fid_at(-80.0, 1000, &p);
        let mut log = ProcessingLog::new();
        let out = to_spectrum(
            RawSpectrum::TimeDomain {
                samples,
                params: p.clone(),
            },
            &ProcessingOptions::default(),
            &mut log,
        )
        .unwrap();

        assert_eq!(out.trace.len(), 2048);
        assert!(out.trace.is_descending());
        let top = peak_ppm(&out.trace);
        assert!((top + 80.0).abs() < 0.8, "peak at {}", top);
        assert!((out.trace.max_intensity() - NORMALIZED_MAXIMUM).abs() < 1e-6);
        assert!(out.heuristics.is_empty());
        assert_eq!(
            log.operations(),
            vec![
                "Zero fill",
                "Apodization",
                "Fourier transform",
                "Baseline correction",
                "Normalization"
            ]
        );
    }

    #[test]
    fn test_negated_fid_gives_same_spectrum() {
        let p = params();
        let samples = fid_at(-120.0, 512, &p);
        let negated: Vec<_> = samples.iter().map(|c| -c).collect();
        let opts = ProcessingOptions::default();

        let a = to_spectrum(
            RawSpectrum::TimeDomain {
                samples,
                params: p.clone(),
            },
            &opts,
            &mut ProcessingLog::new(),
        )
        .unwrap();
        let b = to_spectrum(
            RawSpectrum::TimeDomain { samples: negated, params: p },
            &opts,
            &mut ProcessingLog::new(),
        )
        .unwrap();

        assert_eq!(a.trace, b.trace);
        assert!(matches!(
            b.heuristics.as_slice(),
            [Heuristic::PolarityInverted { .. }]
        ));
    }

    #[test]
    fn test_empty_fid_is_corrupt() {
        let err = to_spectrum(
            RawSpectrum::TimeDomain {
                samples: vec![],
                params: params(),
            },
            &ProcessingOptions::default(),
            &mut ProcessingLog::new(),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::CorruptData(_)));
    }

    #[test]
    fn test_baseline_removes_linear_ramp() {
        let mut real: Vec<f64> = (0..100).map(|i| 10.0 + 0.5 * i as f64).collect();
        baseline_correct(&mut real, &mut ProcessingLog::new());
        for (i, v) in real.iter().enumerate() {
            assert!(v.abs() < 1e-9, "residual {} at {}", v, i);
        }
    }

    #[test]
    fn test_baseline_keeps_central_peak() {
        let n = 1000;
        let mut real: Vec<f64> = (0..n)
            .map(|i| {
                let x = i as f64;
                -3.0 + 0.01 * x + 500.0 / (1.0 + ((x - 500.0) / 5.0).powi(2))
            })
            .collect();
        baseline_correct(&mut real, &mut ProcessingLog::new());
        assert!(real[0].abs() < 1.0, "left edge {}", real[0]);
        assert!(real[n - 1].abs() < 1.0, "right edge {}", real[n - 1]);
        assert!((real[500] - 500.0).abs() < 1.0, "apex {}", real[500]);
    }

    #[test]
    fn test_baseline_two_points() {
        let mut real = vec![4.0, 6.0];
        baseline_correct(&mut real, &mut ProcessingLog::new());
        assert!(real.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_normalize_skips_non_positive() {
        let mut real = vec![-1.0, -2.0];
        let mut log = ProcessingLog::new();
        normalize(&mut real, &mut log);
        assert_eq!(real, vec![-1.0, -2.0]);
        assert!(log.is_empty());
    }
}
