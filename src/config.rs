//! Per-invocation analysis settings.
//!
//! `AnalysisConfig` is what callers hand to [`crate::analyze`]. It can be
//! built in code, deserialized from JSON (every field is optional and falls
//! back to its default), and is split into one parameter struct per stage.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::spectrum::Nucleus;
use crate::error::{AnalysisError, Result};

/// Default ¹H spectrometer frequency when nothing else is known.
pub const DEFAULT_BASE_FREQUENCY_MHZ: f64 = 400.0;
/// Matching window around each reference position.
pub const DEFAULT_TOLERANCE_PPM: f64 = 0.10;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.60;
/// Peaks must exceed `noise * k`.
pub const DEFAULT_SENSITIVITY: f64 = 3.0;
pub const DEFAULT_LINE_BROADENING_HZ: f64 = 1.0;
/// Invert when `|min| > ratio * |max|`.
pub const DEFAULT_POLARITY_RATIO: f64 = 2.0;
/// Terminal group added to the backbone peak count.
pub const DEFAULT_CHAIN_LENGTH_OFFSET: u32 = 1;
/// SNR at which the signal-quality part of a match score saturates.
pub const DEFAULT_SNR_SATURATION: f64 = 20.0;
pub const DEFAULT_MIN_SNR: f64 = 5.0;
pub const DEFAULT_MIN_PEAKS: usize = 1;

/// A labelled chemical-shift window. `upper_ppm` is the downfield edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftRange {
    pub label: String,
    pub upper_ppm: f64,
    pub lower_ppm: f64,
}

impl ShiftRange {
    pub fn new(label: &str, a: f64, b: f64) -> Self {
        Self {
            label: label.to_string(),
            upper_ppm: a.max(b),
            lower_ppm: a.min(b),
        }
    }

    pub fn contains(&self, ppm: f64) -> bool {
        ppm >= self.lower_ppm && ppm <= self.upper_ppm
    }

    /// Parse `"-85:-78"` style CLI input.
    pub fn parse(s: &str) -> Result<Self> {
        let (a, b) = s
            .split_once(':')
            .ok_or_else(|| AnalysisError::config(format!("range '{}' is not LO:HI", s)))?;
        let lo = a
            .trim()
            .parse::<f64>()
            .map_err(|_| AnalysisError::config(format!("bad range bound '{}'", a)))?;
        let hi = b
            .trim()
            .parse::<f64>()
            .map_err(|_| AnalysisError::config(format!("bad range bound '{}'", b)))?;
        Ok(Self::new(&format!("target {}", s.trim()), lo, hi))
    }
}

/// Terminal CF3-like window.
pub fn terminal_cf3_window() -> ShiftRange {
    ShiftRange::new("terminal CF3", -78.0, -85.0)
}

/// Internal CF2-like window.
pub fn internal_cf2_window() -> ShiftRange {
    ShiftRange::new("internal CF2", -110.0, -130.0)
}

/// Backbone window used for chain-length estimation.
pub fn backbone_window() -> ShiftRange {
    ShiftRange::new("backbone CF2", -110.0, -128.0)
}

/// Organofluorine window used for the fluorine-content percentage.
pub fn organofluorine_window() -> ShiftRange {
    ShiftRange::new("organofluorine", -40.0, -240.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// ¹H frequency of the instrument in MHz.
    pub base_frequency_mhz: f64,
    /// Observed nucleus assumed for inputs without acquisition parameters.
    pub nucleus: Nucleus,
    pub tolerance_ppm: f64,
    pub confidence_threshold: f64,
    pub sensitivity: f64,
    pub line_broadening_hz: f64,
    pub polarity_ratio: f64,
    pub chain_length_offset: u32,
    pub snr_saturation: f64,
    pub min_snr: f64,
    pub min_peaks: usize,
    /// Target windows for the PFAS-content percentage. Empty means the
    /// terminal CF3 and internal CF2 windows.
    pub target_ranges: Vec<ShiftRange>,
    /// Assumed sample concentration (any unit); enables a concentration
    /// estimate in the quantitation block.
    pub sample_concentration: Option<f64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_frequency_mhz: DEFAULT_BASE_FREQUENCY_MHZ,
            nucleus: Nucleus::F19,
            tolerance_ppm: DEFAULT_TOLERANCE_PPM,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            sensitivity: DEFAULT_SENSITIVITY,
            line_broadening_hz: DEFAULT_LINE_BROADENING_HZ,
            polarity_ratio: DEFAULT_POLARITY_RATIO,
            chain_length_offset: DEFAULT_CHAIN_LENGTH_OFFSET,
            snr_saturation: DEFAULT_SNR_SATURATION,
            min_snr: DEFAULT_MIN_SNR,
            min_peaks: DEFAULT_MIN_PEAKS,
            target_ranges: Vec::new(),
            sample_concentration: None,
        }
    }
}

impl AnalysisConfig {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sensitivity.is_finite() || self.sensitivity <= 0.0 {
            return Err(AnalysisError::config(format!(
                "sensitivity must be positive, got {}",
                self.sensitivity
            )));
        }
        if !self.base_frequency_mhz.is_finite() || self.base_frequency_mhz <= 0.0 {
            return Err(AnalysisError::config(format!(
                "base frequency must be positive, got {} MHz",
                self.base_frequency_mhz
            )));
        }
        if !self.line_broadening_hz.is_finite() || self.line_broadening_hz < 0.0 {
            return Err(AnalysisError::config(format!(
                "line broadening must be >= 0, got {} Hz",
                self.line_broadening_hz
            )));
        }
        if !self.polarity_ratio.is_finite() || self.polarity_ratio <= 0.0 {
            return Err(AnalysisError::config(format!(
                "polarity ratio must be positive, got {}",
                self.polarity_ratio
            )));
        }
        self.identification_params(self.observe_frequency_mhz())
            .validate()?;
        if !self.min_snr.is_finite() || self.min_snr < 0.0 {
            return Err(AnalysisError::config("minimum SNR must be >= 0"));
        }
        for r in &self.target_ranges {
            if !r.upper_ppm.is_finite() || !r.lower_ppm.is_finite() {
                return Err(AnalysisError::config(format!(
                    "target range '{}' has a non-finite bound",
                    r.label
                )));
            }
        }
        if let Some(c) = self.sample_concentration {
            if !c.is_finite() || c < 0.0 {
                return Err(AnalysisError::config(format!(
                    "sample concentration must be >= 0, got {}",
                    c
                )));
            }
        }
        Ok(())
    }

    /// Observe frequency implied by the base frequency and nucleus.
    pub fn observe_frequency_mhz(&self) -> f64 {
        self.nucleus
            .frequency_from_proton(self.base_frequency_mhz)
            .unwrap_or(self.base_frequency_mhz)
    }

    pub fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions {
            line_broadening_hz: self.line_broadening_hz,
            polarity_ratio: self.polarity_ratio,
        }
    }

    pub fn detection_params(&self, frequency_mhz: f64) -> DetectionParams {
        DetectionParams {
            sensitivity: self.sensitivity,
            frequency_mhz,
        }
    }

    pub fn identification_params(&self, frequency_mhz: f64) -> IdentificationParams {
        IdentificationParams {
            tolerance_ppm: self.tolerance_ppm,
            confidence_threshold: self.confidence_threshold,
            frequency_mhz,
            snr_saturation: self.snr_saturation,
            chain_length_offset: self.chain_length_offset,
        }
    }

    /// Configured target ranges, or the CF3/CF2 pair when none were given.
    pub fn effective_target_ranges(&self) -> Vec<ShiftRange> {
        if self.target_ranges.is_empty() {
            vec![terminal_cf3_window(), internal_cf2_window()]
        } else {
            self.target_ranges.clone()
        }
    }
}

/// Settings for the time-domain → frequency-domain conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessingOptions {
    pub line_broadening_hz: f64,
    pub polarity_ratio: f64,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            line_broadening_hz: DEFAULT_LINE_BROADENING_HZ,
            polarity_ratio: DEFAULT_POLARITY_RATIO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionParams {
    /// Sensitivity constant `k`.
    pub sensitivity: f64,
    /// Observe frequency used to convert ppm widths to Hz.
    pub frequency_mhz: f64,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            frequency_mhz: Nucleus::F19
                .frequency_from_proton(DEFAULT_BASE_FREQUENCY_MHZ)
                .unwrap_or(DEFAULT_BASE_FREQUENCY_MHZ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdentificationParams {
    pub tolerance_ppm: f64,
    pub confidence_threshold: f64,
    pub frequency_mhz: f64,
    pub snr_saturation: f64,
    pub chain_length_offset: u32,
}

impl Default for IdentificationParams {
    fn default() -> Self {
        Self {
            tolerance_ppm: DEFAULT_TOLERANCE_PPM,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            frequency_mhz: DetectionParams::default().frequency_mhz,
            snr_saturation: DEFAULT_SNR_SATURATION,
            chain_length_offset: DEFAULT_CHAIN_LENGTH_OFFSET,
        }
    }
}

impl IdentificationParams {
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance_ppm.is_finite() || self.tolerance_ppm <= 0.0 {
            return Err(AnalysisError::config(format!(
                "tolerance must be a positive number of ppm, got {}",
                self.tolerance_ppm
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AnalysisError::config(format!(
                "confidence threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !self.frequency_mhz.is_finite() || self.frequency_mhz <= 0.0 {
            return Err(AnalysisError::config("frequency must be positive"));
        }
        if !self.snr_saturation.is_finite() || self.snr_saturation <= 0.0 {
            return Err(AnalysisError::config(format!(
                "SNR saturation must be positive, got {}",
                self.snr_saturation
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.tolerance_ppm - 0.10).abs() < 1e-12);
        assert!((config.confidence_threshold - 0.60).abs() < 1e-12);
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let config = AnalysisConfig {
            tolerance_ppm: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::Configuration(_))
        ));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let config = AnalysisConfig {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{ "tolerance_ppm": 0.2, "sample_concentration": 5.0 }"#)
                .unwrap();
        assert!((config.tolerance_ppm - 0.2).abs() < 1e-12);
        assert_eq!(config.sample_concentration, Some(5.0));
        assert!((config.sensitivity - DEFAULT_SENSITIVITY).abs() < 1e-12);
        assert_eq!(config.nucleus, Nucleus::F19);
    }

    #[test]
    fn test_shift_range_parse() {
        let r = ShiftRange::parse("-85:-78").unwrap();
        assert_eq!(r.upper_ppm, -78.0);
        assert_eq!(r.lower_ppm, -85.0);
        assert!(r.contains(-80.7));
        assert!(!r.contains(-118.0));
        assert!(ShiftRange::parse("nonsense").is_err());
    }

    #[test]
    fn test_observe_frequency_from_base() {
        let config = AnalysisConfig::default();
        let f = config.observe_frequency_mhz();
        assert!((f - 400.0 * 0.940867).abs() < 1e-9);
    }

    #[test]
    fn test_default_targets_fall_back_to_windows() {
        let config = AnalysisConfig::default();
        let targets = config.effective_target_ranges();
        assert_eq!(targets.len(), 2);
        assert!(targets[0].contains(-80.7));
        assert!(targets[1].contains(-121.9));
    }
}
