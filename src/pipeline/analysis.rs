//! End-to-end analysis of one spectrum.
//!
//! `analyze` runs classify → read → transform → detect → quantify →
//! identify and gathers everything into an [`AnalysisResult`]. Structural
//! failures abort with an [`AnalysisError`](crate::AnalysisError); quality
//! problems become [`AnalysisWarning`]s on the result.

use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::identify::{identify, ChainLengthEstimate, DetectionCandidate};
use super::peaks::{detect, quantify, Peak, Quantitation};
use super::processing::to_spectrum;
use crate::config::AnalysisConfig;
use crate::data::detect::classify;
use crate::data::reader;
use crate::data::spectrum::{AcquisitionParameters, ChemicalShiftTrace, FormatKind, Heuristic};
use crate::error::Result;
use crate::library::{FunctionalGroup, ReferenceLibrary};
use crate::log::reproducibility::ProcessingLog;

/// Best SNR (with at least this many peaks) for an excellent grade.
pub const EXCELLENT_SNR: f64 = 100.0;
pub const EXCELLENT_MIN_PEAKS: usize = 3;
pub const GOOD_SNR: f64 = 20.0;
pub const FAIR_SNR: f64 = 5.0;

/// Non-fatal findings about the data or the identification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    InsufficientData { reason: String },
    LowSignalToNoise { snr: f64, minimum: f64 },
    FewPeaks { count: usize, minimum: usize },
    NoCompoundMatched { threshold: f64 },
}

impl std::fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisWarning::InsufficientData { reason } => write!(f, "insufficient data: {}", reason),
            AnalysisWarning::LowSignalToNoise { snr, minimum } => {
                write!(f, "signal-to-noise {:.1} is below {:.1}", snr, minimum)
            }
            AnalysisWarning::FewPeaks { count, minimum } => {
                write!(f, "only {} peak(s) detected, expected at least {}", count, minimum)
            }
            AnalysisWarning::NoCompoundMatched { threshold } => {
                write!(f, "no reference compound reached confidence {:.2}", threshold)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl std::fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityGrade::Excellent => write!(f, "Excellent"),
            QualityGrade::Good => write!(f, "Good"),
            QualityGrade::Fair => write!(f, "Fair"),
            QualityGrade::Poor => write!(f, "Poor"),
        }
    }
}

impl QualityGrade {
    pub fn from_measurements(snr: f64, peak_count: usize) -> Self {
        if snr >= EXCELLENT_SNR && peak_count >= EXCELLENT_MIN_PEAKS {
            QualityGrade::Excellent
        } else if snr >= GOOD_SNR {
            QualityGrade::Good
        } else if snr >= FAIR_SNR {
            QualityGrade::Fair
        } else {
            QualityGrade::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    /// Best peak signal-to-noise, 0 without peaks
    pub signal_to_noise: f64,
    pub noise_level: f64,
    pub peak_count: usize,
    pub grade: QualityGrade,
}

/// Where the spectrum came from and what was done to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub source: String,
    /// `None` for traces handed in directly
    pub format: Option<FormatKind>,
    pub acquisition: Option<AcquisitionParameters>,
    pub heuristics: Vec<Heuristic>,
    pub log: ProcessingLog,
    pub analysed_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub spectrum: ChemicalShiftTrace,
    /// Most downfield first
    pub peaks: Vec<Peak>,
    /// Best first
    pub candidates: Vec<DetectionCandidate>,
    pub functional_group: FunctionalGroup,
    pub chain_length: Option<ChainLengthEstimate>,
    pub quantitation: Quantitation,
    pub quality: QualitySummary,
    pub warnings: Vec<AnalysisWarning>,
    pub metadata: AnalysisMetadata,
}

impl AnalysisResult {
    pub fn top_candidate(&self) -> Option<&DetectionCandidate> {
        self.candidates.first()
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

/// Analyze the spectrum stored at `path`.
pub fn analyze(
    path: &Path,
    library: &ReferenceLibrary,
    config: &AnalysisConfig,
) -> Result<AnalysisResult> {
    config.validate()?;

    let kind = classify(path);
    log::info!("Analyzing {} ({})", path.display(), kind);

    let mut log = ProcessingLog::new();
    log.set_source(&path.display().to_string());

    let read = reader::read(path, kind, config.base_frequency_mhz)?;
    let domain = if read.spectrum.is_frequency_domain() {
        "frequency"
    } else {
        "time"
    };
    log.add_entry(
        "Read",
        &format!("Decoded {} input", kind),
        &format!(
            "base_frequency_mhz={} domain={}",
            config.base_frequency_mhz, domain
        ),
    );

    let frequency_mhz = read
        .params
        .as_ref()
        .map(|p| p.observe_frequency_mhz)
        .unwrap_or_else(|| config.observe_frequency_mhz());

    let processed = to_spectrum(read.spectrum, &config.processing_options(), &mut log)?;
    let mut heuristics = read.heuristics;
    heuristics.extend(processed.heuristics);

    let metadata = AnalysisMetadata {
        source: path.display().to_string(),
        format: Some(kind),
        acquisition: read.params,
        heuristics,
        log,
        analysed_at: Local::now(),
    };
    complete(processed.trace, frequency_mhz, library, config, metadata)
}

/// Run detection, quantitation and identification on a trace that is
/// already in the frequency domain. Peak widths use the observe frequency
/// implied by `config`.
pub fn analyze_trace(
    trace: ChemicalShiftTrace,
    library: &ReferenceLibrary,
    config: &AnalysisConfig,
) -> Result<AnalysisResult> {
    config.validate()?;
    let mut log = ProcessingLog::new();
    log.set_source("in-memory trace");
    let metadata = AnalysisMetadata {
        source: "in-memory trace".to_string(),
        format: None,
        acquisition: None,
        heuristics: Vec::new(),
        log,
        analysed_at: Local::now(),
    };
    complete(
        trace,
        config.observe_frequency_mhz(),
        library,
        config,
        metadata,
    )
}

fn complete(
    trace: ChemicalShiftTrace,
    frequency_mhz: f64,
    library: &ReferenceLibrary,
    config: &AnalysisConfig,
    mut metadata: AnalysisMetadata,
) -> Result<AnalysisResult> {
    let detection = detect(&trace, &config.detection_params(frequency_mhz));
    metadata.log.add_entry(
        "Peak detection",
        &format!(
            "{} peaks above {:.3e} (noise {:.3e})",
            detection.peaks.len(),
            detection.noise_level * config.sensitivity,
            detection.noise_level
        ),
        &format!("k={} frequency_mhz={:.4}", config.sensitivity, frequency_mhz),
    );
    metadata.heuristics.extend(detection.heuristics.iter().cloned());

    let targets = config.effective_target_ranges();
    let quantitation = quantify(&detection.peaks, &targets, config.sample_concentration);
    metadata.log.add_entry(
        "Quantitation",
        &format!(
            "PFAS {:.1}% of integrated area, fluorine {:.1}%",
            quantitation.pfas_percent, quantitation.fluorine_percent
        ),
        &format!("targets={}", targets.len()),
    );

    let identification = identify(
        &detection.peaks,
        library,
        &config.identification_params(frequency_mhz),
    )?;
    metadata.log.add_entry(
        "Identification",
        &format!(
            "{} candidate(s) against {} reference compounds",
            identification.candidates.len(),
            library.len()
        ),
        &format!(
            "tolerance_ppm={} threshold={}",
            config.tolerance_ppm, config.confidence_threshold
        ),
    );
    metadata.heuristics.extend(identification.heuristics.iter().cloned());

    let best_snr = detection
        .peaks
        .iter()
        .map(|p| p.signal_to_noise)
        .fold(0.0, f64::max);
    let peak_count = detection.peaks.len();
    let quality = QualitySummary {
        signal_to_noise: best_snr,
        noise_level: detection.noise_level,
        peak_count,
        grade: QualityGrade::from_measurements(best_snr, peak_count),
    };

    let mut warnings = identification.warnings;
    if best_snr < config.min_snr {
        warnings.push(AnalysisWarning::LowSignalToNoise {
            snr: best_snr,
            minimum: config.min_snr,
        });
    }
    if peak_count > 0 && peak_count < config.min_peaks {
        warnings.push(AnalysisWarning::FewPeaks {
            count: peak_count,
            minimum: config.min_peaks,
        });
    }
    for w in &warnings {
        log::warn!("{}", w);
    }

    Ok(AnalysisResult {
        spectrum: trace,
        peaks: detection.peaks,
        candidates: identification.candidates,
        functional_group: identification.functional_group,
        chain_length: identification.chain_length,
        quantitation,
        quality,
        warnings,
        metadata,
    })
}
