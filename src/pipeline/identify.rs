/// Compound identification by reference-pattern matching
///
/// Every library compound is scored against the detected peak list:
/// each expected resonance takes the best-scoring detected peak within the
/// tolerance window, and the compound's confidence blends how many
/// resonances were found with how well they matched. Functional group and
/// chain length are estimated from the peak list alone.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::analysis::AnalysisWarning;
use super::peaks::Peak;
use crate::config::{backbone_window, terminal_cf3_window, IdentificationParams, ShiftRange};
use crate::data::spectrum::Heuristic;
use crate::error::Result;
use crate::library::{FunctionalGroup, ReferenceCompound, ReferenceLibrary};

/// Weight of positional agreement in a single match score.
pub const POSITION_WEIGHT: f64 = 0.7;
/// Weight of signal quality in a single match score.
pub const SIGNAL_WEIGHT: f64 = 0.3;
/// Weight of the matched fraction in the compound confidence.
pub const MATCH_RATIO_WEIGHT: f64 = 0.6;
/// Weight of the mean match score in the compound confidence.
pub const MATCH_SCORE_WEIGHT: f64 = 0.4;

/// Slack on the tolerance comparison for values that are equal on paper.
const TOLERANCE_SLACK_PPM: f64 = 1e-9;

/// One expected resonance paired with the detected peak that explains it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakMatch {
    pub expected_ppm: f64,
    pub matched_ppm: f64,
    pub deviation_ppm: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionCandidate {
    pub compound_id: String,
    pub compound_name: String,
    /// 0 to 1
    pub confidence: f64,
    pub matches: Vec<PeakMatch>,
    pub expected_peaks: usize,
    pub matched_peaks: usize,
}

impl std::fmt::Display for DetectionCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({:.0}%, {}/{} peaks)",
            self.compound_id,
            self.confidence * 100.0,
            self.matched_peaks,
            self.expected_peaks
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainLengthEstimate {
    /// Estimated number of carbons
    pub carbons: u32,
    pub backbone_peaks: usize,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    /// Sorted by confidence, best first
    pub candidates: Vec<DetectionCandidate>,
    pub functional_group: FunctionalGroup,
    pub chain_length: Option<ChainLengthEstimate>,
    pub warnings: Vec<AnalysisWarning>,
    pub heuristics: Vec<Heuristic>,
}

// =========================================================================
//  Scoring
// =========================================================================

/// Score of a single detected peak against an expected position.
pub fn match_score(deviation_ppm: f64, signal_to_noise: f64, params: &IdentificationParams) -> f64 {
    let max_dev_hz = params.tolerance_ppm * params.frequency_mhz;
    let dev_hz = deviation_ppm.abs() * params.frequency_mhz;
    let rel = if max_dev_hz > 0.0 { dev_hz / max_dev_hz } else { 0.0 };
    let positional = (-3.0 * rel * rel).exp();
    let signal = (signal_to_noise / params.snr_saturation).clamp(0.0, 1.0);
    POSITION_WEIGHT * positional + SIGNAL_WEIGHT * signal
}

/// Best detected peak for `expected_ppm`: highest score, ties to the closest.
fn best_match(expected_ppm: f64, peaks: &[Peak], params: &IdentificationParams) -> Option<PeakMatch> {
    let mut best: Option<PeakMatch> = None;
    for p in peaks {
        let deviation = p.position_ppm - expected_ppm;
        if deviation.abs() > params.tolerance_ppm + TOLERANCE_SLACK_PPM {
            continue;
        }
        let candidate = PeakMatch {
            expected_ppm,
            matched_ppm: p.position_ppm,
            deviation_ppm: deviation,
            score: match_score(deviation, p.signal_to_noise, params),
        };
        let better = match &best {
            None => true,
            Some(b) => match candidate.score.total_cmp(&b.score) {
                Ordering::Greater => true,
                Ordering::Equal => candidate.deviation_ppm.abs() < b.deviation_ppm.abs(),
                Ordering::Less => false,
            },
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}

/// Score one compound. `None` when the compound has no expected peaks.
pub fn score_compound(
    compound: &ReferenceCompound,
    peaks: &[Peak],
    params: &IdentificationParams,
) -> Option<DetectionCandidate> {
    let expected = compound.peaks.len();
    if expected == 0 {
        return None;
    }
    let matches: Vec<PeakMatch> = compound
        .peaks
        .iter()
        .filter_map(|rp| best_match(rp.position_ppm, peaks, params))
        .collect();

    let matched = matches.len();
    let ratio = matched as f64 / expected as f64;
    let mean_score = matches.iter().map(|m| m.score).sum::<f64>() / expected as f64;
    let confidence = MATCH_RATIO_WEIGHT * ratio + MATCH_SCORE_WEIGHT * mean_score;

    Some(DetectionCandidate {
        compound_id: compound.id.clone(),
        compound_name: compound.name.clone(),
        confidence,
        matches,
        expected_peaks: expected,
        matched_peaks: matched,
    })
}

// =========================================================================
//  Structural estimates
// =========================================================================

/// Head-group windows, checked against non-CF3 peaks.
pub fn functional_group_windows() -> Vec<(FunctionalGroup, ShiftRange)> {
    vec![
        (FunctionalGroup::Sulfonate, ShiftRange::new("sulfonate α-CF2", -112.5, -116.0)),
        (FunctionalGroup::Carboxylate, ShiftRange::new("carboxylate α-CF2", -116.5, -120.0)),
        (FunctionalGroup::Ether, ShiftRange::new("ether CF/CF2", -128.0, -150.0)),
    ]
}

/// Group implied by the most downfield non-CF3 peak that falls in a
/// head-group window.
pub fn estimate_functional_group(peaks: &[Peak]) -> FunctionalGroup {
    let cf3 = terminal_cf3_window();
    let windows = functional_group_windows();

    let mut positions: Vec<f64> = peaks
        .iter()
        .map(|p| p.position_ppm)
        .filter(|&ppm| !cf3.contains(ppm))
        .collect();
    positions.sort_by(|a, b| b.total_cmp(a));

    positions
        .iter()
        .find_map(|&ppm| {
            windows
                .iter()
                .find(|(_, w)| w.contains(ppm))
                .map(|(g, _)| *g)
        })
        .unwrap_or(FunctionalGroup::Unknown)
}

/// Backbone peak count plus the terminal-group offset.
pub fn estimate_chain_length(peaks: &[Peak], offset: u32) -> Option<ChainLengthEstimate> {
    let backbone = backbone_window();
    let count = peaks
        .iter()
        .filter(|p| backbone.contains(p.position_ppm))
        .count();
    if count == 0 {
        return None;
    }
    Some(ChainLengthEstimate {
        carbons: count as u32 + offset,
        backbone_peaks: count,
        offset,
    })
}

// =========================================================================
//  Identification
// =========================================================================

/// Match `peaks` against every compound in `library`. Invalid `params`
/// are a configuration error.
pub fn identify(
    peaks: &[Peak],
    library: &ReferenceLibrary,
    params: &IdentificationParams,
) -> Result<Identification> {
    params.validate()?;
    if peaks.is_empty() {
        log::warn!("No peaks to identify");
        return Ok(Identification {
            candidates: Vec::new(),
            functional_group: FunctionalGroup::Unknown,
            chain_length: None,
            warnings: vec![AnalysisWarning::InsufficientData {
                reason: "no peaks were detected".to_string(),
            }],
            heuristics: Vec::new(),
        });
    }

    let mut candidates: Vec<DetectionCandidate> = Vec::new();
    for compound in library {
        let Some(candidate) = score_compound(compound, peaks, params) else {
            log::debug!("{}: no reference peaks, skipped", compound.id);
            continue;
        };
        log::debug!(
            "{}: confidence {:.3} ({}/{} matched)",
            compound.id,
            candidate.confidence,
            candidate.matched_peaks,
            candidate.expected_peaks
        );
        if candidate.confidence >= params.confidence_threshold {
            candidates.push(candidate);
        }
    }

    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.matched_peaks.cmp(&a.matched_peaks))
            .then_with(|| a.compound_id.cmp(&b.compound_id))
    });

    let mut warnings = Vec::new();
    if candidates.is_empty() {
        warnings.push(AnalysisWarning::NoCompoundMatched {
            threshold: params.confidence_threshold,
        });
    }

    let functional_group = estimate_functional_group(peaks);
    let chain_length = estimate_chain_length(peaks, params.chain_length_offset);
    let mut heuristics = Vec::new();
    if let Some(est) = &chain_length {
        heuristics.push(Heuristic::ChainLengthEstimated {
            backbone_peaks: est.backbone_peaks,
            offset: est.offset,
        });
    }

    log::info!(
        "{} candidate(s) above {:.2}; group {}, chain {}",
        candidates.len(),
        params.confidence_threshold,
        functional_group,
        chain_length
            .as_ref()
            .map(|c| format!("C{}", c.carbons))
            .unwrap_or_else(|| "n/a".to_string())
    );

    Ok(Identification {
        candidates,
        functional_group,
        chain_length,
        warnings,
        heuristics,
    })
}
