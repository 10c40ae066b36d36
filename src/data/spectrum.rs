//! Core spectral data types shared by readers and the processing pipeline.

use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Which processed (already frequency-domain) container a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessedKind {
    NmrPipe,
    JcampDx,
}

/// Input layouts the reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatKind {
    /// Delimited text export: position column plus one or more intensity columns.
    TabularText,
    /// Bruker experiment directory (`fid` + `acqus`).
    BrukerFid,
    /// Varian/Agilent `fid` with a `procpar` sibling.
    VarianFid,
    /// JEOL Delta `.jdf`, a single self-describing file.
    JeolDelta,
    /// Already transformed spectrum.
    Processed(ProcessedKind),
    Unknown,
}

impl FormatKind {
    /// True for layouts that carry a raw FID rather than a spectrum.
    pub fn is_time_domain(&self) -> bool {
        matches!(
            self,
            FormatKind::BrukerFid | FormatKind::VarianFid | FormatKind::JeolDelta
        )
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatKind::TabularText => write!(f, "Tabular text"),
            FormatKind::BrukerFid => write!(f, "Bruker"),
            FormatKind::VarianFid => write!(f, "Varian/Agilent"),
            FormatKind::JeolDelta => write!(f, "JEOL Delta"),
            FormatKind::Processed(ProcessedKind::NmrPipe) => write!(f, "NMRPipe spectrum"),
            FormatKind::Processed(ProcessedKind::JcampDx) => write!(f, "JCAMP-DX spectrum"),
            FormatKind::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Nucleus type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Nucleus {
    H1,
    H2,
    C13,
    N15,
    F19,
    P31,
    Other(String),
}

impl std::fmt::Display for Nucleus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Nucleus::H1 => write!(f, "1H"),
            Nucleus::H2 => write!(f, "2H"),
            Nucleus::C13 => write!(f, "13C"),
            Nucleus::N15 => write!(f, "15N"),
            Nucleus::F19 => write!(f, "19F"),
            Nucleus::P31 => write!(f, "31P"),
            Nucleus::Other(s) => write!(f, "{}", s),
        }
    }
}

impl Nucleus {
    /// Parse a vendor nucleus label (`"19F"`, `"F19"`, `"<19F>"`, `"fluorine"`).
    pub fn from_label(label: &str) -> Nucleus {
        let cleaned = label
            .trim()
            .trim_matches(|c: char| c == '<' || c == '>' || c == '"' || c == '^')
            .to_uppercase();
        match cleaned.as_str() {
            "1H" | "H1" | "H" | "PROTON" => Nucleus::H1,
            "2H" | "H2" | "D" | "DEUTERIUM" => Nucleus::H2,
            "13C" | "C13" | "C" | "CARBON" => Nucleus::C13,
            "15N" | "N15" | "N" => Nucleus::N15,
            "19F" | "F19" | "F" | "FLUORINE" => Nucleus::F19,
            "31P" | "P31" | "P" | "PHOSPHORUS" => Nucleus::P31,
            _ => Nucleus::Other(label.trim().to_string()),
        }
    }

    /// Larmor frequency relative to ¹H in the same field.
    pub fn gyromagnetic_ratio(&self) -> Option<f64> {
        match self {
            Nucleus::H1 => Some(1.0),
            Nucleus::H2 => Some(0.153506),
            Nucleus::C13 => Some(0.251449),
            Nucleus::N15 => Some(0.101329),
            Nucleus::F19 => Some(0.940867),
            Nucleus::P31 => Some(0.404808),
            Nucleus::Other(_) => None,
        }
    }

    /// Observe frequency for this nucleus on a spectrometer whose ¹H
    /// frequency is `proton_mhz`.
    pub fn frequency_from_proton(&self, proton_mhz: f64) -> Option<f64> {
        self.gyromagnetic_ratio().map(|g| proton_mhz * g)
    }
}

/// Acquisition parameters as read from the vendor parameter file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionParameters {
    pub nucleus: Nucleus,
    /// Observe frequency of `nucleus` in MHz.
    pub observe_frequency_mhz: f64,
    pub sweep_width_ppm: f64,
    /// Carrier offset in Hz; `offset / frequency` is the axis centre in ppm.
    pub reference_offset_hz: f64,
    pub scan_count: u32,
    pub relaxation_delay_s: f64,
}

/// Sweep width of the synthesized default record.
pub const DEFAULT_SWEEP_WIDTH_PPM: f64 = 250.0;
/// Axis centre of the synthesized default record (middle of the PFAS region).
pub const DEFAULT_CENTER_PPM: f64 = -100.0;

impl AcquisitionParameters {
    pub fn new(
        nucleus: Nucleus,
        observe_frequency_mhz: f64,
        sweep_width_ppm: f64,
        reference_offset_hz: f64,
        scan_count: u32,
        relaxation_delay_s: f64,
    ) -> Result<Self> {
        if !observe_frequency_mhz.is_finite() || observe_frequency_mhz <= 0.0 {
            return Err(AnalysisError::corrupt(format!(
                "observe frequency must be positive, got {}",
                observe_frequency_mhz
            )));
        }
        if !sweep_width_ppm.is_finite() || sweep_width_ppm <= 0.0 {
            return Err(AnalysisError::corrupt(format!(
                "sweep width must be positive, got {}",
                sweep_width_ppm
            )));
        }
        if !reference_offset_hz.is_finite() {
            return Err(AnalysisError::corrupt("reference offset is not finite"));
        }
        Ok(Self {
            nucleus,
            observe_frequency_mhz,
            sweep_width_ppm,
            reference_offset_hz,
            scan_count,
            relaxation_delay_s,
        })
    }

    /// Documented fallback used when a parameter file is missing:
    /// ¹⁹F at `base_1h_mhz × γ`, 250 ppm wide, centred on −100 ppm,
    /// one scan, 1 s relaxation delay.
    pub fn synthesized_default(base_1h_mhz: f64) -> Self {
        let nucleus = Nucleus::F19;
        let freq = nucleus
            .frequency_from_proton(base_1h_mhz)
            .unwrap_or(base_1h_mhz);
        Self {
            nucleus,
            observe_frequency_mhz: freq,
            sweep_width_ppm: DEFAULT_SWEEP_WIDTH_PPM,
            reference_offset_hz: DEFAULT_CENTER_PPM * freq,
            scan_count: 1,
            relaxation_delay_s: 1.0,
        }
    }

    pub fn sweep_width_hz(&self) -> f64 {
        self.sweep_width_ppm * self.observe_frequency_mhz
    }

    /// Axis centre in ppm.
    pub fn reference_shift_ppm(&self) -> f64 {
        self.reference_offset_hz / self.observe_frequency_mhz
    }

    /// Chemical-shift axis for `num_points` samples, descending.
    pub fn ppm_axis(&self, num_points: usize) -> Vec<f64> {
        let center = self.reference_shift_ppm();
        let hi = center + self.sweep_width_ppm / 2.0;
        let lo = center - self.sweep_width_ppm / 2.0;
        linear_axis(hi, lo, num_points)
    }
}

/// `n` evenly spaced values from `first` to `last` inclusive.
pub fn linear_axis(first: f64, last: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![first],
        _ => {
            let step = (last - first) / (n - 1) as f64;
            (0..n).map(|i| first + step * i as f64).collect()
        }
    }
}

/// A frequency-domain spectrum: ppm positions with matching intensities.
/// Deserialization goes through [`ChemicalShiftTrace::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TraceParts")]
pub struct ChemicalShiftTrace {
    positions: Vec<f64>,
    intensities: Vec<f64>,
}

#[derive(Deserialize)]
struct TraceParts {
    positions: Vec<f64>,
    intensities: Vec<f64>,
}

impl TryFrom<TraceParts> for ChemicalShiftTrace {
    type Error = AnalysisError;

    fn try_from(parts: TraceParts) -> Result<Self> {
        ChemicalShiftTrace::new(parts.positions, parts.intensities)
    }
}

impl ChemicalShiftTrace {
    /// Validates equal, non-zero length, finite values and a strictly
    /// monotonic axis.
    pub fn new(positions: Vec<f64>, intensities: Vec<f64>) -> Result<Self> {
        if positions.len() != intensities.len() {
            return Err(AnalysisError::corrupt(format!(
                "axis has {} points but intensities have {}",
                positions.len(),
                intensities.len()
            )));
        }
        if positions.is_empty() {
            return Err(AnalysisError::corrupt("spectrum has no points"));
        }
        if positions.iter().chain(intensities.iter()).any(|v| !v.is_finite()) {
            return Err(AnalysisError::corrupt("spectrum contains non-finite values"));
        }
        if positions.len() > 1 {
            let increasing = positions.windows(2).all(|w| w[1] > w[0]);
            let decreasing = positions.windows(2).all(|w| w[1] < w[0]);
            if !increasing && !decreasing {
                return Err(AnalysisError::corrupt(
                    "chemical-shift axis is not strictly monotonic",
                ));
            }
        }
        Ok(Self {
            positions,
            intensities,
        })
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Always false for a constructed trace; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn is_descending(&self) -> bool {
        self.positions.len() < 2 || self.positions[1] < self.positions[0]
    }

    pub fn max_intensity(&self) -> f64 {
        self.intensities
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.positions
            .iter()
            .copied()
            .zip(self.intensities.iter().copied())
    }

    /// Index of the point closest to `ppm`.
    pub fn index_of_nearest(&self, ppm: f64) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, &p) in self.positions.iter().enumerate() {
            let d = (p - ppm).abs();
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }
        best
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.positions, self.intensities)
    }
}

/// Output of the raw reader: a spectrum or an FID with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSpectrum {
    FrequencyDomain(ChemicalShiftTrace),
    TimeDomain {
        samples: Vec<Complex<f64>>,
        params: AcquisitionParameters,
    },
}

impl RawSpectrum {
    pub fn is_frequency_domain(&self) -> bool {
        matches!(self, RawSpectrum::FrequencyDomain(_))
    }
}

/// Named fallback strategies. Every time one is taken it is recorded on the
/// result so callers (and tests) can see it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Heuristic {
    /// More than two columns in a text export; the most peak-like one was used.
    IntensityColumnSelected { column: usize, candidates: usize },
    /// No usable parameter file; [`AcquisitionParameters::synthesized_default`] was used.
    DefaultAcquisitionParameters { reason: String },
    /// The transformed spectrum was negated (`|min| / |max|` recorded).
    PolarityInverted { ratio: f64 },
    /// The 10th-percentile noise estimate was zero and a floor was used instead.
    NoiseFloorApplied { floor: f64 },
    /// Chain length derived from a backbone peak count plus an offset.
    ChainLengthEstimated { backbone_peaks: usize, offset: u32 },
}

/// What the reader produced, including parameters and fallbacks taken.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRead {
    pub spectrum: RawSpectrum,
    /// Acquisition parameters when the source carried them.
    pub params: Option<AcquisitionParameters>,
    pub heuristics: Vec<Heuristic>,
}

impl RawRead {
    pub fn frequency_domain(trace: ChemicalShiftTrace, params: Option<AcquisitionParameters>) -> Self {
        Self {
            spectrum: RawSpectrum::FrequencyDomain(trace),
            params,
            heuristics: Vec::new(),
        }
    }

    pub fn time_domain(samples: Vec<Complex<f64>>, params: AcquisitionParameters) -> Self {
        Self {
            spectrum: RawSpectrum::TimeDomain {
                samples,
                params: params.clone(),
            },
            params: Some(params),
            heuristics: Vec::new(),
        }
    }

    pub fn with_heuristic(mut self, h: Heuristic) -> Self {
        self.heuristics.push(h);
        self
    }
}
