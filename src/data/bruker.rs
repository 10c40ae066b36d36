/// Bruker TopSpin / XWIN-NMR raw FID reader
///
/// Reads an experiment directory (`fid` + `acqus`) natively. The `acqus`
/// file is a JCAMP-DX–like list of `##$PARAM= value` records; `fid` holds
/// interleaved (re, im) words whose type and byte order are given by
/// `DTYPA` and `BYTORDA`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use num_complex::Complex;

use super::spectrum::*;
use crate::error::{AnalysisError, Result};

// ────────────────────────────────────────────────────────────────
//  acqus parameter parsing
// ────────────────────────────────────────────────────────────────

/// Parsed Bruker acquisition parameters (from acqus)
#[derive(Debug, Default)]
pub struct BrukerParams {
    /// Spectral width in Hz
    pub sw_h: f64,
    /// Spectral width in ppm
    pub sw: f64,
    /// Observe frequency in MHz (SFO1)
    pub sfo1: f64,
    /// Base frequency in MHz (BF1)
    pub bf1: f64,
    /// Offset frequency in Hz (O1)
    pub o1: f64,
    /// Total data points (TD), real + imaginary
    pub td: usize,
    /// Data type: 0 = int32, 2 = float64
    pub dtypa: i32,
    /// Byte order: 0 = little-endian, 1 = big-endian
    pub bytorda: i32,
    /// Intensity scaling exponent; stored words are multiplied by 2^NC
    pub nc: i32,
    pub ns: i32,
    /// Relaxation delay D1 in seconds
    pub d1: f64,
    /// Nucleus name (e.g. "19F")
    pub nuc1: String,
    /// Digital filter group delay (grpdly), modern TopSpin sets this
    pub grpdly: f64,
    pub decim: i32,
    pub dspfvs: i32,
}

/// Parse a Bruker `acqus` parameter file.
///
/// These files use a JCAMP-DX–like format with `##$PARAM= value` lines.
/// Array values (`(0..63)` followed by value lines) are joined with spaces.
pub fn parse_acqus(content: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut current_key = String::new();
    let mut current_val = String::new();

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("##$") {
            if !current_key.is_empty() {
                params.insert(current_key.clone(), current_val.trim().to_string());
            }
            match rest.find('=') {
                Some(eq_pos) => {
                    current_key = rest[..eq_pos].trim().to_string();
                    current_val = rest[eq_pos + 1..].trim().to_string();
                }
                None => {
                    current_key.clear();
                    current_val.clear();
                }
            }
        } else if line.starts_with("##") {
            if !current_key.is_empty() {
                params.insert(current_key.clone(), current_val.trim().to_string());
            }
            current_key.clear();
            current_val.clear();
        } else if !current_key.is_empty() && !line.starts_with("$$") {
            current_val.push(' ');
            current_val.push_str(line.trim());
        }
    }
    if !current_key.is_empty() {
        params.insert(current_key, current_val.trim().to_string());
    }

    params
}

fn get_f64(params: &HashMap<String, String>, key: &str) -> f64 {
    params
        .get(key)
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn get_i32(params: &HashMap<String, String>, key: &str) -> i32 {
    params
        .get(key)
        .and_then(|v| v.parse::<i32>().ok())
        .unwrap_or(0)
}

fn get_str(params: &HashMap<String, String>, key: &str) -> String {
    params
        .get(key)
        .map(|v| v.trim_matches(|c| c == '<' || c == '>').to_string())
        .unwrap_or_default()
}

/// Element `index` of an array parameter such as `##$D= (0..63)`.
fn get_array_f64(params: &HashMap<String, String>, key: &str, index: usize) -> f64 {
    params
        .get(key)
        .and_then(|v| {
            v.split_whitespace()
                .filter(|tok| !tok.starts_with('('))
                .nth(index)
                .and_then(|tok| tok.parse::<f64>().ok())
        })
        .unwrap_or(0.0)
}

/// Extract typed parameters from a parsed acqus map
pub fn extract_params(acq: &HashMap<String, String>) -> BrukerParams {
    BrukerParams {
        sw_h: get_f64(acq, "SW_h"),
        sw: get_f64(acq, "SW"),
        sfo1: get_f64(acq, "SFO1"),
        bf1: get_f64(acq, "BF1"),
        o1: get_f64(acq, "O1"),
        td: get_i32(acq, "TD").max(0) as usize,
        dtypa: get_i32(acq, "DTYPA"),
        bytorda: get_i32(acq, "BYTORDA"),
        nc: get_i32(acq, "NC"),
        ns: get_i32(acq, "NS"),
        d1: get_array_f64(acq, "D", 1),
        nuc1: get_str(acq, "NUC1"),
        grpdly: get_f64(acq, "GRPDLY"),
        decim: get_i32(acq, "DECIM"),
        dspfvs: get_i32(acq, "DSPFVS"),
    }
}

/// Compute the Bruker digital filter group delay from DECIM and DSPFVS.
///
/// Lookup table from NMRPipe documentation and Bruker manuals.
/// Only used as fallback when GRPDLY is not set in acqus.
fn compute_grpdly(decim: i32, dspfvs: i32) -> f64 {
    if decim <= 1 {
        return 0.0;
    }

    match dspfvs {
        10 => match decim {
            2 => 44.75, 3 => 33.5, 4 => 66.625, 6 => 59.0833,
            8 => 68.5625, 12 => 60.375, 16 => 69.5313, 24 => 61.0208,
            32 => 70.0156, 48 => 61.3438, 64 => 70.2578, 96 => 61.5052,
            128 => 70.3789, 192 => 61.5859, 256 => 70.4395, 384 => 61.6263,
            512 => 70.4697, 768 => 61.6465, 1024 => 70.4849, 1536 => 61.6566,
            2048 => 70.4924, _ => 0.0,
        },
        11 => match decim {
            2 => 46.0, 3 => 36.5, 4 => 48.0, 6 => 50.1667,
            8 => 53.25, 12 => 69.5, 16 => 72.25, 24 => 70.1667,
            32 => 72.75, 48 => 70.5, 64 => 73.0, 96 => 70.6667,
            128 => 72.5, 192 => 71.3333, 256 => 72.25, 384 => 71.6667,
            512 => 72.125, 768 => 71.8333, 1024 => 72.0625, 1536 => 71.9167,
            2048 => 72.0313, _ => 0.0,
        },
        12 => match decim {
            2 => 46.311, 3 => 36.530, 4 => 47.870, 6 => 50.229,
            8 => 53.289, 12 => 69.551, 16 => 71.600, 24 => 70.184,
            32 => 72.138, 48 => 70.528, 64 => 72.348, 96 => 70.700,
            128 => 72.524, _ => 0.0,
        },
        _ => 0.0,
    }
}

impl BrukerParams {
    /// Group delay in points: GRPDLY when set, else the DECIM/DSPFVS table.
    pub fn group_delay(&self) -> f64 {
        if self.grpdly > 0.0 {
            self.grpdly
        } else {
            compute_grpdly(self.decim, self.dspfvs)
        }
    }

    /// Convert to the shared parameter record. Frequency falls back
    /// SFO1 → BF1 → base × γ; sweep falls back SW → SW_h / frequency.
    pub fn to_acquisition(&self, base_frequency_mhz: f64) -> Result<AcquisitionParameters> {
        let nucleus = if self.nuc1.is_empty() || self.nuc1.eq_ignore_ascii_case("off") {
            Nucleus::F19
        } else {
            Nucleus::from_label(&self.nuc1)
        };
        let freq = if self.sfo1 > 0.0 {
            self.sfo1
        } else if self.bf1 > 0.0 {
            self.bf1
        } else {
            nucleus
                .frequency_from_proton(base_frequency_mhz)
                .unwrap_or(base_frequency_mhz)
        };
        let sweep_ppm = if self.sw > 0.0 {
            self.sw
        } else if self.sw_h > 0.0 {
            self.sw_h / freq
        } else {
            return Err(AnalysisError::corrupt("acqus has neither SW nor SW_h"));
        };
        AcquisitionParameters::new(
            nucleus,
            freq,
            sweep_ppm,
            self.o1,
            self.ns.max(0) as u32,
            self.d1,
        )
    }
}

// ────────────────────────────────────────────────────────────────
//  Native FID reading
// ────────────────────────────────────────────────────────────────

/// Locate `acqus` (or legacy `acqu`) in an experiment directory.
pub fn find_acqus(dir: &Path) -> Option<PathBuf> {
    ["acqus", "acqu"]
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

/// Read a Bruker FID. `path` is either the experiment directory or the
/// `fid` file inside it.
pub fn read_bruker_fid(path: &Path, base_frequency_mhz: f64) -> Result<RawRead> {
    let (dir, fid_path) = if path.is_dir() {
        let fid = if path.join("fid").is_file() {
            path.join("fid")
        } else if path.join("ser").is_file() {
            path.join("ser")
        } else {
            return Err(AnalysisError::corrupt(format!(
                "No fid or ser file found in {}",
                path.display()
            )));
        };
        (path.to_path_buf(), fid)
    } else {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        (dir, path.to_path_buf())
    };

    let (params, acquisition, fallback) = match find_acqus(&dir) {
        Some(acqus_path) => {
            let content = fs::read_to_string(&acqus_path)?;
            let params = extract_params(&parse_acqus(&content));
            let acquisition = params.to_acquisition(base_frequency_mhz)?;
            (params, acquisition, None)
        }
        None => {
            let reason = format!("no acqus file next to {}", fid_path.display());
            log::warn!("{}; using synthesized acquisition parameters", reason);
            // Without acqus assume the TopSpin defaults: int32, little-endian.
            let params = BrukerParams::default();
            (
                params,
                AcquisitionParameters::synthesized_default(base_frequency_mhz),
                Some(reason),
            )
        }
    };

    let raw = fs::read(&fid_path)?;
    let mut samples = decode_fid(&raw, &params)?;

    let grpdly = params.group_delay();
    let shift = grpdly.floor() as usize;
    if shift > 0 && shift < samples.len() {
        // Digital filter: the first `grpdly` points are filter transient.
        samples.rotate_left(shift);
        let len = samples.len();
        for s in &mut samples[len - shift..] {
            *s = Complex::new(0.0, 0.0);
        }
        log::info!("Removed Bruker digital filter delay of {} points", shift);
    }

    log::info!(
        "Read Bruker FID: {} complex points, {} at {:.3} MHz",
        samples.len(),
        acquisition.nucleus,
        acquisition.observe_frequency_mhz
    );

    let mut read = RawRead::time_domain(samples, acquisition);
    if let Some(reason) = fallback {
        read = read.with_heuristic(Heuristic::DefaultAcquisitionParameters { reason });
    }
    Ok(read)
}

/// Decode interleaved (re, im) words into complex samples.
fn decode_fid(raw: &[u8], params: &BrukerParams) -> Result<Vec<Complex<f64>>> {
    let word = if params.dtypa == 2 { 8 } else { 4 };
    if raw.len() % word != 0 {
        return Err(AnalysisError::corrupt(format!(
            "fid length {} is not a multiple of the {}-byte word size",
            raw.len(),
            word
        )));
    }
    if raw.len() < 2 * word {
        return Err(AnalysisError::corrupt(
            "fid is shorter than one complex point",
        ));
    }

    let available = raw.len() / word;
    let npoints = if params.td > 0 {
        params.td.min(available)
    } else {
        available
    };
    let scale = 2f64.powi(params.nc);

    let values = if params.dtypa == 2 {
        read_float64_data(raw, npoints, params.bytorda, scale)
    } else {
        read_int32_data(raw, npoints, params.bytorda, scale)
    };

    Ok(values
        .chunks_exact(2)
        .map(|pair| Complex::new(pair[0], pair[1]))
        .collect())
}

/// Read binary data as 32-bit integers, scaled
fn read_int32_data(raw: &[u8], npoints: usize, bytorda: i32, scale: f64) -> Vec<f64> {
    raw.chunks_exact(4)
        .take(npoints)
        .map(|b| {
            let v = if bytorda == 0 {
                LittleEndian::read_i32(b)
            } else {
                BigEndian::read_i32(b)
            };
            v as f64 * scale
        })
        .collect()
}

/// Read binary data as 64-bit floats, scaled
fn read_float64_data(raw: &[u8], npoints: usize, bytorda: i32, scale: f64) -> Vec<f64> {
    raw.chunks_exact(8)
        .take(npoints)
        .map(|b| {
            let v = if bytorda == 0 {
                LittleEndian::read_f64(b)
            } else {
                BigEndian::read_f64(b)
            };
            v * scale
        })
        .collect()
}
