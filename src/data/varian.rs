/// Varian / Agilent VnmrJ FID reader
///
/// An experiment is a `<name>.fid` directory holding a binary `fid` and a
/// text `procpar`. The binary file starts with a 32-byte big-endian file
/// header, followed by blocks each led by one or more 28-byte block headers.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt};
use num_complex::Complex;

use super::spectrum::*;
use crate::error::{AnalysisError, Result};

pub const FILE_HEADER_BYTES: usize = 32;
pub const BLOCK_HEADER_BYTES: usize = 28;

/// Status bits shared by file and block headers.
pub const S_DATA: i16 = 0x1;
pub const S_32: i16 = 0x4;
pub const S_FLOAT: i16 = 0x8;

// ────────────────────────────────────────────────────────────────
//  procpar parsing
// ────────────────────────────────────────────────────────────────

/// A procpar value: reals or strings depending on the parameter's basic type.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcparValue {
    Real(Vec<f64>),
    Text(Vec<String>),
}

/// Parse a `procpar` file.
///
/// Each parameter is a name line with 11 fields (`name subtype basictype …`),
/// a value line `count v1 v2 …` (string values continue one per line), then
/// an enumeration line.
pub fn parse_procpar(content: &str) -> HashMap<String, ProcparValue> {
    let mut params = HashMap::new();
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());

    while let Some(name_line) = lines.next() {
        let fields: Vec<&str> = name_line.split_whitespace().collect();
        if fields.len() != 11 {
            continue;
        }
        let name = fields[0].to_string();
        let basic_type = fields[2].parse::<i32>().unwrap_or(0);

        let Some(value_line) = lines.next() else {
            break;
        };
        let value_line = value_line.trim();
        let (count_str, rest) = value_line
            .split_once(char::is_whitespace)
            .unwrap_or((value_line, ""));
        let count = count_str.parse::<usize>().unwrap_or(0);

        let value = if basic_type == 2 {
            let mut values = Vec::with_capacity(count);
            if count > 0 {
                values.push(unquote(rest));
                for _ in 1..count {
                    match lines.next() {
                        Some(l) => values.push(unquote(l)),
                        None => break,
                    }
                }
            }
            ProcparValue::Text(values)
        } else {
            ProcparValue::Real(
                rest.split_whitespace()
                    .filter_map(|t| t.parse::<f64>().ok())
                    .collect(),
            )
        };
        params.insert(name, value);

        // enumeration line
        lines.next();
    }

    params
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches('"').to_string()
}

fn real(params: &HashMap<String, ProcparValue>, key: &str) -> Option<f64> {
    match params.get(key) {
        Some(ProcparValue::Real(v)) => v.first().copied(),
        _ => None,
    }
}

fn text(params: &HashMap<String, ProcparValue>, key: &str) -> Option<String> {
    match params.get(key) {
        Some(ProcparValue::Text(v)) => v.first().cloned(),
        _ => None,
    }
}

/// Build acquisition parameters from procpar values.
///
/// The reference offset is `sw/2 − rfl + rfp` Hz, which puts the axis centre
/// at the referenced position of the middle point.
pub fn procpar_to_acquisition(
    params: &HashMap<String, ProcparValue>,
    base_frequency_mhz: f64,
) -> Result<AcquisitionParameters> {
    let nucleus = text(params, "tn")
        .filter(|s| !s.is_empty())
        .map(|s| Nucleus::from_label(&s))
        .unwrap_or(Nucleus::F19);
    let freq = real(params, "sfrq")
        .filter(|f| *f > 0.0)
        .or_else(|| nucleus.frequency_from_proton(base_frequency_mhz))
        .unwrap_or(base_frequency_mhz);
    let sw_hz = real(params, "sw")
        .filter(|s| *s > 0.0)
        .ok_or_else(|| AnalysisError::corrupt("procpar has no positive 'sw'"))?;
    let rfl = real(params, "rfl").unwrap_or(sw_hz / 2.0);
    let rfp = real(params, "rfp").unwrap_or(0.0);

    AcquisitionParameters::new(
        nucleus,
        freq,
        sw_hz / freq,
        sw_hz / 2.0 - rfl + rfp,
        real(params, "nt").unwrap_or(1.0).max(0.0) as u32,
        real(params, "d1").unwrap_or(0.0),
    )
}

// ────────────────────────────────────────────────────────────────
//  Binary FID
// ────────────────────────────────────────────────────────────────

/// The 32-byte file header.
#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    pub nblocks: i32,
    pub ntraces: i32,
    /// Number of stored values per trace (real + imaginary)
    pub np: i32,
    pub ebytes: i32,
    pub tbytes: i32,
    pub bbytes: i32,
    pub vers_id: i16,
    pub status: i16,
    pub nbheaders: i32,
}

impl FileHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FILE_HEADER_BYTES {
            return Err(AnalysisError::corrupt(format!(
                "Varian fid is {} bytes, shorter than its {}-byte header",
                bytes.len(),
                FILE_HEADER_BYTES
            )));
        }
        let mut c = Cursor::new(bytes);
        Ok(Self {
            nblocks: c.read_i32::<BigEndian>()?,
            ntraces: c.read_i32::<BigEndian>()?,
            np: c.read_i32::<BigEndian>()?,
            ebytes: c.read_i32::<BigEndian>()?,
            tbytes: c.read_i32::<BigEndian>()?,
            bbytes: c.read_i32::<BigEndian>()?,
            vers_id: c.read_i16::<BigEndian>()?,
            status: c.read_i16::<BigEndian>()?,
            nbheaders: c.read_i32::<BigEndian>()?,
        })
    }

    fn element_bytes(&self) -> usize {
        if self.status & S_FLOAT != 0 || self.status & S_32 != 0 {
            4
        } else {
            2
        }
    }
}

/// Decode the first trace of the first block into complex samples.
pub fn decode_fid(bytes: &[u8]) -> Result<Vec<Complex<f64>>> {
    let hdr = FileHeader::parse(bytes)?;
    if hdr.nblocks < 1 || hdr.ntraces < 1 || hdr.np < 2 {
        return Err(AnalysisError::corrupt(format!(
            "Varian header has no data: nblocks={}, ntraces={}, np={}",
            hdr.nblocks, hdr.ntraces, hdr.np
        )));
    }
    let elem = hdr.element_bytes();
    if hdr.ebytes as usize != elem {
        log::warn!(
            "Varian header ebytes={} disagrees with status 0x{:x}; trusting status",
            hdr.ebytes,
            hdr.status
        );
    }
    if hdr.status & S_DATA == 0 {
        log::warn!("Varian header status lacks the data bit");
    }

    let np = hdr.np as usize;
    let start = FILE_HEADER_BYTES + hdr.nbheaders.max(1) as usize * BLOCK_HEADER_BYTES;
    let end = start + np * elem;
    let trace = bytes.get(start..end).ok_or_else(|| {
        AnalysisError::corrupt(format!(
            "Varian fid truncated: first trace needs bytes {}..{}, file has {}",
            start,
            end,
            bytes.len()
        ))
    })?;

    let mut c = Cursor::new(trace);
    let mut values = Vec::with_capacity(np);
    for _ in 0..np {
        let v = if hdr.status & S_FLOAT != 0 {
            c.read_f32::<BigEndian>()? as f64
        } else if hdr.status & S_32 != 0 {
            c.read_i32::<BigEndian>()? as f64
        } else {
            c.read_i16::<BigEndian>()? as f64
        };
        values.push(v);
    }

    Ok(values
        .chunks_exact(2)
        .map(|p| Complex::new(p[0], p[1]))
        .collect())
}

/// Read a Varian FID. `path` is the `.fid` directory or the `fid` file.
pub fn read_varian_fid(path: &Path, base_frequency_mhz: f64) -> Result<RawRead> {
    let (dir, fid_path) = if path.is_dir() {
        (path.to_path_buf(), path.join("fid"))
    } else {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        (dir, path.to_path_buf())
    };

    let procpar_path = dir.join("procpar");
    let (acquisition, fallback) = if procpar_path.is_file() {
        let params = parse_procpar(&fs::read_to_string(&procpar_path)?);
        (procpar_to_acquisition(&params, base_frequency_mhz)?, None)
    } else {
        let reason = format!("no procpar file next to {}", fid_path.display());
        log::warn!("{}; using synthesized acquisition parameters", reason);
        (
            AcquisitionParameters::synthesized_default(base_frequency_mhz),
            Some(reason),
        )
    };

    let samples = decode_fid(&fs::read(&fid_path)?)?;
    log::info!(
        "Read Varian FID: {} complex points, {} at {:.3} MHz",
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
