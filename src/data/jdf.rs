/// JEOL Delta (.jdf) native reader
///
/// A Delta file is a 1360-byte big-endian header, a parameter section of
/// fixed-size records and a data section whose byte order is given by the
/// header's endian flag. Only 1D data is read; the real block is followed by
/// the imaginary block.

use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use num_complex::Complex;

use super::spectrum::*;
use crate::error::{AnalysisError, Result};

/// Standard JEOL header size in bytes.
pub const DELTA_HDR_SIZE: usize = 1360;
pub const DELTA_FILE_ID: &[u8; 8] = b"JEOL.NMR";

// ─── Header constants ───────────────────────────────────────────────────────

pub const JEOL_DATATYPE_DOUBLE: u8 = 0;
pub const JEOL_DATATYPE_FLOAT: u8 = 1;

pub const JEOL_BIG_ENDIAN: u8 = 0;
pub const JEOL_LITTLE_ENDIAN: u8 = 1;

pub const JEOL_AXISTYPE_REAL: u8 = 1;
pub const JEOL_AXISTYPE_COMPLEX: u8 = 3;
pub const JEOL_AXISTYPE_REAL_COMPLEX: u8 = 4;

pub const JEOL_SIUNIT_HZ: i32 = 13;
pub const JEOL_SIUNIT_PPM: i32 = 26;
pub const JEOL_SIUNIT_SECONDS: i32 = 28;

pub const JEOL_PARMVAL_STR: i32 = 0;
pub const JEOL_PARMVAL_INT: i32 = 1;
pub const JEOL_PARMVAL_FLT: i32 = 2;

/// Header byte offsets.
mod off {
    pub const ENDIAN: usize = 8;
    pub const DIM_COUNT: usize = 12;
    pub const DATA_TYPE: usize = 14;
    pub const AXIS_TYPE: usize = 24;
    pub const UNITS: usize = 32;
    pub const SIZE_LIST: usize = 176;
    pub const AXIS_START: usize = 272;
    pub const AXIS_STOP: usize = 336;
    pub const BASE_FREQ: usize = 1064;
    pub const ZERO_POINT: usize = 1128;
    pub const PARAM_START: usize = 1212;
    pub const PARAM_LENGTH: usize = 1216;
    pub const DATA_START: usize = 1284;
    pub const DATA_LENGTH: usize = 1288;
}

// ─── Unit structures ────────────────────────────────────────────────────────

/// JEOL SI unit: scale prefix, exponent and unit type.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JUnit {
    pub unit_type: i32,
    pub unit_exp: i32,
    pub scale_type: i32,
}

fn read_junit(buf: &[u8], at: usize) -> JUnit {
    let b0 = buf[at];
    let b1 = buf[at + 1];

    let mut unit_exp = (b0 & 0x0F) as i32;
    if unit_exp > 7 {
        unit_exp -= 16;
    }
    let mut scale_type = ((b0 >> 4) & 0x0F) as i32;
    if scale_type > 7 {
        scale_type -= 16;
    }

    JUnit {
        unit_type: b1 as i32,
        unit_exp,
        scale_type,
    }
}

/// Multiply by the SI prefix (`scale_type` −2 is mega, +1 is milli).
fn apply_unit_scale(val: f64, unit: &JUnit) -> f64 {
    val * 10f64.powi(-3 * unit.scale_type)
}

// ─── Header ─────────────────────────────────────────────────────────────────

/// The subset of the Delta header a 1D reader needs (X axis only).
#[derive(Debug, Clone)]
pub struct DeltaHeader {
    pub endian: u8,
    pub dim_count: u8,
    pub data_type: u8,
    pub data_format: u8,
    pub axis_type: u8,
    pub unit: JUnit,
    pub points: u32,
    pub axis_start: f64,
    pub axis_stop: f64,
    /// MHz
    pub base_freq: f64,
    pub zero_point: f64,
    pub param_start: u32,
    pub param_length: u32,
    pub data_start: u32,
    pub data_length: u64,
}

impl DeltaHeader {
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < DELTA_HDR_SIZE {
            return Err(AnalysisError::corrupt(format!(
                "JEOL header truncated: {} of {} bytes",
                buf.len(),
                DELTA_HDR_SIZE
            )));
        }
        if &buf[..8] != DELTA_FILE_ID {
            return Err(AnalysisError::corrupt("missing JEOL.NMR file identifier"));
        }
        let type_byte = buf[off::DATA_TYPE];
        Ok(Self {
            endian: buf[off::ENDIAN],
            dim_count: buf[off::DIM_COUNT],
            data_type: type_byte >> 6,
            data_format: type_byte & 0x3F,
            axis_type: buf[off::AXIS_TYPE],
            unit: read_junit(buf, off::UNITS),
            points: BigEndian::read_u32(&buf[off::SIZE_LIST..]),
            axis_start: BigEndian::read_f64(&buf[off::AXIS_START..]),
            axis_stop: BigEndian::read_f64(&buf[off::AXIS_STOP..]),
            base_freq: BigEndian::read_f64(&buf[off::BASE_FREQ..]),
            zero_point: BigEndian::read_f64(&buf[off::ZERO_POINT..]),
            param_start: BigEndian::read_u32(&buf[off::PARAM_START..]),
            param_length: BigEndian::read_u32(&buf[off::PARAM_LENGTH..]),
            data_start: BigEndian::read_u32(&buf[off::DATA_START..]),
            data_length: BigEndian::read_u64(&buf[off::DATA_LENGTH..]),
        })
    }

    pub fn is_complex(&self) -> bool {
        matches!(
            self.axis_type,
            JEOL_AXISTYPE_COMPLEX | JEOL_AXISTYPE_REAL_COMPLEX
        )
    }

    pub fn is_time_domain(&self) -> bool {
        self.unit.unit_type == JEOL_SIUNIT_SECONDS
    }

    fn word_size(&self) -> usize {
        if self.data_type == JEOL_DATATYPE_FLOAT {
            4
        } else {
            8
        }
    }
}

// ─── Parameter section ──────────────────────────────────────────────────────

/// Values pulled from the parameter section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaParams {
    pub x_freq_mhz: Option<f64>,
    pub x_offset_ppm: Option<f64>,
    /// Offset given in Hz; converted once the frequency is known.
    pub x_offset_hz: Option<f64>,
    pub x_sweep_hz: Option<f64>,
    pub x_domain: Option<String>,
    pub scans: Option<u32>,
    pub relaxation_delay_s: Option<f64>,
}

/// Scan the 64-byte parameter records. The section starts with a 16-byte
/// header (record size, low id, high id, total size).
pub fn parse_params(section: &[u8], little_endian: bool) -> DeltaParams {
    let read_u32 = |b: &[u8]| {
        if little_endian {
            LittleEndian::read_u32(b)
        } else {
            BigEndian::read_u32(b)
        }
    };
    let read_i32 = |b: &[u8]| read_u32(b) as i32;
    let read_i16 = |b: &[u8]| {
        if little_endian {
            LittleEndian::read_i16(b)
        } else {
            BigEndian::read_i16(b)
        }
    };
    let read_f64 = |b: &[u8]| {
        if little_endian {
            LittleEndian::read_f64(b)
        } else {
            BigEndian::read_f64(b)
        }
    };

    let mut params = DeltaParams::default();
    if section.len() < 16 {
        return params;
    }
    let parm_size = read_u32(&section[0..]) as usize;
    let lo_id = read_u32(&section[4..]);
    let hi_id = read_u32(&section[8..]);
    if parm_size < 64 || hi_id < lo_id {
        log::warn!("JEOL parameter section header looks invalid; skipping");
        return params;
    }

    for i in 0..(hi_id - lo_id) as usize {
        let start = 16 + i * parm_size;
        let Some(rec) = section.get(start..start + parm_size) else {
            break;
        };
        let name = read_text(&rec[36..64]).to_uppercase();
        let val_type = read_i32(&rec[32..]);
        let unit_scale = read_i16(&rec[4..]) as i32;
        let unit = read_junit(rec, 6);

        let numeric = match val_type {
            JEOL_PARMVAL_INT => Some(read_i32(&rec[16..]) as f64),
            JEOL_PARMVAL_FLT => Some(read_f64(&rec[16..])),
            _ => None,
        }
        .map(|v| apply_unit_scale(v, &unit) * 10f64.powi(unit_scale));
        let text = (val_type == JEOL_PARMVAL_STR).then(|| read_text(&rec[16..32]));

        match name.as_str() {
            "X_FREQ" => params.x_freq_mhz = numeric.map(|hz| hz / 1.0e6),
            "X_OFFSET" => match unit.unit_type {
                JEOL_SIUNIT_HZ => params.x_offset_hz = numeric,
                _ => params.x_offset_ppm = numeric,
            },
            "X_SWEEP" => params.x_sweep_hz = numeric,
            "X_DOMAIN" => params.x_domain = text,
            "SCANS" => params.scans = numeric.map(|v| v.max(0.0) as u32),
            "RELAXATION_DELAY" => params.relaxation_delay_s = numeric,
            _ => {}
        }
    }
    params
}

fn read_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

// ─── Reader ─────────────────────────────────────────────────────────────────

/// Read a 1D JEOL Delta file.
pub fn read_jdf(path: &Path, base_frequency_mhz: f64) -> Result<RawRead> {
    let bytes = std::fs::read(path)?;
    read_jdf_bytes(&bytes, base_frequency_mhz)
}

pub(crate) fn read_jdf_bytes(bytes: &[u8], base_frequency_mhz: f64) -> Result<RawRead> {
    let hdr = DeltaHeader::parse(bytes)?;
    if hdr.dim_count != 1 {
        return Err(AnalysisError::unreadable(format!(
            "{}D JEOL data is not supported; expected a 1D experiment",
            hdr.dim_count
        )));
    }
    if hdr.points == 0 {
        return Err(AnalysisError::corrupt("JEOL header reports zero points"));
    }
    let little_endian = hdr.endian == JEOL_LITTLE_ENDIAN;

    let params = if hdr.param_length > 0 {
        let start = hdr.param_start as usize;
        let end = start.saturating_add(hdr.param_length as usize).min(bytes.len());
        bytes
            .get(start..end)
            .map(|s| parse_params(s, little_endian))
            .unwrap_or_default()
    } else {
        DeltaParams::default()
    };

    // Data section
    let npts = hdr.points as usize;
    let channels = if hdr.is_complex() { 2 } else { 1 };
    let word = hdr.word_size();
    let needed = npts * channels * word;
    let start = hdr.data_start as usize;
    let data = bytes
        .get(start..start.saturating_add(needed))
        .ok_or_else(|| {
            AnalysisError::corrupt(format!(
                "JEOL data section truncated: need {} bytes at offset {}, file has {}",
                needed,
                start,
                bytes.len()
            ))
        })?;
    let values: Vec<f64> = match (word, little_endian) {
        (8, true) => data.chunks_exact(8).map(LittleEndian::read_f64).collect(),
        (8, false) => data.chunks_exact(8).map(BigEndian::read_f64).collect(),
        (_, true) => data
            .chunks_exact(4)
            .map(|b| LittleEndian::read_f32(b) as f64)
            .collect(),
        (_, false) => data
            .chunks_exact(4)
            .map(|b| BigEndian::read_f32(b) as f64)
            .collect(),
    };
    let (real, imag) = values.split_at(npts);

    let nucleus = params
        .x_domain
        .as_deref()
        .map(Nucleus::from_label)
        .unwrap_or(Nucleus::F19);
    // Every parameter not read from the file is named here.
    let mut fallbacks: Vec<String> = Vec::new();
    let freq = match params.x_freq_mhz.filter(|f| *f > 0.0) {
        Some(f) => f,
        None if hdr.base_freq > 0.0 => {
            fallbacks.push("X_FREQ missing, used header base frequency".to_string());
            hdr.base_freq
        }
        None => {
            fallbacks.push(format!(
                "X_FREQ missing, derived from {} MHz 1H base frequency",
                base_frequency_mhz
            ));
            nucleus
                .frequency_from_proton(base_frequency_mhz)
                .unwrap_or(base_frequency_mhz)
        }
    };

    if hdr.is_time_domain() {
        let sweep_hz = match params.x_sweep_hz.filter(|s| *s > 0.0) {
            Some(s) => s,
            None => {
                // Dwell time from the axis: stop - start spans npts - 1 intervals.
                let span = (hdr.axis_stop - hdr.axis_start).abs();
                if span <= 0.0 || npts < 2 {
                    return Err(AnalysisError::corrupt("JEOL file carries no sweep width"));
                }
                fallbacks.push("X_SWEEP missing, derived from the time axis".to_string());
                (npts - 1) as f64 / span
            }
        };
        let offset_ppm = match (params.x_offset_ppm, params.x_offset_hz) {
            (Some(ppm), _) => ppm,
            (None, Some(hz)) => hz / freq,
            (None, None) => {
                fallbacks.push(format!(
                    "X_OFFSET missing, centred on {} ppm",
                    DEFAULT_CENTER_PPM
                ));
                DEFAULT_CENTER_PPM
            }
        };

        let acquisition = AcquisitionParameters::new(
            nucleus,
            freq,
            sweep_hz / freq,
            offset_ppm * freq,
            params.scans.unwrap_or(1),
            params.relaxation_delay_s.unwrap_or(0.0),
        )?;
        let samples: Vec<Complex<f64>> = if imag.is_empty() {
            real.iter().map(|&re| Complex::new(re, 0.0)).collect()
        } else {
            real.iter()
                .zip(imag.iter())
                .map(|(&re, &im)| Complex::new(re, im))
                .collect()
        };
        log::info!(
            "Read JEOL FID: {} complex points, {} at {:.3} MHz",
            samples.len(),
            acquisition.nucleus,
            freq
        );
        return Ok(with_fallbacks(
            RawRead::time_domain(samples, acquisition),
            fallbacks,
        ));
    }

    // Frequency-domain file: axis from start/stop in the X unit.
    if !matches!(hdr.unit.unit_type, JEOL_SIUNIT_HZ | JEOL_SIUNIT_PPM) {
        return Err(AnalysisError::unreadable(format!(
            "JEOL X axis unit {} is neither seconds, Hz nor ppm",
            hdr.unit.unit_type
        )));
    }
    let to_ppm = |v: f64| match hdr.unit.unit_type {
        JEOL_SIUNIT_HZ => apply_unit_scale(v, &hdr.unit) / freq,
        _ => v,
    };
    let positions = linear_axis(to_ppm(hdr.axis_start), to_ppm(hdr.axis_stop), npts);
    let sweep_ppm = (to_ppm(hdr.axis_start) - to_ppm(hdr.axis_stop)).abs();
    let params_record = AcquisitionParameters::new(
        nucleus,
        freq,
        sweep_ppm,
        (to_ppm(hdr.axis_start) + to_ppm(hdr.axis_stop)) / 2.0 * freq,
        params.scans.unwrap_or(1),
        params.relaxation_delay_s.unwrap_or(0.0),
    )
    .ok();
    log::info!("Read JEOL spectrum: {} points", npts);
    let trace = ChemicalShiftTrace::new(positions, real.to_vec())?;
    Ok(with_fallbacks(
        RawRead::frequency_domain(trace, params_record),
        fallbacks,
    ))
}

fn with_fallbacks(read: RawRead, fallbacks: Vec<String>) -> RawRead {
    if fallbacks.is_empty() {
        return read;
    }
    let reason = fallbacks.join("; ");
    log::warn!("JEOL parameters incomplete: {}", reason);
    read.with_heuristic(Heuristic::DefaultAcquisitionParameters { reason })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal 1D Delta file. Parameters are stored big-endian.
    fn fixture(unit_type: u8, real: &[f64], imag: &[f64], params: &[(&str, f64)]) -> Vec<u8> {
        let mut buf = vec![0u8; DELTA_HDR_SIZE];
        buf[..8].copy_from_slice(DELTA_FILE_ID);
        buf[off::ENDIAN] = JEOL_BIG_ENDIAN;
        buf[off::DIM_COUNT] = 1;
        buf[off::DATA_TYPE] = (JEOL_DATATYPE_DOUBLE << 6) | 1;
        buf[off::AXIS_TYPE] = if imag.is_empty() {
            JEOL_AXISTYPE_REAL
        } else {
            JEOL_AXISTYPE_COMPLEX
        };
        buf[off::UNITS + 1] = unit_type;
        BigEndian::write_u32(&mut buf[off::SIZE_LIST..], real.len() as u32);
        BigEndian::write_f64(&mut buf[off::AXIS_START..], -70.0);
        BigEndian::write_f64(&mut buf[off::AXIS_STOP..], -130.0);
        BigEndian::write_f64(&mut buf[off::BASE_FREQ..], 376.0);

        let mut section = vec![0u8; 16];
        BigEndian::write_u32(&mut section[0..], 64);
        BigEndian::write_u32(&mut section[4..], 0);
        BigEndian::write_u32(&mut section[8..], params.len() as u32);
        for (name, value) in params {
            let mut rec = vec![0u8; 64];
            BigEndian::write_f64(&mut rec[16..], *value);
            BigEndian::write_u32(&mut rec[32..], JEOL_PARMVAL_FLT as u32);
            rec[36..36 + name.len()].copy_from_slice(name.as_bytes());
            section.extend_from_slice(&rec);
        }
        let param_start = DELTA_HDR_SIZE;
        BigEndian::write_u32(&mut buf[off::PARAM_START..], param_start as u32);
        BigEndian::write_u32(&mut buf[off::PARAM_LENGTH..], section.len() as u32);
        buf.extend_from_slice(&section);

        let data_start = buf.len();
        for v in real.iter().chain(imag.iter()) {
            let mut b = [0u8; 8];
            BigEndian::write_f64(&mut b, *v);
            buf.extend_from_slice(&b);
        }
        BigEndian::write_u32(&mut buf[off::DATA_START..], data_start as u32);
        let data_len = (buf.len() - data_start) as u64;
        BigEndian::write_u64(&mut buf[off::DATA_LENGTH..], data_len);
        buf
    }

    #[test]
    fn test_read_time_domain() {
        let bytes = fixture(
            JEOL_SIUNIT_SECONDS as u8,
            &[1.0, 2.0, 3.0, 4.0],
            &[0.5, 0.25, 0.0, -0.25],
            &[("X_FREQ", 376.0e6), ("X_SWEEP", 37600.0), ("X_OFFSET", -100.0), ("SCANS", 32.0)],
        );
        let read = read_jdf_bytes(&bytes, 400.0).unwrap();
        match &read.spectrum {
            RawSpectrum::TimeDomain { samples, params } => {
                assert_eq!(samples.len(), 4);
                assert_eq!(samples[1], Complex::new(2.0, 0.25));
                assert!((params.observe_frequency_mhz - 376.0).abs() < 1e-9);
                assert!((params.sweep_width_ppm - 100.0).abs() < 1e-9);
                assert!((params.reference_shift_ppm() + 100.0).abs() < 1e-9);
                assert_eq!(params.scan_count, 32);
            }
            other => panic!("expected time domain, got {:?}", other),
        }
        assert!(read.heuristics.is_empty());
    }

    #[test]
    fn test_missing_offset_is_reported() {
        let bytes = fixture(
            JEOL_SIUNIT_SECONDS as u8,
            &[1.0, 2.0, 3.0, 4.0],
            &[0.0; 4],
            &[("X_FREQ", 376.0e6), ("X_SWEEP", 37600.0)],
        );
        let read = read_jdf_bytes(&bytes, 400.0).unwrap();
        let params = read.params.as_ref().unwrap();
        assert!((params.reference_shift_ppm() - DEFAULT_CENTER_PPM).abs() < 1e-9);
        match read.heuristics.as_slice() {
            [Heuristic::DefaultAcquisitionParameters { reason }] => {
                assert!(reason.contains("X_OFFSET"), "{}", reason);
                assert!(!reason.contains("X_FREQ"), "{}", reason);
            }
            other => panic!("expected one fallback heuristic, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_frequency_is_reported() {
        let bytes = fixture(
            JEOL_SIUNIT_SECONDS as u8,
            &[1.0, 2.0],
            &[0.0, 0.0],
            &[("X_SWEEP", 37600.0), ("X_OFFSET", -100.0)],
        );
        let read = read_jdf_bytes(&bytes, 400.0).unwrap();
        assert!((read.params.as_ref().unwrap().observe_frequency_mhz - 376.0).abs() < 1e-9);
        match read.heuristics.as_slice() {
            [Heuristic::DefaultAcquisitionParameters { reason }] => {
                assert!(reason.contains("X_FREQ"), "{}", reason);
            }
            other => panic!("expected one fallback heuristic, got {:?}", other),
        }
    }

    #[test]
    fn test_read_frequency_domain_ppm_axis() {
        let bytes = fixture(JEOL_SIUNIT_PPM as u8, &[0.0, 5.0, 0.0, 0.0, 1.0, 0.0, 0.0], &[], &[]);
        let read = read_jdf_bytes(&bytes, 400.0).unwrap();
        match read.spectrum {
            RawSpectrum::FrequencyDomain(t) => {
                assert_eq!(t.len(), 7);
                assert!((t.positions()[0] + 70.0).abs() < 1e-9);
                assert!((t.positions()[6] + 130.0).abs() < 1e-9);
                assert_eq!(t.intensities()[1], 5.0);
            }
            other => panic!("expected frequency domain, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            read_jdf_bytes(&[0u8; 100], 400.0),
            Err(AnalysisError::CorruptData(_))
        ));
    }

    #[test]
    fn test_truncated_data() {
        let mut bytes = fixture(JEOL_SIUNIT_SECONDS as u8, &[1.0, 2.0], &[0.0, 0.0], &[("X_SWEEP", 1000.0)]);
        bytes.truncate(bytes.len() - 8);
        assert!(matches!(
            read_jdf_bytes(&bytes, 400.0),
            Err(AnalysisError::CorruptData(_))
        ));
    }

    #[test]
    fn test_multidimensional_rejected() {
        let mut bytes = fixture(JEOL_SIUNIT_SECONDS as u8, &[1.0], &[0.0], &[]);
        bytes[off::DIM_COUNT] = 2;
        assert!(matches!(
            read_jdf_bytes(&bytes, 400.0),
            Err(AnalysisError::UnreadableFormat(_))
        ));
    }

    #[test]
    fn test_unit_scale() {
        let mega = JUnit {
            unit_type: JEOL_SIUNIT_HZ,
            unit_exp: 1,
            scale_type: -2,
        };
        assert!((apply_unit_scale(600.13, &mega) - 600.13e6).abs() < 1.0);
        let milli = JUnit {
            unit_type: JEOL_SIUNIT_SECONDS,
            unit_exp: 1,
            scale_type: 1,
        };
        assert!((apply_unit_scale(250.0, &milli) - 0.25).abs() < 1e-12);
    }
}
