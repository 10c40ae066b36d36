/// NMRPipe processed spectrum reader
///
/// NMRPipe uses a 2048-byte (512 float32) header followed by spectral data.
/// Only 1D frequency-domain files (`.ft`, `.ft1`) are accepted here; the
/// real part becomes the trace.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{Cursor, Seek, SeekFrom};
use std::path::Path;

use super::spectrum::*;
use crate::error::{AnalysisError, Result};

/// NMRPipe header size: 512 float32 values = 2048 bytes
const HEADER_FLOATS: usize = 512;
const HEADER_BYTES: usize = HEADER_FLOATS * 4;

/// Key header indices (0-based, each is a float32 slot)
mod idx {
    pub const FDFLTORDER: usize = 2;    // Byte order
    pub const FDDIMCOUNT: usize = 9;    // Number of dimensions
    pub const FDF2LABEL: usize = 16;    // F2 label (8 chars over two slots)
    pub const FDPIPEFLAG: usize = 57;   // Pipe mode flag
    pub const FDSIZE: usize = 99;       // Number of real points in current dim
    pub const FDF2SW: usize = 100;      // Spectral width F2 (Hz)
    pub const FDF2ORIG: usize = 101;    // Origin F2 (Hz)
    pub const FDQUADFLAG: usize = 106;  // 0=complex, 1=real
    pub const FDF2OBS: usize = 119;     // Observe freq F2 (MHz)
    pub const FDSPECNUM: usize = 219;   // Number of spectra (Y size for 2D)
    pub const FDF2FTFLAG: usize = 220;  // 1=freq domain, 0=time domain
}

/// Byte-order marker stored in FDFLTORDER by the writing machine.
const ORDER_MARKER: f32 = 2.345;

/// Read a 1D frequency-domain NMRPipe file.
pub fn read_nmrpipe_file(path: &Path) -> Result<RawRead> {
    let data = std::fs::read(path)?;
    read_nmrpipe_bytes(&data)
}

pub(crate) fn read_nmrpipe_bytes(data: &[u8]) -> Result<RawRead> {
    if data.len() < HEADER_BYTES {
        return Err(AnalysisError::corrupt("File too small for NMRPipe format"));
    }

    // Parse header as 512 little-endian floats first
    let mut header = vec![0.0f32; HEADER_FLOATS];
    let mut cursor = Cursor::new(&data[..HEADER_BYTES]);
    for h in header.iter_mut() {
        *h = cursor.read_f32::<LittleEndian>()?;
    }

    // FDFLTORDER should read as ≈ 2.345; otherwise the file is big-endian.
    let is_big_endian = (header[idx::FDFLTORDER] - ORDER_MARKER).abs() > 0.01;
    if is_big_endian {
        cursor.seek(SeekFrom::Start(0))?;
        for h in header.iter_mut() {
            *h = cursor.read_f32::<BigEndian>()?;
        }
        if (header[idx::FDFLTORDER] - ORDER_MARKER).abs() > 0.01 {
            return Err(AnalysisError::corrupt(
                "NMRPipe byte-order marker not found in either byte order",
            ));
        }
    }

    let ndim = header[idx::FDDIMCOUNT] as usize;
    let nspec = header[idx::FDSPECNUM] as usize;
    if ndim > 1 && nspec > 1 {
        return Err(AnalysisError::unreadable(format!(
            "{}D NMRPipe data is not supported; expected a 1D spectrum",
            ndim
        )));
    }
    if header[idx::FDF2FTFLAG] as i32 != 1 {
        return Err(AnalysisError::unreadable(
            "NMRPipe file is time-domain; expected a transformed spectrum",
        ));
    }

    let npts = header[idx::FDSIZE] as usize;
    let sw = header[idx::FDF2SW] as f64;
    let obs = header[idx::FDF2OBS] as f64;
    let orig = header[idx::FDF2ORIG] as f64;
    if npts == 0 || sw <= 0.0 || obs <= 0.0 {
        return Err(AnalysisError::corrupt(format!(
            "NMRPipe header has invalid axis: size={}, sw={}, obs={}",
            npts, sw, obs
        )));
    }

    // Spectral data follows the header
    let data_slice = &data[HEADER_BYTES..];
    let num_floats = data_slice.len() / 4;
    let mut cursor = Cursor::new(data_slice);
    let mut values = Vec::with_capacity(num_floats);
    for _ in 0..num_floats {
        let v = if is_big_endian {
            cursor.read_f32::<BigEndian>()?
        } else {
            cursor.read_f32::<LittleEndian>()?
        };
        values.push(v as f64);
    }

    let is_complex = header[idx::FDQUADFLAG] as i32 == 0;
    let is_pipe_mode = header[idx::FDPIPEFLAG] as i32 == 1;
    let real: Vec<f64> = if is_complex && is_pipe_mode {
        // Pipe/stream mode: interleaved R, I, R, I, ...
        values.iter().step_by(2).copied().take(npts).collect()
    } else {
        // File mode: R...R then (if complex) I...I
        values.iter().copied().take(npts).collect()
    };
    if real.len() < npts {
        return Err(AnalysisError::corrupt(format!(
            "NMRPipe data truncated: header says {} points, found {}",
            npts,
            real.len()
        )));
    }

    // FDF2ORIG is the frequency (Hz) of the right edge (lowest ppm).
    // Index 0 sits at ORIG + SW; points are SW / n apart.
    let first_ppm = (orig + sw) / obs;
    let step_ppm = sw / obs / npts as f64;
    let last_ppm = first_ppm - step_ppm * (npts - 1) as f64;
    let positions = linear_axis(first_ppm, last_ppm, npts);

    let label = decode_label(&header, idx::FDF2LABEL, is_big_endian);
    log::info!(
        "Read NMRPipe spectrum: {} points, label '{}', {:.3} MHz",
        npts,
        label,
        obs
    );

    let nucleus = if label.is_empty() {
        Nucleus::F19
    } else {
        Nucleus::from_label(&label)
    };
    let params = AcquisitionParameters::new(
        nucleus,
        obs,
        sw / obs,
        (first_ppm + last_ppm) / 2.0 * obs,
        1,
        0.0,
    )
    .ok();

    let trace = ChemicalShiftTrace::new(positions, real)?;
    Ok(RawRead::frequency_domain(trace, params))
}

/// Decode a label stored as raw characters in two consecutive float slots.
fn decode_label(header: &[f32], start_idx: usize, big_endian: bool) -> String {
    if start_idx + 1 >= header.len() {
        return String::new();
    }
    let to_bytes = |v: f32| {
        if big_endian {
            v.to_bits().to_be_bytes()
        } else {
            v.to_bits().to_le_bytes()
        }
    };
    let combined: Vec<u8> = to_bytes(header[start_idx])
        .iter()
        .chain(to_bytes(header[start_idx + 1]).iter())
        .copied()
        .filter(|&b| b.is_ascii_alphanumeric())
        .collect();
    String::from_utf8_lossy(&combined).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn fixture(big_endian: bool, ftflag: f32, values: &[f32]) -> Vec<u8> {
        let mut header = vec![0.0f32; HEADER_FLOATS];
        header[idx::FDFLTORDER] = ORDER_MARKER;
        header[idx::FDDIMCOUNT] = 1.0;
        header[idx::FDSIZE] = values.len() as f32;
        header[idx::FDQUADFLAG] = 1.0;
        header[idx::FDF2FTFLAG] = ftflag;
        header[idx::FDF2SW] = 4000.0;
        header[idx::FDF2OBS] = 400.0;
        header[idx::FDF2ORIG] = -48000.0;

        let mut out = Vec::new();
        for (i, &h) in header.iter().enumerate() {
            if i == idx::FDF2LABEL {
                out.extend_from_slice(b"19F\0");
                continue;
            }
            if big_endian {
                out.write_f32::<BigEndian>(h).unwrap();
            } else {
                out.write_f32::<LittleEndian>(h).unwrap();
            }
        }
        for &v in values {
            if big_endian {
                out.write_f32::<BigEndian>(v).unwrap();
            } else {
                out.write_f32::<LittleEndian>(v).unwrap();
            }
        }
        out
    }

    #[test]
    fn test_read_little_endian() {
        let bytes = fixture(false, 1.0, &[0.0, 1.0, 5.0, 1.0]);
        let read = read_nmrpipe_bytes(&bytes).unwrap();
        let trace = match read.spectrum {
            RawSpectrum::FrequencyDomain(t) => t,
            other => panic!("expected frequency domain, got {:?}", other),
        };
        assert_eq!(trace.intensities(), &[0.0, 1.0, 5.0, 1.0]);
        // (ORIG + SW) / OBS = -110 ppm at index 0, 2.5 ppm steps
        assert!((trace.positions()[0] + 110.0).abs() < 1e-9);
        assert!((trace.positions()[3] + 117.5).abs() < 1e-9);
        assert_eq!(read.params.unwrap().nucleus, Nucleus::F19);
    }

    #[test]
    fn test_read_big_endian() {
        let bytes = fixture(true, 1.0, &[3.0, 2.0]);
        let read = read_nmrpipe_bytes(&bytes).unwrap();
        match read.spectrum {
            RawSpectrum::FrequencyDomain(t) => assert_eq!(t.intensities(), &[3.0, 2.0]),
            other => panic!("expected frequency domain, got {:?}", other),
        }
    }

    #[test]
    fn test_time_domain_rejected() {
        let bytes = fixture(false, 0.0, &[1.0, 2.0]);
        assert!(matches!(
            read_nmrpipe_bytes(&bytes),
            Err(AnalysisError::UnreadableFormat(_))
        ));
    }

    #[test]
    fn test_short_file_is_corrupt() {
        assert!(matches!(
            read_nmrpipe_bytes(&[0u8; 100]),
            Err(AnalysisError::CorruptData(_))
        ));
    }

    #[test]
    fn test_truncated_data_is_corrupt() {
        let mut bytes = fixture(false, 1.0, &[1.0, 2.0, 3.0]);
        bytes.truncate(bytes.len() - 4);
        assert!(matches!(
            read_nmrpipe_bytes(&bytes),
            Err(AnalysisError::CorruptData(_))
        ));
    }
}
