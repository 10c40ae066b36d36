//! One dispatch from [`FormatKind`] to the format modules.

use std::path::Path;

use super::spectrum::{FormatKind, ProcessedKind, RawRead};
use super::{bruker, jcamp, jdf, nmrpipe_format, tabular, varian};
use crate::error::{AnalysisError, Result};

/// Decode `path` as `kind`. `base_frequency_mhz` is the spectrometer ¹H
/// frequency, used when a file lacks its own acquisition parameters.
pub fn read(path: &Path, kind: FormatKind, base_frequency_mhz: f64) -> Result<RawRead> {
    log::info!("Reading {} as {}", path.display(), kind);
    let read = match kind {
        FormatKind::TabularText => tabular::read_tabular(path)?,
        FormatKind::BrukerFid => bruker::read_bruker_fid(path, base_frequency_mhz)?,
        FormatKind::VarianFid => varian::read_varian_fid(path, base_frequency_mhz)?,
        FormatKind::JeolDelta => jdf::read_jdf(path, base_frequency_mhz)?,
        FormatKind::Processed(ProcessedKind::NmrPipe) => nmrpipe_format::read_nmrpipe_file(path)?,
        FormatKind::Processed(ProcessedKind::JcampDx) => {
            jcamp::read_jcamp_file(path, base_frequency_mhz)?
        }
        FormatKind::Unknown => {
            return Err(AnalysisError::unreadable(format!(
                "{} is not a recognised NMR data layout",
                path.display()
            )));
        }
    };
    for h in &read.heuristics {
        log::warn!("Reader fallback: {:?}", h);
    }
    Ok(read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::spectrum::{Heuristic, RawSpectrum};
    use std::fs;

    #[test]
    fn test_unknown_is_unreadable() {
        let err = read(Path::new("whatever.xyz"), FormatKind::Unknown, 400.0).unwrap_err();
        assert!(matches!(err, AnalysisError::UnreadableFormat(_)));
    }

    #[test]
    fn test_missing_file_is_io() {
        let err = read(Path::new("/no/such/file.csv"), FormatKind::TabularText, 400.0).unwrap_err();
        assert!(matches!(err, AnalysisError::Io(_)));
    }

    #[test]
    fn test_bruker_without_acqus_synthesizes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut raw = Vec::new();
        for v in [1000i32, 0, 500, 0, 250, 0, 125, 0] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        let fid = dir.path().join("fid");
        fs::write(&fid, raw).unwrap();

        let read = read(&fid, FormatKind::BrukerFid, 400.0).unwrap();
        assert!(matches!(
            read.heuristics.as_slice(),
            [Heuristic::DefaultAcquisitionParameters { .. }]
        ));
        match read.spectrum {
            RawSpectrum::TimeDomain { samples, params } => {
                assert_eq!(samples.len(), 4);
                assert!((params.sweep_width_ppm - 250.0).abs() < 1e-12);
            }
            other => panic!("expected time domain, got {:?}", other),
        }
    }
}
