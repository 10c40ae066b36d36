//! Decide which layout a path holds from names, siblings and at most an
//! 8-byte magic sniff. Never reads the payload and never fails.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::jdf::DELTA_FILE_ID;
use super::spectrum::{FormatKind, ProcessedKind};

/// Classify `path`. Nonexistent or unrecognised paths are `Unknown`.
pub fn classify(path: &Path) -> FormatKind {
    let kind = if path.is_dir() {
        classify_dir(path)
    } else if path.is_file() {
        classify_file(path)
    } else {
        FormatKind::Unknown
    };
    log::debug!("Classified {} as {}", path.display(), kind);
    kind
}

fn has_file(dir: &Path, name: &str) -> bool {
    dir.join(name).is_file()
}

fn classify_dir(dir: &Path) -> FormatKind {
    let has_fid = has_file(dir, "fid") || has_file(dir, "ser");
    let has_procpar = has_file(dir, "procpar");
    let has_acqus = has_file(dir, "acqus") || has_file(dir, "acqu");

    if has_fid && has_procpar {
        return FormatKind::VarianFid;
    }
    if has_acqus || (has_fid && dir.join("pdata").is_dir()) {
        return FormatKind::BrukerFid;
    }
    let is_fid_dir = dir
        .extension()
        .map(|e| e.eq_ignore_ascii_case("fid"))
        .unwrap_or(false);
    if is_fid_dir && has_file(dir, "fid") {
        return FormatKind::VarianFid;
    }
    FormatKind::Unknown
}

fn classify_file(path: &Path) -> FormatKind {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if name == "fid" {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        if has_file(dir, "procpar") {
            return FormatKind::VarianFid;
        }
        // With or without acqus the reader handles it as Bruker.
        return FormatKind::BrukerFid;
    }

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if ext == "jdf" || has_jeol_magic(path) {
        return FormatKind::JeolDelta;
    }

    match ext.as_str() {
        "ft" | "ft1" | "ft2" => FormatKind::Processed(ProcessedKind::NmrPipe),
        "jdx" | "dx" | "jcamp" => FormatKind::Processed(ProcessedKind::JcampDx),
        "csv" | "tsv" | "txt" | "dat" | "asc" => FormatKind::TabularText,
        _ => FormatKind::Unknown,
    }
}

fn has_jeol_magic(path: &Path) -> bool {
    let mut magic = [0u8; 8];
    File::open(path)
        .and_then(|mut f| f.read_exact(&mut magic))
        .map(|_| &magic == DELTA_FILE_ID)
        .unwrap_or(false)
}
