//! Synthetic fixtures shared by the integration tests.

#![allow(dead_code)]

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

/// PFOA reference pattern: (ppm, relative height)
pub const PFOA_LINES: &[(f64, f64)] = &[
    (-80.7, 1.0),
    (-118.0, 0.45),
    (-121.9, 0.9),
    (-126.1, 0.45),
];

pub const SFO1_MHZ: f64 = 376.3468;
pub const CENTER_PPM: f64 = -100.0;
pub const SWEEP_PPM: f64 = 100.0;

/// Lorentzian lines sampled on a 0.01 ppm grid from -60 to -140 ppm.
pub fn lorentzian_trace(lines: &[(f64, f64)], scale: f64) -> (Vec<f64>, Vec<f64>) {
    let n = 8001;
    let axis: Vec<f64> = (0..n).map(|i| -60.0 - 0.01 * i as f64).collect();
    let ints = axis
        .iter()
        .map(|&x| {
            lines
                .iter()
                .map(|&(c, h)| scale * h / (1.0 + ((x - c) / 0.04).powi(2)))
                .sum()
        })
        .collect();
    (axis, ints)
}

pub fn write_csv(dir: &Path, name: &str, lines: &[(f64, f64)], scale: f64) -> PathBuf {
    let (axis, ints) = lorentzian_trace(lines, scale);
    let mut text = String::from("ppm,intensity\n");
    for (x, y) in axis.iter().zip(ints.iter()) {
        text.push_str(&format!("{},{}\n", x, y));
    }
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

/// Interleaved (re, im) samples of decaying lines at the given shifts,
/// acquired with [`SFO1_MHZ`], [`SWEEP_PPM`] and [`CENTER_PPM`].
pub fn fid_values(lines: &[(f64, f64)], n: usize, sign: f64) -> Vec<f64> {
    let sweep_hz = SWEEP_PPM * SFO1_MHZ;
    let dwell = 1.0 / sweep_hz;
    let mut out = Vec::with_capacity(2 * n);
    for i in 0..n {
        let t = i as f64 * dwell;
        let decay = (-60.0 * t).exp();
        let (mut re, mut im) = (0.0, 0.0);
        for &(ppm, h) in lines {
            let hz = (ppm - CENTER_PPM) * SFO1_MHZ;
            let phase = 2.0 * PI * hz * t;
            re += h * phase.cos() * decay;
            im += h * phase.sin() * decay;
        }
        out.push(sign * re * 1.0e4);
        out.push(sign * im * 1.0e4);
    }
    out
}

pub fn acqus_text(td: usize) -> String {
    format!(
        "##TITLE= Parameter file\n\
         ##JCAMP-DX= 5.00\n\
         ##$SW= {sw}\n\
         ##$SW_h= {swh}\n\
         ##$SFO1= {sfo1}\n\
         ##$BF1= {sfo1}\n\
         ##$O1= {o1}\n\
         ##$TD= {td}\n\
         ##$DTYPA= 2\n\
         ##$BYTORDA= 0\n\
         ##$NC= 0\n\
         ##$NS= 16\n\
         ##$D= (0..63)\n\
         0 1.5 0 0\n\
         ##$NUC1= <19F>\n\
         ##END=\n",
        sw = SWEEP_PPM,
        swh = SWEEP_PPM * SFO1_MHZ,
        sfo1 = SFO1_MHZ,
        o1 = CENTER_PPM * SFO1_MHZ,
        td = td,
    )
}

/// Bruker experiment directory with float64 little-endian `fid`.
/// `with_acqus = false` leaves the parameter file out.
pub fn write_bruker(dir: &Path, values: &[f64], with_acqus: bool) -> PathBuf {
    let exp = dir.join("1");
    fs::create_dir_all(exp.join("pdata")).unwrap();
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    fs::write(exp.join("fid"), bytes).unwrap();
    if with_acqus {
        fs::write(exp.join("acqus"), acqus_text(values.len())).unwrap();
    }
    exp
}

fn procpar_real(name: &str, value: f64) -> String {
    format!("{} 1 1 1e+18 -1e+18 0 2 1 11 1 64\n1 {}\n0\n", name, value)
}

/// Varian `.fid` directory with float32 big-endian data.
pub fn write_varian(dir: &Path, values: &[f64]) -> PathBuf {
    let exp = dir.join("sample.fid");
    fs::create_dir_all(&exp).unwrap();

    let sw_hz = SWEEP_PPM * SFO1_MHZ;
    let mut procpar = String::new();
    procpar.push_str(&procpar_real("sfrq", SFO1_MHZ));
    procpar.push_str(&procpar_real("sw", sw_hz));
    procpar.push_str(&procpar_real("rfl", sw_hz / 2.0 - CENTER_PPM * SFO1_MHZ));
    procpar.push_str(&procpar_real("rfp", 0.0));
    procpar.push_str(&procpar_real("nt", 32.0));
    procpar.push_str("tn 2 2 8 0 0 2 1 0 1 64\n1 \"F19\"\n0\n");
    fs::write(exp.join("procpar"), procpar).unwrap();

    let np = values.len() as i32;
    let mut bytes = Vec::new();
    // file header: nblocks, ntraces, np, ebytes, tbytes, bbytes, vers_id, status, nbheaders
    for v in [1i32, 1, np, 4, np * 4, np * 4 + 28] {
        bytes.extend_from_slice(&v.to_be_bytes());
    }
    bytes.extend_from_slice(&0i16.to_be_bytes());
    bytes.extend_from_slice(&(0x1i16 | 0x8).to_be_bytes());
    bytes.extend_from_slice(&1i32.to_be_bytes());
    bytes.extend_from_slice(&[0u8; 28]);
    for &v in values {
        bytes.extend_from_slice(&(v as f32).to_be_bytes());
    }
    fs::write(exp.join("fid"), bytes).unwrap();
    exp
}

fn jeol_float_record(name: &str, value: f64) -> [u8; 64] {
    let mut rec = [0u8; 64];
    rec[16..24].copy_from_slice(&value.to_be_bytes());
    rec[32..36].copy_from_slice(&2i32.to_be_bytes());
    rec[36..36 + name.len()].copy_from_slice(name.as_bytes());
    rec
}

/// 1D JEOL Delta file, big-endian doubles, real block then imaginary block.
/// `with_offset = false` leaves X_OFFSET out of the parameter section.
pub fn write_jeol(dir: &Path, values: &[f64], with_offset: bool) -> PathBuf {
    let n = values.len() / 2;
    let mut buf = vec![0u8; 1360];
    buf[..8].copy_from_slice(b"JEOL.NMR");
    buf[8] = 0; // big endian
    buf[12] = 1; // one dimension
    buf[14] = 1; // double, 1D format
    buf[24] = 3; // complex
    buf[33] = 28; // seconds
    buf[176..180].copy_from_slice(&(n as u32).to_be_bytes());
    buf[1064..1072].copy_from_slice(&SFO1_MHZ.to_be_bytes());

    let mut records = vec![
        jeol_float_record("X_FREQ", SFO1_MHZ * 1.0e6),
        jeol_float_record("X_SWEEP", SWEEP_PPM * SFO1_MHZ),
        jeol_float_record("SCANS", 16.0),
    ];
    if with_offset {
        records.push(jeol_float_record("X_OFFSET", CENTER_PPM));
    }
    let mut section = Vec::new();
    section.extend_from_slice(&64u32.to_be_bytes());
    section.extend_from_slice(&0u32.to_be_bytes());
    section.extend_from_slice(&(records.len() as u32).to_be_bytes());
    section.extend_from_slice(&0u32.to_be_bytes());
    for rec in &records {
        section.extend_from_slice(rec);
    }
    buf[1212..1216].copy_from_slice(&1360u32.to_be_bytes());
    buf[1216..1220].copy_from_slice(&(section.len() as u32).to_be_bytes());
    buf.extend_from_slice(&section);

    let data_start = buf.len();
    let real = values.iter().step_by(2);
    let imag = values.iter().skip(1).step_by(2);
    for v in real.chain(imag) {
        buf.extend_from_slice(&v.to_be_bytes());
    }
    buf[1284..1288].copy_from_slice(&(data_start as u32).to_be_bytes());
    let data_len = (buf.len() - data_start) as u64;
    buf[1288..1296].copy_from_slice(&data_len.to_be_bytes());

    let path = dir.join("sample.jdf");
    fs::write(&path, buf).unwrap();
    path
}

/// Position of the highest point of a trace.
pub fn apex_ppm(positions: &[f64], intensities: &[f64]) -> f64 {
    let mut best = 0;
    for (i, &v) in intensities.iter().enumerate() {
        if v > intensities[best] {
            best = i;
        }
    }
    positions[best]
}
