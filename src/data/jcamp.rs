/// JCAMP-DX spectral data reader
///
/// JCAMP-DX is a text-based format widely used for spectral data exchange.
///
/// File extensions: `.dx`, `.jdx`, `.jcamp`
///
/// Format overview:
///   - Lines starting with `##` are labeled data records (LDR)
///   - `##DATA TYPE= ...` : "NMR SPECTRUM", "NMR FID", etc.
///   - `##XUNITS= ...` : "HZ" or "PPM"
///   - `##FIRSTX=`, `##LASTX=`, `##NPOINTS=` : abscissa of the data table
///   - `##XYDATA= (X++(Y..Y))` : compressed data table (ASDF format)
///   - `##XYPOINTS= (XY..XY)` : simple X,Y pairs
///
/// ASDF (ASCII Squeezed Difference Form) encoding:
///   - SQZ `@`, `A`..`I` / `a`..`i`: first digit of an absolute value (0, ±1..±9)
///   - DIF `%`, `J`..`R` / `j`..`r`: first digit of a difference (0, ±1..±9)
///   - DUP `S`..`Z`, `s`: the previous token occurs 1..9 times in total

use std::path::Path;

use super::spectrum::*;
use crate::error::{AnalysisError, Result};

/// Parsed JCAMP-DX header fields
#[derive(Debug)]
struct JcampHeader {
    data_type: String,
    x_units: String,
    first_x: f64,
    last_x: f64,
    x_factor: f64,
    y_factor: f64,
    npoints: usize,
    observe_freq: f64,
    observe_nucleus: String,
}

impl Default for JcampHeader {
    fn default() -> Self {
        Self {
            data_type: String::new(),
            x_units: String::new(),
            first_x: 0.0,
            last_x: 0.0,
            x_factor: 1.0,
            y_factor: 1.0,
            npoints: 0,
            observe_freq: 0.0,
            observe_nucleus: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Table {
    None,
    XyData,
    XyPoints,
}

/// Read a JCAMP-DX spectrum file.
pub fn read_jcamp_file(path: &Path, base_frequency_mhz: f64) -> Result<RawRead> {
    let content = std::fs::read_to_string(path)?;
    parse_jcamp(&content, base_frequency_mhz)
}

/// Parse JCAMP-DX content string
pub(crate) fn parse_jcamp(content: &str, base_frequency_mhz: f64) -> Result<RawRead> {
    let mut header = JcampHeader::default();
    let mut data_lines: Vec<&str> = Vec::new();
    let mut table = Table::None;

    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(record) = trimmed.strip_prefix("##") {
            // A new labeled record ends any open data table
            if table != Table::None && !data_lines.is_empty() {
                break;
            }
            let Some((key, value)) = record.split_once('=') else {
                continue;
            };
            let key = key.trim().to_uppercase();
            let value = value.trim();
            match key.as_str() {
                "DATA TYPE" | "DATATYPE" => header.data_type = value.to_uppercase(),
                "XUNITS" => header.x_units = value.to_uppercase(),
                "FIRSTX" => header.first_x = parse_jcamp_float(value)?,
                "LASTX" => header.last_x = parse_jcamp_float(value)?,
                "XFACTOR" => header.x_factor = parse_jcamp_float(value)?,
                "YFACTOR" => header.y_factor = parse_jcamp_float(value)?,
                "NPOINTS" => header.npoints = parse_jcamp_float(value)? as usize,
                ".OBSERVE FREQUENCY" => header.observe_freq = parse_jcamp_float(value)?,
                ".OBSERVE NUCLEUS" => header.observe_nucleus = value.to_string(),
                "DATA CLASS" if value.to_uppercase().contains("NTUPLES") => {
                    return Err(AnalysisError::unreadable(
                        "JCAMP-DX NTUPLES files are not supported",
                    ));
                }
                "XYDATA" => table = Table::XyData,
                "XYPOINTS" | "PEAK TABLE" => table = Table::XyPoints,
                _ => {}
            }
        } else if table != Table::None && !trimmed.is_empty() && !trimmed.starts_with("$$") {
            data_lines.push(trimmed);
        }
    }

    if header.data_type.contains("FID") {
        return Err(AnalysisError::unreadable(
            "JCAMP-DX file holds an FID; only spectra are accepted",
        ));
    }

    let nucleus = if header.observe_nucleus.is_empty() {
        Nucleus::F19
    } else {
        Nucleus::from_label(&header.observe_nucleus)
    };
    let freq = if header.observe_freq > 0.0 {
        header.observe_freq
    } else {
        nucleus
            .frequency_from_proton(base_frequency_mhz)
            .unwrap_or(base_frequency_mhz)
    };

    let (x, y) = match table {
        Table::XyData => parse_asdf_table(&data_lines, &header)?,
        Table::XyPoints => parse_xy_pairs(&data_lines, &header),
        Table::None => {
            return Err(AnalysisError::corrupt("No data block found in JCAMP-DX file"));
        }
    };
    if y.is_empty() {
        return Err(AnalysisError::corrupt("JCAMP-DX data table is empty"));
    }

    let positions: Vec<f64> = if header.x_units.contains("HZ") {
        x.iter().map(|hz| hz / freq).collect()
    } else {
        x
    };

    let first = positions[0];
    let last = positions[positions.len() - 1];
    let params = AcquisitionParameters::new(
        nucleus,
        freq,
        (first - last).abs(),
        (first + last) / 2.0 * freq,
        1,
        0.0,
    )
    .ok();

    log::info!("Read JCAMP-DX spectrum: {} points", y.len());
    let trace = ChemicalShiftTrace::new(positions, y)?;
    Ok(RawRead::frequency_domain(trace, params))
}

/// Parse a numeric value from a JCAMP field
fn parse_jcamp_float(s: &str) -> Result<f64> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| AnalysisError::corrupt(format!("bad JCAMP-DX number '{}'", s.trim())))
}

/// Parse (XY..XY) format: comma or space separated X,Y pairs
fn parse_xy_pairs(lines: &[&str], header: &JcampHeader) -> (Vec<f64>, Vec<f64>) {
    let mut x_data = Vec::new();
    let mut y_data = Vec::new();

    for line in lines {
        let tokens: Vec<f64> = line
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter_map(|s| s.parse::<f64>().ok())
            .collect();
        for pair in tokens.chunks_exact(2) {
            x_data.push(pair[0] * header.x_factor);
            y_data.push(pair[1] * header.y_factor);
        }
    }

    (x_data, y_data)
}

/// Upper bound on ordinates decoded from one table.
const MAX_TABLE_POINTS: usize = 1 << 24;

/// Parse (X++(Y..Y)) data. The abscissa comes from FIRSTX/LASTX/NPOINTS;
/// the X value opening each line is skipped.
fn parse_asdf_table(lines: &[&str], header: &JcampHeader) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut all_y: Vec<f64> = Vec::new();
    let mut prev_ended_in_dif = false;

    let max_points = if header.npoints > 0 {
        header.npoints.min(MAX_TABLE_POINTS)
    } else {
        MAX_TABLE_POINTS
    };
    for line in lines {
        let (_, y_part) = split_x(line);
        // One extra ordinate for the y check.
        let budget = max_points.saturating_sub(all_y.len()) + 1;
        let decoded = decode_asdf_values(y_part, budget)?;
        let mut values = decoded.values;
        // After a DIF line the first ordinate repeats the last one (y check).
        if prev_ended_in_dif && !values.is_empty() {
            values.remove(0);
        }
        prev_ended_in_dif = decoded.ended_in_dif;
        all_y.extend(values);
    }

    let npoints = if header.npoints > 0 {
        header.npoints
    } else {
        all_y.len()
    };
    if all_y.len() < npoints {
        return Err(AnalysisError::corrupt(format!(
            "JCAMP-DX table has {} ordinates, NPOINTS says {}",
            all_y.len(),
            npoints
        )));
    }
    all_y.truncate(npoints);

    let y: Vec<f64> = all_y.iter().map(|v| v * header.y_factor).collect();
    let x = linear_axis(header.first_x, header.last_x, npoints);
    Ok((x, y))
}

/// Split the leading X value from the ordinates. Exponents are not
/// accepted here since `E`/`e` are SQZ characters.
fn split_x(line: &str) -> (&str, &str) {
    let line = line.trim_start();
    let end = line
        .char_indices()
        .find(|&(i, c)| {
            !(c.is_ascii_digit() || c == '.' || ((c == '-' || c == '+') && i == 0))
        })
        .map(|(i, _)| i)
        .unwrap_or(line.len());
    (&line[..end], &line[end..])
}

#[derive(Debug, Default)]
struct Decoded {
    values: Vec<f64>,
    ended_in_dif: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Abs(f64),
    Dif(f64),
    Dup(usize),
}

fn sqz_digit(c: char) -> Option<(i64, bool)> {
    match c {
        '@' => Some((0, false)),
        'A'..='I' => Some((c as i64 - 'A' as i64 + 1, false)),
        'a'..='i' => Some((c as i64 - 'a' as i64 + 1, true)),
        _ => None,
    }
}

fn dif_digit(c: char) -> Option<(i64, bool)> {
    match c {
        '%' => Some((0, false)),
        'J'..='R' => Some((c as i64 - 'J' as i64 + 1, false)),
        'j'..='r' => Some((c as i64 - 'j' as i64 + 1, true)),
        _ => None,
    }
}

fn dup_digit(c: char) -> Option<i64> {
    match c {
        'S'..='Z' => Some(c as i64 - 'S' as i64 + 1),
        's' => Some(9),
        _ => None,
    }
}

/// Split an ordinate string into tokens.
fn tokenize(s: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = s.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() || c == ',' {
            i += 1;
            continue;
        }

        // Compressed token: pseudo-digit followed by plain digits
        let lead = sqz_digit(c)
            .map(|(d, neg)| (d, neg, 0u8))
            .or_else(|| dif_digit(c).map(|(d, neg)| (d, neg, 1u8)))
            .or_else(|| dup_digit(c).map(|d| (d, false, 2u8)));
        if let Some((digit, negative, kind)) = lead {
            let mut magnitude = digit;
            i += 1;
            while i < chars.len() && chars[i].is_ascii_digit() {
                let digit = chars[i].to_digit(10).unwrap_or(0) as i64;
                magnitude = magnitude
                    .checked_mul(10)
                    .and_then(|m| m.checked_add(digit))
                    .ok_or_else(|| {
                        AnalysisError::corrupt("JCAMP-DX compressed value overflows")
                    })?;
                i += 1;
            }
            let v = if negative { -magnitude } else { magnitude } as f64;
            tokens.push(match kind {
                0 => Token::Abs(v),
                1 => Token::Dif(v),
                _ => Token::Dup(magnitude.max(1) as usize),
            });
            continue;
        }

        // Plain AFFN number
        if c.is_ascii_digit() || c == '+' || c == '-' || c == '.' {
            let start = i;
            i += 1;
            while i < chars.len()
                && (chars[i].is_ascii_digit()
                    || chars[i] == '.'
                    || chars[i] == 'E'
                    || chars[i] == 'e'
                    || ((chars[i] == '+' || chars[i] == '-')
                        && (chars[i - 1] == 'E' || chars[i - 1] == 'e')))
            {
                i += 1;
            }
            let num: String = chars[start..i].iter().collect();
            if let Ok(v) = num.parse::<f64>() {
                tokens.push(Token::Abs(v));
            }
            continue;
        }

        // Unknown character: skip
        i += 1;
    }

    Ok(tokens)
}

/// Decode ASDF-encoded ordinates. A DUP that would expand past `limit`
/// values is corrupt.
fn decode_asdf_values(s: &str, limit: usize) -> Result<Decoded> {
    let mut out = Decoded::default();
    let mut last_value = 0.0;
    let mut last_token: Option<Token> = None;

    for token in tokenize(s)? {
        match token {
            Token::Abs(v) => {
                last_value = v;
                out.values.push(v);
                last_token = Some(token);
            }
            Token::Dif(d) => {
                last_value += d;
                out.values.push(last_value);
                last_token = Some(token);
            }
            Token::Dup(count) => {
                if out.values.len().saturating_add(count - 1) > limit {
                    return Err(AnalysisError::corrupt(format!(
                        "JCAMP-DX DUP count {} exceeds the declared point count",
                        count
                    )));
                }
                // The previous token occurs `count` times in total.
                for _ in 1..count {
                    match last_token {
                        Some(Token::Dif(d)) => last_value += d,
                        Some(Token::Abs(_)) | Some(Token::Dup(_)) | None => {}
                    }
                    out.values.push(last_value);
                }
            }
        }
    }
    out.ended_in_dif = matches!(last_token, Some(Token::Dif(_)));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(s: &str) -> Decoded {
        decode_asdf_values(s, usize::MAX).unwrap()
    }

    #[test]
    fn test_parse_jcamp_float() {
        assert!((parse_jcamp_float("123.456").unwrap() - 123.456).abs() < 0.001);
        assert!((parse_jcamp_float("  -1.5E2  ").unwrap() - -150.0).abs() < 0.001);
        assert!(parse_jcamp_float("abc").is_err());
    }

    #[test]
    fn test_decode_plain_numbers() {
        let result = decode("100 200 -300");
        assert_eq!(result.values, vec![100.0, 200.0, -300.0]);
        assert!(!result.ended_in_dif);
    }

    #[test]
    fn test_decode_sqz_values() {
        // A00 = 100, B00 = 200, a5 = -15
        let result = decode("A00B00a5");
        assert_eq!(result.values, vec![100.0, 200.0, -15.0]);
    }

    #[test]
    fn test_decode_dif_and_dup() {
        // 10, +5 -> 15, DUP 3 of the +5 difference -> 20, 25
        let result = decode("A0NU");
        assert_eq!(result.values, vec![10.0, 15.0, 20.0, 25.0]);
        assert!(result.ended_in_dif);
    }

    #[test]
    fn test_decode_dup_of_absolute() {
        let result = decode("@T");
        assert_eq!(result.values, vec![0.0, 0.0]);
        let result = decode("A%");
        assert_eq!(result.values, vec![1.0, 1.0]);
    }

    #[test]
    fn test_decode_long_digit_run_is_corrupt() {
        let digits = "9".repeat(40);
        assert!(matches!(
            decode_asdf_values(&format!("A{}", digits), usize::MAX),
            Err(AnalysisError::CorruptData(_))
        ));
        assert!(matches!(
            decode_asdf_values(&format!("A0S{}", digits), usize::MAX),
            Err(AnalysisError::CorruptData(_))
        ));
    }

    #[test]
    fn test_decode_dup_bounded_by_limit() {
        assert_eq!(decode_asdf_values("A0T", 2).unwrap().values.len(), 2);
        assert!(matches!(
            decode_asdf_values("A0S999999999", 10),
            Err(AnalysisError::CorruptData(_))
        ));
    }

    #[test]
    fn test_dup_beyond_npoints_is_corrupt() {
        let content = r#"##DATA TYPE= NMR SPECTRUM
##XUNITS= PPM
##FIRSTX= 0.0
##LASTX= -1.0
##NPOINTS= 4
##XYDATA= (X++(Y..Y))
0.0 A0S99999999999
##END=
"#;
        assert!(matches!(
            parse_jcamp(content, 400.0),
            Err(AnalysisError::CorruptData(_))
        ));
    }

    #[test]
    fn test_split_x() {
        assert_eq!(split_x("-80.5A0J"), ("-80.5", "A0J"));
        assert_eq!(split_x("12 100 200"), ("12", " 100 200"));
    }

    #[test]
    fn test_full_jcamp_parse_ppm() {
        let content = r#"##TITLE= PFOA standard
##JCAMP-DX= 5.01
##DATA TYPE= NMR SPECTRUM
##XUNITS= PPM
##YUNITS= ARBITRARY UNITS
##.OBSERVE FREQUENCY= 376.3
##.OBSERVE NUCLEUS= ^19F
##FIRSTX= -70.0
##LASTX= -74.0
##NPOINTS= 5
##XFACTOR= 1.0
##YFACTOR= 2.0
##XYDATA= (X++(Y..Y))
-70.0 100 200 300 400 500
##END=
"#;
        let read = parse_jcamp(content, 400.0).unwrap();
        let params = read.params.clone().unwrap();
        assert_eq!(params.nucleus, Nucleus::F19);
        assert!((params.observe_frequency_mhz - 376.3).abs() < 1e-9);
        match read.spectrum {
            RawSpectrum::FrequencyDomain(t) => {
                assert_eq!(t.len(), 5);
                assert_eq!(t.intensities()[4], 1000.0);
                assert!((t.positions()[1] + 71.0).abs() < 1e-9);
            }
            other => panic!("expected frequency domain, got {:?}", other),
        }
    }

    #[test]
    fn test_dif_checkpoint_dropped_between_lines() {
        let content = r#"##DATA TYPE= NMR SPECTRUM
##XUNITS= PPM
##FIRSTX= 0.0
##LASTX= -5.0
##NPOINTS= 6
##XYDATA= (X++(Y..Y))
0.0 A0JJ
-2.0 A2JJJ
##END=
"#;
        let read = parse_jcamp(content, 400.0).unwrap();
        match read.spectrum {
            RawSpectrum::FrequencyDomain(t) => {
                assert_eq!(t.intensities(), &[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
            }
            other => panic!("expected frequency domain, got {:?}", other),
        }
    }

    #[test]
    fn test_hz_axis_converted() {
        let content = r#"##DATA TYPE= NMR SPECTRUM
##XUNITS= HZ
##.OBSERVE FREQUENCY= 400.0
##XYPOINTS= (XY..XY)
-32000, 1.0
-32400, 3.0
-32800, 2.0
##END=
"#;
        let read = parse_jcamp(content, 400.0).unwrap();
        match read.spectrum {
            RawSpectrum::FrequencyDomain(t) => {
                assert!((t.positions()[0] + 80.0).abs() < 1e-9);
                assert!((t.positions()[2] + 82.0).abs() < 1e-9);
            }
            other => panic!("expected frequency domain, got {:?}", other),
        }
    }

    #[test]
    fn test_fid_rejected() {
        let content = "##DATA TYPE= NMR FID\n##XYDATA= (X++(Y..Y))\n0 1 2\n##END=\n";
        assert!(matches!(
            parse_jcamp(content, 400.0),
            Err(AnalysisError::UnreadableFormat(_))
        ));
    }

    #[test]
    fn test_missing_table_is_corrupt() {
        let content = "##DATA TYPE= NMR SPECTRUM\n##END=\n";
        assert!(matches!(
            parse_jcamp(content, 400.0),
            Err(AnalysisError::CorruptData(_))
        ));
    }
}
