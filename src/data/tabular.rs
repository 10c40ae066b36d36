//! Delimited text exports: a position column followed by one or more
//! intensity columns.

use std::path::Path;

use csv::{ReaderBuilder, Trim};

use super::spectrum::*;
use crate::error::{AnalysisError, Result};

const COMMENT_PREFIXES: [&str; 3] = ["#", "%", "//"];

fn is_comment(line: &str) -> bool {
    COMMENT_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// Number of leading numeric lines consulted when picking the delimiter.
const SNIFF_LINES: usize = 5;

const DELIMITERS: [u8; 3] = [b'\t', b';', b','];

fn is_number(field: &str) -> bool {
    field.trim().parse::<f64>().is_ok()
}

/// Leading numeric fields of `line`; `None` splits on runs of whitespace.
fn numeric_fields(line: &str, delimiter: Option<u8>) -> usize {
    match delimiter {
        Some(d) => line.split(char::from(d)).take_while(|f| is_number(f)).count(),
        None => line.split_whitespace().take_while(|f| is_number(f)).count(),
    }
}

fn starts_with_number(line: &str) -> bool {
    line.split(|c: char| c.is_whitespace() || c == ';' || c == ',')
        .next()
        .map_or(false, is_number)
}

/// Pick the delimiter that splits the most of the first few numeric lines
/// into at least two numbers: tab, `;` or `,`, else whitespace. Title and
/// header lines do not vote.
fn sniff_delimiter(lines: &[&str]) -> Option<u8> {
    let sample: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|l| starts_with_number(l))
        .take(SNIFF_LINES)
        .collect();

    let candidates = DELIMITERS.into_iter().map(Some).chain([None]);
    let mut best: Option<(Option<u8>, usize)> = None;
    for d in candidates {
        let votes = sample.iter().filter(|l| numeric_fields(l, d) >= 2).count();
        if votes > 0 && best.map_or(true, |(_, v)| votes > v) {
            best = Some((d, votes));
        }
    }
    best.and_then(|(d, _)| d)
}

/// Read a tabular text spectrum.
pub fn read_tabular(path: &Path) -> Result<RawRead> {
    let content = std::fs::read_to_string(path)?;
    parse_tabular(&content)
}

pub(crate) fn parse_tabular(content: &str) -> Result<RawRead> {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !is_comment(l))
        .collect();
    if lines.is_empty() {
        return Err(AnalysisError::corrupt("text file has no data lines"));
    }

    // Whitespace-separated files are normalised to tabs so runs of spaces
    // count as one delimiter.
    let (delimiter, body) = match sniff_delimiter(&lines) {
        Some(d) => (d, lines.join("\n")),
        None => (
            b'\t',
            lines
                .iter()
                .map(|l| l.split_whitespace().collect::<Vec<_>>().join("\t"))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(body.as_bytes());

    let mut rows: Vec<Vec<f64>> = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| AnalysisError::corrupt(format!("text parse error: {}", e)))?;
        let numeric: Vec<f64> = record
            .iter()
            .map_while(|field| field.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .collect();
        if numeric.len() >= 2 {
            rows.push(numeric);
        }
    }
    if rows.is_empty() {
        return Err(AnalysisError::corrupt(
            "no rows with a position and an intensity value",
        ));
    }

    let ncols = rows.iter().map(Vec::len).min().unwrap_or(2);
    let positions: Vec<f64> = rows.iter().map(|r| r[0]).collect();

    let mut heuristics = Vec::new();
    let column = if ncols > 2 {
        let (best, _) = (1..ncols)
            .map(|c| {
                let values: Vec<f64> = rows.iter().map(|r| r[c]).collect();
                (c, peak_likeness(&values))
            })
            .fold((1, f64::NEG_INFINITY), |acc, (c, score)| {
                if score > acc.1 {
                    (c, score)
                } else {
                    acc
                }
            });
        log::info!(
            "Text file has {} intensity columns; using column {}",
            ncols - 1,
            best
        );
        heuristics.push(Heuristic::IntensityColumnSelected {
            column: best,
            candidates: ncols - 1,
        });
        best
    } else {
        1
    };
    let intensities: Vec<f64> = rows.iter().map(|r| r[column]).collect();

    let trace = ChemicalShiftTrace::new(positions, intensities)?;
    let mut read = RawRead::frequency_domain(trace, None);
    read.heuristics = heuristics;
    Ok(read)
}

/// `stdev × (1 + number of values above mean + 2·stdev)`: large for a
/// channel with a few sharp excursions over a flat floor.
fn peak_likeness(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let sd = var.sqrt();
    let outliers = values.iter().filter(|&&v| v > mean + 2.0 * sd).count();
    sd * (1.0 + outliers as f64)
}
