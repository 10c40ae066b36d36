//! pfas-nmr - identify PFAS compounds in a ¹⁹F NMR spectrum.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use pfas_nmr::config::ShiftRange;
use pfas_nmr::data::detect::classify;
use pfas_nmr::{analyze, AnalysisConfig, ReferenceLibrary};

#[derive(Parser)]
#[command(
    name = "pfas-nmr",
    version,
    about = "Identify PFAS compounds in a 19F NMR spectrum and print the result as JSON"
)]
struct Cli {
    /// Spectrum file or experiment directory
    path: PathBuf,

    /// JSON analysis config; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Peak matching tolerance in ppm
    #[arg(long)]
    tolerance: Option<f64>,

    /// Minimum confidence (0-1) for a reported candidate
    #[arg(long)]
    threshold: Option<f64>,

    /// Peak threshold as a multiple of the noise level
    #[arg(long)]
    sensitivity: Option<f64>,

    /// Spectrometer 1H frequency in MHz
    #[arg(long)]
    base_frequency: Option<f64>,

    /// Exponential line broadening in Hz
    #[arg(long)]
    line_broadening: Option<f64>,

    /// Assumed sample concentration, enables a PFAS concentration estimate
    #[arg(long)]
    concentration: Option<f64>,

    /// Target chemical-shift range LO:HI in ppm (repeatable)
    #[arg(long = "target-range", allow_hyphen_values = true)]
    target_ranges: Vec<String>,

    /// Pretty-print the JSON
    #[arg(long, default_value_t = false)]
    pretty: bool,

    /// Only report the detected input format
    #[arg(long, default_value_t = false)]
    classify_only: bool,

    /// Also write the processing log as text to this file
    #[arg(long)]
    log: Option<PathBuf>,
}

fn build_config(cli: &Cli) -> pfas_nmr::Result<AnalysisConfig> {
    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(v) = cli.tolerance {
        config.tolerance_ppm = v;
    }
    if let Some(v) = cli.threshold {
        config.confidence_threshold = v;
    }
    if let Some(v) = cli.sensitivity {
        config.sensitivity = v;
    }
    if let Some(v) = cli.base_frequency {
        config.base_frequency_mhz = v;
    }
    if let Some(v) = cli.line_broadening {
        config.line_broadening_hz = v;
    }
    if cli.concentration.is_some() {
        config.sample_concentration = cli.concentration;
    }
    if !cli.target_ranges.is_empty() {
        config.target_ranges = cli
            .target_ranges
            .iter()
            .map(|s| ShiftRange::parse(s))
            .collect::<pfas_nmr::Result<Vec<_>>>()?;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.classify_only {
        let kind = classify(&cli.path);
        let json = serde_json::json!({
            "path": cli.path.display().to_string(),
            "format": kind,
            "time_domain": kind.is_time_domain(),
        });
        println!("{}", json);
        return Ok(());
    }

    let config = build_config(cli)?;
    let library = ReferenceLibrary::builtin();
    let result = analyze(&cli.path, &library, &config)?;

    if let Some(path) = &cli.log {
        result.metadata.log.save_text(path)?;
        log::info!("Processing log written to {}", path.display());
    }

    println!("{}", result.to_json(cli.pretty)?);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    log::info!("pfas-nmr v{}", env!("CARGO_PKG_VERSION"));

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("analysis failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
