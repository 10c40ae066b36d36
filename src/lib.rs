//! 19F NMR spectrum processing and PFAS compound identification.
//!
//! The pipeline runs leaf-first:
//!
//! 1. [`data::detect::classify`] decides which vendor layout a path holds,
//! 2. [`data::reader::read`] decodes it into a [`data::spectrum::RawSpectrum`],
//! 3. [`pipeline::processing::to_spectrum`] turns FIDs into a ppm trace,
//! 4. [`pipeline::peaks::detect`] picks and quantifies peaks,
//! 5. [`pipeline::identify::identify`] scores them against the
//!    [`library::ReferenceLibrary`].
//!
//! [`pipeline::analysis::analyze`] wires all of it together and returns an
//! [`pipeline::analysis::AnalysisResult`].

pub mod config;
pub mod data;
pub mod error;
pub mod library;
pub mod log;
pub mod pipeline;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result};
pub use library::ReferenceLibrary;
pub use pipeline::analysis::{analyze, AnalysisResult};
