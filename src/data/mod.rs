pub mod bruker;
pub mod detect;
pub mod jcamp;
pub mod jdf;
pub mod nmrpipe_format;
pub mod reader;
pub mod spectrum;
pub mod tabular;
pub mod varian;
