pub mod analysis;
pub mod identify;
pub mod peaks;
pub mod processing;
