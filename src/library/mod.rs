//! Read-only catalog of reference compounds.
//!
//! Build it once with [`ReferenceLibrary::builtin`] (or
//! [`ReferenceLibrary::from_compounds`] for a custom catalog) and share it by
//! reference; nothing mutates it after construction.

mod table;

use std::collections::HashSet;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Qualitative height of an expected resonance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntensityClass {
    Strong,
    Medium,
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    CarboxylicAcid,
    Sulfonate,
    EtherAcid,
    Telomer,
    Other,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::CarboxylicAcid => write!(f, "perfluoroalkyl carboxylic acid"),
            Category::Sulfonate => write!(f, "perfluoroalkane sulfonate"),
            Category::EtherAcid => write!(f, "perfluoroether acid"),
            Category::Telomer => write!(f, "fluorotelomer"),
            Category::Other => write!(f, "other"),
        }
    }
}

/// Head group, as far as ¹⁹F shifts can tell it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionalGroup {
    Carboxylate,
    Sulfonate,
    Ether,
    Unknown,
}

impl std::fmt::Display for FunctionalGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionalGroup::Carboxylate => write!(f, "carboxylate"),
            FunctionalGroup::Sulfonate => write!(f, "sulfonate"),
            FunctionalGroup::Ether => write!(f, "ether"),
            FunctionalGroup::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePeak {
    pub position_ppm: f64,
    pub intensity: IntensityClass,
    /// Structural assignment, e.g. "CF3"
    pub assignment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCompound {
    pub id: String,
    pub name: String,
    pub formula: String,
    pub cas_number: String,
    pub category: Category,
    pub functional_group: FunctionalGroup,
    pub chain_length: u32,
    pub peaks: Vec<ReferencePeak>,
}

impl std::fmt::Display for ReferenceCompound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, CAS {})", self.id, self.formula, self.cas_number)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceLibrary {
    compounds: Vec<ReferenceCompound>,
}

impl ReferenceLibrary {
    /// The embedded PFAS catalog.
    pub fn builtin() -> Self {
        let compounds: Vec<ReferenceCompound> = table::entries()
            .map(|e| ReferenceCompound {
                id: e.id.to_string(),
                name: e.name.to_string(),
                formula: e.formula.to_string(),
                cas_number: e.cas.to_string(),
                category: e.category,
                functional_group: e.group,
                chain_length: e.chain,
                peaks: e
                    .peaks
                    .iter()
                    .map(|&(ppm, intensity, assignment)| ReferencePeak {
                        position_ppm: ppm,
                        intensity,
                        assignment: assignment.to_string(),
                    })
                    .collect(),
            })
            .collect();
        log::debug!("Built reference library with {} compounds", compounds.len());
        Self { compounds }
    }

    /// Custom catalog. Ids must be unique and non-empty and every reference
    /// position finite.
    pub fn from_compounds(compounds: Vec<ReferenceCompound>) -> Result<Self> {
        let mut seen = HashSet::new();
        for c in &compounds {
            if c.id.trim().is_empty() {
                return Err(AnalysisError::config("reference compound with empty id"));
            }
            if !seen.insert(c.id.as_str()) {
                return Err(AnalysisError::config(format!(
                    "duplicate reference compound id '{}'",
                    c.id
                )));
            }
            if c.peaks.iter().any(|p| !p.position_ppm.is_finite()) {
                return Err(AnalysisError::config(format!(
                    "reference compound '{}' has a non-finite peak position",
                    c.id
                )));
            }
        }
        Ok(Self { compounds })
    }

    pub fn get(&self, id: &str) -> Option<&ReferenceCompound> {
        self.compounds.iter().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceCompound> {
        self.compounds.iter()
    }

    pub fn len(&self) -> usize {
        self.compounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compounds.is_empty()
    }

    pub fn by_category(&self, category: Category) -> Vec<&ReferenceCompound> {
        self.iter().filter(|c| c.category == category).collect()
    }

    pub fn by_chain_length(&self, range: RangeInclusive<u32>) -> Vec<&ReferenceCompound> {
        self.iter()
            .filter(|c| range.contains(&c.chain_length))
            .collect()
    }

    pub fn by_functional_group(&self, group: FunctionalGroup) -> Vec<&ReferenceCompound> {
        self.iter().filter(|c| c.functional_group == group).collect()
    }
}

impl<'a> IntoIterator for &'a ReferenceLibrary {
    type Item = &'a ReferenceCompound;
    type IntoIter = std::slice::Iter<'a, ReferenceCompound>;

    fn into_iter(self) -> Self::IntoIter {
        self.compounds.iter()
    }
}
