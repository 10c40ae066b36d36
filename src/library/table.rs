//! Embedded reference fingerprints.
//!
//! Positions are ¹⁹F chemical shifts in ppm relative to CFCl3, listed
//! downfield first. Chain length is the carbon count of the backbone.

use super::{Category, FunctionalGroup, IntensityClass};

use super::IntensityClass::{Medium, Strong, Weak};

pub(crate) struct Entry {
    pub id: &'static str,
    pub name: &'static str,
    pub formula: &'static str,
    pub cas: &'static str,
    pub category: Category,
    pub group: FunctionalGroup,
    pub chain: u32,
    /// (ppm, intensity class, assignment)
    pub peaks: &'static [(f64, IntensityClass, &'static str)],
}

/// Perfluoroalkyl carboxylic acids, C2 to C10
const PFCA_SERIES: &[Entry] = &[
    Entry {
        id: "TFA",
        name: "Trifluoroacetic acid",
        formula: "C2HF3O2",
        cas: "76-05-1",
        category: Category::CarboxylicAcid,
        group: FunctionalGroup::Carboxylate,
        chain: 2,
        peaks: &[(-76.5, Strong, "CF3")],
    },
    Entry {
        id: "PFPrA",
        name: "Perfluoropropanoic acid",
        formula: "C3HF5O2",
        cas: "422-64-0",
        category: Category::CarboxylicAcid,
        group: FunctionalGroup::Carboxylate,
        chain: 3,
        peaks: &[(-83.1, Strong, "CF3"), (-121.5, Medium, "α-CF2")],
    },
    Entry {
        id: "PFBA",
        name: "Perfluorobutanoic acid",
        formula: "C4HF7O2",
        cas: "375-22-4",
        category: Category::CarboxylicAcid,
        group: FunctionalGroup::Carboxylate,
        chain: 4,
        peaks: &[
            (-81.0, Strong, "CF3"),
            (-118.5, Medium, "α-CF2"),
            (-127.3, Medium, "CF2-CF3"),
        ],
    },
    Entry {
        id: "PFPeA",
        name: "Perfluoropentanoic acid",
        formula: "C5HF9O2",
        cas: "2706-90-3",
        category: Category::CarboxylicAcid,
        group: FunctionalGroup::Carboxylate,
        chain: 5,
        peaks: &[
            (-81.1, Strong, "CF3"),
            (-118.3, Medium, "α-CF2"),
            (-123.6, Medium, "β-CF2"),
            (-126.6, Medium, "CF2-CF3"),
        ],
    },
    Entry {
        id: "PFHxA",
        name: "Perfluorohexanoic acid",
        formula: "C6HF11O2",
        cas: "307-24-4",
        category: Category::CarboxylicAcid,
        group: FunctionalGroup::Carboxylate,
        chain: 6,
        peaks: &[
            (-81.0, Strong, "CF3"),
            (-118.2, Medium, "α-CF2"),
            (-122.4, Medium, "β-CF2"),
            (-123.2, Medium, "γ-CF2"),
            (-126.4, Medium, "CF2-CF3"),
        ],
    },
    Entry {
        id: "PFHpA",
        name: "Perfluoroheptanoic acid",
        formula: "C7HF13O2",
        cas: "375-85-9",
        category: Category::CarboxylicAcid,
        group: FunctionalGroup::Carboxylate,
        chain: 7,
        peaks: &[
            (-80.9, Strong, "CF3"),
            (-118.25, Medium, "α-CF2"),
            (-121.7, Medium, "β-CF2"),
            (-122.6, Medium, "γ-CF2"),
            (-123.0, Medium, "δ-CF2"),
            (-126.35, Medium, "CF2-CF3"),
        ],
    },
    Entry {
        id: "PFOA",
        name: "Perfluorooctanoic acid",
        formula: "C8HF15O2",
        cas: "335-67-1",
        category: Category::CarboxylicAcid,
        group: FunctionalGroup::Carboxylate,
        chain: 8,
        peaks: &[
            (-80.7, Strong, "CF3"),
            (-118.0, Medium, "α-CF2"),
            (-121.9, Strong, "internal CF2"),
            (-126.1, Medium, "CF2-CF3"),
        ],
    },
    Entry {
        id: "PFNA",
        name: "Perfluorononanoic acid",
        formula: "C9HF17O2",
        cas: "375-95-1",
        category: Category::CarboxylicAcid,
        group: FunctionalGroup::Carboxylate,
        chain: 9,
        peaks: &[
            (-80.85, Strong, "CF3"),
            (-118.15, Medium, "α-CF2"),
            (-121.6, Strong, "internal CF2"),
            (-122.3, Medium, "internal CF2"),
            (-122.7, Medium, "internal CF2"),
            (-123.1, Medium, "internal CF2"),
            (-126.25, Medium, "CF2-CF3"),
        ],
    },
    Entry {
        id: "PFDA",
        name: "Perfluorodecanoic acid",
        formula: "C10HF19O2",
        cas: "335-76-2",
        category: Category::CarboxylicAcid,
        group: FunctionalGroup::Carboxylate,
        chain: 10,
        peaks: &[
            (-80.9, Strong, "CF3"),
            (-118.3, Medium, "α-CF2"),
            (-121.5, Strong, "internal CF2"),
            (-122.2, Medium, "internal CF2"),
            (-122.5, Medium, "internal CF2"),
            (-123.2, Medium, "internal CF2"),
            (-126.3, Medium, "CF2-CF3"),
        ],
    },
];

/// Perfluoroalkane sulfonic acids
const PFSA_SERIES: &[Entry] = &[
    Entry {
        id: "PFBS",
        name: "Perfluorobutanesulfonic acid",
        formula: "C4HF9O3S",
        cas: "375-73-5",
        category: Category::Sulfonate,
        group: FunctionalGroup::Sulfonate,
        chain: 4,
        peaks: &[
            (-81.0, Strong, "CF3"),
            (-114.3, Medium, "α-CF2"),
            (-121.3, Medium, "β-CF2"),
            (-125.9, Medium, "CF2-CF3"),
        ],
    },
    Entry {
        id: "PFHxS",
        name: "Perfluorohexanesulfonic acid",
        formula: "C6HF13O3S",
        cas: "355-46-4",
        category: Category::Sulfonate,
        group: FunctionalGroup::Sulfonate,
        chain: 6,
        peaks: &[
            (-80.9, Strong, "CF3"),
            (-114.4, Medium, "α-CF2"),
            (-120.9, Medium, "β-CF2"),
            (-121.8, Medium, "internal CF2"),
            (-122.9, Medium, "internal CF2"),
            (-126.3, Medium, "CF2-CF3"),
        ],
    },
    Entry {
        id: "PFOS",
        name: "Perfluorooctanesulfonic acid",
        formula: "C8HF17O3S",
        cas: "1763-23-1",
        category: Category::Sulfonate,
        group: FunctionalGroup::Sulfonate,
        chain: 8,
        peaks: &[
            (-80.85, Strong, "CF3"),
            (-114.5, Medium, "α-CF2"),
            (-120.8, Medium, "β-CF2"),
            (-121.6, Strong, "internal CF2"),
            (-122.0, Medium, "internal CF2"),
            (-122.8, Medium, "internal CF2"),
            (-126.2, Medium, "CF2-CF3"),
        ],
    },
];

/// Fluorotelomers and replacement ether acids
const OTHER_PFAS: &[Entry] = &[
    Entry {
        id: "6:2 FTS",
        name: "6:2 Fluorotelomer sulfonic acid",
        formula: "C8H5F13O3S",
        cas: "27619-97-2",
        category: Category::Telomer,
        group: FunctionalGroup::Sulfonate,
        chain: 8,
        peaks: &[
            (-81.1, Strong, "CF3"),
            (-113.8, Medium, "CH2-CF2"),
            (-122.05, Medium, "internal CF2"),
            (-123.1, Medium, "internal CF2"),
            (-123.7, Medium, "internal CF2"),
            (-126.4, Medium, "CF2-CF3"),
        ],
    },
    Entry {
        id: "HFPO-DA",
        name: "Hexafluoropropylene oxide dimer acid (GenX)",
        formula: "C6HF11O3",
        cas: "13252-13-6",
        category: Category::EtherAcid,
        group: FunctionalGroup::Ether,
        chain: 6,
        peaks: &[
            (-80.1, Strong, "CF3-CF2-CF2-O"),
            (-82.2, Strong, "CF3-CF"),
            (-83.5, Weak, "O-CF2"),
            (-130.1, Medium, "CF3-CF2"),
            (-131.6, Medium, "CF"),
        ],
    },
    Entry {
        id: "ADONA",
        name: "4,8-Dioxa-3H-perfluorononanoic acid",
        formula: "C7H2F12O4",
        cas: "958445-44-8",
        category: Category::EtherAcid,
        group: FunctionalGroup::Ether,
        chain: 7,
        peaks: &[
            (-55.5, Strong, "CF3-O"),
            (-85.2, Medium, "O-CF2"),
            (-87.1, Medium, "O-CF2"),
            (-129.6, Medium, "CF2"),
            (-145.2, Weak, "CHF"),
        ],
    },
];

pub(crate) fn entries() -> impl Iterator<Item = &'static Entry> {
    PFCA_SERIES
        .iter()
        .chain(PFSA_SERIES.iter())
        .chain(OTHER_PFAS.iter())
}
