//! Chromosome identity and coarse spatial classification
//!
//! The reference genome has six nuclear chromosomes plus the mitochondrial
//! genome. Upstream files name them with roman numerals; the store keys them
//! with a stable numeric enumeration.

use ndp_common::error::{NdpError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The fixed chromosome enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chromosome {
    I,
    II,
    III,
    IV,
    V,
    X,
    MtDna,
}

impl Chromosome {
    /// Stable numeric id used by the store
    pub fn number(self) -> i64 {
        match self {
            Chromosome::I => 1,
            Chromosome::II => 2,
            Chromosome::III => 3,
            Chromosome::IV => 4,
            Chromosome::V => 5,
            Chromosome::X => 6,
            Chromosome::MtDna => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Chromosome::I => "I",
            Chromosome::II => "II",
            Chromosome::III => "III",
            Chromosome::IV => "IV",
            Chromosome::V => "V",
            Chromosome::X => "X",
            Chromosome::MtDna => "MtDNA",
        }
    }
}

impl FromStr for Chromosome {
    type Err = NdpError;

    /// An unrecognized token is a data error, never silently defaulted.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "I" => Ok(Chromosome::I),
            "II" => Ok(Chromosome::II),
            "III" => Ok(Chromosome::III),
            "IV" => Ok(Chromosome::IV),
            "V" => Ok(Chromosome::V),
            "X" => Ok(Chromosome::X),
            "MtDNA" => Ok(Chromosome::MtDna),
            _ => Err(NdpError::UnknownChromosome(s.to_string())),
        }
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Midpoint of a feature, `start + (end - start) / 2` with integer division
pub fn midpoint(start: i64, end: i64) -> i64 {
    start + (end - start) / 2
}

/// Coarse spatial classification of a position on a chromosome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArmOrCenter {
    Arm,
    Center,
}

impl ArmOrCenter {
    pub fn as_str(self) -> &'static str {
        match self {
            ArmOrCenter::Arm => "arm",
            ArmOrCenter::Center => "center",
        }
    }
}

/// Per-chromosome center-domain boundaries
///
/// Positions inside the configured `[left, right]` interval classify as
/// center, outside as arm. Chromosomes with no configured boundary (the
/// mitochondrial genome) always classify as center; that is policy, not a
/// lookup failure.
#[derive(Debug, Clone)]
pub struct ArmCenterTable {
    boundaries: HashMap<Chromosome, (i64, i64)>,
}

impl ArmCenterTable {
    pub fn new(boundaries: HashMap<Chromosome, (i64, i64)>) -> Self {
        Self { boundaries }
    }

    pub fn classify(&self, chrom: Chromosome, pos: i64) -> ArmOrCenter {
        match self.boundaries.get(&chrom) {
            Some(&(left, right)) => {
                if pos < left || pos > right {
                    ArmOrCenter::Arm
                } else {
                    ArmOrCenter::Center
                }
            },
            None => ArmOrCenter::Center,
        }
    }
}

impl Default for ArmCenterTable {
    /// Center domains of the nuclear chromosomes (bp). The mitochondrial
    /// genome carries no boundary and classifies as center.
    fn default() -> Self {
        let boundaries = HashMap::from([
            (Chromosome::I, (5_024_000, 10_048_000)),
            (Chromosome::II, (5_093_000, 10_186_000)),
            (Chromosome::III, (4_594_000, 9_189_000)),
            (Chromosome::IV, (5_831_000, 11_662_000)),
            (Chromosome::V, (6_974_000, 13_949_000)),
            (Chromosome::X, (5_906_000, 11_812_000)),
        ]);
        Self { boundaries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chromosome_numbers_are_total() {
        let tokens = ["I", "II", "III", "IV", "V", "X", "MtDNA"];
        let numbers: Vec<i64> = tokens
            .iter()
            .map(|t| t.parse::<Chromosome>().unwrap().number())
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_unknown_chromosome_is_an_error() {
        let err = "chr7".parse::<Chromosome>().unwrap_err();
        assert!(matches!(err, NdpError::UnknownChromosome(_)));
    }

    #[test]
    fn test_midpoint_within_bounds() {
        for (start, end) in [(1, 1), (10, 11), (100, 250), (3_000_000, 3_000_001)] {
            let pos = midpoint(start, end);
            assert!(start <= pos && pos <= end);
        }
        assert_eq!(midpoint(100, 200), 150);
        assert_eq!(midpoint(10, 11), 10);
    }

    #[test]
    fn test_classify_arm_and_center() {
        let table = ArmCenterTable::default();
        assert_eq!(table.classify(Chromosome::I, 100_000), ArmOrCenter::Arm);
        assert_eq!(table.classify(Chromosome::I, 7_500_000), ArmOrCenter::Center);
        assert_eq!(table.classify(Chromosome::I, 14_900_000), ArmOrCenter::Arm);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let table = ArmCenterTable::default();
        let first = table.classify(Chromosome::V, 6_974_000);
        for _ in 0..10 {
            assert_eq!(table.classify(Chromosome::V, 6_974_000), first);
        }
    }

    #[test]
    fn test_unconfigured_chromosome_is_center() {
        let table = ArmCenterTable::default();
        assert_eq!(table.classify(Chromosome::MtDna, 5), ArmOrCenter::Center);
        assert_eq!(table.classify(Chromosome::MtDna, 13_000), ArmOrCenter::Center);
    }
}
