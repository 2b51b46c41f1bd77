use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

const INVISIBLE: &[char] = &['\u{feff}', '\u{200b}', '\u{200c}', '\u{200d}', '\u{a0}'];

/// UniProt entry name taken from the TTD list, e.g. `ACES_HUMAN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetIdentifier(String);

impl TargetIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TargetIdentifier {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let cleaned: String = value.chars().filter(|ch| !INVISIBLE.contains(ch)).collect();
        let cleaned = cleaned.trim();
        let cleaned = strip_version_suffix(cleaned);
        let is_valid = !cleaned.is_empty()
            && !cleaned.eq_ignore_ascii_case("uniprot id")
            && cleaned
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !is_valid {
            return Err(KiraError::InvalidTargetId(value.to_string()));
        }
        Ok(Self(cleaned.to_string()))
    }
}

fn strip_version_suffix(value: &str) -> &str {
    match value.rsplit_once('.') {
        Some((head, tail)) if !tail.is_empty() && tail.chars().all(|ch| ch.is_ascii_digit()) => {
            head
        }
        _ => value,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccessionCode(String);

impl AccessionCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccessionCode {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        // isoform accessions (P12345-2) share the canonical entry's structures
        let base = normalized
            .split_once('-')
            .map(|(head, _)| head.to_string())
            .unwrap_or(normalized);
        let is_valid = !base.is_empty() && base.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !is_valid {
            return Err(KiraError::InvalidAccession(value.to_string()));
        }
        Ok(Self(base))
    }
}

/// Four-character PDB entry id, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructureId(String);

impl StructureId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StructureId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let is_valid =
            normalized.len() == 4 && normalized.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !is_valid {
            return Err(KiraError::InvalidStructureId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureCandidate {
    pub structure_id: StructureId,
    pub method: Option<String>,
    pub resolution: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedTarget {
    pub target: TargetIdentifier,
    pub accession: AccessionCode,
    pub structure_ids: Vec<StructureId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedStructure {
    pub target: TargetIdentifier,
    pub accession: AccessionCode,
    pub candidate: StructureCandidate,
}

impl SelectedStructure {
    pub fn structure_id(&self) -> &StructureId {
        &self.candidate.structure_id
    }

    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.target, self.candidate.structure_id)
    }

    pub fn raw_file_name(&self) -> String {
        format!("{}.cif", self.file_stem())
    }

    pub fn converted_file_name(&self, format: ConvertFormat) -> String {
        format!("{}.{}", self.file_stem(), format.extension())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedStructure {
    pub selection: SelectedStructure,
    pub raw_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConvertFormat {
    Pdb,
    Mae,
}

impl ConvertFormat {
    pub const ALL: [ConvertFormat; 2] = [ConvertFormat::Pdb, ConvertFormat::Mae];

    pub fn extension(&self) -> &'static str {
        match self {
            ConvertFormat::Pdb => "pdb",
            ConvertFormat::Mae => "mae",
        }
    }
}

impl fmt::Display for ConvertFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}
