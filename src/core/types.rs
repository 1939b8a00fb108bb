use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error parsing a `chrom:start-end` region string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegionError {
    #[error("Region '{0}' is not of the form chrom:start-end")]
    InvalidFormat(String),

    #[error("Region '{0}' has a non-numeric bound")]
    InvalidBound(String),

    #[error("Region '{0}' ends before it starts")]
    Inverted(String),
}

/// A closed, 1-based genomic interval on one contig
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Region {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

impl Region {
    pub fn new(chrom: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            end,
        }
    }

    /// True if `position` lies inside the closed interval
    #[inline]
    pub fn contains(&self, position: u64) -> bool {
        self.start <= position && position <= self.end
    }

    pub fn width(&self) -> u64 {
        self.end - self.start + 1
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

impl FromStr for Region {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Contig names may themselves contain ':' (e.g. HLA alleles), so split on the last one
        let (chrom, range) = s
            .rsplit_once(':')
            .ok_or_else(|| RegionError::InvalidFormat(s.to_string()))?;
        let (start, end) = range
            .split_once('-')
            .ok_or_else(|| RegionError::InvalidFormat(s.to_string()))?;
        if chrom.is_empty() {
            return Err(RegionError::InvalidFormat(s.to_string()));
        }

        let start: u64 = start
            .trim()
            .parse()
            .map_err(|_| RegionError::InvalidBound(s.to_string()))?;
        let end: u64 = end
            .trim()
            .parse()
            .map_err(|_| RegionError::InvalidBound(s.to_string()))?;
        if end < start {
            return Err(RegionError::Inverted(s.to_string()));
        }

        Ok(Self::new(chrom, start, end))
    }
}

impl TryFrom<String> for Region {
    type Error = RegionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Region> for String {
    fn from(region: Region) -> Self {
        region.to_string()
    }
}

/// Structural variant class requested by a query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VariantType {
    Del,
    Ins,
    Dup,
    DupTandem,
    Cnv,
    /// Any other symbolic type, matched only by its own tag
    Other(String),
}

impl VariantType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Del => "DEL",
            Self::Ins => "INS",
            Self::Dup => "DUP",
            Self::DupTandem => "DUP:TANDEM",
            Self::Cnv => "CNV",
            Self::Other(tag) => tag,
        }
    }

    /// Prefix a symbolic allele must start with to carry this type's own tag
    pub fn symbolic_prefix(&self) -> String {
        format!("<{}", self.as_str())
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for VariantType {
    fn from(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "DEL" => Self::Del,
            "INS" => Self::Ins,
            "DUP" => Self::Dup,
            "DUP:TANDEM" => Self::DupTandem,
            "CNV" => Self::Cnv,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl From<String> for VariantType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<VariantType> for String {
    fn from(variant_type: VariantType) -> Self {
        variant_type.as_str().to_string()
    }
}

impl FromStr for VariantType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

/// Which dataset outcomes the caller wants reported in full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPER")]
pub enum IncludeDatasets {
    /// Report datasets that contain the variant
    #[default]
    Hit,
    /// Report every dataset
    All,
    /// Report datasets that do not contain the variant
    Miss,
}

impl IncludeDatasets {
    /// HIT and ALL need full counts and samples; MISS only needs existence
    pub fn requires_details(self) -> bool {
        matches!(self, Self::Hit | Self::All)
    }

    /// Whether a dataset with the given outcome is reported in full
    pub fn includes(self, exists: bool) -> bool {
        match self {
            Self::All => true,
            Self::Hit => exists,
            Self::Miss => !exists,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::All => "ALL",
            Self::Miss => "MISS",
        }
    }
}

impl fmt::Display for IncludeDatasets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
