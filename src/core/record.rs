use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// One variant row produced by a record source
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShardRecord {
    /// 1-based position of the first reference base
    pub position: u64,

    /// Literal reference allele
    pub reference: String,

    /// Alternate alleles in file order; literal or symbolic
    pub alternates: Vec<String>,

    /// INFO key/value pairs; flags map to an empty string
    #[serde(default)]
    pub info: HashMap<String, String>,

    /// One genotype string per sample (e.g. `0/1`, `1|2`, `./.`)
    #[serde(default)]
    pub genotype_calls: Vec<String>,
}

impl ShardRecord {
    pub fn new(position: u64, reference: impl Into<String>, alternates: Vec<String>) -> Self {
        Self {
            position,
            reference: reference.into(),
            alternates,
            info: HashMap::new(),
            genotype_calls: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_genotypes<I, S>(mut self, calls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genotype_calls = calls.into_iter().map(Into::into).collect();
        self
    }

    /// Raw `AC` field (per-alternate allele counts), if present
    pub fn allele_counts_field(&self) -> Option<&str> {
        self.info
            .get("AC")
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Raw `AN` field (total called alleles), if present
    pub fn allele_number_field(&self) -> Option<&str> {
        self.info
            .get("AN")
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Parse an INFO column (`K=V;FLAG;...`). A lone `.` means no INFO.
pub fn parse_info(info: &str) -> HashMap<String, String> {
    let info = info.trim();
    if info.is_empty() || info == "." {
        return HashMap::new();
    }
    info.split(';')
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (entry.to_string(), String::new()),
        })
        .collect()
}

/// Digit runs in a genotype string, one per called allele (`./.` has none)
pub fn allele_calls(genotype: &str) -> impl Iterator<Item = &str> {
    genotype
        .split(|c: char| !c.is_ascii_digit())
        .filter(|call| !call.is_empty())
}

/// Zero-based alternate indexes carried by a genotype string.
///
/// Every standalone positive allele number `k` contributes index `k - 1`;
/// `0` (reference) and missing calls contribute nothing.
pub fn alternate_indexes(genotype: &str) -> BTreeSet<usize> {
    genotype
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|token| !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()))
        .filter(|token| !token.starts_with('0'))
        .filter_map(|token| token.parse::<usize>().ok())
        .map(|allele| allele - 1)
        .collect()
}
