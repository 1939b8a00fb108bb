use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

use crate::utils::validation::validate_dataset_id;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Dataset '{id}' is invalid: {reason}")]
    InvalidDataset { id: String, reason: String },

    #[error("Dataset '{0}' is defined more than once")]
    DuplicateDataset(String),
}

/// A queryable collection of variant files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub dataset_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,

    /// Number of samples in the dataset; the frequency denominator
    pub sample_count: u64,

    /// Variant file location → chromosome name used inside that file
    pub vcf_locations: BTreeMap<String, String>,

    /// Optional annotation table (TSV, optionally gzipped)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_location: Option<String>,
}

impl Dataset {
    /// Check the invariants the query path relies on.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidDataset` for a bad id, a zero sample
    /// count, or no variant files.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |reason: &str| CatalogError::InvalidDataset {
            id: self.dataset_id.clone(),
            reason: reason.to_string(),
        };
        if validate_dataset_id(&self.dataset_id).is_err() {
            return Err(invalid("id must be alphanumeric, '-', '_' or '.'"));
        }
        if self.sample_count == 0 {
            return Err(invalid("sample_count must be positive"));
        }
        if self.vcf_locations.is_empty() {
            return Err(invalid("no vcf_locations"));
        }
        Ok(())
    }
}

/// Serializable catalog format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogData {
    pub datasets: Vec<Dataset>,
}

/// All datasets known to this process, indexed by id
#[derive(Debug, Default)]
pub struct DatasetCatalog {
    pub datasets: Vec<Dataset>,

    /// Index: dataset ID -> index in datasets vec
    id_to_index: HashMap<String, usize>,
}

impl DatasetCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Load catalog from a JSON file
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the file cannot be read or is invalid.
    pub fn load_from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse catalog from JSON string
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on malformed JSON, invalid datasets, or
    /// duplicate ids.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let data: CatalogData = serde_json::from_str(json)?;

        let mut catalog = Self::new();
        for dataset in data.datasets {
            catalog.add_dataset(dataset)?;
        }
        Ok(catalog)
    }

    /// Add a dataset to the catalog
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the dataset is invalid or its id is taken.
    pub fn add_dataset(&mut self, dataset: Dataset) -> Result<(), CatalogError> {
        dataset.validate()?;
        if self.id_to_index.contains_key(&dataset.dataset_id) {
            return Err(CatalogError::DuplicateDataset(dataset.dataset_id));
        }
        self.id_to_index
            .insert(dataset.dataset_id.clone(), self.datasets.len());
        self.datasets.push(dataset);
        Ok(())
    }

    /// Get a dataset by ID
    pub fn get(&self, id: &str) -> Option<&Dataset> {
        self.id_to_index.get(id).map(|&i| &self.datasets[i])
    }

    /// Whether any dataset lists `location` as one of its variant files
    pub fn serves_location(&self, location: &str) -> bool {
        self.datasets
            .iter()
            .any(|d| d.vcf_locations.contains_key(location))
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Export catalog to JSON
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ParseError` if serialization fails.
    pub fn to_json(&self) -> Result<String, CatalogError> {
        let data = CatalogData {
            datasets: self.datasets.clone(),
        };
        Ok(serde_json::to_string_pretty(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "datasets": [
            {
                "dataset_id": "1000g",
                "name": "1000 Genomes",
                "description": "Phase 3",
                "sample_count": 2504,
                "vcf_locations": {
                    "/data/chr1.vcf.gz": "1",
                    "/data/chr1.extra.vcf.gz": "chr1"
                },
                "annotation_location": "/data/annotations.tsv.gz"
            },
            {
                "dataset_id": "small",
                "name": "Small cohort",
                "sample_count": 3,
                "vcf_locations": { "/data/small.vcf": "1" }
            }
        ]
    }"#;

    #[test]
    fn test_load_catalog() {
        let catalog = DatasetCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);

        let dataset = catalog.get("1000g").unwrap();
        assert_eq!(dataset.sample_count, 2504);
        assert_eq!(dataset.vcf_locations.len(), 2);
        assert_eq!(
            dataset.annotation_location.as_deref(),
            Some("/data/annotations.tsv.gz")
        );

        let small = catalog.get("small").unwrap();
        assert!(small.description.is_empty());
        assert!(small.annotation_location.is_none());
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn test_serves_location() {
        let catalog = DatasetCatalog::from_json(CATALOG).unwrap();
        assert!(catalog.serves_location("/data/chr1.extra.vcf.gz"));
        assert!(catalog.serves_location("/data/small.vcf"));
        assert!(!catalog.serves_location("/data/annotations.tsv.gz"));
        assert!(!catalog.serves_location("/etc/passwd"));
    }

    #[test]
    fn test_round_trip() {
        let catalog = DatasetCatalog::from_json(CATALOG).unwrap();
        let reloaded = DatasetCatalog::from_json(&catalog.to_json().unwrap()).unwrap();
        assert_eq!(catalog.datasets, reloaded.datasets);
    }

    #[test]
    fn test_rejects_zero_samples() {
        let json = r#"{"datasets": [{"dataset_id": "x", "name": "x", "sample_count": 0,
            "vcf_locations": {"a.vcf": "1"}}]}"#;
        assert!(matches!(
            DatasetCatalog::from_json(json),
            Err(CatalogError::InvalidDataset { .. })
        ));
    }

    #[test]
    fn test_rejects_no_sources() {
        let json = r#"{"datasets": [{"dataset_id": "x", "name": "x", "sample_count": 5,
            "vcf_locations": {}}]}"#;
        assert!(matches!(
            DatasetCatalog::from_json(json),
            Err(CatalogError::InvalidDataset { .. })
        ));
    }

    #[test]
    fn test_rejects_duplicates() {
        let json = r#"{"datasets": [
            {"dataset_id": "x", "name": "x", "sample_count": 5, "vcf_locations": {"a.vcf": "1"}},
            {"dataset_id": "x", "name": "y", "sample_count": 6, "vcf_locations": {"b.vcf": "1"}}
        ]}"#;
        assert!(matches!(
            DatasetCatalog::from_json(json),
            Err(CatalogError::DuplicateDataset(_))
        ));
    }

    #[test]
    fn test_rejects_bad_id() {
        let json = r#"{"datasets": [{"dataset_id": "../x", "name": "x", "sample_count": 5,
            "vcf_locations": {"a.vcf": "1"}}]}"#;
        assert!(DatasetCatalog::from_json(json).is_err());
    }
}
