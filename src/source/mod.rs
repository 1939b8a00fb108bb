//! Variant record sources.
//!
//! A source turns a region into a sequential stream of [`ShardRecord`]s.
//! Two implementations are provided:
//!
//! - [`VcfFileSource`]: indexed (tabix/CSI) region query over a bgzipped VCF,
//!   with a linear scan for unindexed files
//! - [`BcftoolsSource`]: runs `bcftools query` against an indexed VCF/BCF
//!
//! Sources may return records that start before the requested region
//! (overlapping records); the shard matcher applies the window itself.

use std::path::PathBuf;

use crate::core::record::ShardRecord;
use crate::core::types::Region;

pub mod bcftools;
pub mod vcf_file;

pub use bcftools::BcftoolsSource;
pub use vcf_file::VcfFileSource;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record on line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("Malformed record in {region}: {reason}")]
    InvalidRecord { region: String, reason: String },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    ProcessFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Sequential record stream for one region
pub type RecordStream<'a> = Box<dyn Iterator<Item = Result<ShardRecord, SourceError>> + Send + 'a>;

/// Produces the records of one region of one variant file
pub trait RecordSource: Send + Sync {
    /// Identifier of the underlying file, used in logs and per-source sample sets
    fn location(&self) -> &str;

    /// Open a stream of the records overlapping `region`.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` if the underlying file or process cannot be opened.
    fn stream(&self, region: &Region) -> Result<RecordStream<'_>, SourceError>;
}

/// How variant files are read
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Read VCF files in-process
    #[default]
    Vcf,
    /// Delegate region queries to a `bcftools` executable
    Bcftools { binary: PathBuf },
}

impl SourceKind {
    /// Open the source for a location
    pub fn open(&self, location: &str) -> Box<dyn RecordSource> {
        match self {
            Self::Vcf => Box::new(VcfFileSource::new(location)),
            Self::Bcftools { binary } => Box::new(BcftoolsSource::new(binary.clone(), location)),
        }
    }
}
