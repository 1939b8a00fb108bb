use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use noodles::core::{self as ncore, Position};
use noodles::vcf::variant::record::AlternateBases as _;
use noodles::{csi, tabix, vcf};
use tracing::{debug, warn};

use crate::core::record::{parse_info, ShardRecord};
use crate::core::types::Region;
use crate::parsing::vcf::{extract_genotypes, parse_data_line};
use crate::source::{RecordSource, RecordStream, SourceError};
use crate::utils::io::open_text;

/// Index extensions looked up next to the VCF, in order of preference
const INDEX_EXTENSIONS: [&str; 2] = ["tbi", "csi"];

/// Region reader for one VCF file.
///
/// A bgzipped file with a tabix (`.tbi`) or CSI (`.csi`) index next to it is
/// read through the index, so only the blocks overlapping the region are
/// decoded. Without an index the file is scanned linearly (plain, gzip or
/// BGZF), which assumes a position-sorted file.
#[derive(Debug, Clone)]
pub struct VcfFileSource {
    path: PathBuf,
    location: String,
}

impl VcfFileSource {
    pub fn new(location: impl Into<String>) -> Self {
        let location = location.into();
        Self {
            path: PathBuf::from(&location),
            location,
        }
    }

    /// The index file next to this VCF, if any
    pub fn index_path(&self) -> Option<PathBuf> {
        INDEX_EXTENSIONS
            .iter()
            .map(|ext| append_extension(&self.path, ext))
            .find(|path| path.is_file())
    }

    fn query_indexed(
        &self,
        index: &Path,
        region: &Region,
    ) -> Result<Vec<Result<ShardRecord, SourceError>>, SourceError> {
        let builder = vcf::io::indexed_reader::Builder::default();
        let builder = if index.extension().is_some_and(|ext| ext == "csi") {
            builder.set_index(csi::read(index)?)
        } else {
            builder.set_index(tabix::read(index)?)
        };
        let mut reader = builder.build_from_path(&self.path)?;
        let header = reader.read_header()?;

        let start = Position::new(region.start as usize).unwrap_or(Position::MIN);
        let end = Position::new(region.end as usize).unwrap_or(Position::MIN);
        let index_region = ncore::Region::new(region.chrom.as_str(), start..=end);

        let query = match reader.query(&header, &index_region) {
            Ok(query) => query,
            // Contig absent from the index
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
                debug!("{}: no records for {}: {}", self.location, region, e);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for result in query {
            let converted = result
                .map_err(SourceError::from)
                .and_then(|record| convert_record(&record, region));
            let failed = converted.is_err();
            records.push(converted);
            if failed {
                break;
            }
        }
        Ok(records)
    }
}

impl RecordSource for VcfFileSource {
    fn location(&self) -> &str {
        &self.location
    }

    fn stream(&self, region: &Region) -> Result<RecordStream<'_>, SourceError> {
        if let Some(index) = self.index_path() {
            debug!("{}: indexed query of {} via {}", self.location, region, index.display());
            let records = self.query_indexed(&index, region)?;
            return Ok(Box::new(records.into_iter()));
        }

        debug!("{}: no index found, scanning for {}", self.location, region);
        let reader = open_text(&self.path)?;
        Ok(Box::new(RegionScan {
            location: self.location.clone(),
            lines: reader.lines().enumerate(),
            region: region.clone(),
            done: false,
        }))
    }
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn convert_record(record: &vcf::Record, region: &Region) -> Result<ShardRecord, SourceError> {
    let invalid = |reason: String| SourceError::InvalidRecord {
        region: region.to_string(),
        reason,
    };

    let position = match record.variant_start() {
        Some(Ok(position)) => usize::from(position) as u64,
        Some(Err(e)) => return Err(invalid(format!("invalid position: {e}"))),
        None => return Err(invalid("missing position".to_string())),
    };

    let mut alternates = record
        .alternate_bases()
        .iter()
        .map(|allele| allele.map(str::to_string))
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| invalid(format!("invalid alternate bases at {position}: {e}")))?;
    if alternates.is_empty() {
        alternates.push(".".to_string());
    }

    let info = record.info();
    let info: &str = info.as_ref();
    let samples = record.samples();
    let samples: &str = samples.as_ref();
    let mut columns = samples.split('\t');
    let genotype_calls = match columns.next() {
        Some(format) if !format.is_empty() => {
            let samples: Vec<&str> = columns.collect();
            extract_genotypes(format, &samples)
        }
        _ => Vec::new(),
    };

    Ok(ShardRecord {
        position,
        reference: record.reference_bases().to_string(),
        alternates,
        info: parse_info(info),
        genotype_calls,
    })
}

/// Linear scan used when the file has no index
struct RegionScan<L> {
    location: String,
    lines: L,
    region: Region,
    done: bool,
}

impl<L> Iterator for RegionScan<L>
where
    L: Iterator<Item = (usize, io::Result<String>)>,
{
    type Item = Result<ShardRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let Some((i, line)) = self.lines.next() else {
                self.done = true;
                break;
            };
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Only contig and position are needed to place a line
            let mut fields = line.splitn(3, '\t');
            if fields.next() != Some(self.region.chrom.as_str()) {
                continue;
            }
            let Some(position) = fields.next().and_then(|pos| pos.parse::<u64>().ok()) else {
                warn!("{}: skipping line {} with no usable position", self.location, i + 1);
                continue;
            };
            if position > self.region.end {
                self.done = true;
                break;
            }

            match parse_data_line(&line, i + 1) {
                Ok((_, record)) => {
                    let end = record.position + record.reference.len() as u64 - 1;
                    if end >= self.region.start {
                        return Some(Ok(record));
                    }
                }
                // Its reference span is unknown, so it cannot be placed in the region
                Err(e) if position < self.region.start => {
                    warn!("{}: skipping line before region: {}", self.location, e);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
