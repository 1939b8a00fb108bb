use std::path::PathBuf;

use clap::Args;

use crate::cli::OutputFormat;
use crate::core::types::{Region, VariantType};
use crate::matching::shard::{CancelToken, MatchQuery, ShardResult};
use crate::query::dispatcher::execute_unit;
use crate::query::splitter::WorkUnit;
use crate::source::SourceKind;

#[derive(Args)]
pub struct ShardArgs {
    /// Variant file (VCF, optionally gzip/BGZF compressed)
    #[arg(required = true)]
    pub location: String,

    /// Region to scan, as chrom:start-end
    #[arg(long)]
    pub region: Region,

    /// Reference bases (IUPAC codes; N with --variant-type for approximate matching)
    #[arg(short = 'r', long)]
    pub reference_bases: String,

    /// Alternate bases (IUPAC codes)
    #[arg(short = 'a', long, required_unless_present = "variant_type")]
    pub alternate_bases: Option<String>,

    /// Structural variant type (DEL, INS, DUP, DUP:TANDEM, CNV, ...)
    #[arg(long)]
    pub variant_type: Option<VariantType>,

    /// Minimum variant end position (defaults to the region start)
    #[arg(long)]
    pub end_min: Option<u64>,

    /// Maximum variant end position (defaults to the region end)
    #[arg(long)]
    pub end_max: Option<u64>,

    /// Stop at the first match without counting samples
    #[arg(long)]
    pub existence_only: bool,

    /// Read the file through this bcftools executable (requires an index)
    #[arg(long, env = "BCFTOOLS")]
    pub bcftools: Option<PathBuf>,
}

impl ShardArgs {
    fn work_unit(&self) -> WorkUnit {
        WorkUnit {
            location: self.location.clone(),
            query: MatchQuery {
                region: self.region.clone(),
                reference_bases: self.reference_bases.clone(),
                alternate_bases: self.alternate_bases.clone(),
                variant_type: self.variant_type.clone(),
                end_min: self.end_min.unwrap_or(self.region.start),
                end_max: self.end_max.unwrap_or(self.region.end),
                include_details: !self.existence_only,
            },
        }
    }
}

pub fn run(args: ShardArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let kind = match &args.bcftools {
        Some(binary) => SourceKind::Bcftools {
            binary: binary.clone(),
        },
        None => SourceKind::Vcf,
    };
    let unit = args.work_unit();

    if verbose {
        eprintln!("Scanning {} in {}", unit.query.region, unit.location);
    }

    let result = execute_unit(&kind, &unit, &CancelToken::new())?;

    match format {
        OutputFormat::Text => print_text_result(&unit, &result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Tsv => print_tsv_result(&result),
    }

    Ok(())
}

fn print_text_result(unit: &WorkUnit, result: &ShardResult) {
    println!("Shard Result");
    println!("{}", "=".repeat(60));
    println!("\nSource: {}", unit.location);
    println!("Region: {}", unit.query.region);
    println!("Exists: {}", if result.exists { "yes" } else { "no" });

    if !unit.query.include_details {
        return;
    }
    println!("Matched calls: {}", result.call_count);
    println!("Total allele count: {}", result.total_allele_count);

    if !result.variant_samples.is_empty() {
        println!("\nVariants:");
        for (variant, samples) in &result.variant_samples {
            println!("  {variant}: {} samples", samples.len());
        }
    }
}

fn print_tsv_result(result: &ShardResult) {
    println!("variant\tsample_count\tsamples");
    for (variant, samples) in &result.variant_samples {
        let indexes: Vec<String> = samples.iter().map(ToString::to_string).collect();
        println!("{variant}\t{}\t{}", samples.len(), indexes.join(","));
    }
}
