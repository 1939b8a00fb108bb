use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Args;

use crate::catalog::store::{Dataset, DatasetCatalog};
use crate::cli::OutputFormat;
use crate::config::EngineArgs;
use crate::core::types::{IncludeDatasets, VariantType};
use crate::query::orchestrator::{DatasetResponse, IncludedResponse, Orchestrator, QueryRequest};

#[derive(Args)]
pub struct QueryArgs {
    /// Dataset catalog (JSON)
    #[arg(long, env = "DATASET_CATALOG")]
    pub catalog: PathBuf,

    /// Dataset to query (repeatable; all catalog datasets when omitted)
    #[arg(long = "dataset")]
    pub datasets: Vec<String>,

    /// Region start (1-based, inclusive)
    #[arg(long)]
    pub start: u64,

    /// Region end (1-based, inclusive)
    #[arg(long)]
    pub end: u64,

    /// Minimum variant end position (defaults to --start)
    #[arg(long)]
    pub end_min: Option<u64>,

    /// Maximum variant end position (defaults to --end)
    #[arg(long)]
    pub end_max: Option<u64>,

    /// Reference bases (IUPAC codes; N with --variant-type for approximate matching)
    #[arg(short = 'r', long)]
    pub reference_bases: String,

    /// Alternate bases (IUPAC codes)
    #[arg(short = 'a', long, required_unless_present = "variant_type")]
    pub alternate_bases: Option<String>,

    /// Structural variant type (DEL, INS, DUP, DUP:TANDEM, CNV, ...)
    #[arg(long)]
    pub variant_type: Option<VariantType>,

    /// Which datasets to report in full
    #[arg(long, value_enum, default_value_t = IncludeDatasets::Hit)]
    pub include: IncludeDatasets,

    /// Variants to skip in each dataset's listing
    #[arg(long, default_value_t = 0)]
    pub skip: usize,

    /// Maximum variants to list per dataset
    #[arg(long)]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub engine: EngineArgs,
}

impl QueryArgs {
    fn request(&self) -> QueryRequest {
        QueryRequest {
            reference_bases: self.reference_bases.clone(),
            region_start: self.start,
            region_end: self.end,
            end_min: self.end_min.unwrap_or(self.start),
            end_max: self.end_max.unwrap_or(self.end),
            alternate_bases: self.alternate_bases.clone(),
            variant_type: self.variant_type.clone(),
            include_datasets: self.include,
            variants_skip: self.skip,
            variants_max: self.limit,
        }
    }
}

pub fn run(args: QueryArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let catalog = DatasetCatalog::load_from_file(&args.catalog)
        .with_context(|| format!("Failed to load catalog {}", args.catalog.display()))?;

    let datasets: Vec<&Dataset> = if args.datasets.is_empty() {
        catalog.datasets.iter().collect()
    } else {
        let mut selected = Vec::with_capacity(args.datasets.len());
        for id in &args.datasets {
            match catalog.get(id) {
                Some(dataset) => selected.push(dataset),
                None => bail!("Unknown dataset '{id}'"),
            }
        }
        selected
    };

    let request = args.request();
    request.validate()?;

    if verbose {
        eprintln!(
            "Querying {} datasets over {}-{} (split size {})",
            datasets.len(),
            request.region_start,
            request.region_end,
            args.engine.split_size
        );
    }

    let orchestrator = Orchestrator::new(
        args.engine.dispatcher()?,
        args.engine.cache(),
        args.engine.query_config(),
    );

    let rt = tokio::runtime::Runtime::new()?;
    let responses = rt.block_on(async {
        let mut responses = Vec::with_capacity(datasets.len());
        for dataset in &datasets {
            responses.push(orchestrator.split_query(dataset, &request).await?);
        }
        orchestrator.flush_cache().await;
        Ok::<_, anyhow::Error>(responses)
    })?;

    match format {
        OutputFormat::Text => print_text_responses(&datasets, &responses),
        OutputFormat::Json => print_json_responses(&responses)?,
        OutputFormat::Tsv => print_tsv_responses(&responses),
    }

    Ok(())
}

fn print_text_responses(datasets: &[&Dataset], responses: &[DatasetResponse]) {
    println!("Query Results");
    println!("{}", "=".repeat(60));

    for (dataset, response) in datasets.iter().zip(responses) {
        println!("\nDataset: {} ({})", dataset.name, dataset.dataset_id);
        match response {
            DatasetResponse::Excluded(excluded) => {
                println!("  Exists: {}", yes_no(excluded.exists));
                println!("  (not reported for this inclusion mode)");
            }
            DatasetResponse::Included(included) => print_text_included(included),
        }
    }
}

fn print_text_included(included: &IncludedResponse) {
    println!("  Exists: {}", yes_no(included.exists));
    println!("  Variants: {}", included.variant_count);
    println!("  Calls: {}", included.call_count);
    println!(
        "  Samples: {} of {}",
        included.sample_count, included.info.dataset_sample_count
    );
    if let Some(frequency) = included.frequency {
        println!("  Frequency: {}", frequency.as_f64());
    }

    if included.info.variants.is_empty() {
        return;
    }
    println!("\n  {:<12} {:<12} {:<12} {:>8}", "Pos", "Ref", "Alt", "Samples");
    println!("  {}", "-".repeat(48));
    for row in &included.info.variants {
        println!(
            "  {:<12} {:<12} {:<12} {:>8}",
            row.pos, row.reference, row.alternate, row.sample_count
        );
    }
}

fn print_json_responses(responses: &[DatasetResponse]) -> anyhow::Result<()> {
    let output = serde_json::json!({ "datasets": responses });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_tsv_responses(responses: &[DatasetResponse]) {
    println!("dataset_id\tpos\tref\talt\tsample_count\tfrequency");
    for response in responses {
        let DatasetResponse::Included(included) = response else {
            continue;
        };
        for row in &included.info.variants {
            let frequency = row
                .frequency
                .map(|f| f.as_f64().to_string())
                .unwrap_or_default();
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                included.dataset_id,
                row.pos,
                row.reference,
                row.alternate,
                row.sample_count,
                frequency
            );
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
