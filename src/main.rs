use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pgxpipe::batch::{self, PlanMode};
use pgxpipe::knowledge::sort_by_evidence;
use pgxpipe::{DrugGeneInteraction, KnowledgeSources, Pipeline, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "pgxpipe", about = "Batch pharmacogenomic analysis pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve drug-gene interactions for a variant file.
    Analyze {
        /// Variant file (VCF) to analyze.
        #[arg(long)]
        vcf: PathBuf,
        /// Comma-separated drug names (brand or generic).
        #[arg(long, value_delimiter = ',', required = true)]
        drugs: Vec<String>,
        /// Rows per batch.
        #[arg(long, default_value_t = 50_000)]
        batch_size: u64,
        /// Worker threads (0 = all available cores).
        #[arg(long, default_value_t = 0)]
        workers: usize,
        /// Directory holding the cpic/ and pharmgkb/ dumps.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        /// Skip the annotation backend.
        #[arg(long)]
        skip_annotation: bool,
        /// Estimate the row count from a sample instead of counting exactly.
        #[arg(long)]
        estimate: bool,
        /// Per-batch deadline in seconds.
        #[arg(long)]
        task_deadline: Option<u64>,
        /// Write the merged interactions to this file as JSON.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Report how many batches a variant file decomposes into.
    Plan {
        /// Variant file (VCF) to plan.
        #[arg(long)]
        vcf: PathBuf,
        /// Rows per batch.
        #[arg(long, default_value_t = 50_000)]
        batch_size: u64,
        /// Estimate the row count from a sample instead of counting exactly.
        #[arg(long)]
        estimate: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze {
            vcf,
            drugs,
            batch_size,
            workers,
            data_dir,
            skip_annotation,
            estimate,
            task_deadline,
            output,
        } => run_analyze(
            vcf,
            drugs,
            batch_size,
            workers,
            data_dir,
            skip_annotation,
            estimate,
            task_deadline,
            output,
        )?,
        Commands::Plan {
            vcf,
            batch_size,
            estimate,
        } => run_plan(vcf, batch_size, estimate)?,
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_analyze(
    vcf: PathBuf,
    drugs: Vec<String>,
    batch_size: u64,
    workers: usize,
    data_dir: PathBuf,
    skip_annotation: bool,
    estimate: bool,
    task_deadline: Option<u64>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = PipelineConfig::new(&vcf, drugs)
        .with_batch_size(batch_size)
        .with_workers(workers)
        .with_plan_mode(plan_mode(estimate))
        .with_sources(KnowledgeSources::from_data_dir(data_dir));
    config.skip_annotation = skip_annotation;
    if let Some(seconds) = task_deadline {
        config = config.with_task_deadline(Duration::from_secs(seconds));
    }

    let pipeline = Pipeline::new(config).context("failed to initialize pipeline")?;
    let mut interactions = pipeline
        .run()
        .with_context(|| format!("analysis failed for {}", vcf.display()))?;
    sort_by_evidence(&mut interactions);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&interactions)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write results to {}", path.display()))?;
        eprintln!("wrote {} interactions to {}", interactions.len(), path.display());
    }

    if interactions.is_empty() {
        println!("No drug-gene interactions found.");
    } else {
        for interaction in &interactions {
            print_interaction(interaction);
        }
    }
    Ok(())
}

fn run_plan(vcf: PathBuf, batch_size: u64, estimate: bool) -> Result<()> {
    let batches = batch::plan(&vcf, batch_size, plan_mode(estimate))
        .with_context(|| format!("planning failed for {}", vcf.display()))?;
    println!("{}\tbatch_size={}\tbatches={}", vcf.display(), batch_size, batches);
    Ok(())
}

fn plan_mode(estimate: bool) -> PlanMode {
    if estimate {
        PlanMode::Estimated
    } else {
        PlanMode::Exact
    }
}

fn print_interaction(interaction: &DrugGeneInteraction) {
    println!(
        "{}\t{}\tsource={}\tevidence={}\t{}",
        interaction.drug,
        interaction.gene,
        interaction.source,
        interaction.evidence_level.as_deref().unwrap_or("-"),
        interaction
            .recommendation
            .lines()
            .next()
            .unwrap_or("no recommendation"),
    );
}
