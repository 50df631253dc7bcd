use amr_reconcile::logging::init_logger;
use amr_reconcile::{
    annotate_pipeline, summarize_pipeline, write_summaries, DetectionTool, OverlapMatrix,
    PipelineConfig, ReferenceSource, RunReport, SummarizeRequest, Table, TableFormat, ToolInput,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "amr-reconcile")]
#[command(version)]
#[command(about = "Reconcile AMR gene identities across reference databases and detection tools")]
#[command(after_help = "EXAMPLES:
  # Annotate the clustered gene table against the reference catalogs
  amr-reconcile annotate genes.tsv --card aro_index.tsv --megares megares_annotations_v3.00.csv

  # Combine per-sample tool outputs into a presence matrix
  amr-reconcile summarize --groot s1.tsv --karga s1_KARGA_mappedGenes.csv -o matrix.tsv

  # Gene overlap between source databases
  amr-reconcile overlap -i genes.tsv -o plots/")]
struct Cli {
    /// Enable verbose progress output with timestamps
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the per-gene annotation summary
    Annotate {
        /// Tab-delimited sequence table (fa_header, database, userGeneName, ...)
        sequence_table: PathBuf,

        /// JSON pipeline config
        #[arg(long)]
        config: Option<PathBuf>,

        /// AMRFinderPlus ReferenceGeneCatalog.txt
        #[arg(long)]
        amrfinderplus: Option<PathBuf>,

        /// CARD aro_index.tsv
        #[arg(long)]
        card: Option<PathBuf>,

        /// MEGARes annotations CSV
        #[arg(long)]
        megares: Option<PathBuf>,

        /// ResFinder notes.txt
        #[arg(long)]
        resfinder: Option<PathBuf>,

        /// Output summary TSV
        #[arg(short, long, default_value = "gene_annotation_summary.tsv")]
        summary: PathBuf,

        /// Write a JSON run report here
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Combine per-sample tool outputs into a gene presence matrix
    Summarize {
        #[arg(long)]
        groot: Option<PathBuf>,

        /// ARIBA report.tsv (needs --ariba-summary)
        #[arg(long, requires = "ariba_summary")]
        ariba: Option<PathBuf>,

        /// ARIBA summary CSV
        #[arg(long)]
        ariba_summary: Option<PathBuf>,

        #[arg(long)]
        karga: Option<PathBuf>,

        #[arg(long)]
        srst2: Option<PathBuf>,

        #[arg(long)]
        argprofiler: Option<PathBuf>,

        /// Gene metadata TSV keyed by userGeneName
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// JSON pipeline config
        #[arg(long)]
        config: Option<PathBuf>,

        /// KARGA coverage threshold in percent
        #[arg(long)]
        karga_min_coverage: Option<f64>,

        #[arg(short = 'o', long)]
        output_file: PathBuf,

        /// Write a JSON run report here
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Pairwise gene overlap between source databases
    Overlap {
        /// Table with userGeneName and database columns
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory (created if absent)
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "sharing_matrix")]
        prefix: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Annotate {
            sequence_table,
            config,
            amrfinderplus,
            card,
            megares,
            resfinder,
            summary,
            report,
        } => {
            let mut config = load_config(config.as_deref())?;
            for (source, path) in [
                (ReferenceSource::AmrFinderPlus, amrfinderplus),
                (ReferenceSource::Card, card),
                (ReferenceSource::Megares, megares),
                (ReferenceSource::ResFinder, resfinder),
            ] {
                if let Some(path) = path {
                    config.references.set(source, path);
                }
            }
            run_annotate(&config, &sequence_table, &summary, report.as_deref())
        }
        Commands::Summarize {
            groot,
            ariba,
            ariba_summary,
            karga,
            srst2,
            argprofiler,
            metadata,
            config,
            karga_min_coverage,
            output_file,
            report,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(threshold) = karga_min_coverage {
                config.karga_min_coverage = threshold;
                config.validate()?;
            }

            let mut request = SummarizeRequest::new();
            if let Some(path) = groot {
                request = request.with_tool(ToolInput::new(DetectionTool::Groot, path));
            }
            if let Some(path) = ariba {
                let mut input = ToolInput::new(DetectionTool::Ariba, path);
                if let Some(summary) = ariba_summary {
                    input = input.with_summary(summary);
                }
                request = request.with_tool(input);
            }
            for (tool, path) in [
                (DetectionTool::Karga, karga),
                (DetectionTool::Srst2, srst2),
                (DetectionTool::ArgProfiler, argprofiler),
            ] {
                if let Some(path) = path {
                    request = request.with_tool(ToolInput::new(tool, path));
                }
            }
            if let Some(path) = metadata {
                request = request.with_metadata(path);
            }
            if request.tools.is_empty() {
                bail!("No tool outputs given; pass at least one of --groot, --ariba, --karga, --srst2, --argprofiler");
            }

            run_summarize(&config, &request, &output_file, report.as_deref())
        }
        Commands::Overlap {
            input,
            output,
            prefix,
        } => run_overlap(&input, &output, &prefix),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path),
        None => Ok(PipelineConfig::default()),
    }
}

fn run_annotate(config: &PipelineConfig, sequence_table: &Path, output: &Path, report_path: Option<&Path>) -> Result<()> {
    println!("🧬 Annotating genes from {}", sequence_table.display());

    let (summaries, report) = annotate_pipeline(config, sequence_table)
        .with_context(|| format!("Failed to annotate {}", sequence_table.display()))?;

    write_summaries(output, &summaries)
        .with_context(|| format!("Failed to write summary: {}", output.display()))?;
    println!("✓ Wrote {} gene summaries to {}", summaries.len(), output.display());

    finish(&report, report_path)
}

fn run_summarize(config: &PipelineConfig, request: &SummarizeRequest, output: &Path, report_path: Option<&Path>) -> Result<()> {
    println!("📊 Combining {} tool outputs", request.tools.len());

    let (matrix, report) = summarize_pipeline(config, request).context("Failed to build presence matrix")?;

    matrix
        .write_to_path(output)
        .with_context(|| format!("Failed to write matrix: {}", output.display()))?;
    println!(
        "✓ Wrote {} genes × {} samples to {}",
        matrix.len(),
        matrix.columns().len(),
        output.display()
    );

    finish(&report, report_path)
}

fn run_overlap(input: &Path, output: &Path, prefix: &str) -> Result<()> {
    println!("🔀 Computing database overlap from {}", input.display());

    let table = Table::read(input, &TableFormat::tsv())
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let overlap = OverlapMatrix::from_table(&table)?;
    let (counts, percentages) = overlap.write(output, prefix)?;

    println!("✓ {} databases", overlap.databases().len());
    println!("✓ {}", counts.display());
    println!("✓ {}", percentages.display());
    Ok(())
}

fn finish(report: &RunReport, report_path: Option<&Path>) -> Result<()> {
    if let Some(path) = report_path {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        println!("✓ Report written to {}", path.display());
    }

    if report.has_warnings() {
        println!("⚠️  {} warnings (see log)", report.warnings.len());
    }
    println!("✅ {}", report.summary());
    Ok(())
}
