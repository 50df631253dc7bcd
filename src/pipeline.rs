// 🚀 Pipelines
// annotate:  sequence table + reference catalogs → gene annotation summary
// summarize: per-sample tool outputs (+ metadata) → presence matrix
//
// Each optional source is loaded on its own; a failing source costs only its
// own contribution and leaves a warning in the RunReport.

use crate::config::PipelineConfig;
use crate::error::{ReconcileError, Result};
use crate::matrix::ToolCallMatrix;
use crate::merge::MergeEngine;
use crate::overrides::OverrideRegistry;
use crate::records::{count_unresolved, records_from_table};
use crate::report::RunReport;
use crate::sources::{get_loader, ReferenceSource, ReferenceTable};
use crate::summary::{aggregate, GeneSummary, SUMMARY_COLUMNS};
use crate::table::{Table, TableFormat};
use crate::tools::{parse_or_zero, ToolInput};
use log::info;
use std::path::{Path, PathBuf};

// ============================================================================
// ANNOTATE
// ============================================================================

/// Load every configured reference catalog that can be loaded.
///
/// Returns the tables in priority order; failures become report warnings.
pub fn load_reference_tables(config: &PipelineConfig, report: &mut RunReport) -> Result<Vec<ReferenceTable>> {
    let mut tables = Vec::new();

    for source in ReferenceSource::PRIORITY {
        let Some(path) = config.references.get(source) else {
            info!("No {} reference configured, skipping", source.name());
            continue;
        };

        let loader = get_loader(source)?;
        match loader.load(path) {
            Ok(table) => {
                report.add_input(source.name(), path, table.len());
                tables.push(table);
            }
            Err(ReconcileError::Io { path, .. }) => {
                report.warn(format!(
                    "{} reference {} not found or unreadable, skipping",
                    source.name(),
                    path.display()
                ));
            }
            Err(e) => {
                report.warn(format!("{} reference skipped: {}", source.name(), e));
            }
        }
    }

    Ok(tables)
}

/// Normalize, merge and aggregate one sequence table.
///
/// Fatal only when the sequence table itself is unusable or no reference
/// catalog could be loaded.
pub fn annotate_pipeline(config: &PipelineConfig, sequence_table: &Path) -> Result<(Vec<GeneSummary>, RunReport)> {
    let mut report = RunReport::new("annotate");
    let registry = config.identifier_registry()?;

    let table = Table::read(sequence_table, &TableFormat::tsv().allowing_empty())?;
    let records = if table.is_empty() {
        report.warn(format!(
            "Sequence table {} has no rows; the summary will be empty",
            sequence_table.display()
        ));
        Vec::new()
    } else {
        records_from_table(&table, &registry)?
    };
    report.add_input("sequences", sequence_table, table.len());
    report.unresolved_identifiers = count_unresolved(&records);

    let tables = load_reference_tables(config, &mut report)?;
    if tables.is_empty() {
        return Err(ReconcileError::NoInputs(
            "no reference annotation table could be loaded".to_string(),
        ));
    }

    let engine = MergeEngine::standard(tables, OverrideRegistry::with_defaults());
    let (merged, stats) = engine.merge_with_stats(&records);
    for (catalog, hits) in &stats.matches {
        info!("{}: {} records matched", catalog, hits);
    }

    let summaries = aggregate(&merged);
    report.output_rows = summaries.len();
    report.output_columns = SUMMARY_COLUMNS.len();

    Ok((summaries, report))
}

// ============================================================================
// SUMMARIZE
// ============================================================================

/// What to combine: tool outputs in column order, plus optional metadata
#[derive(Debug, Clone, Default)]
pub struct SummarizeRequest {
    pub tools: Vec<ToolInput>,
    pub metadata: Option<PathBuf>,
}

impl SummarizeRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, input: ToolInput) -> Self {
        self.tools.push(input);
        self
    }

    pub fn with_metadata(mut self, path: impl Into<PathBuf>) -> Self {
        self.metadata = Some(path.into());
        self
    }
}

pub fn summarize_pipeline(config: &PipelineConfig, request: &SummarizeRequest) -> Result<(ToolCallMatrix, RunReport)> {
    let mut report = RunReport::new("summarize");
    if request.tools.is_empty() {
        return Err(ReconcileError::NoInputs("no tool outputs given".to_string()));
    }

    let mut columns = Vec::with_capacity(request.tools.len());
    for input in &request.tools {
        let (column, warning) = parse_or_zero(input, config);
        report.add_input(input.tool.name(), &input.path, column.calls.len());
        // parse_or_zero already logged it
        report.warnings.extend(warning);
        columns.push(column);
    }

    let mut matrix = ToolCallMatrix::combine(columns)?;

    if let Some(path) = &request.metadata {
        // a header-only metadata table still joins: it recognizes no gene
        let enriched = Table::read(path, &TableFormat::tsv().allowing_empty()).and_then(|table| {
            report.add_input("metadata", path, table.len());
            let outcome = matrix.enrich(&table)?;
            Ok((outcome, table.is_empty()))
        });
        match enriched {
            Ok((outcome, metadata_empty)) => {
                report.dropped_by_enrichment = outcome.dropped;
                if metadata_empty {
                    report.warn(format!(
                        "Metadata {} has no rows; all {} genes dropped by the join",
                        path.display(),
                        outcome.dropped
                    ));
                }
            }
            Err(e) => report.warn(format!(
                "Metadata {} not joined ({}); writing the matrix without it",
                path.display(),
                e
            )),
        }
    }

    report.output_rows = matrix.len();
    report.output_columns = 1 + matrix.columns().len() + matrix.metadata_columns().len();

    Ok((matrix, report))
}
