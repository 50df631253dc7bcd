// 🔬 Detection-tool output parsers
// Each tool writes its per-sample calls in its own format. A parser turns one
// sample's output into a single column: gene → 0/1.
//
// Failure policy: a missing, empty or malformed file yields an all-zero column
// for that tool (see `parse_or_zero`); it never aborts the aggregation.

use crate::config::PipelineConfig;
use crate::error::{ReconcileError, Result};
use crate::table::{Table, TableFormat};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

// ============================================================================
// CORE TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionTool {
    Groot,
    Ariba,
    Karga,
    Srst2,
    ArgProfiler,
}

impl DetectionTool {
    pub fn name(&self) -> &'static str {
        match self {
            DetectionTool::Groot => "GROOT",
            DetectionTool::Ariba => "ARIBA",
            DetectionTool::Karga => "KARGA",
            DetectionTool::Srst2 => "SRST2",
            DetectionTool::ArgProfiler => "ARGprofiler",
        }
    }
}

/// One requested tool output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool: DetectionTool,
    pub path: PathBuf,

    /// ARIBA only: the `ariba summary` CSV holding the yes/no calls
    pub summary: Option<PathBuf>,
}

impl ToolInput {
    pub fn new(tool: DetectionTool, path: impl Into<PathBuf>) -> Self {
        ToolInput {
            tool,
            path: path.into(),
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<PathBuf>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// ToolColumn - one sample's calls from one tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolColumn {
    pub name: String,
    pub calls: BTreeMap<String, u8>,
}

impl ToolColumn {
    pub fn new(name: impl Into<String>) -> Self {
        ToolColumn {
            name: name.into(),
            calls: BTreeMap::new(),
        }
    }

    /// Column with no detections; zero-filled when combined
    pub fn zero(name: impl Into<String>) -> Self {
        ToolColumn::new(name)
    }

    pub fn detect(&mut self, gene: &str) {
        let gene = gene.trim();
        if !gene.is_empty() {
            self.calls.insert(gene.to_string(), 1);
        }
    }

    pub fn with_calls<'a, I: IntoIterator<Item = &'a str>>(mut self, genes: I) -> Self {
        for gene in genes {
            self.detect(gene);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Sample column name for a tool output file.
///
/// Basename, minus a tool-specific suffix, minus one known extension, so the
/// same sample never shows up twice under different extensions.
pub fn column_name(path: &Path, strip_suffix: Option<&str>, extensions: &[String]) -> String {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    if let Some(suffix) = strip_suffix.filter(|s| !s.is_empty()) {
        name = name.replace(suffix, "");
    }

    for ext in extensions {
        let dotted = format!(".{}", ext);
        if let Some(stem) = name.strip_suffix(&dotted) {
            return stem.to_string();
        }
    }
    name
}

// ============================================================================
// PARSER TRAIT + FACTORY
// ============================================================================

/// ToolParser - reads one tool's per-sample output
pub trait ToolParser: Send + Sync {
    fn tool(&self) -> DetectionTool;

    /// Tool-specific suffix dropped from the basename when naming the column
    fn suffix(&self) -> Option<&str> {
        None
    }

    fn parse(&self, input: &ToolInput, column: &mut ToolColumn) -> Result<()>;
}

pub fn get_tool_parser(tool: DetectionTool, config: &PipelineConfig) -> Box<dyn ToolParser> {
    match tool {
        DetectionTool::Groot => Box::new(GrootParser),
        DetectionTool::Ariba => Box::new(AribaParser),
        DetectionTool::Karga => Box::new(KargaParser {
            min_coverage: config.karga_min_coverage,
        }),
        DetectionTool::Srst2 => Box::new(Srst2Parser {
            suffix: config.srst2_suffix.clone(),
        }),
        DetectionTool::ArgProfiler => Box::new(ArgProfilerParser),
    }
}

/// Run the parser for `input`, degrading any failure to an all-zero column.
///
/// Warnings (naming the file) are returned so the caller can report them.
pub fn parse_or_zero(input: &ToolInput, config: &PipelineConfig) -> (ToolColumn, Option<String>) {
    let parser = get_tool_parser(input.tool, config);
    let name = column_name(&input.path, parser.suffix(), &config.column_extensions);
    info!("Processing {} output: {}", input.tool.name(), input.path.display());

    let mut column = ToolColumn::new(name.clone());
    match parser.parse(input, &mut column) {
        Ok(()) => {
            info!("{}: {} genes detected", name, column.calls.len());
            (column, None)
        }
        Err(e) => {
            let message = match &e {
                ReconcileError::EmptySource { path } => {
                    format!("{} output {} is empty", input.tool.name(), path.display())
                }
                ReconcileError::Io { path, .. } => {
                    format!("{} output {} not found or unreadable", input.tool.name(), path.display())
                }
                other => format!("{} output unusable: {}", input.tool.name(), other),
            };
            warn!("{}; using an all-zero column", message);
            (ToolColumn::zero(name), Some(message))
        }
    }
}

// ============================================================================
// PARSERS
// ============================================================================

/// GROOT report: headerless TSV, first field is the gene
pub struct GrootParser;

impl ToolParser for GrootParser {
    fn tool(&self) -> DetectionTool {
        DetectionTool::Groot
    }

    fn parse(&self, input: &ToolInput, column: &mut ToolColumn) -> Result<()> {
        let format = TableFormat::tsv().headerless(&["Gene"]);
        let table = Table::read(&input.path, &format)?;
        for row in table.rows() {
            column.detect(Table::cell(row, 0));
        }
        Ok(())
    }
}

/// ARIBA: report TSV maps cluster → reference name, summary CSV holds calls
pub struct AribaParser;

impl AribaParser {
    /// cluster → first ref_name reported for it
    fn cluster_names(report: &Path) -> Result<HashMap<String, String>> {
        let table = Table::read(report, &TableFormat::tsv())?;
        let mut mapping = HashMap::new();
        let (Some(ref_col), Some(cluster_col)) = (table.column("ref_name"), table.column("cluster"))
        else {
            return Ok(mapping);
        };
        for row in table.rows() {
            let cluster = Table::cell(row, cluster_col);
            let ref_name = Table::cell(row, ref_col);
            if !cluster.is_empty() && !ref_name.is_empty() {
                mapping
                    .entry(cluster.to_string())
                    .or_insert_with(|| ref_name.to_string());
            }
        }
        Ok(mapping)
    }

    fn is_present(value: &str) -> bool {
        let value = value.trim();
        !(value.is_empty() || value.eq_ignore_ascii_case("no") || value == "0")
    }
}

impl ToolParser for AribaParser {
    fn tool(&self) -> DetectionTool {
        DetectionTool::Ariba
    }

    fn parse(&self, input: &ToolInput, column: &mut ToolColumn) -> Result<()> {
        let mapping = match AribaParser::cluster_names(&input.path) {
            Ok(mapping) => mapping,
            Err(e) if e.is_recoverable() => {
                warn!("ARIBA report {} unusable ({}); keeping cluster names", input.path.display(), e);
                HashMap::new()
            }
            Err(e) => return Err(e),
        };

        let summary_path = input.summary.as_deref().ok_or_else(|| {
            ReconcileError::NoInputs(format!(
                "ARIBA report {} given without a summary file",
                input.path.display()
            ))
        })?;
        let summary = Table::read(summary_path, &TableFormat::csv())?;

        let sample = input
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let row = summary
            .rows()
            .iter()
            .find(|row| {
                let name = Table::cell(row, 0);
                name == sample || Path::new(name).file_name().is_some_and(|n| n.to_string_lossy() == sample)
            })
            .ok_or_else(|| ReconcileError::NoInputs(format!(
                "sample {} not listed in ARIBA summary {}",
                sample,
                summary_path.display()
            )))?;

        let headers = summary.headers();
        let has_match_columns = headers.iter().any(|h| h.ends_with(".match"));
        for (i, header) in headers.iter().enumerate().skip(1) {
            let cluster = match header.strip_suffix(".match") {
                Some(cluster) => cluster,
                None if !has_match_columns => header.as_str(),
                None => continue,
            };
            if AribaParser::is_present(Table::cell(row, i)) {
                let gene = mapping.get(cluster).map(String::as_str).unwrap_or(cluster);
                column.detect(gene);
            }
        }
        Ok(())
    }
}

/// KARGA: CSV with `GeneIdx` and `PercentGeneCovered` (`93.5%`)
pub struct KargaParser {
    pub min_coverage: f64,
}

impl ToolParser for KargaParser {
    fn tool(&self) -> DetectionTool {
        DetectionTool::Karga
    }

    fn parse(&self, input: &ToolInput, column: &mut ToolColumn) -> Result<()> {
        let table = Table::read(&input.path, &TableFormat::csv())?;
        let gene_col = table.required_column("GeneIdx")?;
        let coverage_col = table.required_column("PercentGeneCovered")?;

        for (i, row) in table.rows().iter().enumerate() {
            let raw = Table::cell(row, coverage_col);
            let coverage = match raw.trim_end_matches('%').trim().parse::<f64>() {
                Ok(value) => value,
                Err(_) => {
                    warn!(
                        "Skipping KARGA row {} in {}: bad coverage '{}'",
                        i + 2,
                        input.path.display(),
                        raw
                    );
                    continue;
                }
            };
            if coverage >= self.min_coverage {
                column.detect(Table::cell(row, gene_col).trim_start_matches('>'));
            }
        }
        Ok(())
    }
}

/// SRST2 fullgenes report: TSV with a `gene` column
pub struct Srst2Parser {
    pub suffix: String,
}

impl ToolParser for Srst2Parser {
    fn tool(&self) -> DetectionTool {
        DetectionTool::Srst2
    }

    fn suffix(&self) -> Option<&str> {
        Some(self.suffix.as_str())
    }

    fn parse(&self, input: &ToolInput, column: &mut ToolColumn) -> Result<()> {
        let table = Table::read(&input.path, &TableFormat::tsv())?;
        let gene_col = table.required_column("gene")?;
        for row in table.rows() {
            column.detect(Table::cell(row, gene_col));
        }
        Ok(())
    }
}

/// ARGprofiler (KMA): six comment lines, then a `# refSequence` header
pub struct ArgProfilerParser;

impl ArgProfilerParser {
    pub const PREAMBLE_LINES: usize = 6;
    pub const GENE_COLUMN: &'static str = "# refSequence";
}

impl ToolParser for ArgProfilerParser {
    fn tool(&self) -> DetectionTool {
        DetectionTool::ArgProfiler
    }

    fn parse(&self, input: &ToolInput, column: &mut ToolColumn) -> Result<()> {
        let format = TableFormat::tsv().with_skip_lines(Self::PREAMBLE_LINES);
        let table = Table::read(&input.path, &format)?;
        let gene_col = table.required_column(Self::GENE_COLUMN)?;
        for row in table.rows() {
            column.detect(Table::cell(row, gene_col));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn extensions() -> Vec<String> {
        PipelineConfig::default().column_extensions
    }

    #[test]
    fn test_column_name_strips_extension() {
        let ext = extensions();
        assert_eq!(column_name(Path::new("/out/S1.tsv"), None, &ext), "S1");
        assert_eq!(column_name(Path::new("S1.csv"), None, &ext), "S1");
        assert_eq!(column_name(Path::new("S1.report.txt"), None, &ext), "S1.report");
        assert_eq!(column_name(Path::new("S1.fasta"), None, &ext), "S1.fasta");
        assert_eq!(
            column_name(
                Path::new("S1_fullgenes_sequence_results.txt"),
                Some("_fullgenes_sequence_results.txt"),
                &ext
            ),
            "S1"
        );
    }

    #[test]
    fn test_column_name_is_stable() {
        let ext = extensions();
        let a = column_name(Path::new("/runs/a/sample7.tsv"), None, &ext);
        let b = column_name(Path::new("/runs/a/sample7.tsv"), None, &ext);
        assert_eq!(a, b);
    }

    #[test]
    fn test_groot_parser() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S1.groot.tsv");
        fs::write(&path, "blaTEM-1\t10\t861\t100M\ntetA\t4\t1200\t100M\n").unwrap();

        let (column, warning) = parse_or_zero(&ToolInput::new(DetectionTool::Groot, &path), &PipelineConfig::default());
        assert!(warning.is_none());
        assert_eq!(column.name, "S1.groot");
        assert_eq!(column.calls.len(), 2);
        assert_eq!(column.calls.get("blaTEM-1"), Some(&1));
    }

    #[test]
    fn test_empty_file_gives_zero_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S2.tsv");
        fs::write(&path, "").unwrap();

        let (column, warning) = parse_or_zero(&ToolInput::new(DetectionTool::Groot, &path), &PipelineConfig::default());
        assert_eq!(column.name, "S2");
        assert!(column.is_empty());
        assert!(warning.unwrap().contains("S2.tsv"));
    }

    #[test]
    fn test_missing_file_gives_zero_column() {
        let input = ToolInput::new(DetectionTool::Srst2, "/nonexistent/S3_fullgenes_sequence_results.txt");
        let (column, warning) = parse_or_zero(&input, &PipelineConfig::default());
        assert_eq!(column.name, "S3");
        assert!(column.is_empty());
        assert!(warning.is_some());
    }

    #[test]
    fn test_karga_threshold_and_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S4.csv");
        fs::write(
            &path,
            "GeneIdx,PercentGeneCovered,AverageKMerDepth\n\
             >blaTEM-1,95.5%,10\n\
             >tetA,79.9%,3\n\
             >sul1,80%,4\n\
             >broken,n/a,1\n",
        )
        .unwrap();

        let (column, warning) = parse_or_zero(&ToolInput::new(DetectionTool::Karga, &path), &PipelineConfig::default());
        assert!(warning.is_none());
        let genes: Vec<&str> = column.calls.keys().map(String::as_str).collect();
        assert_eq!(genes, vec!["blaTEM-1", "sul1"]);
    }

    #[test]
    fn test_karga_missing_column_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S5.csv");
        fs::write(&path, "Gene,Coverage\nblaTEM,99%\n").unwrap();

        let (column, warning) = parse_or_zero(&ToolInput::new(DetectionTool::Karga, &path), &PipelineConfig::default());
        assert!(column.is_empty());
        assert!(warning.unwrap().contains("GeneIdx"));
    }

    #[test]
    fn test_srst2_parser() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S6_fullgenes_sequence_results.txt");
        fs::write(&path, "Sample\tDB\tgene\tallele\nS6\tARG\tblaOXA-48\tOXA-48\nS6\tARG\tsul2\tsul2\n").unwrap();

        let (column, _) = parse_or_zero(&ToolInput::new(DetectionTool::Srst2, &path), &PipelineConfig::default());
        assert_eq!(column.name, "S6");
        assert_eq!(column.calls.len(), 2);
    }

    #[test]
    fn test_argprofiler_parser() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S7.txt");
        let text = "## line1\n## line2\n## line3\n## line4\n## line5\n## line6\n\
                    # refSequence\tScore\tExpected\n\
                    blaCTX-M-15\t900\t1\n\
                    qnrS1\t400\t2\n";
        fs::write(&path, text).unwrap();

        let (column, warning) = parse_or_zero(&ToolInput::new(DetectionTool::ArgProfiler, &path), &PipelineConfig::default());
        assert!(warning.is_none());
        assert_eq!(column.name, "S7");
        assert!(column.calls.contains_key("blaCTX-M-15"));
        assert!(column.calls.contains_key("qnrS1"));
    }

    #[test]
    fn test_ariba_report_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("S8.tsv");
        let summary = dir.path().join("summary.csv");
        fs::write(
            &report,
            "#ariba_ref_name\tref_name\tcluster\n\
             blaTEM-1.3000873\tblaTEM-1.3000873\tblaTEM\n\
             blaTEM-2.3000874\tblaTEM-2.3000874\tblaTEM\n",
        )
        .unwrap();
        fs::write(
            &summary,
            "name,blaTEM.match,tetA.match,sul1.match\n\
             other.tsv,no,yes,no\n\
             /runs/S8.tsv,yes,no,yes_nonunique\n",
        )
        .unwrap();

        let input = ToolInput::new(DetectionTool::Ariba, &report).with_summary(&summary);
        let (column, warning) = parse_or_zero(&input, &PipelineConfig::default());
        assert!(warning.is_none());
        assert_eq!(column.name, "S8");
        let genes: Vec<&str> = column.calls.keys().map(String::as_str).collect();
        assert_eq!(genes, vec!["blaTEM-1.3000873", "sul1"]);
    }

    #[test]
    fn test_ariba_without_summary_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("S9.tsv");
        fs::write(&report, "ref_name\tcluster\nx\ty\n").unwrap();

        let (column, warning) = parse_or_zero(&ToolInput::new(DetectionTool::Ariba, &report), &PipelineConfig::default());
        assert!(column.is_empty());
        assert!(warning.is_some());
    }
}
