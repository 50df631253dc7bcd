// 🧮 Multi-Tool Result Aggregator
// Outer-joins per-sample tool columns into one gene × sample presence matrix.
//
// Rows = union of every column's genes, cells a column did not report = 0.
// Optional enrichment inner-joins the matrix with a gene metadata table: genes
// the metadata does not know are dropped on purpose, and the count of dropped
// genes is returned so it never goes unnoticed.

use crate::error::{ReconcileError, Result};
use crate::records::COL_GENE_NAME;
use crate::table::Table;
use crate::tools::ToolColumn;
use csv::WriterBuilder;
use log::{info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const GENE_COLUMN: &str = "Gene";

/// ToolCallMatrix - gene → one 0/1 indicator per sample column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCallMatrix {
    columns: Vec<String>,
    rows: BTreeMap<String, Vec<u8>>,
    metadata_columns: Vec<String>,
    metadata: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnrichmentOutcome {
    pub matched: usize,
    /// Genes removed because the metadata table has no row for them
    pub dropped: usize,
}

impl ToolCallMatrix {
    /// Full outer union of `columns`, in the order given.
    pub fn combine(columns: Vec<ToolColumn>) -> Result<Self> {
        if columns.is_empty() {
            return Err(ReconcileError::NoInputs(
                "no tool results to combine".to_string(),
            ));
        }

        let width = columns.len();
        let mut names = Vec::with_capacity(width);
        let mut seen = HashSet::new();
        let mut rows: BTreeMap<String, Vec<u8>> = BTreeMap::new();

        for (i, column) in columns.into_iter().enumerate() {
            if !seen.insert(column.name.clone()) {
                warn!(
                    "Column name '{}' appears more than once; both columns are kept",
                    column.name
                );
            }
            for (gene, indicator) in column.calls {
                let cells = rows.entry(gene).or_insert_with(|| vec![0; width]);
                cells[i] = u8::from(indicator > 0);
            }
            names.push(column.name);
        }

        info!(
            "Combined {} columns into {} genes",
            names.len(),
            rows.len()
        );

        Ok(ToolCallMatrix {
            columns: names,
            rows,
            metadata_columns: Vec::new(),
            metadata: HashMap::new(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn metadata_columns(&self) -> &[String] {
        &self.metadata_columns
    }

    pub fn genes(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, gene: &str) -> Option<&[u8]> {
        self.rows.get(gene).map(Vec::as_slice)
    }

    /// Indicator for (gene, column); 0 for any gene the matrix holds but the
    /// column did not report, None only for unknown genes/columns
    pub fn get(&self, gene: &str, column: &str) -> Option<u8> {
        let i = self.columns.iter().position(|c| c == column)?;
        self.rows.get(gene).map(|cells| cells[i])
    }

    /// Inner-join with a gene metadata table keyed by `userGeneName`.
    ///
    /// Fails with MalformedInput (matrix untouched) when that column is absent.
    /// For genes listed twice the first metadata row wins.
    pub fn enrich(&mut self, metadata: &Table) -> Result<EnrichmentOutcome> {
        let key_col = metadata.required_column(COL_GENE_NAME)?;

        let mut by_gene: HashMap<String, Vec<String>> = HashMap::new();
        for row in metadata.rows() {
            let gene = Table::cell(row, key_col);
            if gene.is_empty() || by_gene.contains_key(gene) {
                continue;
            }
            let values = (0..metadata.headers().len())
                .filter(|&c| c != key_col)
                .map(|c| Table::cell(row, c).to_string())
                .collect();
            by_gene.insert(gene.to_string(), values);
        }

        let before = self.rows.len();
        self.rows.retain(|gene, _| by_gene.contains_key(gene));
        by_gene.retain(|gene, _| self.rows.contains_key(gene));

        self.metadata_columns = metadata
            .headers()
            .iter()
            .enumerate()
            .filter(|(c, _)| *c != key_col)
            .map(|(_, h)| h.clone())
            .collect();
        self.metadata = by_gene;

        let outcome = EnrichmentOutcome {
            matched: self.rows.len(),
            dropped: before - self.rows.len(),
        };
        info!(
            "Metadata join kept {} genes, dropped {} without metadata",
            outcome.matched, outcome.dropped
        );
        Ok(outcome)
    }

    /// Tab-delimited: `Gene`, sample columns, then metadata columns; no index
    pub fn write_tsv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut out = WriterBuilder::new().delimiter(b'\t').from_writer(writer);

        let mut header = Vec::with_capacity(1 + self.columns.len() + self.metadata_columns.len());
        header.push(GENE_COLUMN);
        header.extend(self.columns.iter().map(String::as_str));
        header.extend(self.metadata_columns.iter().map(String::as_str));
        out.write_record(&header)?;

        for (gene, cells) in &self.rows {
            let mut record = Vec::with_capacity(header.len());
            record.push(gene.clone());
            record.extend(cells.iter().map(|v| v.to_string()));
            if let Some(values) = self.metadata.get(gene) {
                record.extend(values.iter().cloned());
            }
            out.write_record(&record)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| ReconcileError::io(path, e))?;
        self.write_tsv(file).map_err(|e| ReconcileError::Csv {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableFormat;

    fn col(name: &str, genes: &[&str]) -> ToolColumn {
        ToolColumn::new(name).with_calls(genes.iter().copied())
    }

    fn scenario() -> ToolCallMatrix {
        ToolCallMatrix::combine(vec![
            col("Tool1", &["geneA"]),
            ToolColumn::zero("Tool2"),
            col("Tool3", &["geneB", "geneA"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_combine_scenario() {
        let m = scenario();
        assert_eq!(m.columns(), &["Tool1", "Tool2", "Tool3"]);
        assert_eq!(m.row("geneA"), Some(&[1, 0, 1][..]));
        assert_eq!(m.row("geneB"), Some(&[0, 0, 1][..]));
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_union_completeness_and_zero_fill() {
        let inputs = vec![
            col("S1", &["a", "b"]),
            col("S2", &["c"]),
            col("S3", &["b", "d"]),
        ];
        let expected: std::collections::BTreeSet<String> = inputs
            .iter()
            .flat_map(|c| c.calls.keys().cloned())
            .collect();
        let m = ToolCallMatrix::combine(inputs).unwrap();

        let genes: std::collections::BTreeSet<String> = m.genes().map(str::to_string).collect();
        assert_eq!(genes, expected);
        assert_eq!(m.get("c", "S1"), Some(0));
        assert_eq!(m.get("c", "S2"), Some(1));
        assert_eq!(m.get("d", "S2"), Some(0));
        assert_eq!(m.get("zzz", "S1"), None);
    }

    #[test]
    fn test_combine_nothing_is_fatal() {
        assert!(matches!(
            ToolCallMatrix::combine(vec![]),
            Err(ReconcileError::NoInputs(_))
        ));
    }

    #[test]
    fn test_all_zero_columns_still_present() {
        let m = ToolCallMatrix::combine(vec![ToolColumn::zero("S1"), ToolColumn::zero("S2")]).unwrap();
        assert_eq!(m.columns().len(), 2);
        assert!(m.is_empty());
    }

    #[test]
    fn test_write_tsv() {
        let mut buf = Vec::new();
        scenario().write_tsv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "Gene\tTool1\tTool2\tTool3\ngeneA\t1\t0\t1\ngeneB\t0\t0\t1\n"
        );
    }

    #[test]
    fn test_enrich_inner_join() {
        let meta = Table::from_reader(
            "userGeneName\tgene_len\tsubtype\ngeneA\t861\tAMR\ngeneA\t999\tDUP\ngeneZ\t100\tMETAL\n".as_bytes(),
            Path::new("meta.tsv"),
            &TableFormat::tsv(),
        )
        .unwrap();

        let mut m = scenario();
        let outcome = m.enrich(&meta).unwrap();
        assert_eq!(outcome, EnrichmentOutcome { matched: 1, dropped: 1 });
        assert_eq!(m.metadata_columns(), &["gene_len", "subtype"]);

        let mut buf = Vec::new();
        m.write_tsv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "Gene\tTool1\tTool2\tTool3\tgene_len\tsubtype\ngeneA\t1\t0\t1\t861\tAMR\n"
        );
    }

    #[test]
    fn test_enrich_with_header_only_metadata_drops_everything() {
        let meta = Table::from_reader(
            "userGeneName\tsubtype\n".as_bytes(),
            Path::new("meta.tsv"),
            &TableFormat::tsv().allowing_empty(),
        )
        .unwrap();

        let mut m = scenario();
        let outcome = m.enrich(&meta).unwrap();
        assert_eq!(outcome, EnrichmentOutcome { matched: 0, dropped: 2 });
        assert!(m.is_empty());
        assert_eq!(m.metadata_columns(), &["subtype"]);
    }

    #[test]
    fn test_enrich_without_key_column_leaves_matrix() {
        let meta = Table::from_reader(
            "Gene\tsubtype\ngeneA\tAMR\n".as_bytes(),
            Path::new("meta.tsv"),
            &TableFormat::tsv(),
        )
        .unwrap();
        let mut m = scenario();
        let before = m.clone();
        assert!(matches!(
            m.enrich(&meta),
            Err(ReconcileError::MalformedInput { .. })
        ));
        assert_eq!(m, before);
    }
}
