// 🗂️ Sequence records - one row per reference sequence
// Loads the sequence table and attaches a canonical id to every row.

use crate::error::Result;
use crate::normalizer::{IdentifierRegistry, SourceDatabase};
use crate::table::{Table, TableFormat};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const COL_HEADER: &str = "fa_header";
pub const COL_DATABASE: &str = "database";
pub const COL_GENE_NAME: &str = "userGeneName";
pub const COL_LENGTH: &str = "gene_len";
pub const COL_SHORT_NAME: &str = "shortname";

/// GeneRecord - a reference sequence with its resolved cross-database key
///
/// Immutable once normalized; the merge stage works on a MergedRecord copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneRecord {
    pub sequence_header: String,
    pub source_database: SourceDatabase,
    pub raw_id: String,

    /// None = identifier extraction failed (unresolved, never dropped)
    pub canonical_id: Option<String>,

    /// Externally visible gene label used for grouping
    pub user_gene_name: String,
    pub short_name: Option<String>,
    pub length: Option<u64>,
}

impl GeneRecord {
    /// Build a record and run identifier extraction on it
    pub fn new(
        sequence_header: String,
        source_database: SourceDatabase,
        user_gene_name: String,
        registry: &IdentifierRegistry,
    ) -> Self {
        let canonical_id = registry.normalize(&sequence_header, &source_database);
        GeneRecord {
            raw_id: sequence_header.clone(),
            sequence_header,
            source_database,
            canonical_id,
            user_gene_name,
            short_name: None,
            length: None,
        }
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_short_name(mut self, short_name: String) -> Self {
        self.short_name = Some(short_name);
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.canonical_id.is_some()
    }
}

/// Load the tab-delimited sequence table.
///
/// `fa_header`, `database` and `userGeneName` are required; `gene_len` and
/// `shortname` are picked up when present.
pub fn load_gene_records(path: &Path, registry: &IdentifierRegistry) -> Result<Vec<GeneRecord>> {
    let table = Table::read(path, &TableFormat::tsv())?;
    records_from_table(&table, registry)
}

pub fn records_from_table(table: &Table, registry: &IdentifierRegistry) -> Result<Vec<GeneRecord>> {
    let header_col = table.required_column(COL_HEADER)?;
    let database_col = table.required_column(COL_DATABASE)?;
    let gene_col = table.required_column(COL_GENE_NAME)?;
    let length_col = table.column(COL_LENGTH);
    let short_col = table.column(COL_SHORT_NAME);

    let mut records = Vec::with_capacity(table.len());
    let mut unresolved = 0;

    for (i, row) in table.rows().iter().enumerate() {
        let header = Table::cell(row, header_col).to_string();
        let source = SourceDatabase::from_tag(Table::cell(row, database_col));
        let gene = Table::cell(row, gene_col).to_string();

        let mut record = GeneRecord::new(header, source, gene, registry);

        if let Some(len) = Table::value(row, length_col) {
            match len.parse::<u64>() {
                Ok(n) => record = record.with_length(n),
                Err(_) => warn!(
                    "Non-numeric {} '{}' at row {} of {}",
                    COL_LENGTH,
                    len,
                    i + 2,
                    table.path().display()
                ),
            }
        }
        if let Some(short) = Table::value(row, short_col) {
            record = record.with_short_name(short.to_string());
        }

        if !record.is_resolved() {
            unresolved += 1;
            debug!(
                "Unresolved identifier for {} header '{}'",
                record.source_database.name(),
                record.sequence_header
            );
        }

        records.push(record);
    }

    info!(
        "Loaded {} sequence records from {} ({} unresolved)",
        records.len(),
        table.path().display(),
        unresolved
    );

    Ok(records)
}

/// Number of records whose canonical id could not be extracted
pub fn count_unresolved(records: &[GeneRecord]) -> usize {
    records.iter().filter(|r| !r.is_resolved()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;

    fn table(text: &str) -> Table {
        Table::from_reader(text.as_bytes(), Path::new("seqs.tsv"), &TableFormat::tsv()).unwrap()
    }

    #[test]
    fn test_records_from_table() {
        let t = table(
            "fa_header\tdatabase\tuserGeneName\tgene_len\tshortname\n\
             blaTEM-1_WP_000027057.1_1_861\tAMRFinderPlus_cds\tblaTEM-1\t861\tTEM\n\
             gb|X|ARO_3000873|TEM-1\tcard_cds\tblaTEM-1\t861\t\n",
        );
        let registry = IdentifierRegistry::with_defaults().unwrap();
        let records = records_from_table(&t, &registry).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].canonical_id.as_deref(), Some("WP_000027057.1"));
        assert_eq!(records[0].length, Some(861));
        assert_eq!(records[0].short_name.as_deref(), Some("TEM"));
        assert_eq!(records[1].canonical_id.as_deref(), Some("ARO:3000873"));
        assert_eq!(records[1].short_name, None);
        assert_eq!(records[1].raw_id, records[1].sequence_header);
    }

    #[test]
    fn test_unresolved_record_is_kept() {
        let t = table("fa_header\tdatabase\tuserGeneName\nno_pattern_here\tcard_cds\tfoo\n");
        let registry = IdentifierRegistry::with_defaults().unwrap();
        let records = records_from_table(&t, &registry).unwrap();

        assert_eq!(records.len(), 1);
        assert!(!records[0].is_resolved());
        assert_eq!(count_unresolved(&records), 1);
    }

    #[test]
    fn test_missing_required_column() {
        let t = table("fa_header\tuserGeneName\nx\ty\n");
        let registry = IdentifierRegistry::empty();
        match records_from_table(&t, &registry) {
            Err(ReconcileError::MalformedInput { column, .. }) => assert_eq!(column, "database"),
            other => panic!("expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_length_is_ignored() {
        let t = table("fa_header\tdatabase\tuserGeneName\tgene_len\nx_1\tother\tg\tabc\n");
        let records = records_from_table(&t, &IdentifierRegistry::empty()).unwrap();
        assert_eq!(records[0].length, None);
    }
}
