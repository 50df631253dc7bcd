// 📊 Gene Summary Aggregator
// Collapses merged per-sequence records into one row per userGeneName.
// Multi-valued columns are deduplicated and sorted, so the output does not
// depend on input order.

use crate::error::{ReconcileError, Result};
use crate::merge::MergedRecord;
use csv::WriterBuilder;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;

/// GeneSummary - one row of the gene annotation table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneSummary {
    #[serde(rename = "userGeneName")]
    pub user_gene_name: String,

    /// First length encountered in input order
    #[serde(rename = "gene_len")]
    pub length: Option<u64>,

    #[serde(rename = "shortname")]
    pub short_names: String,

    #[serde(rename = "database")]
    pub databases: String,

    #[serde(rename = "entry_count")]
    pub entry_count: usize,

    #[serde(rename = "id")]
    pub canonical_ids: String,

    #[serde(rename = "allele")]
    pub alleles: String,

    #[serde(rename = "gene_family")]
    pub gene_families: String,

    #[serde(rename = "subtype")]
    pub subtypes: String,

    #[serde(rename = "class")]
    pub classes: String,
}

/// Sorted, distinct, comma-joined set of the non-empty values
pub fn join_distinct<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(",")
}

/// Like `join_distinct`, but values that are themselves comma lists are
/// split first, so no token can repeat.
pub fn join_distinct_tokens<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    join_distinct(values.into_iter().flat_map(|v| v.split(',')))
}

#[derive(Default)]
struct GroupAccumulator<'a> {
    length: Option<u64>,
    entry_count: usize,
    short_names: Vec<&'a str>,
    databases: Vec<&'a str>,
    canonical_ids: Vec<&'a str>,
    alleles: Vec<&'a str>,
    gene_families: Vec<&'a str>,
    subtypes: Vec<String>,
    classes: Vec<&'a str>,
}

impl<'a> GroupAccumulator<'a> {
    fn add(&mut self, merged: &'a MergedRecord) {
        let record = &merged.record;
        let annotation = &merged.annotation;

        self.entry_count += 1;
        if self.length.is_none() {
            self.length = record.length;
        }
        self.databases.push(record.source_database.tag());
        self.short_names.extend(record.short_name.as_deref());
        self.canonical_ids.extend(merged.canonical_id.as_deref());
        self.alleles.extend(annotation.allele.as_deref());
        self.gene_families.extend(annotation.gene_family.as_deref());
        self.classes.extend(annotation.resistance_class.as_deref());
        self.subtypes
            .extend(annotation.subtype.as_deref().map(str::to_uppercase));
    }

    fn finish(self, user_gene_name: String) -> GeneSummary {
        GeneSummary {
            user_gene_name,
            length: self.length,
            short_names: join_distinct(self.short_names),
            databases: join_distinct(self.databases),
            entry_count: self.entry_count,
            canonical_ids: join_distinct(self.canonical_ids),
            alleles: join_distinct(self.alleles),
            gene_families: join_distinct(self.gene_families),
            subtypes: join_distinct_tokens(self.subtypes.iter().map(String::as_str)),
            classes: join_distinct(self.classes),
        }
    }
}

/// One GeneSummary per distinct userGeneName, sorted by name
pub fn aggregate(records: &[MergedRecord]) -> Vec<GeneSummary> {
    let mut groups: BTreeMap<&str, GroupAccumulator> = BTreeMap::new();
    for merged in records {
        groups
            .entry(merged.record.user_gene_name.as_str())
            .or_default()
            .add(merged);
    }

    let summaries: Vec<GeneSummary> = groups
        .into_iter()
        .map(|(name, group)| group.finish(name.to_string()))
        .collect();

    info!(
        "Aggregated {} records into {} gene summaries",
        records.len(),
        summaries.len()
    );
    summaries
}

/// Write the gene annotation table (tab-delimited, header row)
pub fn write_summaries(path: &Path, summaries: &[GeneSummary]) -> Result<()> {
    let file = File::create(path).map_err(|e| ReconcileError::io(path, e))?;
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(file);
    let csv_err = |e| ReconcileError::Csv {
        path: path.to_path_buf(),
        source: e,
    };

    if summaries.is_empty() {
        writer
            .write_record(SUMMARY_COLUMNS)
            .map_err(csv_err)?;
    }
    for summary in summaries {
        writer.serialize(summary).map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| ReconcileError::io(path, e))?;
    Ok(())
}

pub const SUMMARY_COLUMNS: [&str; 10] = [
    "userGeneName",
    "gene_len",
    "shortname",
    "database",
    "entry_count",
    "id",
    "allele",
    "gene_family",
    "subtype",
    "class",
];
