// 📚 Reference annotation tables
// One loader per curated catalog. Each reads its native format and hands back
// a ReferenceTable: annotation rows plus a hash index on the join key.
//
// Loaders follow the same shape as the record parsers: a minimal trait,
// one struct per catalog, and a factory keyed by ReferenceSource.

use crate::error::{ReconcileError, Result};
use crate::table::{Table, TableFormat};
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

// ============================================================================
// ANNOTATION
// ============================================================================

/// The four fields the merge resolves
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub allele: Option<String>,
    pub gene_family: Option<String>,
    pub resistance_class: Option<String>,
    pub subtype: Option<String>,
}

/// Store `candidate` only if `target` holds nothing yet.
///
/// Empty and whitespace-only strings count as nothing on both sides.
pub fn fill_if_empty(target: &mut Option<String>, candidate: Option<&str>) {
    let has_value = target.as_deref().is_some_and(|v| !v.trim().is_empty());
    if has_value {
        return;
    }
    if let Some(value) = candidate.map(str::trim).filter(|v| !v.is_empty()) {
        *target = Some(value.to_string());
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Annotation {
    pub fn new() -> Self {
        Annotation::default()
    }

    pub fn with_allele(mut self, allele: Option<&str>) -> Self {
        self.allele = owned(allele);
        self
    }

    pub fn with_gene_family(mut self, gene_family: Option<&str>) -> Self {
        self.gene_family = owned(gene_family);
        self
    }

    pub fn with_class(mut self, class: Option<&str>) -> Self {
        self.resistance_class = owned(class);
        self
    }

    pub fn with_subtype(mut self, subtype: Option<&str>) -> Self {
        self.subtype = owned(subtype);
        self
    }

    /// First-non-empty-wins over every field
    pub fn fill_from(&mut self, other: &Annotation) {
        fill_if_empty(&mut self.allele, other.allele.as_deref());
        fill_if_empty(&mut self.gene_family, other.gene_family.as_deref());
        fill_if_empty(&mut self.resistance_class, other.resistance_class.as_deref());
        fill_if_empty(&mut self.subtype, other.subtype.as_deref());
    }

    pub fn is_empty(&self) -> bool {
        self.allele.is_none()
            && self.gene_family.is_none()
            && self.resistance_class.is_none()
            && self.subtype.is_none()
    }
}

// ============================================================================
// REFERENCE TABLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceSource {
    AmrFinderPlus,
    Card,
    Megares,
    ResFinder,
}

impl ReferenceSource {
    /// Curation-authority order used by the standard merge
    pub const PRIORITY: [ReferenceSource; 4] = [
        ReferenceSource::AmrFinderPlus,
        ReferenceSource::Card,
        ReferenceSource::Megares,
        ReferenceSource::ResFinder,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ReferenceSource::AmrFinderPlus => "AMRFinderPlus",
            ReferenceSource::Card => "CARD",
            ReferenceSource::Megares => "MEGARes",
            ReferenceSource::ResFinder => "ResFinder",
        }
    }

    /// File name shipped by each catalog
    pub fn default_file(&self) -> &'static str {
        match self {
            ReferenceSource::AmrFinderPlus => "ReferenceGeneCatalog.txt",
            ReferenceSource::Card => "aro_index.tsv",
            ReferenceSource::Megares => "megares_annotations_v3.00.csv",
            ReferenceSource::ResFinder => "notes.txt",
        }
    }

    /// Which record attribute this catalog is joined on
    pub fn record_key(&self) -> RecordKey {
        match self {
            ReferenceSource::ResFinder => RecordKey::AlleleSymbol,
            _ => RecordKey::CanonicalId,
        }
    }
}

/// Record-side attribute compared against a table's join key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKey {
    CanonicalId,
    /// Sanitised allele name derived by the ResFinder override
    AlleleSymbol,
}

/// ReferenceAnnotation - one curated catalog row
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceAnnotation {
    pub key: String,
    pub annotation: Annotation,
}

#[derive(Debug, Clone)]
pub struct ReferenceTable {
    source: ReferenceSource,
    rows: Vec<ReferenceAnnotation>,
    /// key → index of the FIRST row carrying it
    index: HashMap<String, usize>,
}

impl ReferenceTable {
    pub fn from_rows(source: ReferenceSource, rows: Vec<ReferenceAnnotation>) -> Self {
        let mut index = HashMap::with_capacity(rows.len());
        let mut duplicates = 0;
        for (i, row) in rows.iter().enumerate() {
            if row.key.is_empty() {
                continue;
            }
            if index.contains_key(&row.key) {
                duplicates += 1;
            } else {
                index.insert(row.key.clone(), i);
            }
        }
        if duplicates > 0 {
            debug!(
                "{}: {} duplicate join keys, keeping first occurrence",
                source.name(),
                duplicates
            );
        }
        ReferenceTable {
            source,
            rows,
            index,
        }
    }

    pub fn source(&self) -> ReferenceSource {
        self.source
    }

    pub fn record_key(&self) -> RecordKey {
        self.source.record_key()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn lookup(&self, key: &str) -> Option<&ReferenceAnnotation> {
        self.index.get(key).map(|&i| &self.rows[i])
    }
}

// ============================================================================
// LOADERS
// ============================================================================

/// ReferenceLoader - reads one catalog's native file
pub trait ReferenceLoader: Send + Sync {
    fn source(&self) -> ReferenceSource;

    fn format(&self) -> TableFormat;

    fn build(&self, table: &Table) -> Result<Vec<ReferenceAnnotation>>;

    fn load(&self, path: &Path) -> Result<ReferenceTable> {
        let table = Table::read(path, &self.format())?;
        let rows = self.build(&table)?;
        info!(
            "Loaded {} {} annotations from {}",
            rows.len(),
            self.source().name(),
            path.display()
        );
        Ok(ReferenceTable::from_rows(self.source(), rows))
    }
}

pub fn get_loader(source: ReferenceSource) -> Result<Box<dyn ReferenceLoader>> {
    let loader: Box<dyn ReferenceLoader> = match source {
        ReferenceSource::AmrFinderPlus => Box::new(AmrFinderPlusCatalog),
        ReferenceSource::Card => Box::new(CardIndex),
        ReferenceSource::Megares => Box::new(MegaresAnnotations::new()?),
        ReferenceSource::ResFinder => Box::new(ResFinderNotes),
    };
    Ok(loader)
}

/// NCBI ReferenceGeneCatalog.txt
pub struct AmrFinderPlusCatalog;

impl ReferenceLoader for AmrFinderPlusCatalog {
    fn source(&self) -> ReferenceSource {
        ReferenceSource::AmrFinderPlus
    }

    fn format(&self) -> TableFormat {
        TableFormat::tsv()
    }

    fn build(&self, table: &Table) -> Result<Vec<ReferenceAnnotation>> {
        let refseq = table.required_column("refseq_protein_accession")?;
        let genbank = table.required_column("genbank_protein_accession")?;
        let allele = table.required_column("allele")?;
        let family = table.required_column("gene_family")?;
        let subtype = table.required_column("subtype")?;
        let class = table.required_column("class")?;

        Ok(table
            .rows()
            .iter()
            .map(|row| {
                let key = Table::value(row, Some(refseq))
                    .or_else(|| Table::value(row, Some(genbank)))
                    .unwrap_or("")
                    .to_string();
                let gene_family = Table::value(row, Some(family));
                let allele = Table::value(row, Some(allele)).or(gene_family);
                ReferenceAnnotation {
                    key,
                    annotation: Annotation::new()
                        .with_allele(allele)
                        .with_gene_family(gene_family)
                        .with_class(Table::value(row, Some(class)))
                        .with_subtype(Table::value(row, Some(subtype))),
                }
            })
            .collect())
    }
}

/// CARD aro_index.tsv
pub struct CardIndex;

impl ReferenceLoader for CardIndex {
    fn source(&self) -> ReferenceSource {
        ReferenceSource::Card
    }

    fn format(&self) -> TableFormat {
        TableFormat::tsv()
    }

    fn build(&self, table: &Table) -> Result<Vec<ReferenceAnnotation>> {
        let accession = table.required_column("ARO Accession")?;
        let family = table.required_column("AMR Gene Family")?;
        let short_name = table.required_column("CARD Short Name")?;
        let drug_class = table.required_column("Drug Class")?;

        Ok(table
            .rows()
            .iter()
            .map(|row| ReferenceAnnotation {
                key: Table::cell(row, accession).to_string(),
                annotation: Annotation::new()
                    .with_allele(Table::value(row, Some(short_name)))
                    .with_gene_family(Table::value(row, Some(family)))
                    .with_class(Table::value(row, Some(drug_class)))
                    // everything in CARD is antimicrobial resistance
                    .with_subtype(Some("AMR")),
            })
            .collect())
    }
}

/// MEGARes annotation CSV
pub struct MegaresAnnotations {
    accession: Regex,
}

impl MegaresAnnotations {
    pub fn new() -> Result<Self> {
        let accession = Regex::new(r"MEG_\d+")
            .map_err(|e| ReconcileError::InvalidConfig(e.to_string()))?;
        Ok(MegaresAnnotations { accession })
    }

    /// MEGARes `type` → subtype vocabulary shared with the other catalogs
    pub fn normalize_type(raw_type: &str, class: &str) -> String {
        let base = if raw_type == "Multi-compound" {
            class
        } else {
            raw_type
        };
        base.replace(" resistance", "")
            .replace(" and ", ",")
            .replace("Drugs", "AMR")
            .replace("Drug", "AMR")
            .replace("Biocides", "Biocide")
            .replace("Metals", "Metal")
    }
}

impl ReferenceLoader for MegaresAnnotations {
    fn source(&self) -> ReferenceSource {
        ReferenceSource::Megares
    }

    fn format(&self) -> TableFormat {
        TableFormat::csv()
    }

    fn build(&self, table: &Table) -> Result<Vec<ReferenceAnnotation>> {
        let header = table.required_column("header")?;
        let kind = table.required_column("type")?;
        let class = table.required_column("class")?;
        let group = table.required_column("group")?;

        Ok(table
            .rows()
            .iter()
            .filter_map(|row| {
                // rows without an accession can never match
                let key = self.accession.find(Table::cell(row, header))?.as_str().to_string();
                let class_value = Table::cell(row, class);
                let subtype = MegaresAnnotations::normalize_type(Table::cell(row, kind), class_value);
                Some(ReferenceAnnotation {
                    key,
                    annotation: Annotation::new()
                        .with_gene_family(Table::value(row, Some(group)))
                        .with_class(Some(class_value))
                        .with_subtype(Some(&subtype)),
                })
            })
            .collect())
    }
}

/// ResFinder notes.txt (`allele:class:...`, `#` comments, no header)
pub struct ResFinderNotes;

impl ResFinderNotes {
    /// Join key: every non-alphanumeric character becomes `_`
    pub fn gene_symbol(allele: &str) -> String {
        allele
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

impl ReferenceLoader for ResFinderNotes {
    fn source(&self) -> ReferenceSource {
        ReferenceSource::ResFinder
    }

    fn format(&self) -> TableFormat {
        TableFormat::tsv()
            .with_delimiter(b':')
            .with_comment(b'#')
            .headerless(&["Gene allele", "class"])
    }

    fn build(&self, table: &Table) -> Result<Vec<ReferenceAnnotation>> {
        let allele = table.required_column("Gene allele")?;
        let class = table.required_column("class")?;

        Ok(table
            .rows()
            .iter()
            .filter_map(|row| {
                let allele = Table::value(row, Some(allele))?;
                let class = Table::cell(row, class).replace("resistance", "");
                Some(ReferenceAnnotation {
                    key: ResFinderNotes::gene_symbol(allele),
                    annotation: Annotation::new()
                        .with_allele(Some(allele))
                        .with_class(Some(&class)),
                })
            })
            .collect())
    }
}
