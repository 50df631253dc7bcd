// 🏷️ Per-database override rules
// Some catalogs carry no usable annotation table, so their records get fields
// derived from the FASTA header itself. Overrides FORCE values (they replace
// whatever the earlier joins filled) and only fire for their own database.

use crate::merge::MergedRecord;
use crate::normalizer::{is_all_digits, SourceDatabase};
use std::collections::HashMap;

/// RecordOverride - rewrite a merged record of one source database
pub trait RecordOverride: Send + Sync {
    fn source(&self) -> SourceDatabase;

    fn apply(&self, record: &mut MergedRecord);
}

/// ARG-ANNOT: `(Class)_Class_family_number-or-accession_...`
pub struct ArgAnnotOverride;

impl RecordOverride for ArgAnnotOverride {
    fn source(&self) -> SourceDatabase {
        SourceDatabase::ArgAnnot
    }

    fn apply(&self, record: &mut MergedRecord) {
        record.annotation.subtype = Some("AMR".to_string());

        let rest: Vec<&str> = record.record.sequence_header.split('_').skip(1).collect();
        let Some(family) = rest.get(1).filter(|f| !f.is_empty()) else {
            return;
        };

        // a numeric third token is part of the allele name (e.g. OXA_48)
        let allele = match rest.get(2) {
            Some(next) if is_all_digits(next) => format!("{}_{}", family, next),
            _ => family.to_string(),
        };
        record.annotation.allele = Some(allele);
        record.annotation.gene_family = Some(family.to_string());
    }
}

/// Metal resistance genes: `geneName_..._accession`
pub struct MetalResistanceOverride;

impl RecordOverride for MetalResistanceOverride {
    fn source(&self) -> SourceDatabase {
        SourceDatabase::MetalResistance
    }

    fn apply(&self, record: &mut MergedRecord) {
        record.annotation.subtype = Some("Metal".to_string());

        let mut tokens = record.record.sequence_header.split('_');
        let Some(name) = tokens.next().filter(|n| !n.is_empty()) else {
            return;
        };
        if let Some(accession) = tokens.last().filter(|a| !a.is_empty()) {
            record.canonical_id = Some(accession.to_string());
        }
        record.annotation.allele = Some(name.to_string());
        record.annotation.gene_family = Some(name.to_string());
    }
}

/// ResFinder: `allele_variant_accession`; the allele symbol keys the notes join
pub struct ResFinderOverride;

impl RecordOverride for ResFinderOverride {
    fn source(&self) -> SourceDatabase {
        SourceDatabase::ResFinder
    }

    fn apply(&self, record: &mut MergedRecord) {
        record.annotation.subtype = Some("AMR".to_string());

        let tokens: Vec<&str> = record.record.sequence_header.split('_').collect();
        if tokens.len() > 2 {
            record.allele_symbol = Some(tokens[..tokens.len() - 2].join("_"));
        }
        if let Some(family) = tokens.first().filter(|f| !f.is_empty()) {
            record.annotation.gene_family = Some(family.to_string());
        }
    }
}

pub struct OverrideRegistry {
    overrides: HashMap<SourceDatabase, Vec<Box<dyn RecordOverride>>>,
}

impl OverrideRegistry {
    pub fn empty() -> Self {
        OverrideRegistry {
            overrides: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = OverrideRegistry::empty();
        registry.register(Box::new(ArgAnnotOverride));
        registry.register(Box::new(MetalResistanceOverride));
        registry.register(Box::new(ResFinderOverride));
        registry
    }

    pub fn register(&mut self, rule: Box<dyn RecordOverride>) {
        self.overrides.entry(rule.source()).or_default().push(rule);
    }

    pub fn len(&self) -> usize {
        self.overrides.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply every rule registered for the record's database.
    /// Returns true if at least one fired.
    pub fn apply(&self, record: &mut MergedRecord) -> bool {
        let Some(rules) = self.overrides.get(&record.record.source_database) else {
            return false;
        };
        for rule in rules {
            rule.apply(record);
        }
        !rules.is_empty()
    }
}

impl Default for OverrideRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
