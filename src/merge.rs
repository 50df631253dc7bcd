// 🔗 Annotation Merge Engine
// Walks the reference catalogs in priority order and fills each record's
// annotation with first-non-empty-wins semantics.
//
// The engine is an explicit list of steps: joins against ReferenceTables and
// override passes. A record with no match anywhere survives with empty fields,
// so N records in → N records out.

use crate::normalizer::SourceDatabase;
use crate::overrides::OverrideRegistry;
use crate::records::GeneRecord;
use crate::sources::{Annotation, RecordKey, ReferenceSource, ReferenceTable};
use log::{debug, info};
use serde::Serialize;

// ============================================================================
// MERGED RECORD
// ============================================================================

/// MergedRecord - GeneRecord plus its resolved annotation
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    pub record: GeneRecord,

    /// Join key for id-keyed catalogs; starts as the normalized id, overrides
    /// may rewrite it
    pub canonical_id: Option<String>,

    /// Join key for allele-keyed catalogs (set by overrides)
    pub allele_symbol: Option<String>,

    pub annotation: Annotation,
}

impl MergedRecord {
    pub fn from_record(record: &GeneRecord) -> Self {
        MergedRecord {
            canonical_id: record.canonical_id.clone(),
            record: record.clone(),
            allele_symbol: None,
            annotation: Annotation::default(),
        }
    }

    pub fn key(&self, key: RecordKey) -> Option<&str> {
        match key {
            RecordKey::CanonicalId => self.canonical_id.as_deref(),
            RecordKey::AlleleSymbol => self.allele_symbol.as_deref(),
        }
    }

    pub fn source_database(&self) -> &SourceDatabase {
        &self.record.source_database
    }
}

// ============================================================================
// MERGE PLAN
// ============================================================================

pub enum MergeStep {
    Join(ReferenceTable),
    Overrides(OverrideRegistry),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeStats {
    /// (catalog, matched records) in join order
    pub matches: Vec<(String, usize)>,
    pub overrides_applied: usize,
    /// Records no catalog matched
    pub unmatched: usize,
}

pub struct MergeEngine {
    steps: Vec<MergeStep>,
}

impl MergeEngine {
    pub fn new() -> Self {
        MergeEngine { steps: Vec::new() }
    }

    pub fn then_join(mut self, table: ReferenceTable) -> Self {
        self.steps.push(MergeStep::Join(table));
        self
    }

    pub fn then_overrides(mut self, overrides: OverrideRegistry) -> Self {
        self.steps.push(MergeStep::Overrides(overrides));
        self
    }

    /// The curated chain: AMRFinderPlus → CARD → overrides → MEGARes → ResFinder.
    ///
    /// Catalogs absent from `tables` are skipped; overrides run regardless.
    pub fn standard(tables: Vec<ReferenceTable>, overrides: OverrideRegistry) -> Self {
        let mut tables = tables;
        let mut take = |source: ReferenceSource| {
            tables
                .iter()
                .position(|t| t.source() == source)
                .map(|i| tables.remove(i))
        };

        let amrfinder = take(ReferenceSource::AmrFinderPlus);
        let card = take(ReferenceSource::Card);
        let megares = take(ReferenceSource::Megares);
        let resfinder = take(ReferenceSource::ResFinder);

        let mut engine = MergeEngine::new();
        for table in [amrfinder, card].into_iter().flatten() {
            engine = engine.then_join(table);
        }
        engine = engine.then_overrides(overrides);
        for table in [megares, resfinder].into_iter().flatten() {
            engine = engine.then_join(table);
        }
        engine
    }

    pub fn steps(&self) -> &[MergeStep] {
        &self.steps
    }

    pub fn merge(&self, records: &[GeneRecord]) -> Vec<MergedRecord> {
        self.merge_with_stats(records).0
    }

    pub fn merge_with_stats(&self, records: &[GeneRecord]) -> (Vec<MergedRecord>, MergeStats) {
        let mut merged: Vec<MergedRecord> = records.iter().map(MergedRecord::from_record).collect();
        let mut matched_any = vec![false; merged.len()];
        let mut stats = MergeStats::default();

        for step in &self.steps {
            match step {
                MergeStep::Join(table) => {
                    let key = table.record_key();
                    let mut hits = 0;
                    for (record, matched) in merged.iter_mut().zip(matched_any.iter_mut()) {
                        let Some(row) = record.key(key).and_then(|k| table.lookup(k)) else {
                            continue;
                        };
                        record.annotation.fill_from(&row.annotation);
                        *matched = true;
                        hits += 1;
                    }
                    debug!("{} join matched {} records", table.source().name(), hits);
                    stats.matches.push((table.source().name().to_string(), hits));
                }
                MergeStep::Overrides(overrides) => {
                    for record in merged.iter_mut() {
                        if overrides.apply(record) {
                            stats.overrides_applied += 1;
                        }
                    }
                }
            }
        }

        for record in merged.iter_mut() {
            if let Some(subtype) = record.annotation.subtype.as_mut() {
                *subtype = subtype.to_uppercase();
            }
        }

        stats.unmatched = matched_any.iter().filter(|m| !**m).count();
        info!(
            "Merged {} records ({} overridden, {} without catalog match)",
            merged.len(),
            stats.overrides_applied,
            stats.unmatched
        );

        (merged, stats)
    }
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::IdentifierRegistry;
    use crate::sources::ReferenceAnnotation;

    fn record(header: &str, tag: &str) -> GeneRecord {
        let registry = IdentifierRegistry::with_defaults().unwrap();
        GeneRecord::new(
            header.to_string(),
            SourceDatabase::from_tag(tag),
            "gene".to_string(),
            &registry,
        )
    }

    fn row(key: &str, annotation: Annotation) -> ReferenceAnnotation {
        ReferenceAnnotation {
            key: key.to_string(),
            annotation,
        }
    }

    #[test]
    fn test_first_non_empty_not_first_source() {
        let primary = ReferenceTable::from_rows(
            ReferenceSource::AmrFinderPlus,
            vec![row("X1", Annotation::new().with_allele(Some("")).with_class(Some("BETA-LACTAM")))],
        );
        let secondary = ReferenceTable::from_rows(
            ReferenceSource::Card,
            vec![row("X1", Annotation::new().with_allele(Some("blaX-1")).with_class(Some("penam")))],
        );
        let engine = MergeEngine::new().then_join(primary).then_join(secondary);

        let merged = engine.merge(&[record("X1", "custom")]);
        assert_eq!(merged[0].annotation.allele.as_deref(), Some("blaX-1"));
        // class was filled by the primary, the secondary must not overwrite it
        assert_eq!(merged[0].annotation.resistance_class.as_deref(), Some("BETA-LACTAM"));
    }

    #[test]
    fn test_unmatched_records_survive() {
        let table = ReferenceTable::from_rows(
            ReferenceSource::Card,
            vec![row("ARO:1", Annotation::new().with_allele(Some("A")))],
        );
        let engine = MergeEngine::new().then_join(table);
        let records = vec![
            record("gb|ARO_1|x", "card_cds"),
            record("no_accession", "card_cds"),
            record("other", "custom"),
        ];
        let (merged, stats) = engine.merge_with_stats(&records);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].annotation.allele.as_deref(), Some("A"));
        assert!(merged[1].annotation.is_empty());
        assert!(merged[1].canonical_id.is_none());
        assert_eq!(stats.unmatched, 2);
        assert_eq!(stats.matches, vec![("CARD".to_string(), 1)]);
    }

    #[test]
    fn test_standard_chain_order_and_overrides() {
        let megares = ReferenceTable::from_rows(
            ReferenceSource::Megares,
            vec![row("BAC0001", Annotation::new().with_class(Some("Arsenic")).with_gene_family(Some("ARS")))],
        );
        let amrfinder = ReferenceTable::from_rows(ReferenceSource::AmrFinderPlus, vec![]);
        let engine = MergeEngine::standard(vec![megares, amrfinder], OverrideRegistry::with_defaults());

        // AMRFinderPlus join, overrides, MEGARes join
        assert_eq!(engine.steps().len(), 3);
        assert!(matches!(engine.steps()[1], MergeStep::Overrides(_)));

        // metal override rewrites the id so the later MEGARes join hits
        let merged = engine.merge(&[record("arsB_1_BAC0001", "MetalResistance_cds")]);
        let m = &merged[0];
        assert_eq!(m.canonical_id.as_deref(), Some("BAC0001"));
        assert_eq!(m.annotation.resistance_class.as_deref(), Some("Arsenic"));
        // override forced family before the join, the join must not replace it
        assert_eq!(m.annotation.gene_family.as_deref(), Some("arsB"));
        assert_eq!(m.annotation.subtype.as_deref(), Some("METAL"));
    }

    #[test]
    fn test_resfinder_joins_on_allele_symbol() {
        let notes = ReferenceTable::from_rows(
            ReferenceSource::ResFinder,
            vec![row("blaTEM_1A", Annotation::new().with_allele(Some("blaTEM-1A")).with_class(Some("Beta-lactam")))],
        );
        let engine = MergeEngine::standard(vec![notes], OverrideRegistry::with_defaults());
        let merged = engine.merge(&[record("blaTEM_1A_1_HM749966", "ResFinder_cds")]);

        assert_eq!(merged[0].annotation.allele.as_deref(), Some("blaTEM-1A"));
        assert_eq!(merged[0].annotation.resistance_class.as_deref(), Some("Beta-lactam"));
        assert_eq!(merged[0].annotation.subtype.as_deref(), Some("AMR"));
    }

    #[test]
    fn test_subtype_upper_cased() {
        let table = ReferenceTable::from_rows(
            ReferenceSource::AmrFinderPlus,
            vec![row("K", Annotation::new().with_subtype(Some("amr,Metal")))],
        );
        let merged = MergeEngine::new().then_join(table).merge(&[record("K", "x")]);
        assert_eq!(merged[0].annotation.subtype.as_deref(), Some("AMR,METAL"));
    }
}
