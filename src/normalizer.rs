// 🧬 Identifier Normalizer
// Turns a raw FASTA header into the accession each reference catalog is keyed on.
//
// Every database writes its headers differently, so extraction is a strategy
// per source tag, held in IdentifierRegistry. Adding a database = registering
// a new IdExtractor, no existing rule changes.

use crate::error::{ReconcileError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// SOURCE DATABASE
// ============================================================================

/// SourceDatabase - which reference collection a sequence came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceDatabase {
    AmrFinderPlus,
    Card,
    ArgAnnot,
    Megares,
    ResFinder,
    MetalResistance,
    Other(String),
}

impl SourceDatabase {
    /// Parse the tag used in the `database` column
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "AMRFinderPlus_cds" => SourceDatabase::AmrFinderPlus,
            "card_cds" => SourceDatabase::Card,
            "ARG-ANNOT_cds" => SourceDatabase::ArgAnnot,
            "megares_cds" => SourceDatabase::Megares,
            "ResFinder_cds" => SourceDatabase::ResFinder,
            "MetalResistance_cds" => SourceDatabase::MetalResistance,
            other => SourceDatabase::Other(other.to_string()),
        }
    }

    /// Tag as written in the sequence table
    pub fn tag(&self) -> &str {
        match self {
            SourceDatabase::AmrFinderPlus => "AMRFinderPlus_cds",
            SourceDatabase::Card => "card_cds",
            SourceDatabase::ArgAnnot => "ARG-ANNOT_cds",
            SourceDatabase::Megares => "megares_cds",
            SourceDatabase::ResFinder => "ResFinder_cds",
            SourceDatabase::MetalResistance => "MetalResistance_cds",
            SourceDatabase::Other(tag) => tag,
        }
    }

    /// Human-readable name for logs
    pub fn name(&self) -> &str {
        match self {
            SourceDatabase::AmrFinderPlus => "AMRFinderPlus",
            SourceDatabase::Card => "CARD",
            SourceDatabase::ArgAnnot => "ARG-ANNOT",
            SourceDatabase::Megares => "MEGARes",
            SourceDatabase::ResFinder => "ResFinder",
            SourceDatabase::MetalResistance => "MetalResistance",
            SourceDatabase::Other(tag) => tag,
        }
    }
}

impl fmt::Display for SourceDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ============================================================================
// EXTRACTION RULES
// ============================================================================

/// IdExtractor - one extraction rule
///
/// Returns None when the expected token/pattern is absent. It never fails:
/// an unresolved id just won't match in later joins.
pub trait IdExtractor: Send + Sync {
    fn extract(&self, raw: &str) -> Option<String>;

    /// Short description for logs
    fn describe(&self) -> &str;
}

/// Python-style `str.isdigit()` for ASCII headers
pub(crate) fn is_all_digits(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

fn non_empty(id: String) -> Option<String> {
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// `gene_WP_012345.1_...` → `WP_012345.1`, `gene_ABC123_...` → `ABC123`
///
/// The first underscore token is the gene name; a literal `WP` segment means
/// the accession itself contains an underscore.
pub struct AccessionAfterName;

impl IdExtractor for AccessionAfterName {
    fn extract(&self, raw: &str) -> Option<String> {
        let rest: Vec<&str> = raw.split('_').skip(1).collect();
        let first = rest.first()?;
        if *first == "WP" {
            let end = rest.len().min(2);
            non_empty(rest[..end].join("_"))
        } else {
            non_empty(first.to_string())
        }
    }

    fn describe(&self) -> &str {
        "accession after gene name (WP_ aware)"
    }
}

/// First occurrence of a fixed accession pattern anywhere in the header
pub struct PatternRule {
    pattern: Regex,
    /// Rewrite `_` in the match (CARD stores `ARO:nnn`, headers carry `ARO_nnn`)
    underscore_replacement: Option<char>,
    label: String,
}

impl PatternRule {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            ReconcileError::InvalidConfig(format!("bad identifier pattern '{}': {}", pattern, e))
        })?;
        Ok(PatternRule {
            pattern: regex,
            underscore_replacement: None,
            label: format!("pattern {}", pattern),
        })
    }

    pub fn replacing_underscore(mut self, with: char) -> Self {
        self.underscore_replacement = Some(with);
        self
    }
}

impl IdExtractor for PatternRule {
    fn extract(&self, raw: &str) -> Option<String> {
        let found = self.pattern.find(raw)?.as_str();
        let id = match self.underscore_replacement {
            Some(c) => found.replace('_', &c.to_string()),
            None => found.to_string(),
        };
        non_empty(id)
    }

    fn describe(&self) -> &str {
        &self.label
    }
}

/// ARG-ANNOT style `(Bla)TEM-1D_AF188200_1_861` headers.
///
/// Counting from the end of the tokens after the first: if the 4th-from-last
/// is numeric the name itself was split, so the accession spans two tokens.
pub struct PositionalRule;

impl IdExtractor for PositionalRule {
    fn extract(&self, raw: &str) -> Option<String> {
        let rest: Vec<&str> = raw.split('_').skip(1).collect();
        if rest.len() < 4 {
            return None;
        }
        let len = rest.len();
        if is_all_digits(rest[len - 4]) {
            let start = len.saturating_sub(5);
            non_empty(rest[start..len - 3].join("_"))
        } else {
            non_empty(rest[len - 4].to_string())
        }
    }

    fn describe(&self) -> &str {
        "positional token (numeric disambiguation)"
    }
}

/// ResFinder `blaTEM-1A_1_HM749966` → `HM749966`
pub struct LastToken;

impl IdExtractor for LastToken {
    fn extract(&self, raw: &str) -> Option<String> {
        let mut tokens = raw.split('_');
        tokens.next()?;
        tokens.last().and_then(|t| non_empty(t.to_string()))
    }

    fn describe(&self) -> &str {
        "last underscore token"
    }
}

/// Raw id is already the key
pub struct PassThrough;

impl IdExtractor for PassThrough {
    fn extract(&self, raw: &str) -> Option<String> {
        non_empty(raw.trim().to_string())
    }

    fn describe(&self) -> &str {
        "pass-through"
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

pub struct IdentifierRegistry {
    rules: HashMap<SourceDatabase, Box<dyn IdExtractor>>,
    fallback: Box<dyn IdExtractor>,
}

impl IdentifierRegistry {
    /// Registry with no source-specific rules (everything passes through)
    pub fn empty() -> Self {
        IdentifierRegistry {
            rules: HashMap::new(),
            fallback: Box::new(PassThrough),
        }
    }

    /// Rules for every known reference database
    pub fn with_defaults() -> Result<Self> {
        let mut registry = IdentifierRegistry::empty();
        registry.register(SourceDatabase::AmrFinderPlus, Box::new(AccessionAfterName));
        registry.register(
            SourceDatabase::Card,
            Box::new(PatternRule::new(r"ARO_\d+")?.replacing_underscore(':')),
        );
        registry.register(SourceDatabase::ArgAnnot, Box::new(PositionalRule));
        registry.register(SourceDatabase::Megares, Box::new(PatternRule::new(r"MEG_\d+")?));
        registry.register(SourceDatabase::ResFinder, Box::new(LastToken));
        // MetalResistance passes through; its id is rewritten by an override
        Ok(registry)
    }

    pub fn register(&mut self, source: SourceDatabase, rule: Box<dyn IdExtractor>) {
        self.rules.insert(source, rule);
    }

    pub fn has_rule(&self, source: &SourceDatabase) -> bool {
        self.rules.contains_key(source)
    }

    /// Canonical id for a raw header, None when unresolved
    pub fn normalize(&self, raw: &str, source: &SourceDatabase) -> Option<String> {
        self.rules
            .get(source)
            .unwrap_or(&self.fallback)
            .extract(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> IdentifierRegistry {
        IdentifierRegistry::with_defaults().unwrap()
    }

    #[test]
    fn test_source_tag_round_trip() {
        for tag in [
            "AMRFinderPlus_cds",
            "card_cds",
            "ARG-ANNOT_cds",
            "megares_cds",
            "ResFinder_cds",
            "MetalResistance_cds",
            "PlasmidFinder",
        ] {
            assert_eq!(SourceDatabase::from_tag(tag).tag(), tag);
        }
        assert_eq!(
            SourceDatabase::from_tag("custom_db"),
            SourceDatabase::Other("custom_db".to_string())
        );
        assert_eq!(SourceDatabase::Card.name(), "CARD");
    }

    #[test]
    fn test_amrfinderplus_wp_accession() {
        let id = registry().normalize("blaTEM-1_WP_000027057.1_1_861", &SourceDatabase::AmrFinderPlus);
        assert_eq!(id, Some("WP_000027057.1".to_string()));
    }

    #[test]
    fn test_amrfinderplus_single_token_accession() {
        let id = registry().normalize("mcr-1_AKF16168.1_1_1626", &SourceDatabase::AmrFinderPlus);
        assert_eq!(id, Some("AKF16168.1".to_string()));
    }

    #[test]
    fn test_amrfinderplus_without_underscore_is_unresolved() {
        assert_eq!(registry().normalize("blaTEM", &SourceDatabase::AmrFinderPlus), None);
    }

    #[test]
    fn test_card_pattern_rewrites_underscore() {
        let raw = "gb|AF028812.1|+|392-1253|ARO_3002999|CblA-1";
        assert_eq!(
            registry().normalize(raw, &SourceDatabase::Card),
            Some("ARO:3002999".to_string())
        );
    }

    #[test]
    fn test_card_pattern_absent_is_unresolved() {
        assert_eq!(registry().normalize("gb|AF028812.1|CblA-1", &SourceDatabase::Card), None);
    }

    #[test]
    fn test_megares_pattern() {
        let raw = "MEG_1234|Drugs|Aminoglycosides|Aminoglycoside-resistant_16S_ribosomal_subunit_protein|A16S";
        assert_eq!(
            registry().normalize(raw, &SourceDatabase::Megares),
            Some("MEG_1234".to_string())
        );
    }

    #[test]
    fn test_arg_annot_plain_token() {
        // rest = [TEM-1D, AF188200, 1, 861] → 4th from last is non numeric
        let id = registry().normalize("(Bla)_TEM-1D_AF188200_1_861", &SourceDatabase::ArgAnnot);
        assert_eq!(id, Some("TEM-1D".to_string()));
    }

    #[test]
    fn test_arg_annot_numeric_position_joins_two_tokens() {
        // rest = [Bla, NG, 049256, 1, 861, x] → 4th from last "049256" is numeric
        let id = registry().normalize("(Bla)_Bla_NG_049256_1_861_x", &SourceDatabase::ArgAnnot);
        assert_eq!(id, Some("NG_049256".to_string()));
    }

    #[test]
    fn test_arg_annot_too_few_tokens() {
        assert_eq!(registry().normalize("(Bla)_TEM_1", &SourceDatabase::ArgAnnot), None);
    }

    #[test]
    fn test_resfinder_last_token() {
        let id = registry().normalize("blaTEM-1A_1_HM749966", &SourceDatabase::ResFinder);
        assert_eq!(id, Some("HM749966".to_string()));
        assert_eq!(registry().normalize("blaTEM", &SourceDatabase::ResFinder), None);
    }

    #[test]
    fn test_unknown_source_passes_through() {
        let source = SourceDatabase::Other("custom".to_string());
        assert_eq!(registry().normalize("xyz_1", &source), Some("xyz_1".to_string()));
        assert_eq!(
            registry().normalize("arsB_1_X", &SourceDatabase::MetalResistance),
            Some("arsB_1_X".to_string())
        );
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let reg = registry();
        let raw = "gb|AF028812.1|ARO_3002999|CblA-1";
        let first = reg.normalize(raw, &SourceDatabase::Card);
        for _ in 0..5 {
            assert_eq!(reg.normalize(raw, &SourceDatabase::Card), first);
        }
    }

    #[test]
    fn test_register_new_database() {
        let mut reg = registry();
        let source = SourceDatabase::Other("BacMet_cds".to_string());
        assert!(!reg.has_rule(&source));
        reg.register(source.clone(), Box::new(PatternRule::new(r"BAC\d+").unwrap()));
        assert_eq!(reg.normalize("arsB|BAC0001|x", &source), Some("BAC0001".to_string()));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        assert!(matches!(
            PatternRule::new("ARO_(\\d+"),
            Err(ReconcileError::InvalidConfig(_))
        ));
    }
}
