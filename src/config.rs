// ⚙️ Pipeline configuration
// Loaded from a JSON file; every field has a default so partial files work.
// CLI flags override whatever the file says.

use crate::error::{ReconcileError, Result};
use crate::normalizer::{IdentifierRegistry, PatternRule, SourceDatabase};
use crate::sources::ReferenceSource;
use anyhow::Context as AnyhowContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferencePaths {
    pub amrfinderplus: Option<PathBuf>,
    pub card: Option<PathBuf>,
    pub megares: Option<PathBuf>,
    pub resfinder: Option<PathBuf>,
}

impl Default for ReferencePaths {
    /// Each catalog's own file name, relative to the working directory
    fn default() -> Self {
        let path = |s: ReferenceSource| Some(PathBuf::from(s.default_file()));
        ReferencePaths {
            amrfinderplus: path(ReferenceSource::AmrFinderPlus),
            card: path(ReferenceSource::Card),
            megares: path(ReferenceSource::Megares),
            resfinder: path(ReferenceSource::ResFinder),
        }
    }
}

impl ReferencePaths {
    pub fn get(&self, source: ReferenceSource) -> Option<&Path> {
        match source {
            ReferenceSource::AmrFinderPlus => self.amrfinderplus.as_deref(),
            ReferenceSource::Card => self.card.as_deref(),
            ReferenceSource::Megares => self.megares.as_deref(),
            ReferenceSource::ResFinder => self.resfinder.as_deref(),
        }
    }

    pub fn set(&mut self, source: ReferenceSource, path: PathBuf) {
        let slot = match source {
            ReferenceSource::AmrFinderPlus => &mut self.amrfinderplus,
            ReferenceSource::Card => &mut self.card,
            ReferenceSource::Megares => &mut self.megares,
            ReferenceSource::ResFinder => &mut self.resfinder,
        };
        *slot = Some(path);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub references: ReferencePaths,

    /// KARGA calls at or above this percent gene coverage count as present
    pub karga_min_coverage: f64,

    /// Extensions dropped from sample column names
    pub column_extensions: Vec<String>,

    /// Suffix SRST2 appends to the sample name
    pub srst2_suffix: String,

    /// Extra identifier rules: database tag → accession regex
    pub identifier_patterns: BTreeMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            references: ReferencePaths::default(),
            karga_min_coverage: 80.0,
            column_extensions: vec!["csv".to_string(), "tsv".to_string(), "txt".to_string()],
            srst2_suffix: "_fullgenes_sequence_results.txt".to_string(),
            identifier_patterns: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Load from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: PipelineConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.karga_min_coverage) {
            return Err(ReconcileError::InvalidConfig(format!(
                "karga_min_coverage must be within 0-100 (got {})",
                self.karga_min_coverage
            )));
        }
        if self.column_extensions.iter().any(|e| e.is_empty() || e.starts_with('.')) {
            return Err(ReconcileError::InvalidConfig(
                "column_extensions must be bare extensions like \"tsv\"".to_string(),
            ));
        }
        Ok(())
    }

    /// Default extraction rules plus the configured pattern rules
    pub fn identifier_registry(&self) -> Result<IdentifierRegistry> {
        let mut registry = IdentifierRegistry::with_defaults()?;
        for (tag, pattern) in &self.identifier_patterns {
            registry.register(SourceDatabase::from_tag(tag), Box::new(PatternRule::new(pattern)?));
        }
        Ok(registry)
    }
}
