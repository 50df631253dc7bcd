// AMR Reconcile - Core Library
// Gene identity reconciliation across AMR reference databases and detection tools.
// Exposes all modules for use in the CLI and tests.

pub mod error;
pub mod table;
pub mod normalizer;     // Identifier Normalizer
pub mod records;
pub mod sources;        // Reference catalogs
pub mod overrides;
pub mod merge;          // Annotation Merge Engine
pub mod summary;        // Gene Summary Aggregator
pub mod tools;          // Per-tool parsers
pub mod matrix;         // Multi-Tool Result Aggregator
pub mod overlap;
pub mod config;
pub mod report;
pub mod logging;
pub mod pipeline;

// Re-export commonly used types
pub use error::{ReconcileError, Result};
pub use table::{Table, TableFormat};
pub use normalizer::{
    IdExtractor, IdentifierRegistry, SourceDatabase,
    AccessionAfterName, PatternRule, PositionalRule, LastToken, PassThrough,
};
pub use records::{GeneRecord, load_gene_records, records_from_table, count_unresolved};
pub use sources::{
    Annotation, ReferenceSource, ReferenceTable, ReferenceAnnotation, RecordKey,
    ReferenceLoader, get_loader, fill_if_empty,
};
pub use overrides::{RecordOverride, OverrideRegistry};
pub use merge::{MergedRecord, MergeEngine, MergeStep, MergeStats};
pub use summary::{GeneSummary, aggregate, write_summaries, SUMMARY_COLUMNS};
pub use tools::{
    DetectionTool, ToolInput, ToolColumn, ToolParser,
    get_tool_parser, parse_or_zero, column_name,
};
pub use matrix::{ToolCallMatrix, EnrichmentOutcome};
pub use overlap::OverlapMatrix;
pub use config::{PipelineConfig, ReferencePaths};
pub use report::{RunReport, InputProvenance};
pub use pipeline::{annotate_pipeline, summarize_pipeline, SummarizeRequest};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
