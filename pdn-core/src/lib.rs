//! # PDN Core
//!
//! Core library for the PDN extraction pipeline.
//! Turns per-jurisdiction JSON dumps of asset declarations and procurement
//! releases into flat CSV relations, and partitions the extracted income
//! relation into a clean dataset and an audit log.

pub mod config;
pub mod csv;
pub mod error;
pub mod orchestrator;
pub mod probe;
pub mod profile;
pub mod quality;
pub mod relations;
pub mod resolve;

// Re-export commonly used types at the crate root.
pub use config::{ExtractionConfig, PipelineConfig, ProfileConfig, QualityConfig, load_config};
pub use error::{ConfigError, OutputError, PipelineError, Result, SourceError};
pub use orchestrator::{
    JurisdictionOutcome, Orchestrator, OutcomeStatus, RunSummary, SkipReason, SourceLayout,
};
pub use profile::IncomeProfile;
pub use quality::{QualityReport, RejectionRule, RuleSet, Verdict};
pub use relations::{Corpus, CorpusKind, DECLARATIONS, PROCUREMENT, RelationSet};
