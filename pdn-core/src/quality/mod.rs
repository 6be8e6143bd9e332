//! Income data-quality classification.
//!
//! The extracted income relation is unioned across jurisdictions, each row is
//! run through an ordered [`RuleSet`], and rows are partitioned into a clean
//! dataset and an audit log carrying the rejection reason.

pub mod partition;
pub mod rules;
pub mod source;

pub use partition::{AUDIT_COLUMNS, QualityReport, ReasonCount, partition, percentage};
pub use rules::{CLEAN_LABEL, Predicate, RejectionRule, RuleSet, Verdict, coerce_number};
pub use source::{FILENAME_COLUMN, RelationFile, Table};
