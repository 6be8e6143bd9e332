//! Clean/audit partition of the unioned income relation.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::rules::{RuleSet, Verdict, coerce_number};
use super::source::{self, FILENAME_COLUMN, RelationFile};
use crate::config::QualityConfig;
use crate::csv::AtomicWriter;
use crate::error::{OutputError, Result};

/// Header of the audit log.
pub const AUDIT_COLUMNS: [&str; 5] = [
    "id",
    "archivo_origen",
    "ingreso_mensual_neto",
    "ingreso_anual_neto",
    "motivo_rechazo",
];

/// Count of rejected rows for one reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: usize,
}

/// Outcome of one classification run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub files: usize,
    pub total: usize,
    pub clean: usize,
    pub rejected: usize,
    pub clean_pct: f64,
    pub rejected_pct: f64,
    /// Descending by count, ties by reason.
    pub reasons: Vec<ReasonCount>,
    pub clean_path: PathBuf,
    pub audit_path: PathBuf,
}

impl QualityReport {
    fn new(files: usize, tally: Tally, clean_path: PathBuf, audit_path: PathBuf) -> Self {
        let total = tally.clean + tally.rejected;
        let mut reasons: Vec<ReasonCount> = tally
            .reasons
            .into_iter()
            .map(|(reason, count)| ReasonCount { reason, count })
            .collect();
        reasons.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.reason.cmp(&b.reason)));
        Self {
            files,
            total,
            clean: tally.clean,
            rejected: tally.rejected,
            clean_pct: percentage(tally.clean, total),
            rejected_pct: percentage(tally.rejected, total),
            reasons,
            clean_path,
            audit_path,
        }
    }
}

/// Share of `part` in `total` as a percentage; 0 when `total` is 0.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

#[derive(Debug, Default)]
struct Tally {
    clean: usize,
    rejected: usize,
    reasons: BTreeMap<String, usize>,
}

impl Tally {
    fn record(&mut self, verdict: Verdict<'_>) {
        match verdict {
            Verdict::Clean => self.clean += 1,
            Verdict::Rejected(reason) => {
                self.rejected += 1;
                *self.reasons.entry(reason.to_string()).or_default() += 1;
            }
        }
    }
}

/// Classify every row of the unioned relation and write the clean dataset
/// and the audit log.
///
/// Files are processed one jurisdiction at a time against a union header
/// computed up front. Outputs replace their targets only after every file has
/// been classified, so a failure leaves previous outputs untouched.
pub fn partition(config: &QualityConfig) -> Result<QualityReport> {
    let files = source::discover(&config.input_dir, &config.relation_file)?;
    let headers = files
        .iter()
        .map(RelationFile::header)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let union = source::union_columns(headers.iter().map(Vec::as_slice));
    let clean_columns: Vec<&str> = union
        .iter()
        .map(String::as_str)
        .filter(|c| *c != FILENAME_COLUMN)
        .collect();
    let position = |name: &str| union.iter().position(|c| c == name);

    tracing::info!(
        files = files.len(),
        columns = union.len(),
        input = %config.input_dir.display(),
        "Classifying income relation"
    );

    std::fs::create_dir_all(&config.output_dir).map_err(|source| OutputError::CreateDir {
        path: config.output_dir.clone(),
        source,
    })?;
    let mut clean_out = AtomicWriter::create(&config.output_dir.join(&config.clean_file))?;
    let mut audit_out = AtomicWriter::create(&config.output_dir.join(&config.audit_file))?;
    clean_out.write_record(&clean_columns)?;
    audit_out.write_record(AUDIT_COLUMNS)?;

    let rule_columns: Vec<(&str, Option<usize>)> = config
        .rules
        .fields()
        .into_iter()
        .map(|field| (field, position(field)))
        .collect();
    let clean_positions: Vec<Option<usize>> = clean_columns.iter().map(|c| position(c)).collect();
    let audit_positions = AUDIT_COLUMNS.map(position);

    let mut tally = Tally::default();
    for file in &files {
        let table = file.load()?;
        let projection = source::projection(&union, &table.columns);
        let origin = file.origin();
        let before = (tally.clean, tally.rejected);

        for row in &table.rows {
            let cell = |idx: Option<usize>| {
                idx.and_then(|i| projection[i])
                    .map_or("", |src| row[src].as_str())
            };
            let verdict = classify_row(&config.rules, &rule_columns, cell);
            tally.record(verdict);
            match verdict {
                Verdict::Clean => {
                    clean_out.write_record(clean_positions.iter().map(|idx| cell(*idx)))?;
                }
                Verdict::Rejected(reason) => {
                    audit_out.write_record([
                        cell(audit_positions[0]),
                        origin.as_str(),
                        cell(audit_positions[2]),
                        cell(audit_positions[3]),
                        reason,
                    ])?;
                }
            }
        }

        tracing::debug!(
            jurisdiction = %file.jurisdiction,
            rows = table.rows.len(),
            clean = tally.clean - before.0,
            rejected = tally.rejected - before.1,
            "Classified jurisdiction"
        );
    }

    let clean_path = clean_out.commit()?;
    let audit_path = audit_out.commit()?;
    let report = QualityReport::new(files.len(), tally, clean_path, audit_path);
    tracing::info!(
        total = report.total,
        clean = report.clean,
        rejected = report.rejected,
        "Income classification complete"
    );
    Ok(report)
}

fn classify_row<'r, 'c, F>(
    rules: &'r RuleSet,
    rule_columns: &[(&str, Option<usize>)],
    cell: F,
) -> Verdict<'r>
where
    F: Fn(Option<usize>) -> &'c str,
{
    rules.classify(|field| {
        let idx = rule_columns
            .iter()
            .find(|(name, _)| *name == field)
            .and_then(|(_, idx)| *idx);
        idx.and_then(|i| coerce_number(cell(Some(i))))
    })
}
