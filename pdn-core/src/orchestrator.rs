//! Batch orchestration: one extraction job per jurisdiction.
//!
//! Jurisdictions are discovered under the input root, filtered by the
//! idempotency check, and processed on a bounded pool. A failing jurisdiction
//! is recorded in the run summary and never stops the others.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ExtractionConfig;
use crate::csv;
use crate::error::{OutputError, PipelineError, Result, SourceError};
use crate::relations::{Corpus, CorpusKind, extract_batch};

/// Top-level members that may hold the record array of a wrapped file.
pub const WRAPPER_KEYS: [&str; 3] = ["results", "releases", "data"];

/// How jurisdiction sources are laid out under the input root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceLayout {
    /// `<root>/<jurisdiction>/<canonical_file>`, falling back to the first
    /// file (by name) with the given extension.
    PerDirectory {
        canonical_file: String,
        extension: String,
    },
    /// `<root>/<jurisdiction><suffix>`.
    FlatSuffix { suffix: String },
}

/// Source lookup result for one jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLookup {
    Found(PathBuf),
    /// The directory holds no usable file.
    Missing,
    /// The directory could not be listed.
    Unreadable(String),
}

impl SourceLookup {
    pub fn path(&self) -> Option<&Path> {
        match self {
            SourceLookup::Found(path) => Some(path),
            SourceLookup::Missing | SourceLookup::Unreadable(_) => None,
        }
    }
}

/// A jurisdiction found under the input root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jurisdiction {
    pub name: String,
    pub source: SourceLookup,
}

impl SourceLayout {
    /// Enumerate jurisdictions under `root`, ordered by name.
    ///
    /// Only a missing or unlistable root is an error. A jurisdiction directory
    /// that cannot be listed is reported as [`SourceLookup::Unreadable`].
    pub fn discover(&self, root: &Path) -> Result<Vec<Jurisdiction>> {
        if !root.is_dir() {
            return Err(PipelineError::InputRootMissing {
                path: root.to_path_buf(),
            });
        }
        let mut found = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(root = %root.display(), error = %err, "Unreadable entry under input root");
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            // Follows symlinks.
            let path = entry.path();
            match self {
                SourceLayout::PerDirectory {
                    canonical_file,
                    extension,
                } => {
                    if path.is_dir() {
                        let source = match pick_source(&path, canonical_file, extension) {
                            Ok(Some(file)) => SourceLookup::Found(file),
                            Ok(None) => SourceLookup::Missing,
                            Err(err) => SourceLookup::Unreadable(err.to_string()),
                        };
                        found.push(Jurisdiction { name, source });
                    }
                }
                SourceLayout::FlatSuffix { suffix } => {
                    if let Some(stem) = name.strip_suffix(suffix.as_str())
                        && path.is_file()
                        && !stem.is_empty()
                    {
                        found.push(Jurisdiction {
                            name: stem.to_string(),
                            source: SourceLookup::Found(path),
                        });
                    }
                }
            }
        }
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }
}

fn pick_source(
    dir: &Path,
    canonical_file: &str,
    extension: &str,
) -> std::result::Result<Option<PathBuf>, SourceError> {
    let canonical = dir.join(canonical_file);
    if canonical.is_file() {
        return Ok(Some(canonical));
    }
    let list_err = |source| SourceError::ListDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(list_err)? {
        let path = entry.map_err(list_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            candidates.push(path);
        }
    }
    candidates.sort();
    Ok(candidates.into_iter().next())
}

/// Why a jurisdiction was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyProcessed,
    MissingSource,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyProcessed => write!(f, "already processed"),
            SkipReason::MissingSource => write!(f, "missing source"),
        }
    }
}

/// Result of one jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Processed {
        source: PathBuf,
        records: usize,
        skipped_entries: usize,
        /// Rows written per relation; relations with no rows are absent.
        rows: BTreeMap<String, usize>,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JurisdictionOutcome {
    pub jurisdiction: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

/// Summary of one orchestrated run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub corpus: CorpusKind,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub processed: usize,
    pub skipped_already_processed: usize,
    pub skipped_missing_source: usize,
    pub failed: usize,
    /// Ordered by jurisdiction name.
    pub outcomes: Vec<JurisdictionOutcome>,
}

impl RunSummary {
    fn new(
        corpus: CorpusKind,
        settings: &ExtractionConfig,
        started_at: DateTime<Utc>,
        mut outcomes: Vec<JurisdictionOutcome>,
    ) -> Self {
        outcomes.sort_by(|a, b| a.jurisdiction.cmp(&b.jurisdiction));
        let count = |pred: fn(&OutcomeStatus) -> bool| outcomes.iter().filter(|o| pred(&o.status)).count();
        let processed = count(|s| matches!(s, OutcomeStatus::Processed { .. }));
        let skipped_already_processed = count(|s| {
            matches!(s, OutcomeStatus::Skipped { reason: SkipReason::AlreadyProcessed })
        });
        let skipped_missing_source = count(|s| {
            matches!(s, OutcomeStatus::Skipped { reason: SkipReason::MissingSource })
        });
        let failed = count(|s| matches!(s, OutcomeStatus::Failed { .. }));
        Self {
            corpus,
            input_dir: settings.input_dir.clone(),
            output_dir: settings.output_dir.clone(),
            started_at,
            finished_at: Utc::now(),
            processed,
            skipped_already_processed,
            skipped_missing_source,
            failed,
            outcomes,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped_already_processed + self.skipped_missing_source
    }

    pub fn outcome(&self, jurisdiction: &str) -> Option<&JurisdictionOutcome> {
        self.outcomes.iter().find(|o| o.jurisdiction == jurisdiction)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Drives extraction of one corpus over every jurisdiction under its input root.
pub struct Orchestrator {
    corpus: &'static Corpus,
    settings: Arc<ExtractionConfig>,
}

impl Orchestrator {
    pub fn new(corpus: &'static Corpus, settings: ExtractionConfig) -> Self {
        Self {
            corpus,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &ExtractionConfig {
        &self.settings
    }

    /// Output directory of one jurisdiction.
    pub fn output_dir_of(&self, jurisdiction: &str) -> PathBuf {
        self.settings.output_dir.join(jurisdiction)
    }

    /// Whether the primary relation of `jurisdiction` already exists and no
    /// override forces reprocessing.
    pub fn should_skip(&self, jurisdiction: &str) -> bool {
        let forced = self
            .settings
            .force_reprocess
            .iter()
            .any(|name| name == jurisdiction);
        !forced
            && self
                .output_dir_of(jurisdiction)
                .join(self.corpus.primary_file())
                .exists()
    }

    /// Decide whether a discovered jurisdiction gets a worker. Returns its
    /// source file, or the outcome recorded without running it.
    fn triage(
        &self,
        name: String,
        source: SourceLookup,
    ) -> std::result::Result<PathBuf, JurisdictionOutcome> {
        let status = match source {
            SourceLookup::Unreadable(error) => {
                tracing::error!(jurisdiction = %name, error = %error, "Jurisdiction directory unreadable");
                OutcomeStatus::Failed { error }
            }
            SourceLookup::Missing => {
                tracing::warn!(jurisdiction = %name, "No source file found, skipping");
                OutcomeStatus::Skipped {
                    reason: SkipReason::MissingSource,
                }
            }
            SourceLookup::Found(_) if self.should_skip(&name) => {
                tracing::info!(jurisdiction = %name, "Already processed, skipping");
                OutcomeStatus::Skipped {
                    reason: SkipReason::AlreadyProcessed,
                }
            }
            SourceLookup::Found(path) => return Ok(path),
        };
        Err(JurisdictionOutcome {
            jurisdiction: name,
            status,
        })
    }

    /// Run every jurisdiction and summarize.
    ///
    /// Fails only when the input root is missing; per-jurisdiction failures
    /// are reported in the summary.
    pub async fn run(&self) -> Result<RunSummary> {
        let started_at = Utc::now();
        let jurisdictions = self.settings.layout.discover(&self.settings.input_dir)?;
        let workers = self.settings.effective_workers();
        tracing::info!(
            corpus = %self.corpus.kind,
            jurisdictions = jurisdictions.len(),
            workers,
            input = %self.settings.input_dir.display(),
            "Starting extraction run"
        );

        let semaphore = Arc::new(tokio::sync::Semaphore::new(workers));
        let mut outcomes = Vec::new();
        let mut handles = Vec::new();

        for Jurisdiction { name, source } in jurisdictions {
            let source = match self.triage(name.clone(), source) {
                Ok(source) => source,
                Err(outcome) => {
                    outcomes.push(outcome);
                    continue;
                }
            };

            let corpus = self.corpus;
            let out_dir = self.output_dir_of(&name);
            let sem = semaphore.clone();
            let handle = tokio::spawn(async move {
                let _permit = sem.acquire_owned().await;
                let job_name = name.clone();
                let joined = tokio::task::spawn_blocking(move || {
                    process_jurisdiction(corpus, &job_name, &source, &out_dir)
                })
                .await;
                let status = match joined {
                    Ok(Ok(status)) => status,
                    Ok(Err(err)) => {
                        tracing::error!(jurisdiction = %name, error = %err, "Jurisdiction failed");
                        OutcomeStatus::Failed {
                            error: err.to_string(),
                        }
                    }
                    Err(join_err) => {
                        let err = OutputError::WorkerAborted {
                            jurisdiction: name.clone(),
                            message: join_err.to_string(),
                        };
                        tracing::error!(jurisdiction = %name, error = %err, "Worker aborted");
                        OutcomeStatus::Failed {
                            error: err.to_string(),
                        }
                    }
                };
                JurisdictionOutcome {
                    jurisdiction: name,
                    status,
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => tracing::error!(error = %err, "Extraction task did not complete"),
            }
        }

        let summary = RunSummary::new(self.corpus.kind, &self.settings, started_at, outcomes);
        tracing::info!(
            corpus = %summary.corpus,
            processed = summary.processed,
            skipped = summary.skipped(),
            failed = summary.failed,
            "Extraction run complete"
        );
        Ok(summary)
    }
}

/// Load, extract and materialize one jurisdiction.
///
/// Non-empty relations are written to `out_dir`, primary relation last.
pub fn process_jurisdiction(
    corpus: &Corpus,
    jurisdiction: &str,
    source: &Path,
    out_dir: &Path,
) -> Result<OutcomeStatus> {
    tracing::info!(jurisdiction, source = %source.display(), "Loading source");
    let entries = load_records(source)?;
    let extraction = extract_batch(corpus, &entries, jurisdiction);
    drop(entries);
    if extraction.skipped_entries > 0 {
        tracing::warn!(
            jurisdiction,
            skipped = extraction.skipped_entries,
            "Skipped top-level entries that are not records"
        );
    }

    std::fs::create_dir_all(out_dir).map_err(|source| OutputError::CreateDir {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut rows = BTreeMap::new();
    let (primary, others): (Vec<_>, Vec<_>) = extraction
        .relations
        .iter()
        .partition(|batch| batch.name == corpus.primary);
    for batch in others.into_iter().chain(primary) {
        if batch.is_empty() {
            continue;
        }
        let path = out_dir.join(format!("{}.csv", batch.name));
        csv::write_atomic(&path, &csv::render(&batch.columns, &batch.rows))?;
        tracing::debug!(jurisdiction, relation = batch.name, rows = batch.row_count(), "Wrote relation");
        rows.insert(batch.name.to_string(), batch.row_count());
    }

    tracing::info!(
        jurisdiction,
        records = extraction.records,
        relations = rows.len(),
        "Jurisdiction processed"
    );
    Ok(OutcomeStatus::Processed {
        source: source.to_path_buf(),
        records: extraction.records,
        skipped_entries: extraction.skipped_entries,
        rows,
    })
}

/// Read and parse one source file into its top-level entries.
///
/// Accepts a JSON array, or a mapping whose `results`, `releases` or `data`
/// member is an array.
pub fn load_records(path: &Path) -> std::result::Result<Vec<Value>, SourceError> {
    let text = std::fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let document: Value = serde_json::from_str(&text).map_err(|source| SourceError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    match document {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut map) => WRAPPER_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(entries)) => Some(entries),
                _ => None,
            })
            .ok_or_else(|| SourceError::Shape {
                path: path.to_path_buf(),
                found: "object without a record array".into(),
            }),
        other => Err(SourceError::Shape {
            path: path.to_path_buf(),
            found: kind_of(&other).into(),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
