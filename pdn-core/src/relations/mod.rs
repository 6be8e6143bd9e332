//! Relation extraction: one nested source record → rows in many flat relations.
//!
//! Each corpus is a declarative table of [`RelationDef`] entries (name, scope,
//! navigation path, columns, row mapping) consumed by one generic row builder.
//! Adding a relation is a new table entry, not new traversal code.

pub mod declarations;
pub mod procurement;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resolve::{self, collection, descend, field, is_truthy};

pub use declarations::DECLARATIONS;
pub use procurement::PROCUREMENT;

/// Column holding the jurisdiction on every relation.
pub const JURISDICTION_COLUMN: &str = "state";

/// Column holding the item ordinal on item-scoped relations.
pub const ITEM_INDEX_COLUMN: &str = "item_index";

/// A navigation path: one entry per hop, each hop listing candidate keys.
pub type NavPath = &'static [&'static [&'static str]];

/// Maps a source node to the relation's non-key cells, in column order.
pub type RowFn = fn(&Value) -> Vec<Value>;

/// How many rows a relation yields per source record.
pub enum Scope {
    /// Exactly one row per record; the row function receives the record root.
    Record,
    /// Zero or one row per record, from the optional mapping at `path`.
    /// No row when the mapping is empty or its `skip_flag` member is truthy.
    Section {
        path: NavPath,
        skip_flag: Option<&'static str>,
    },
    /// One row per mapping element of the collection at `path`, resolved
    /// through `candidates`.
    Items {
        path: NavPath,
        candidates: &'static [&'static str],
    },
}

/// Declarative description of one output relation.
pub struct RelationDef {
    pub name: &'static str,
    pub scope: Scope,
    pub columns: &'static [&'static str],
    pub row: RowFn,
}

impl RelationDef {
    /// Output filename for this relation.
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name)
    }
}

/// Which family of source documents a corpus holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorpusKind {
    Declarations,
    Procurement,
}

impl std::fmt::Display for CorpusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorpusKind::Declarations => write!(f, "declarations"),
            CorpusKind::Procurement => write!(f, "procurement"),
        }
    }
}

/// A corpus: how records are identified and which relations they produce.
pub struct Corpus {
    pub kind: CorpusKind,
    /// Record member (and column) identifying a record.
    pub record_key: &'static str,
    /// Column carrying the parent record id on section/item relations.
    pub parent_key: &'static str,
    /// Relation whose file marks a jurisdiction as already materialized.
    pub primary: &'static str,
    pub relations: &'static [RelationDef],
}

impl Corpus {
    pub fn for_kind(kind: CorpusKind) -> &'static Corpus {
        match kind {
            CorpusKind::Declarations => &DECLARATIONS,
            CorpusKind::Procurement => &PROCUREMENT,
        }
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Filename of the primary relation.
    pub fn primary_file(&self) -> String {
        format!("{}.csv", self.primary)
    }

    /// Full column list of a relation, key columns first.
    pub fn columns_of(&self, def: &RelationDef) -> Vec<&'static str> {
        let mut columns = match def.scope {
            Scope::Record => vec![self.record_key, JURISDICTION_COLUMN],
            Scope::Section { .. } => vec![self.parent_key, JURISDICTION_COLUMN],
            Scope::Items { .. } => vec![self.parent_key, JURISDICTION_COLUMN, ITEM_INDEX_COLUMN],
        };
        columns.extend_from_slice(def.columns);
        columns
    }

    /// An empty relation set with one batch per relation, in table order.
    pub fn empty_set(&self) -> RelationSet {
        RelationSet {
            batches: self
                .relations
                .iter()
                .map(|def| RelationBatch {
                    name: def.name,
                    columns: self.columns_of(def),
                    rows: Vec::new(),
                })
                .collect(),
        }
    }
}

/// Rows of one relation.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationBatch {
    pub name: &'static str,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<Value>>,
}

impl RelationBatch {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell of `row` under `column`, if both exist.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| *c == column)?;
        self.rows.get(row)?.get(idx)
    }
}

/// Rows of every relation of a corpus, in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSet {
    pub batches: Vec<RelationBatch>,
}

impl RelationSet {
    pub fn get(&self, name: &str) -> Option<&RelationBatch> {
        self.batches.iter().find(|b| b.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelationBatch> {
        self.batches.iter()
    }

    pub fn total_rows(&self) -> usize {
        self.batches.iter().map(RelationBatch::row_count).sum()
    }
}

/// Result of extracting a whole jurisdiction batch.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub relations: RelationSet,
    /// Entries that were mappings and therefore records.
    pub records: usize,
    /// Top-level entries that were not mappings.
    pub skipped_entries: usize,
}

/// Extract every relation of `corpus` from a single source record.
pub fn extract_record(corpus: &Corpus, record: &Value, jurisdiction: &str) -> RelationSet {
    let mut set = corpus.empty_set();
    append_record(corpus, &mut set, record, jurisdiction);
    set
}

/// Extract every relation of `corpus` from all records of one jurisdiction.
///
/// Non-mapping entries are counted and skipped; they are not records.
pub fn extract_batch(corpus: &Corpus, entries: &[Value], jurisdiction: &str) -> Extraction {
    let mut set = corpus.empty_set();
    let mut records = 0;
    let mut skipped_entries = 0;
    for entry in entries {
        if entry.is_object() {
            append_record(corpus, &mut set, entry, jurisdiction);
            records += 1;
        } else {
            skipped_entries += 1;
        }
    }
    Extraction {
        relations: set,
        records,
        skipped_entries,
    }
}

fn append_record(corpus: &Corpus, set: &mut RelationSet, record: &Value, jurisdiction: &str) {
    let record_id = field(record, corpus.record_key);
    let state = Value::String(jurisdiction.to_string());

    for (def, batch) in corpus.relations.iter().zip(set.batches.iter_mut()) {
        match &def.scope {
            Scope::Record => {
                let cells = (def.row)(record);
                push_row(batch, def, vec![record_id.clone(), state.clone()], cells);
            }
            Scope::Section { path, skip_flag } => {
                let section = descend(record, path);
                let skipped = skip_flag.is_some_and(|flag| section.get(flag).is_some_and(is_truthy));
                if is_truthy(section) && !skipped {
                    let cells = (def.row)(section);
                    push_row(batch, def, vec![record_id.clone(), state.clone()], cells);
                }
            }
            Scope::Items { path, candidates } => {
                let (last, parents) = match path.split_last() {
                    Some(split) => split,
                    None => continue,
                };
                let container = resolve::select(descend(record, parents), last);
                for (index, item) in collection(container, candidates).iter().enumerate() {
                    if !item.is_object() {
                        continue;
                    }
                    let cells = (def.row)(item);
                    let key = vec![record_id.clone(), state.clone(), Value::from(index)];
                    push_row(batch, def, key, cells);
                }
            }
        }
    }
}

fn push_row(batch: &mut RelationBatch, def: &RelationDef, mut row: Vec<Value>, cells: Vec<Value>) {
    debug_assert_eq!(
        cells.len(),
        def.columns.len(),
        "row function for {} returned the wrong arity",
        def.name
    );
    row.extend(cells);
    batch.rows.push(row);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_relation_has_unique_name() {
        for corpus in [&DECLARATIONS, &PROCUREMENT] {
            let mut names: Vec<_> = corpus.relations.iter().map(|r| r.name).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), corpus.relations.len());
            assert!(corpus.relation(corpus.primary).is_some());
        }
    }

    #[test]
    fn test_row_arity_matches_columns_on_empty_record() {
        for corpus in [&DECLARATIONS, &PROCUREMENT] {
            for def in corpus.relations {
                assert_eq!((def.row)(&json!({})).len(), def.columns.len(), "{}", def.name);
            }
        }
    }

    #[test]
    fn test_key_columns() {
        let def = DECLARATIONS.relation("s1_vehiculos").unwrap();
        let columns = DECLARATIONS.columns_of(def);
        assert_eq!(&columns[..3], &["id_declaracion", "state", "item_index"]);
        let def = DECLARATIONS.relation("s1_ingresos").unwrap();
        assert_eq!(&DECLARATIONS.columns_of(def)[..2], &["id", "state"]);
    }

    #[test]
    fn test_extract_batch_skips_non_records() {
        let entries = vec![json!({"id": "a"}), json!("garbage"), json!(null), json!({"id": "b"})];
        let extraction = extract_batch(&DECLARATIONS, &entries, "Colima");
        assert_eq!(extraction.records, 2);
        assert_eq!(extraction.skipped_entries, 2);
        assert_eq!(extraction.relations.get("s1_resumen").unwrap().row_count(), 2);
        assert_eq!(extraction.relations.get("s1_ingresos").unwrap().row_count(), 2);
    }

    #[test]
    fn test_items_skip_non_mapping_elements_but_keep_ordinals() {
        let record = json!({
            "id": "d1",
            "declaracion": {"situacionPatrimonial": {"vehiculos": {"vehiculo": [
                {"marca": "NISSAN"}, "n/a", {"marca": "FORD"}
            ]}}}
        });
        let set = extract_record(&DECLARATIONS, &record, "Jalisco");
        let vehicles = set.get("s1_vehiculos").unwrap();
        assert_eq!(vehicles.row_count(), 2);
        assert_eq!(vehicles.cell(0, "item_index"), Some(&json!(0)));
        assert_eq!(vehicles.cell(1, "item_index"), Some(&json!(2)));
        assert_eq!(vehicles.cell(1, "marca"), Some(&json!("FORD")));
        assert_eq!(vehicles.cell(1, "id_declaracion"), Some(&json!("d1")));
    }

    #[test]
    fn test_section_skipped_when_flagged() {
        let record = json!({
            "id": "d1",
            "declaracion": {"situacionPatrimonial": {"datosPareja": {"ninguno": true}}}
        });
        let set = extract_record(&DECLARATIONS, &record, "Jalisco");
        assert!(set.get("s1_datos_pareja").unwrap().is_empty());
    }
}
