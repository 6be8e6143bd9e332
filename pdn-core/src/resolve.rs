//! Value resolution over schema-inconsistent JSON.
//!
//! Declarations drift across years and jurisdictions: values appear either as
//! `{"valor": X}` or as raw `X`, collections are renamed (singular vs plural),
//! and a collection is sometimes flattened to a single object. Every accessor
//! here degrades a type mismatch to "missing" and never fails, so one malformed
//! sub-path cannot take down the rest of a record.

use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Member name used by wrapped values.
pub const WRAPPED_VALUE_KEY: &str = "valor";

/// Separator used when a multi-valued field is flattened into one cell.
pub const JOIN_SEPARATOR: &str = ", ";

static EMPTY_MAPPING: LazyLock<Value> = LazyLock::new(|| Value::Object(Map::new()));
static NULL: Value = Value::Null;

/// Shape of a JSON node as seen by the resolver.
#[derive(Debug, Clone, Copy)]
pub enum Shape<'a> {
    Mapping(&'a Map<String, Value>),
    Sequence(&'a [Value]),
    Scalar(&'a Value),
    Missing,
}

impl<'a> Shape<'a> {
    /// Classify an optional node. `null` counts as missing.
    pub fn of(node: Option<&'a Value>) -> Self {
        match node {
            None | Some(Value::Null) => Shape::Missing,
            Some(Value::Object(map)) => Shape::Mapping(map),
            Some(Value::Array(items)) => Shape::Sequence(items),
            Some(other) => Shape::Scalar(other),
        }
    }

    /// Member `key` of a mapping; anything else has no members.
    pub fn member(container: &'a Value, key: &str) -> Self {
        match container {
            Value::Object(map) => Shape::of(map.get(key)),
            _ => Shape::Missing,
        }
    }
}

/// The shared empty mapping substituted for missing or mistyped sections.
pub fn empty_mapping() -> &'static Value {
    &EMPTY_MAPPING
}

/// Resolve `key` in `container`, unwrapping `{"valor": X}` when present.
///
/// Returns `Value::Null` when the container is not a mapping, the key is
/// absent, or the wrapper has no `valor`.
pub fn value(container: &Value, key: &str) -> Value {
    value_or(container, key, Value::Null)
}

/// Like [`value`], with a caller-supplied default.
pub fn value_or(container: &Value, key: &str, default: Value) -> Value {
    match Shape::member(container, key) {
        Shape::Mapping(wrapper) => match wrapper.get(WRAPPED_VALUE_KEY) {
            Some(inner) if !inner.is_null() => inner.clone(),
            _ => default,
        },
        Shape::Sequence(_) | Shape::Scalar(_) => container
            .get(key)
            .cloned()
            .unwrap_or(default),
        Shape::Missing => default,
    }
}

/// Raw member `key`, without unwrapping. `Value::Null` when unavailable.
pub fn field(container: &Value, key: &str) -> Value {
    match container {
        Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Member `key` if it is a mapping, otherwise the empty mapping.
pub fn child<'a>(container: &'a Value, key: &str) -> &'a Value {
    match container {
        Value::Object(map) => match map.get(key) {
            Some(node @ Value::Object(_)) => node,
            _ => empty_mapping(),
        },
        _ => empty_mapping(),
    }
}

/// Member `key` as a mapping, taking the first element when the source
/// stores a one-or-many section as a sequence.
pub fn first_mapping<'a>(container: &'a Value, key: &str) -> &'a Value {
    match Shape::member(container, key) {
        Shape::Sequence(items) => match items.first() {
            Some(node @ Value::Object(_)) => node,
            _ => empty_mapping(),
        },
        Shape::Mapping(_) => child(container, key),
        Shape::Scalar(_) | Shape::Missing => empty_mapping(),
    }
}

/// The first candidate member of `container` holding a non-empty value,
/// untyped. `Value::Null` when none does.
pub fn select<'a>(container: &'a Value, candidates: &[&str]) -> &'a Value {
    candidates
        .iter()
        .filter_map(|key| container.get(*key))
        .find(|candidate| is_truthy(candidate))
        .unwrap_or(&NULL)
}

/// Walk a fixed navigation path from `root`.
///
/// Each hop lists candidate member names and goes through [`select`]. A hop
/// that lands on anything but a mapping yields the empty mapping, which every
/// later hop passes through unchanged.
pub fn descend<'a>(root: &'a Value, path: &[&[&str]]) -> &'a Value {
    path.iter().fold(root, |node, hop| match select(node, hop) {
        found @ Value::Object(_) => found,
        _ => empty_mapping(),
    })
}

/// Resolve a collection through an ordered list of candidate keys.
///
/// 1. A container that already is a sequence is returned as is.
/// 2. The first candidate holding a sequence wins; a candidate holding a
///    single mapping is treated as a one-element sequence.
/// 3. Otherwise the first sequence among all members (document order).
/// 4. Otherwise empty.
pub fn collection<'a>(container: &'a Value, candidates: &[&str]) -> &'a [Value] {
    let map = match container {
        Value::Array(items) => return items,
        Value::Object(map) => map,
        _ => return &[],
    };

    for key in candidates {
        match map.get(*key) {
            Some(Value::Array(items)) => return items,
            Some(single @ Value::Object(_)) => return std::slice::from_ref(single),
            _ => {}
        }
    }

    map.values()
        .find_map(|member| match member {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        })
        .unwrap_or(&[])
}

/// Join a multi-valued member into one delimited string cell.
///
/// Sequence elements that are mappings contribute their (possibly wrapped)
/// `member`; string elements contribute themselves; everything else is dropped.
/// A single mapping is treated as a one-element sequence and a bare string is
/// kept verbatim.
pub fn join_members(container: &Value, key: &str, member: &str) -> Value {
    let parts: Vec<String> = match Shape::member(container, key) {
        Shape::Sequence(items) => items
            .iter()
            .filter_map(|item| element_text(item, member))
            .collect(),
        Shape::Mapping(_) => container
            .get(key)
            .and_then(|single| element_text(single, member))
            .into_iter()
            .collect(),
        Shape::Scalar(Value::String(text)) => vec![text.clone()],
        Shape::Scalar(_) | Shape::Missing => Vec::new(),
    };
    Value::String(parts.join(JOIN_SEPARATOR))
}

fn element_text(element: &Value, member: &str) -> Option<String> {
    match element {
        Value::Object(_) => match value(element, member) {
            Value::String(text) => Some(text),
            Value::Null => None,
            other => Some(other.to_string()),
        },
        Value::String(text) => Some(text.clone()),
        _ => None,
    }
}

/// Names of the holders ("titular") of an asset, joined into one cell.
pub fn holders(item: &Value) -> Value {
    join_members(item, "titular", WRAPPED_VALUE_KEY)
}

/// Split a monetary member into `(amount, currency)`.
///
/// Declarations wrap money as `{"valor": 100, "moneda": "MXN"}`; OCDS uses
/// `{"amount": 100, "currency": "MXN"}`. A bare scalar is an amount with no
/// currency.
pub fn money(container: &Value, key: &str) -> (Value, Value) {
    match Shape::member(container, key) {
        Shape::Mapping(_) => {
            let node = child(container, key);
            let amount = first_non_null(node, &[WRAPPED_VALUE_KEY, "amount", "monto"]);
            let currency = match first_non_null(node, &["moneda", "currency"]) {
                Value::Object(_) => value(node, "moneda"),
                other => other,
            };
            (amount, currency)
        }
        Shape::Scalar(scalar) => (scalar.clone(), Value::Null),
        Shape::Sequence(_) | Shape::Missing => (Value::Null, Value::Null),
    }
}

/// First candidate member that holds a non-empty value.
pub fn first_present(container: &Value, keys: &[&str]) -> Value {
    keys.iter()
        .filter_map(|key| container.get(*key))
        .find(|candidate| is_truthy(candidate))
        .cloned()
        .unwrap_or(Value::Null)
}

/// First candidate member that is present and not `null`. Zero and empty
/// strings are kept.
pub fn first_non_null(container: &Value, keys: &[&str]) -> Value {
    keys.iter()
        .filter_map(|key| container.get(*key))
        .find(|candidate| !candidate.is_null())
        .cloned()
        .unwrap_or(Value::Null)
}

/// Truthiness of a source value: null, `false`, zero, and empty
/// strings/sequences/mappings are all "empty".
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
