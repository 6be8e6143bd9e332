//! Income rejection rules.
//!
//! A rule set is an ordered list of predicates over numeric fields; the first
//! matching rule gives the rejection reason. Rules are plain data so they can
//! be replaced from configuration without touching the partitioner.

use serde::{Deserialize, Serialize};

/// Status label written for rows that match no rule.
pub const CLEAN_LABEL: &str = "OK";

/// Comparison against a fixed threshold. A missing (null) value never matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    LessThan { field: String, threshold: f64 },
    GreaterThan { field: String, threshold: f64 },
}

impl Predicate {
    pub fn field(&self) -> &str {
        match self {
            Predicate::LessThan { field, .. } | Predicate::GreaterThan { field, .. } => field,
        }
    }

    pub fn threshold(&self) -> f64 {
        match self {
            Predicate::LessThan { threshold, .. } | Predicate::GreaterThan { threshold, .. } => {
                *threshold
            }
        }
    }

    pub fn matches(&self, value: Option<f64>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match self {
            Predicate::LessThan { threshold, .. } => value < *threshold,
            Predicate::GreaterThan { threshold, .. } => value > *threshold,
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::LessThan { field, threshold } => write!(f, "{field} < {threshold}"),
            Predicate::GreaterThan { field, threshold } => write!(f, "{field} > {threshold}"),
        }
    }
}

/// One predicate plus the reason recorded when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionRule {
    #[serde(flatten)]
    pub predicate: Predicate,
    pub reason: String,
}

impl RejectionRule {
    pub fn less_than(field: &str, threshold: f64, reason: &str) -> Self {
        Self {
            predicate: Predicate::LessThan {
                field: field.into(),
                threshold,
            },
            reason: reason.into(),
        }
    }

    pub fn greater_than(field: &str, threshold: f64, reason: &str) -> Self {
        Self {
            predicate: Predicate::GreaterThan {
                field: field.into(),
                threshold,
            },
            reason: reason.into(),
        }
    }
}

/// Classification of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict<'a> {
    Clean,
    Rejected(&'a str),
}

impl Verdict<'_> {
    pub fn label(&self) -> &str {
        match self {
            Verdict::Clean => CLEAN_LABEL,
            Verdict::Rejected(reason) => reason,
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, Verdict::Clean)
    }
}

/// Ordered rule list. Earlier rules take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<RejectionRule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(vec![
            RejectionRule::less_than("ingreso_anual_neto", 0.0, "negative annual income"),
            RejectionRule::less_than("ingreso_mensual_neto", 0.0, "negative monthly income"),
            RejectionRule::less_than("remuneracion_mensual_cargo", 0.0, "negative compensation"),
            RejectionRule::less_than("otros_ingresos_mensuales", 0.0, "negative other income"),
            RejectionRule::greater_than("ingreso_anual_neto", 500_000_000.0, "extreme annual outlier"),
            RejectionRule::greater_than("ingreso_mensual_neto", 50_000_000.0, "extreme monthly outlier"),
        ])
    }
}

impl RuleSet {
    pub fn new(rules: Vec<RejectionRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[RejectionRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Fields the rules read, in first-use order without duplicates.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for rule in &self.rules {
            let field = rule.predicate.field();
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }

    /// Check the rule list, returning one message per problem.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.rules.is_empty() {
            problems.push("quality.rules must contain at least one rule".to_string());
        }
        for (idx, rule) in self.rules.iter().enumerate() {
            let reason = rule.reason.trim();
            if reason.is_empty() {
                problems.push(format!("quality.rules[{idx}] has an empty reason"));
            } else if reason == CLEAN_LABEL {
                problems.push(format!(
                    "quality.rules[{idx}] uses the reserved reason '{CLEAN_LABEL}'"
                ));
            }
            if rule.predicate.field().trim().is_empty() {
                problems.push(format!("quality.rules[{idx}] has an empty field"));
            }
            if !rule.predicate.threshold().is_finite() {
                problems.push(format!("quality.rules[{idx}] threshold must be finite"));
            }
        }
        problems
    }

    /// Classify one row. `value_of` returns the coerced numeric value of a
    /// field, or `None` when it is missing or non-numeric.
    pub fn classify<F>(&self, value_of: F) -> Verdict<'_>
    where
        F: Fn(&str) -> Option<f64>,
    {
        self.rules
            .iter()
            .find(|rule| rule.predicate.matches(value_of(rule.predicate.field())))
            .map_or(Verdict::Clean, |rule| Verdict::Rejected(&rule.reason))
    }
}

/// Numeric coercion for CSV cells: surrounding whitespace is ignored, and an
/// empty or non-numeric cell becomes `None`.
pub fn coerce_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| !v.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn classify<'a>(rules: &'a RuleSet, row: &HashMap<String, String>) -> Verdict<'a> {
        rules.classify(|field| row.get(field).and_then(|v| coerce_number(v)))
    }

    #[test]
    fn test_default_rules_in_order() {
        let rules = RuleSet::default();
        assert_eq!(rules.rules().len(), 6);
        assert_eq!(
            rules.fields(),
            vec![
                "ingreso_anual_neto",
                "ingreso_mensual_neto",
                "remuneracion_mensual_cargo",
                "otros_ingresos_mensuales"
            ]
        );
        assert!(rules.validate().is_empty());
    }

    #[test]
    fn test_clean_row() {
        let rules = RuleSet::default();
        let r = row(&[("ingreso_anual_neto", "540000"), ("ingreso_mensual_neto", "45000")]);
        assert_eq!(classify(&rules, &r), Verdict::Clean);
        assert_eq!(classify(&rules, &r).label(), "OK");
    }

    #[test]
    fn test_earliest_rule_wins() {
        let rules = RuleSet::default();
        let r = row(&[
            ("ingreso_anual_neto", "600000000"),
            ("ingreso_mensual_neto", "-1"),
        ]);
        assert_eq!(classify(&rules, &r), Verdict::Rejected("negative monthly income"));

        let r = row(&[("ingreso_anual_neto", "-500"), ("remuneracion_mensual_cargo", "-3")]);
        assert_eq!(classify(&rules, &r).label(), "negative annual income");
    }

    #[test]
    fn test_boundaries_are_strict() {
        let rules = RuleSet::default();
        let r = row(&[("ingreso_anual_neto", "500000000"), ("ingreso_mensual_neto", "0")]);
        assert!(classify(&rules, &r).is_clean());
        let r = row(&[("ingreso_mensual_neto", "50000000.01")]);
        assert_eq!(classify(&rules, &r).label(), "extreme monthly outlier");
    }

    #[test]
    fn test_null_never_matches() {
        let rules = RuleSet::default();
        let r = row(&[("ingreso_anual_neto", "n/a"), ("ingreso_mensual_neto", "")]);
        assert!(classify(&rules, &r).is_clean());
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number(" -500 "), Some(-500.0));
        assert_eq!(coerce_number("1e3"), Some(1000.0));
        assert_eq!(coerce_number("12.50"), Some(12.5));
        assert_eq!(coerce_number(""), None);
        assert_eq!(coerce_number("NaN"), None);
        assert_eq!(coerce_number("$100"), None);
    }

    #[test]
    fn test_validate_rejects_bad_rules() {
        let rules = RuleSet::new(vec![
            RejectionRule::less_than("x", f64::INFINITY, "OK"),
            RejectionRule::greater_than("", 1.0, "  "),
        ]);
        let problems = rules.validate();
        assert_eq!(problems.len(), 4);
        assert!(problems[0].contains("reserved"));
        assert!(RuleSet::new(Vec::new()).validate()[0].contains("at least one"));
    }

    #[test]
    fn test_rule_serde_shape() {
        let rule = RejectionRule::less_than("ingreso_anual_neto", 0.0, "negative annual income");
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["op"], "less_than");
        assert_eq!(json["field"], "ingreso_anual_neto");

        let parsed: RejectionRule = toml::from_str(
            "op = \"greater_than\"\nfield = \"ingreso_mensual_neto\"\nthreshold = 1000.0\nreason = \"too high\"\n",
        )
        .unwrap();
        assert_eq!(parsed, RejectionRule::greater_than("ingreso_mensual_neto", 1000.0, "too high"));
    }
}
