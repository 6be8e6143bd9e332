//! Exploratory statistics over the unioned income relation.
//!
//! Read-only: nothing here feeds the clean/audit partition. The `Q3 + k*IQR`
//! bound is reported for inspection only.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::{ProfileConfig, QualityConfig};
use crate::error::Result;
use crate::quality::{coerce_number, source};

const ANNUAL_FIELD: &str = "ingreso_anual_neto";
const MONTHLY_FIELD: &str = "ingreso_mensual_neto";
const ID_FIELD: &str = "id";

/// Summary statistics of one numeric field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldProfile {
    pub field: String,
    /// Whether any input file carries the column.
    pub present: bool,
    pub non_null: usize,
    pub negatives: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub q1: Option<f64>,
    pub q3: Option<f64>,
    pub upper_bound: Option<f64>,
    pub above_upper_bound: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JurisdictionCount {
    pub jurisdiction: String,
    pub rows: usize,
}

/// One of the highest annual incomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopIncome {
    pub id: String,
    pub jurisdiction: String,
    pub origin: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeProfile {
    pub files: usize,
    pub rows: usize,
    pub iqr_multiplier: f64,
    pub fields: Vec<FieldProfile>,
    /// Rows with `0 < annual < monthly`.
    pub annual_below_monthly: usize,
    /// Descending by rows, ties by name.
    pub per_jurisdiction: Vec<JurisdictionCount>,
    pub top_annual: Vec<TopIncome>,
}

/// Linear-interpolation quantile of an ascending slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

fn profile_field(field: &str, present: bool, mut values: Vec<f64>, k: f64) -> FieldProfile {
    values.sort_by(f64::total_cmp);
    let q1 = quantile(&values, 0.25);
    let q3 = quantile(&values, 0.75);
    let upper_bound = q1.zip(q3).map(|(q1, q3)| q3 + k * (q3 - q1));
    let above_upper_bound = upper_bound.map_or(0, |bound| values.iter().filter(|v| **v > bound).count());
    let mean = (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64);
    FieldProfile {
        field: field.to_string(),
        present,
        non_null: values.len(),
        negatives: values.iter().filter(|v| **v < 0.0).count(),
        min: values.first().copied(),
        max: values.last().copied(),
        mean,
        q1,
        q3,
        upper_bound,
        above_upper_bound,
    }
}

/// Profile the income relation found under `quality.input_dir`.
pub fn profile(quality: &QualityConfig, settings: &ProfileConfig) -> Result<IncomeProfile> {
    let files = source::discover(&quality.input_dir, &quality.relation_file)?;
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); settings.fields.len()];
    let mut present = vec![false; settings.fields.len()];
    let mut per_jurisdiction: BTreeMap<String, usize> = BTreeMap::new();
    let mut annual_below_monthly = 0;
    let mut top: Vec<TopIncome> = Vec::new();
    let mut rows = 0;

    for file in &files {
        let table = file.load()?;
        let field_idx: Vec<Option<usize>> = settings
            .fields
            .iter()
            .map(|f| table.column_index(f))
            .collect();
        for (seen, idx) in present.iter_mut().zip(&field_idx) {
            *seen |= idx.is_some();
        }
        let annual_idx = table.column_index(ANNUAL_FIELD);
        let monthly_idx = table.column_index(MONTHLY_FIELD);
        let id_idx = table.column_index(ID_FIELD);
        let origin = file.origin();

        for row in &table.rows {
            let number = |idx: Option<usize>| idx.and_then(|i| coerce_number(&row[i]));
            for (bucket, idx) in values.iter_mut().zip(&field_idx) {
                if let Some(v) = number(*idx) {
                    bucket.push(v);
                }
            }
            let annual = number(annual_idx);
            if let (Some(a), Some(m)) = (annual, number(monthly_idx))
                && a > 0.0
                && a < m
            {
                annual_below_monthly += 1;
            }
            if let Some(value) = annual {
                top.push(TopIncome {
                    id: id_idx.map(|i| row[i].clone()).unwrap_or_default(),
                    jurisdiction: file.jurisdiction.clone(),
                    origin: origin.clone(),
                    value,
                });
                if top.len() > settings.top_n.saturating_mul(4).max(64) {
                    keep_top(&mut top, settings.top_n);
                }
            }
        }
        *per_jurisdiction.entry(file.jurisdiction.clone()).or_default() += table.rows.len();
        rows += table.rows.len();
    }
    keep_top(&mut top, settings.top_n);

    let fields = settings
        .fields
        .iter()
        .zip(values)
        .zip(present)
        .map(|((field, vals), present)| profile_field(field, present, vals, settings.iqr_multiplier))
        .collect();
    let mut per_jurisdiction: Vec<JurisdictionCount> = per_jurisdiction
        .into_iter()
        .map(|(jurisdiction, rows)| JurisdictionCount { jurisdiction, rows })
        .collect();
    per_jurisdiction.sort_by(|a, b| b.rows.cmp(&a.rows).then_with(|| a.jurisdiction.cmp(&b.jurisdiction)));

    tracing::info!(files = files.len(), rows, "Income profile computed");
    Ok(IncomeProfile {
        files: files.len(),
        rows,
        iqr_multiplier: settings.iqr_multiplier,
        fields,
        annual_below_monthly,
        per_jurisdiction,
        top_annual: top,
    })
}

fn keep_top(top: &mut Vec<TopIncome>, n: usize) {
    top.sort_by(|a, b| b.value.total_cmp(&a.value));
    top.truncate(n);
}
