//! Summary statistics for query results, laid out like a pandas `describe()`.
//!
//! When a table has numeric columns, only those are described, with count, mean,
//! sample std, min, quartiles and max. Otherwise every column is described as
//! categorical, with count, unique, top and freq. Nulls are skipped in both cases.

use std::collections::HashMap;

use serde::Serialize;

use crate::table::{CellValue, DataTable};

const NUMERIC_LABELS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];
const CATEGORICAL_LABELS: [&str; 4] = ["count", "unique", "top", "freq"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; undefined below two values.
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalStats {
    pub count: usize,
    pub unique: usize,
    pub top: Option<String>,
    pub freq: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnStats {
    Numeric(NumericStats),
    Categorical(CategoricalStats),
}

/// Described columns, in table order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Description {
    pub columns: Vec<String>,
    pub stats: Vec<ColumnStats>,
}

impl Description {
    pub fn is_numeric(&self) -> bool {
        matches!(self.stats.first(), Some(ColumnStats::Numeric(_)))
    }

    /// Header row for display: the statistic label column, then one per described column.
    pub fn headers(&self) -> Vec<String> {
        std::iter::once("statistic".to_string())
            .chain(self.columns.iter().cloned())
            .collect()
    }

    /// Body rows for display, one per statistic.
    pub fn rows(&self) -> Vec<Vec<String>> {
        let labels: &[&str] = if self.is_numeric() {
            &NUMERIC_LABELS
        } else {
            &CATEGORICAL_LABELS
        };

        labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                std::iter::once(label.to_string())
                    .chain(self.stats.iter().map(|s| stat_cell(s, i)))
                    .collect()
            })
            .collect()
    }
}

fn stat_cell(stats: &ColumnStats, index: usize) -> String {
    match stats {
        ColumnStats::Numeric(n) => {
            let value = match index {
                0 => Some(n.count as f64),
                1 => Some(n.mean),
                2 => n.std,
                3 => Some(n.min),
                4 => Some(n.q25),
                5 => Some(n.median),
                6 => Some(n.q75),
                _ => Some(n.max),
            };
            value.map(format_number).unwrap_or_else(|| "NaN".to_string())
        }
        ColumnStats::Categorical(c) => match index {
            0 => c.count.to_string(),
            1 => c.unique.to_string(),
            2 => c.top.clone().unwrap_or_else(|| "NaN".to_string()),
            _ => c.freq.map(|f| f.to_string()).unwrap_or_else(|| "NaN".to_string()),
        },
    }
}

/// Up to six decimals, trailing zeros dropped.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let formatted = format!("{value:.6}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Describe a table. Returns `None` when there is nothing to describe.
pub fn describe(table: &DataTable) -> Option<Description> {
    if table.columns.is_empty() || table.is_empty() {
        return None;
    }

    let numeric: Vec<(usize, Vec<f64>)> = (0..table.columns.len())
        .filter_map(|i| numeric_values(table, i).map(|values| (i, values)))
        .collect();

    let (columns, stats) = if numeric.is_empty() {
        (0..table.columns.len())
            .map(|i| {
                (
                    table.columns[i].clone(),
                    ColumnStats::Categorical(categorical_stats(table, i)),
                )
            })
            .unzip()
    } else {
        numeric
            .into_iter()
            .map(|(i, values)| {
                (
                    table.columns[i].clone(),
                    ColumnStats::Numeric(numeric_stats(values)),
                )
            })
            .unzip()
    };

    Some(Description { columns, stats })
}

/// Non-null values of a column, if it holds at least one and all of them are numbers.
fn numeric_values(table: &DataTable, index: usize) -> Option<Vec<f64>> {
    let mut values = Vec::new();
    for cell in table.column(index).filter(|c| !c.is_null()) {
        values.push(cell.as_f64()?);
    }
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn numeric_stats(mut values: Vec<f64>) -> NumericStats {
    values.sort_by(|a, b| a.total_cmp(b));
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let std = (count > 1).then(|| {
        let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (sum_sq / (count - 1) as f64).sqrt()
    });

    NumericStats {
        count,
        mean,
        std,
        min: values[0],
        q25: quantile(&values, 0.25),
        median: quantile(&values, 0.5),
        q75: quantile(&values, 0.75),
        max: values[count - 1],
    }
}

/// Linear interpolation between closest ranks. `sorted` must be non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn categorical_stats(table: &DataTable, index: usize) -> CategoricalStats {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen: Vec<String> = Vec::new();
    let mut count = 0;

    for cell in table.column(index) {
        if let CellValue::Null = cell {
            continue;
        }
        count += 1;
        let key = cell.to_string();
        let entry = counts.entry(key.clone()).or_insert(0);
        if *entry == 0 {
            first_seen.push(key);
        }
        *entry += 1;
    }

    // Ties go to the value seen first.
    let mut top: Option<(&String, usize)> = None;
    for value in &first_seen {
        let n = counts[value];
        if top.map_or(true, |(_, best)| n > best) {
            top = Some((value, n));
        }
    }

    CategoricalStats {
        count,
        unique: counts.len(),
        top: top.map(|(v, _)| v.clone()),
        freq: top.map(|(_, n)| n),
    }
}
