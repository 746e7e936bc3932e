//! Combiner: joins source/target result tables on the agreed key set and
//! produces one report row per configured metric per observed key tuple.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Map as JsonMap;

use crate::config::ValidationStatus;
use crate::engine::{Row, TabularResult};
use crate::expr::Scalar;
use crate::metadata::{Metric, MetricDescriptor, RunMetadata};
use crate::registry::{ComparisonKind, MetricRegistry};

fn row_key(row: &Row, aliases: &[String]) -> Vec<Scalar> {
    aliases
        .iter()
        .map(|alias| row.get(alias).cloned().unwrap_or(Scalar::Null))
        .collect()
}

/// `target - source` and the percent-difference rule from the combiner
/// contract, in one pass so both share the same equality judgement.
fn numeric_diff(source: &Scalar, target: &Scalar) -> (Option<f64>, Option<f64>, bool) {
    let s = source.as_f64();
    let t = target.as_f64();

    let values_equal = match (source, target) {
        (Scalar::Null, Scalar::Null) => true,
        _ => match (s, t) {
            (Some(sv), Some(tv)) => sv == tv,
            _ => !source.is_null() && !target.is_null() && source.to_string() == target.to_string(),
        },
    };

    if values_equal {
        return (Some(0.0), Some(0.0), true);
    }

    let difference = match (s, t) {
        (Some(sv), Some(tv)) => Some(tv - sv),
        _ => None,
    };

    let pct_difference = match (source.is_null(), target.is_null()) {
        (true, false) => Some(100.0),
        (false, true) => Some(-100.0),
        _ => match (s, t) {
            (Some(sv), Some(tv)) => {
                if sv == 0.0 {
                    if tv > 0.0 {
                        Some(100.0)
                    } else if tv < 0.0 {
                        Some(-100.0)
                    } else {
                        Some(0.0)
                    }
                } else {
                    Some(100.0 * (tv - sv) / sv.abs())
                }
            }
            _ => None,
        },
    };

    (difference, pct_difference, false)
}

#[allow(clippy::too_many_arguments)]
pub fn combine(
    run_meta: &RunMetadata,
    registry: &MetricRegistry,
    descriptors: &[MetricDescriptor],
    source_table: Option<(String, String)>,
    target_table: Option<(String, String)>,
    join_keys: &[String],
    source: &TabularResult,
    target: &TabularResult,
    is_value_comparison: bool,
    pct_threshold: f64,
    filter_status: &HashSet<ValidationStatus>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Vec<Metric> {
    let source_table_name = source_table.map(|(s, t)| format!("{s}.{t}"));
    let target_table_name = target_table.map(|(s, t)| format!("{s}.{t}"));

    // Full outer join: every key seen on either side gets an entry, keyed
    // by its stringified scalar tuple so `Scalar` does not need `Hash`.
    let mut joined: IndexMap<Vec<String>, (Vec<Scalar>, Option<Row>, Option<Row>)> = IndexMap::new();

    for row in &source.rows {
        let key = row_key(row, join_keys);
        let key_str: Vec<String> = key.iter().map(ToString::to_string).collect();
        let entry = joined
            .entry(key_str)
            .or_insert_with(|| (key, None, None));
        entry.1 = Some(row.clone());
    }
    for row in &target.rows {
        let key = row_key(row, join_keys);
        let key_str: Vec<String> = key.iter().map(ToString::to_string).collect();
        let entry = joined
            .entry(key_str)
            .or_insert_with(|| (key, None, None));
        entry.2 = Some(row.clone());
    }

    let mut report = Vec::with_capacity(joined.len() * descriptors.len());
    for (key, source_row, target_row) in joined.values() {
        let mut group_by_columns = JsonMap::new();
        for (alias, value) in join_keys.iter().zip(key.iter()) {
            group_by_columns.insert(alias.clone(), value.to_json());
        }

        for descriptor in descriptors {
            let source_value = source_row
                .as_ref()
                .and_then(|r| r.get(&descriptor.alias).cloned())
                .unwrap_or(Scalar::Null);
            let target_value = target_row
                .as_ref()
                .and_then(|r| r.get(&descriptor.alias).cloned())
                .unwrap_or(Scalar::Null);

            let (difference, pct_difference, values_equal) = numeric_diff(&source_value, &target_value);

            // The registry decides, per metric, whether a non-numeric kind
            // (string/custom) should be judged by direct equality rather
            // than the percent-difference threshold; row-validation mode
            // forces equality judgement for every metric regardless.
            let comparison = registry
                .aggregate(&descriptor.aggregate_kind)
                .map(|e| e.comparison)
                .unwrap_or(ComparisonKind::Numeric);
            let judge_by_equality = is_value_comparison || comparison != ComparisonKind::Numeric;

            let metric = Metric::new(
                run_meta,
                descriptor,
                source_table_name.clone(),
                target_table_name.clone(),
                source_value,
                target_value,
                difference,
                pct_difference,
                pct_threshold,
                group_by_columns.clone(),
                start_time,
                end_time,
            );

            let metric = if judge_by_equality {
                metric.with_status(if values_equal {
                    ValidationStatus::Success
                } else {
                    ValidationStatus::Fail
                })
            } else {
                metric
            };

            if filter_status.is_empty() || filter_status.contains(&metric.validation_status) {
                report.push(metric);
            }
        }
    }

    report
}
