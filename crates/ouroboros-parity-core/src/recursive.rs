//! Recursive Row Validator: for row-level validation against large tables,
//! compares aggregate rollups at progressively finer group-by granularity,
//! descending only into groups where source and target disagree.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};

use crate::builder::ValidationBuilder;
use crate::combiner;
use crate::config::{ColumnAlias, FilterConfig, ValidationStatus};
use crate::engine::Engine;
use crate::error::Result;
use crate::executor;
use crate::expr::Scalar;
use crate::metadata::{Metric, RunMetadata};
use crate::registry::MetricRegistry;

/// Parameters threaded unchanged through every recursion frame.
pub struct RecursionContext<'a> {
    pub source: &'a Arc<dyn Engine>,
    pub target: &'a Arc<dyn Engine>,
    pub run_meta: &'a RunMetadata,
    pub registry: &'a MetricRegistry,
    pub pct_threshold: f64,
    pub filter_status: &'a HashSet<ValidationStatus>,
    pub max_recursive_query_size: u64,
    pub verbose: bool,
}

/// Drives the recursion described in the recursive-row-validator component:
/// `builder` already has its configured group-bys removed and held aside as
/// `group_list` (the ordered dimension list `G`).
pub fn validate<'a>(
    builder: ValidationBuilder,
    group_list: Vec<ColumnAlias>,
    ctx: &'a RecursionContext<'a>,
) -> BoxFuture<'a, Result<Vec<Metric>>> {
    async move {
        if group_list.is_empty() {
            if builder.get_primary_keys().is_empty() {
                tracing::warn!("row validation has no primary keys and no remaining group-by dimensions; returning empty report");
                return Ok(Vec::new());
            }
            return run_leaf(&builder, ctx).await;
        }

        let mut remaining = group_list;
        let g = remaining.remove(0);

        let mut rollup_builder = builder.clone();
        rollup_builder.add_query_group(g.clone());

        let start_time = Utc::now();
        let source_expr = rollup_builder.get_source_query()?;
        let target_expr = rollup_builder.get_target_query()?;
        let (source_result, target_result) =
            executor::execute(ctx.source.as_ref(), ctx.target.as_ref(), &source_expr, &target_expr, ctx.verbose)
                .await?;
        let end_time = Utc::now();

        let descriptors = rollup_builder.get_metadata();
        let rollup = combiner::combine(
            ctx.run_meta,
            ctx.registry,
            &descriptors,
            builder_table(&rollup_builder, Side::Source),
            builder_table(&rollup_builder, Side::Target),
            &[g.alias.clone()],
            &source_result,
            &target_result,
            false,
            ctx.pct_threshold,
            &HashSet::new(), // unfiltered: decisions below need every status
            start_time,
            end_time,
        );

        let mut report = Vec::new();
        for group in group_by_key(&rollup) {
            let too_large = if !remaining.is_empty() {
                false
            } else {
                group_too_large(&group, ctx.max_recursive_query_size)
            };

            if too_large {
                tracing::warn!(group_by = ?group.first().map(|m| &m.group_by_columns), "group exceeds max_recursive_query_size; not descending");
                report.extend(apply_filter_status(group, ctx.filter_status));
                continue;
            }

            let all_equal = group
                .iter()
                .all(|m| m.source_agg_value == m.target_agg_value);
            if all_equal {
                report.extend(apply_filter_status(group, ctx.filter_status));
                continue;
            }

            let value = group
                .first()
                .and_then(|m| m.group_by_columns.get(&g.alias))
                .cloned()
                .map(|v| Scalar::from_json(&v))
                .unwrap_or(Scalar::Null);

            let source_col = rollup_builder
                .grouped_alias_source_column(&g.alias)
                .unwrap_or(&g.source_column)
                .to_string();
            let target_col = rollup_builder
                .grouped_alias_target_column(&g.alias)
                .unwrap_or(&g.target_column)
                .to_string();

            let mut next_builder = builder.clone();
            next_builder.add_filter(FilterConfig::equals(source_col, target_col, value));

            let child = validate(next_builder, remaining.clone(), ctx).await?;
            report.extend(child);
        }

        Ok(report)
    }
    .boxed()
}

async fn run_leaf(builder: &ValidationBuilder, ctx: &RecursionContext<'_>) -> Result<Vec<Metric>> {
    let start_time = Utc::now();
    let source_expr = builder.get_source_query()?;
    let target_expr = builder.get_target_query()?;
    let (source_result, target_result) =
        executor::execute(ctx.source.as_ref(), ctx.target.as_ref(), &source_expr, &target_expr, ctx.verbose).await?;
    let end_time = Utc::now();

    let descriptors = builder.get_metadata();
    let join_keys: Vec<String> = builder
        .get_primary_keys()
        .iter()
        .map(|pk| pk.alias.clone())
        .collect();

    let report = combiner::combine(
        ctx.run_meta,
        ctx.registry,
        &descriptors,
        builder_table(builder, Side::Source),
        builder_table(builder, Side::Target),
        &join_keys,
        &source_result,
        &target_result,
        true,
        ctx.pct_threshold,
        ctx.filter_status,
        start_time,
        end_time,
    );
    Ok(report)
}

enum Side {
    Source,
    Target,
}

fn builder_table(builder: &ValidationBuilder, side: Side) -> Option<(String, String)> {
    let table = match side {
        Side::Source => builder.source_table_name(),
        Side::Target => builder.target_table_name(),
    }?;
    Some((table.0.to_string(), table.1.to_string()))
}

/// Groups a flat combiner report back into per-key-tuple slices, preserving
/// the order the Combiner produced them in.
fn group_by_key(rows: &[Metric]) -> Vec<Vec<Metric>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<Metric>> = std::collections::HashMap::new();
    for row in rows {
        let key = serde_json::to_string(&row.group_by_columns).unwrap_or_default();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(row.clone());
    }
    order.into_iter().filter_map(|k| groups.remove(&k)).collect()
}

/// The "too large" rule: only meaningful at the last remaining dimension,
/// and only when the COUNT aggregate parses as a number.
fn group_too_large(group: &[Metric], max_recursive_query_size: u64) -> bool {
    let count_row = match group.iter().find(|m| m.aggregate_kind == "count") {
        Some(row) => row,
        None => return false,
    };
    let source_count = count_row.source_agg_value.as_f64();
    let target_count = count_row.target_agg_value.as_f64();
    match (source_count, target_count) {
        (Some(s), Some(t)) => s.max(t) > max_recursive_query_size as f64,
        _ => false,
    }
}

fn apply_filter_status(group: Vec<Metric>, filter_status: &HashSet<ValidationStatus>) -> Vec<Metric> {
    if filter_status.is_empty() {
        group
    } else {
        group
            .into_iter()
            .filter(|m| filter_status.contains(&m.validation_status))
            .collect()
    }
}
