//! Schema-only validation: a sibling mode treated as a black box by the
//! purpose/scope section. Implemented here as a minimal concrete module so
//! the orchestrator's `schema` dispatch arm is total: it compares column
//! name/type sets on both sides and reuses the Combiner's status rule with
//! `pct_threshold = 0`.

use chrono::Utc;
use serde_json::Map as JsonMap;

use crate::config::{Config, ValidationStatus};
use crate::engine::Engine;
use crate::error::{ParityError, Result};
use crate::expr::{AggregateKind, Scalar};
use crate::metadata::{Metric, MetricDescriptor, RunMetadata};

/// One report row per column name observed on either side: `1` when both
/// sides agree on the column's type, `0` otherwise (absence on a side
/// counts as disagreement).
pub fn validate(config: &Config, run_meta: &RunMetadata, source: &dyn Engine, target: &dyn Engine) -> Result<Vec<Metric>> {
    let start_time = Utc::now();

    let (source_schema_name, source_table) = config
        .source_table()
        .ok_or_else(|| ParityError::config("missing schema_name/table_name for schema validation"))?;
    let (target_schema_name, target_table) = config
        .target_table()
        .ok_or_else(|| ParityError::config("missing schema_name/table_name for schema validation"))?;

    let source_schema = source
        .schema(Some(source_schema_name), source_table)
        .ok_or_else(|| ParityError::engine(format!("unknown source table '{source_schema_name}.{source_table}'")))?;
    let target_schema = target
        .schema(Some(target_schema_name), target_table)
        .ok_or_else(|| ParityError::engine(format!("unknown target table '{target_schema_name}.{target_table}'")))?;

    let mut columns: Vec<&str> = source_schema.iter().map(|(name, _)| name.as_str()).collect();
    for (name, _) in &target_schema {
        if !columns.contains(&name.as_str()) {
            columns.push(name.as_str());
        }
    }

    let end_time = Utc::now();
    let mut report = Vec::with_capacity(columns.len());
    for column in columns {
        let source_type = source_schema.iter().find(|(name, _)| name == column).map(|(_, ty)| *ty);
        let target_type = target_schema.iter().find(|(name, _)| name == column).map(|(_, ty)| *ty);
        let matches = source_type.is_some() && source_type == target_type;

        let descriptor = MetricDescriptor {
            alias: column.to_string(),
            aggregate_kind: AggregateKind::Custom("schema_match".to_string()),
            source_column: Some(column.to_string()),
            target_column: Some(column.to_string()),
        };
        let source_value = Scalar::Str(source_type.map(|t| t.to_string()).unwrap_or_else(|| "missing".to_string()));
        let target_value = Scalar::Str(target_type.map(|t| t.to_string()).unwrap_or_else(|| "missing".to_string()));

        let (difference, pct_difference) = if matches { (Some(0.0), Some(0.0)) } else { (None, Some(100.0)) };

        let metric = Metric::new(
            run_meta,
            &descriptor,
            Some(format!("{source_schema_name}.{source_table}")),
            Some(format!("{target_schema_name}.{target_table}")),
            source_value,
            target_value,
            difference,
            pct_difference,
            0.0,
            JsonMap::new(),
            start_time,
            end_time,
        )
        .with_status(if matches { ValidationStatus::Success } else { ValidationStatus::Fail });

        report.push(metric);
    }

    Ok(report)
}
