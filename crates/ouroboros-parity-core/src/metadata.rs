//! Run metadata and the per-metric report row.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map as JsonMap;

use crate::config::ValidationStatus;
use crate::expr::{AggregateKind, Scalar};

/// Descriptor for one configured metric, produced by the Validation
/// Builder's `get_metadata()` and consumed by the Combiner.
#[derive(Debug, Clone)]
pub struct MetricDescriptor {
    pub alias: String,
    pub aggregate_kind: AggregateKind,
    pub source_column: Option<String>,
    pub target_column: Option<String>,
}

/// Metadata owned by a single [`crate::orchestrator::Run`]: fixed at
/// construction, mutated only to append metric definitions as plans are
/// built.
#[derive(Debug, Clone)]
pub struct RunMetadata {
    pub run_id: String,
    pub labels: HashMap<String, String>,
    pub validation_type: crate::config::ValidationType,
    pub validations: Vec<MetricDescriptor>,
}

impl RunMetadata {
    pub fn new(run_id: String, labels: HashMap<String, String>, validation_type: crate::config::ValidationType) -> Self {
        Self {
            run_id,
            labels,
            validation_type,
            validations: Vec::new(),
        }
    }
}

/// One line of the output report: fully self-describing, stable field
/// ordering for external sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub run_id: String,
    pub validation_name: String,
    pub validation_type: String,
    pub source_table_name: Option<String>,
    pub target_table_name: Option<String>,
    pub source_column_name: Option<String>,
    pub target_column_name: Option<String>,
    pub aggregate_kind: String,
    pub source_agg_value: serde_json::Value,
    pub target_agg_value: serde_json::Value,
    pub difference: Option<f64>,
    pub pct_difference: Option<f64>,
    pub pct_threshold: f64,
    pub validation_status: ValidationStatus,
    pub group_by_columns: JsonMap<String, serde_json::Value>,
    pub labels: HashMap<String, String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Metric {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_meta: &RunMetadata,
        descriptor: &MetricDescriptor,
        source_table: Option<String>,
        target_table: Option<String>,
        source_value: Scalar,
        target_value: Scalar,
        difference: Option<f64>,
        pct_difference: Option<f64>,
        pct_threshold: f64,
        group_by_columns: JsonMap<String, serde_json::Value>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let status = match pct_difference {
            Some(pct) => {
                if pct.abs() <= pct_threshold {
                    ValidationStatus::Success
                } else {
                    ValidationStatus::Fail
                }
            }
            None => ValidationStatus::Fail,
        };
        Self {
            run_id: run_meta.run_id.clone(),
            validation_name: descriptor.alias.clone(),
            validation_type: format!("{:?}", run_meta.validation_type).to_lowercase(),
            source_table_name: source_table,
            target_table_name: target_table,
            source_column_name: descriptor.source_column.clone(),
            target_column_name: descriptor.target_column.clone(),
            aggregate_kind: descriptor.aggregate_kind.to_string(),
            source_agg_value: source_value.to_json(),
            target_agg_value: target_value.to_json(),
            difference,
            pct_difference,
            pct_threshold,
            validation_status: status,
            group_by_columns,
            labels: run_meta.labels.clone(),
            start_time,
            end_time,
        }
    }

    pub fn with_status(mut self, status: ValidationStatus) -> Self {
        self.validation_status = status;
        self
    }
}
