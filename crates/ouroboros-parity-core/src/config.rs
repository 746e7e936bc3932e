//! The validation configuration record: immutable for the lifetime of a
//! run, deserialized from YAML/JSON by the CLI/config-loader collaborator.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::expr::{AggregateKind, CalculatedKind, ColumnType, Scalar};

/// Opaque connection descriptor. The core never interprets `params`
/// itself — resolving it into an [`crate::engine::Engine`] handle is the
/// connection/client factory's job, out of scope here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnDescriptor {
    pub kind: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationType {
    Column,
    Row,
    Schema,
    CustomQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomQueryType {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Success,
    Fail,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Shared shape for primary keys and grouped columns: an alias plus the
/// physical column name on each side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnAlias {
    pub alias: String,
    pub source_column: String,
    pub target_column: String,
    #[serde(default)]
    pub cast: Option<ColumnType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateConfig {
    pub alias: String,
    pub kind: AggregateKind,
    #[serde(default)]
    pub source_column: Option<String>,
    #[serde(default)]
    pub target_column: Option<String>,
    #[serde(default)]
    pub cast: Option<ColumnType>,
}

/// A calculated field in the DAG. `inputs` names other aliases (base
/// columns/primary keys/grouped columns or calculated fields of strictly
/// lower `depth`); the builder resolves them in ascending `depth` order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatedFieldConfig {
    pub alias: String,
    pub kind: CalculatedKind,
    pub inputs: Vec<String>,
    pub depth: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Equals,
    IsIn,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub kind: FilterKind,
    pub source_column: String,
    #[serde(default)]
    pub source_value: Option<serde_json::Value>,
    pub target_column: String,
    #[serde(default)]
    pub target_value: Option<serde_json::Value>,
}

impl FilterConfig {
    pub fn equals(source_column: impl Into<String>, target_column: impl Into<String>, value: Scalar) -> Self {
        Self {
            kind: FilterKind::Equals,
            source_column: source_column.into(),
            source_value: Some(value.to_json()),
            target_column: target_column.into(),
            target_value: Some(value.to_json()),
        }
    }

    pub fn is_in(source_column: impl Into<String>, target_column: impl Into<String>, values: &[Scalar]) -> Self {
        let json = serde_json::Value::Array(values.iter().map(Scalar::to_json).collect());
        Self {
            kind: FilterKind::IsIn,
            source_column: source_column.into(),
            source_value: Some(json.clone()),
            target_column: target_column.into(),
            target_value: Some(json),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Table,
    Text,
    Json,
    Csv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultHandlerConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl Default for ResultHandlerConfig {
    fn default() -> Self {
        Self {
            kind: "stdout".to_string(),
            params: HashMap::new(),
        }
    }
}

/// Immutable configuration for a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source_conn: ConnDescriptor,
    pub target_conn: ConnDescriptor,
    #[serde(rename = "type")]
    pub validation_type: ValidationType,
    #[serde(default)]
    pub custom_query_type: Option<CustomQueryType>,

    #[serde(default)]
    pub schema_name: Option<String>,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub target_schema_name: Option<String>,
    #[serde(default)]
    pub target_table_name: Option<String>,

    #[serde(default)]
    pub primary_keys: Vec<ColumnAlias>,
    #[serde(default)]
    pub grouped_columns: Vec<ColumnAlias>,
    #[serde(default)]
    pub aggregates: Vec<AggregateConfig>,
    #[serde(default)]
    pub calculated_fields: Vec<CalculatedFieldConfig>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,

    #[serde(default)]
    pub threshold: f64,

    #[serde(default)]
    pub result_handler: ResultHandlerConfig,
    #[serde(default = "default_format")]
    pub format: ReportFormat,
    #[serde(default)]
    pub filter_status: HashSet<ValidationStatus>,

    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default = "default_max_recursive_query_size")]
    pub max_recursive_query_size: u64,
    #[serde(default = "default_random_row_batch_size")]
    pub random_row_batch_size: u64,
    #[serde(default)]
    pub use_random_rows: bool,
    #[serde(default)]
    pub trim_string_pks: bool,

    /// Verbose mode: logs resolved dataframe schemas on an in-memory
    /// execution failure (see SPEC_FULL.md "added" data-model notes).
    #[serde(default)]
    pub verbose: bool,
}

const fn default_max_recursive_query_size() -> u64 {
    10_000
}

const fn default_random_row_batch_size() -> u64 {
    100
}

const fn default_format() -> ReportFormat {
    ReportFormat::Table
}

impl Config {
    /// Table identity on the source side, used both as the base table for
    /// builder construction and as the schema-validator's lookup key.
    pub fn source_table(&self) -> Option<(&str, &str)> {
        Some((self.schema_name.as_deref()?, self.table_name.as_deref()?))
    }

    pub fn target_table(&self) -> Option<(&str, &str)> {
        let schema = self
            .target_schema_name
            .as_deref()
            .or(self.schema_name.as_deref())?;
        let table = self
            .target_table_name
            .as_deref()
            .or(self.table_name.as_deref())?;
        Some((schema, table))
    }
}
