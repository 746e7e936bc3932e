//! The "Connection/client factory" collaborator, modeled as a trait plus
//! one concrete in-process/test implementation.
//!
//! Production engines (Postgres, BigQuery, a pandas-backed frame, ...) are
//! out of scope; they would lower [`Expr`] to their native query language
//! and implement [`Engine`] the way `ouroboros-postgres::Connection` wraps
//! a `sqlx::PgPool`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::{ParityError, Result};
use crate::expr::{
    AggregateCall, AggregateKind, CalculatedKind, ColumnType, Expr, Predicate, Scalar, ValueExpr,
};

/// A single output row, column name to scalar, insertion-ordered so that
/// `group_by_columns` JSON rendering is deterministic.
pub type Row = IndexMap<String, Scalar>;

/// Table schema: ordered column name/type pairs.
pub type TableSchema = Vec<(String, ColumnType)>;

/// A materialized tabular result, as returned by [`Engine::execute`].
#[derive(Debug, Clone, Default)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl TabularResult {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Engine handle interface consumed by the core: `execute`, schema
/// introspection, and column type introspection (`is_binary` lives on
/// [`ColumnType`] itself).
#[async_trait]
pub trait Engine: Send + Sync {
    async fn execute(&self, expr: &Expr) -> Result<TabularResult>;

    fn schema(&self, schema: Option<&str>, table: &str) -> Option<TableSchema>;

    fn column_type(&self, schema: Option<&str>, table: &str, column: &str) -> Option<ColumnType> {
        self.schema(schema, table)?
            .into_iter()
            .find(|(name, _)| name == column)
            .map(|(_, ty)| ty)
    }
}

/// Returns true when `source` and `target` are the same underlying engine
/// instance, per the "process_in_memory is derived" design note: the
/// orchestrator uses this to decide between the in-memory and pushdown
/// execution strategies.
pub fn same_engine_instance(source: &Arc<dyn Engine>, target: &Arc<dyn Engine>) -> bool {
    Arc::ptr_eq(source, target)
}

/// An in-process engine holding named tables in memory. Used both as the
/// default engine for standalone runs and as the deterministic test
/// harness for every scenario in the testable-properties section.
#[derive(Default)]
pub struct InMemoryEngine {
    tables: RwLock<HashMap<String, (TableSchema, TabularResult)>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_table(
        &self,
        name: impl Into<String>,
        schema: TableSchema,
        data: TabularResult,
    ) {
        self.tables
            .write()
            .expect("table registry lock poisoned")
            .insert(name.into(), (schema, data));
    }

    fn table_key(schema: Option<&str>, name: &str) -> String {
        match schema {
            Some(s) => format!("{s}.{name}"),
            None => name.to_string(),
        }
    }

    fn fetch_table(&self, schema: Option<&str>, name: &str) -> Result<TabularResult> {
        let key = Self::table_key(schema, name);
        self.tables
            .read()
            .expect("table registry lock poisoned")
            .get(&key)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| ParityError::engine(format!("unknown table '{key}'")))
    }

    fn eval_value(row: &Row, expr: &ValueExpr) -> Result<Scalar> {
        match expr {
            ValueExpr::Column(name) => Ok(row.get(name).cloned().unwrap_or(Scalar::Null)),
            ValueExpr::Literal(scalar) => Ok(scalar.clone()),
            ValueExpr::Cast { input, to } => {
                let value = Self::eval_value(row, input)?;
                Ok(Self::cast_scalar(value, *to))
            }
            ValueExpr::Calculated { kind, inputs } => {
                let values = inputs
                    .iter()
                    .map(|v| Self::eval_value(row, v))
                    .collect::<Result<Vec<_>>>()?;
                Self::eval_calculated(kind, &values)
            }
            ValueExpr::TrimEnd(input) => {
                let value = Self::eval_value(row, input)?;
                match value {
                    Scalar::Str(s) => Ok(Scalar::Str(s.trim_end().to_string())),
                    other => Ok(other),
                }
            }
        }
    }

    fn cast_scalar(value: Scalar, to: ColumnType) -> Scalar {
        if value.is_null() {
            return Scalar::Null;
        }
        match to {
            ColumnType::String => Scalar::Str(value.to_string()),
            ColumnType::Binary => match value {
                Scalar::Str(s) => Scalar::from_hex_string(&s).unwrap_or(Scalar::Null),
                other @ Scalar::Binary(_) => other,
                _ => Scalar::Null,
            },
            ColumnType::Int64 => value
                .as_f64()
                .map(|f| Scalar::Int(f as i64))
                .unwrap_or(Scalar::Null),
            ColumnType::Float64 => value.as_f64().map(Scalar::Float).unwrap_or(Scalar::Null),
            ColumnType::Bool => match value {
                Scalar::Bool(b) => Scalar::Bool(b),
                Scalar::Int(i) => Scalar::Bool(i != 0),
                _ => Scalar::Null,
            },
            ColumnType::Date => value,
        }
    }

    fn eval_calculated(kind: &CalculatedKind, values: &[Scalar]) -> Result<Scalar> {
        match kind {
            CalculatedKind::Length => {
                let s = values.first().map(ToString::to_string).unwrap_or_default();
                Ok(Scalar::Int(s.chars().count() as i64))
            }
            CalculatedKind::Upper => {
                let s = values.first().map(ToString::to_string).unwrap_or_default();
                Ok(Scalar::Str(s.to_uppercase()))
            }
            CalculatedKind::Concat => {
                let s: String = values.iter().map(ToString::to_string).collect();
                Ok(Scalar::Str(s))
            }
            CalculatedKind::Custom(name) => Err(ParityError::engine(format!(
                "in-memory engine does not implement calculated kind '{name}'"
            ))),
        }
    }

    fn eval_predicate(row: &Row, predicate: &Predicate) -> Result<bool> {
        match predicate {
            Predicate::Equals(a, b) => {
                Ok(Self::eval_value(row, a)? == Self::eval_value(row, b)?)
            }
            Predicate::IsIn(a, values) => {
                let v = Self::eval_value(row, a)?;
                Ok(values.contains(&v))
            }
            Predicate::Custom(name) => Err(ParityError::engine(format!(
                "in-memory engine cannot interpret custom filter '{name}'"
            ))),
            Predicate::And(preds) => {
                for p in preds {
                    if !Self::eval_predicate(row, p)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    fn aggregate(kind: &AggregateKind, values: &[Scalar]) -> Result<Scalar> {
        let numeric: Vec<f64> = values.iter().filter_map(Scalar::as_f64).collect();
        match kind {
            AggregateKind::Count => Ok(Scalar::Int(values.len() as i64)),
            AggregateKind::Sum => Ok(Scalar::Float(numeric.iter().sum())),
            AggregateKind::Min => numeric
                .iter()
                .cloned()
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
                .map(Scalar::Float)
                .map(Ok)
                .unwrap_or(Ok(Scalar::Null)),
            AggregateKind::Max => numeric
                .iter()
                .cloned()
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
                .map(Scalar::Float)
                .map(Ok)
                .unwrap_or(Ok(Scalar::Null)),
            AggregateKind::Avg => {
                if numeric.is_empty() {
                    Ok(Scalar::Null)
                } else {
                    Ok(Scalar::Float(numeric.iter().sum::<f64>() / numeric.len() as f64))
                }
            }
            AggregateKind::BitXor => {
                let mut acc: i64 = 0;
                for v in values.iter().filter_map(|s| match s {
                    Scalar::Int(i) => Some(*i),
                    _ => None,
                }) {
                    acc ^= v;
                }
                Ok(Scalar::Int(acc))
            }
            AggregateKind::Custom(name) => Err(ParityError::engine(format!(
                "in-memory engine does not implement aggregate '{name}'"
            ))),
        }
    }

    fn eval(&self, expr: &Expr) -> Result<TabularResult> {
        match expr {
            Expr::Table { schema, name } => self.fetch_table(schema.as_deref(), name),
            Expr::Filter { input, predicate } => {
                let base = self.eval(input)?;
                let rows = base
                    .rows
                    .into_iter()
                    .map(|row| match Self::eval_predicate(&row, predicate) {
                        Ok(true) => Ok(Some(row)),
                        Ok(false) => Ok(None),
                        Err(e) => Err(e),
                    })
                    .collect::<Result<Vec<_>>>()?
                    .into_iter()
                    .flatten()
                    .collect();
                Ok(TabularResult::new(base.columns, rows))
            }
            Expr::Mutate {
                input,
                column,
                value,
            } => {
                let mut base = self.eval(input)?;
                if !base.columns.contains(column) {
                    base.columns.push(column.clone());
                }
                for row in &mut base.rows {
                    let v = Self::eval_value(row, value)?;
                    row.insert(column.clone(), v);
                }
                Ok(base)
            }
            Expr::Project { input, columns } => {
                let base = self.eval(input)?;
                let mut out_rows = Vec::with_capacity(base.rows.len());
                for row in &base.rows {
                    let mut out = Row::new();
                    for (alias, value) in columns {
                        out.insert(alias.clone(), Self::eval_value(row, value)?);
                    }
                    out_rows.push(out);
                }
                let out_columns = columns.iter().map(|(alias, _)| alias.clone()).collect();
                Ok(TabularResult::new(out_columns, out_rows))
            }
            Expr::GroupByAggregate {
                input,
                group_by,
                aggregates,
            } => {
                let base = self.eval(input)?;
                let mut groups: IndexMap<Vec<Scalar>, Vec<Row>> = IndexMap::new();
                for row in &base.rows {
                    let key = group_by
                        .iter()
                        .map(|(_, v)| Self::eval_value(row, v))
                        .collect::<Result<Vec<_>>>()?;
                    groups.entry(key).or_default().push(row.clone());
                }
                // A no-group-by aggregate still produces exactly one row
                // (e.g. COUNT(*) = 0) even over zero input rows.
                if group_by.is_empty() {
                    groups.entry(Vec::new()).or_default();
                }
                let mut out_rows = Vec::with_capacity(groups.len());
                for (key, rows) in &groups {
                    let mut out = Row::new();
                    for ((alias, _), value) in group_by.iter().zip(key.iter()) {
                        out.insert(alias.clone(), value.clone());
                    }
                    for (alias, call) in aggregates {
                        let values = match &call.input {
                            Some(v) => rows
                                .iter()
                                .map(|r| Self::eval_value(r, v))
                                .collect::<Result<Vec<_>>>()?,
                            None => rows.iter().map(|_| Scalar::Int(1)).collect(),
                        };
                        let values: Vec<Scalar> =
                            values.into_iter().filter(|v| !v.is_null()).collect();
                        out.insert(alias.clone(), Self::aggregate(&call.kind, &values)?);
                    }
                    out_rows.push(out);
                }
                let mut out_columns: Vec<String> =
                    group_by.iter().map(|(alias, _)| alias.clone()).collect();
                out_columns.extend(aggregates.iter().map(|(alias, _)| alias.clone()));
                Ok(TabularResult::new(out_columns, out_rows))
            }
            Expr::RandomSampleLimit { input, limit } => {
                let base = self.eval(input)?;
                let rows = base.rows.into_iter().take(*limit as usize).collect();
                Ok(TabularResult::new(base.columns, rows))
            }
        }
    }
}

#[async_trait]
impl Engine for InMemoryEngine {
    async fn execute(&self, expr: &Expr) -> Result<TabularResult> {
        self.eval(expr)
    }

    fn schema(&self, schema: Option<&str>, table: &str) -> Option<TableSchema> {
        let key = Self::table_key(schema, table);
        self.tables
            .read()
            .expect("table registry lock poisoned")
            .get(&key)
            .map(|(schema, _)| schema.clone())
    }
}

/// Unused aggregate-call convenience constructor, kept alongside the
/// engine so callers outside `builder`/`sampler` can assemble ad-hoc exprs
/// in tests without re-deriving the struct literal.
pub fn count_all() -> AggregateCall {
    AggregateCall {
        kind: AggregateKind::Count,
        input: None,
    }
}
