//! Validation Builder: compiles a [`Config`] into a pair of source/target
//! query expressions plus the metric plan.

use std::sync::Arc;

use serde_json::Value as Json;

use crate::config::{
    AggregateConfig, CalculatedFieldConfig, Config, ColumnAlias, CustomQueryType, FilterConfig,
    FilterKind, ValidationType,
};
use crate::error::{ParityError, Result};
use crate::expr::{AggregateCall, Expr, Predicate, Scalar, ValueExpr};
use crate::metadata::MetricDescriptor;
use crate::registry::MetricRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Source,
    Target,
}

/// The immutable half of a builder: shared via `Arc` so `clone()` is cheap
/// and every clone still agrees on table names, keys, and metric plan.
struct BuilderConfig {
    config: Config,
    registry: Arc<MetricRegistry>,
}

/// Compiles configuration into query expressions. Cloning produces an
/// independent filter/group-by list so recursive drill-down can diverge
/// per branch without shared mutable state.
#[derive(Clone)]
pub struct ValidationBuilder {
    shared: Arc<BuilderConfig>,
    filters: Vec<FilterConfig>,
    group_by: Vec<ColumnAlias>,
}

impl ValidationBuilder {
    pub fn new(config: Config, registry: Arc<MetricRegistry>) -> Result<Self> {
        validate_config(&config, &registry)?;
        let filters = config.filters.clone();
        let group_by = config.grouped_columns.clone();
        Ok(Self {
            shared: Arc::new(BuilderConfig { config, registry }),
            filters,
            group_by,
        })
    }

    fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn source_table_name(&self) -> Option<(&str, &str)> {
        self.config().source_table()
    }

    pub fn target_table_name(&self) -> Option<(&str, &str)> {
        self.config().target_table()
    }

    pub fn is_row_keyed(&self) -> bool {
        matches!(self.config().validation_type, ValidationType::Row)
            || (self.config().validation_type == ValidationType::CustomQuery
                && self.config().custom_query_type == Some(CustomQueryType::Row))
    }

    pub fn get_primary_keys(&self) -> &[ColumnAlias] {
        &self.config().primary_keys
    }

    pub fn get_group_aliases(&self) -> Vec<String> {
        self.group_by.iter().map(|c| c.alias.clone()).collect()
    }

    pub fn add_filter(&mut self, filter: FilterConfig) {
        self.filters.push(filter);
    }

    pub fn add_query_group(&mut self, group: ColumnAlias) {
        self.group_by.push(group);
    }

    /// Removes and returns the currently registered group-bys. The caller
    /// (the Recursive Row Validator) re-adds them one at a time.
    pub fn pop_grouped_fields(&mut self) -> Vec<ColumnAlias> {
        std::mem::take(&mut self.group_by)
    }

    pub fn grouped_alias_source_column(&self, alias: &str) -> Option<&str> {
        self.group_by
            .iter()
            .find(|c| c.alias == alias)
            .map(|c| c.source_column.as_str())
    }

    pub fn grouped_alias_target_column(&self, alias: &str) -> Option<&str> {
        self.group_by
            .iter()
            .find(|c| c.alias == alias)
            .map(|c| c.target_column.as_str())
    }

    pub fn get_metadata(&self) -> Vec<MetricDescriptor> {
        self.config()
            .aggregates
            .iter()
            .map(|agg| MetricDescriptor {
                alias: agg.alias.clone(),
                aggregate_kind: agg.kind.clone(),
                source_column: agg.source_column.clone(),
                target_column: agg.target_column.clone(),
            })
            .collect()
    }

    pub fn get_source_query(&self) -> Result<Expr> {
        self.build_side(Side::Source)
    }

    pub fn get_target_query(&self) -> Result<Expr> {
        self.build_side(Side::Target)
    }

    /// The source table with the builder's current filters applied, but
    /// before calculated-field resolution or aggregation — what the
    /// Random-Row Sampler needs to select just the primary-key column.
    pub fn filtered_source_table(&self) -> Result<Expr> {
        let cfg = self.config();
        let table = cfg
            .source_table()
            .ok_or_else(|| ParityError::config("missing schema_name/table_name for validation"))?;
        let mut expr = Expr::table(Some(table.0), table.1);
        if !self.filters.is_empty() {
            let predicates = self
                .filters
                .iter()
                .map(|f| Self::build_predicate(Side::Source, f))
                .collect::<Result<Vec<_>>>()?;
            expr = expr.filter(Predicate::And(predicates));
        }
        Ok(expr)
    }

    /// Resolves an alias (primary key, grouped column, or a previously
    /// resolved calculated field) to a physical column reference on the
    /// given side.
    fn resolve_alias(&self, side: Side, alias: &str) -> Option<ValueExpr> {
        let cfg = self.config();
        if let Some(pk) = cfg.primary_keys.iter().find(|c| c.alias == alias) {
            return Some(Self::column_for(side, pk));
        }
        if let Some(g) = cfg.grouped_columns.iter().find(|c| c.alias == alias) {
            return Some(Self::column_for(side, g));
        }
        if cfg.calculated_fields.iter().any(|c| c.alias == alias) {
            // Already projected as a mutated column earlier in the chain.
            return Some(ValueExpr::column(alias));
        }
        if let Some(agg) = cfg.aggregates.iter().find(|a| a.alias == alias) {
            let col = match side {
                Side::Source => agg.source_column.as_deref(),
                Side::Target => agg.target_column.as_deref(),
            };
            return col.map(ValueExpr::column);
        }
        None
    }

    fn column_for(side: Side, alias: &ColumnAlias) -> ValueExpr {
        let col = match side {
            Side::Source => &alias.source_column,
            Side::Target => &alias.target_column,
        };
        let value = ValueExpr::column(col.clone());
        match alias.cast {
            Some(ty) => value.cast(ty),
            None => value,
        }
    }

    fn filter_value(side: Side, filter: &FilterConfig) -> Option<&Json> {
        match side {
            Side::Source => filter.source_value.as_ref(),
            Side::Target => filter.target_value.as_ref(),
        }
    }

    fn filter_column(side: Side, filter: &FilterConfig) -> &str {
        match side {
            Side::Source => &filter.source_column,
            Side::Target => &filter.target_column,
        }
    }

    fn build_predicate(side: Side, filter: &FilterConfig) -> Result<Predicate> {
        let column = ValueExpr::column(Self::filter_column(side, filter));
        match filter.kind {
            FilterKind::Equals => {
                let value = Self::filter_value(side, filter)
                    .map(json_to_scalar)
                    .unwrap_or(Scalar::Null);
                Ok(Predicate::Equals(column, ValueExpr::Literal(value)))
            }
            FilterKind::IsIn => {
                let values = match Self::filter_value(side, filter) {
                    Some(Json::Array(items)) => items.iter().map(json_to_scalar).collect(),
                    Some(other) => vec![json_to_scalar(other)],
                    None => Vec::new(),
                };
                Ok(Predicate::IsIn(column, values))
            }
            FilterKind::Custom => Ok(Predicate::Custom(format!(
                "{}={:?}",
                Self::filter_column(side, filter),
                Self::filter_value(side, filter)
            ))),
        }
    }

    fn build_side(&self, side: Side) -> Result<Expr> {
        let cfg = self.config();
        let table = match side {
            Side::Source => cfg.source_table(),
            Side::Target => cfg.target_table(),
        }
        .ok_or_else(|| ParityError::config("missing schema_name/table_name for validation"))?;

        let mut expr = Expr::table(Some(table.0), table.1);

        if !self.filters.is_empty() {
            let predicates = self
                .filters
                .iter()
                .map(|f| Self::build_predicate(side, f))
                .collect::<Result<Vec<_>>>()?;
            expr = expr.filter(Predicate::And(predicates));
        }

        let mut sorted_calculated: Vec<&CalculatedFieldConfig> = cfg.calculated_fields.iter().collect();
        sorted_calculated.sort_by_key(|c| c.depth);
        for field in sorted_calculated {
            self.shared.registry.calculated(&field.kind)?;
            let inputs = field
                .inputs
                .iter()
                .map(|input_alias| {
                    self.resolve_alias(side, input_alias).ok_or_else(|| {
                        ParityError::config(format!(
                            "calculated field '{}' references unresolved input '{input_alias}' at depth {}",
                            field.alias, field.depth
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            expr = expr.mutate(
                field.alias.clone(),
                ValueExpr::Calculated {
                    kind: field.kind.clone(),
                    inputs,
                },
            );
        }

        if self.is_row_keyed() && self.group_by.is_empty() {
            let mut columns: Vec<(String, ValueExpr)> = cfg
                .primary_keys
                .iter()
                .map(|pk| (pk.alias.clone(), Self::column_for(side, pk)))
                .collect();
            for agg in &cfg.aggregates {
                columns.push((agg.alias.clone(), self.aggregate_input(side, agg)?));
            }
            expr = expr.project(columns);
        } else {
            let group_by = self
                .group_by
                .iter()
                .map(|g| (g.alias.clone(), Self::column_for(side, g)))
                .collect();
            let aggregates = cfg
                .aggregates
                .iter()
                .map(|agg| -> Result<(String, AggregateCall)> {
                    self.shared.registry.aggregate(&agg.kind)?;
                    let input = if agg.source_column.is_none() && agg.target_column.is_none() {
                        None
                    } else {
                        Some(self.aggregate_input(side, agg)?)
                    };
                    Ok((agg.alias.clone(), AggregateCall { kind: agg.kind.clone(), input }))
                })
                .collect::<Result<Vec<_>>>()?;
            expr = expr.group_by_aggregate(group_by, aggregates);
        }

        Ok(expr)
    }

    fn aggregate_input(&self, side: Side, agg: &AggregateConfig) -> Result<ValueExpr> {
        let column = match side {
            Side::Source => agg.source_column.as_deref(),
            Side::Target => agg.target_column.as_deref(),
        }
        .ok_or_else(|| {
            ParityError::config(format!(
                "metric '{}' is missing a {side:?}-side column",
                agg.alias
            ))
        })?;
        let value = ValueExpr::column(column);
        Ok(match agg.cast {
            Some(ty) => value.cast(ty),
            None => value,
        })
    }
}

fn json_to_scalar(value: &Json) -> Scalar {
    match value {
        Json::Null => Scalar::Null,
        Json::Bool(b) => Scalar::Bool(*b),
        Json::Number(n) => n
            .as_i64()
            .map(Scalar::Int)
            .unwrap_or_else(|| Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
        Json::String(s) => Scalar::Str(s.clone()),
        Json::Array(_) | Json::Object(_) => Scalar::Str(value.to_string()),
    }
}

fn validate_config(config: &Config, registry: &MetricRegistry) -> Result<()> {
    // Row validation with no primary keys is allowed to construct; the
    // recursive validator's base case warns and returns an empty report
    // rather than rejecting it at build time (design notes open question).
    if config.use_random_rows() && config.primary_keys.is_empty() {
        return Err(ParityError::config(
            "random row sampling requires at least one primary key",
        ));
    }

    let mut seen_aliases = std::collections::HashSet::new();
    for alias in config
        .aggregates
        .iter()
        .map(|a| &a.alias)
        .chain(config.calculated_fields.iter().map(|c| &c.alias))
    {
        if !seen_aliases.insert(alias) {
            return Err(ParityError::config(format!("duplicate metric alias '{alias}'")));
        }
    }

    for agg in &config.aggregates {
        let entry = registry.aggregate(&agg.kind)?;
        if !entry.allows_no_input
            && agg.source_column.is_none()
            && agg.target_column.is_none()
        {
            return Err(ParityError::config(format!(
                "aggregate '{}' requires a source/target column",
                agg.alias
            )));
        }
        if agg.source_column.is_some() != agg.target_column.is_some() {
            return Err(ParityError::config(format!(
                "metric '{}' has mismatched source/target column counts",
                agg.alias
            )));
        }
    }

    let mut by_depth: Vec<&CalculatedFieldConfig> = config.calculated_fields.iter().collect();
    by_depth.sort_by_key(|c| c.depth);
    let mut resolved: std::collections::HashSet<&str> = config
        .primary_keys
        .iter()
        .map(|c| c.alias.as_str())
        .chain(config.grouped_columns.iter().map(|c| c.alias.as_str()))
        .chain(config.aggregates.iter().map(|a| a.alias.as_str()))
        .collect();
    for field in &by_depth {
        registry.calculated(&field.kind)?;
        for input in &field.inputs {
            if !resolved.contains(input.as_str()) {
                return Err(ParityError::config(format!(
                    "calculated field '{}' references unresolved input '{input}' at depth {}",
                    field.alias, field.depth
                )));
            }
        }
        resolved.insert(field.alias.as_str());
    }

    Ok(())
}

impl Config {
    pub fn use_random_rows(&self) -> bool {
        self.use_random_rows
    }
}
