//! Minimal relational-algebra capability set consumed by the core.
//!
//! This models the "Query-expression library" collaborator named in the
//! purpose/scope: a real engine would lower `Expr` to engine-specific SQL
//! (or a Mongo aggregation pipeline, etc). The core only ever builds and
//! consumes this capability set: projection, aliased projection, mutation,
//! cast, filter, group-by, aggregate, literal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Column/literal type, mirroring the cast targets named in the external
/// interfaces section (`string`, `binary`, `int64`, `date`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Int64,
    Float64,
    String,
    Binary,
    Bool,
    Date,
}

impl ColumnType {
    pub const fn is_binary(self) -> bool {
        matches!(self, Self::Binary)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Binary => "binary",
            Self::Bool => "bool",
            Self::Date => "date",
        };
        write!(f, "{s}")
    }
}

/// A scalar value flowing through literals, casts, and aggregate results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Binary(Vec<u8>),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Binary primary keys are always hex-stringified in memory so cross
    /// engine comparisons agree on a normalized scalar representation.
    pub fn to_hex_string(&self) -> Option<String> {
        match self {
            Self::Binary(bytes) => Some(bytes.iter().map(|b| format!("{b:02x}")).collect()),
            _ => None,
        }
    }

    pub fn from_hex_string(hex: &str) -> Option<Self> {
        if hex.len() % 2 != 0 {
            return None;
        }
        let mut bytes = Vec::with_capacity(hex.len() / 2);
        for i in (0..hex.len()).step_by(2) {
            bytes.push(u8::from_str_radix(&hex[i..i + 2], 16).ok()?);
        }
        Some(Self::Binary(bytes))
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Str(s) => serde_json::Value::from(s.clone()),
            Self::Bool(b) => serde_json::Value::from(*b),
            Self::Binary(_) => {
                // Tagged so a round trip through JSON (e.g. the Random-Row
                // Sampler's IN filter) can tell a hex-stringified binary
                // value apart from an ordinary string column.
                let mut obj = serde_json::Map::new();
                obj.insert(
                    "$bin".to_string(),
                    serde_json::Value::from(self.to_hex_string().unwrap_or_default()),
                );
                serde_json::Value::Object(obj)
            }
        }
    }

    /// Inverse of [`Scalar::to_json`].
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .unwrap_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN))),
            serde_json::Value::String(s) => Self::Str(s.clone()),
            serde_json::Value::Object(obj) => obj
                .get("$bin")
                .and_then(|h| h.as_str())
                .and_then(Self::from_hex_string)
                .unwrap_or_else(|| Self::Str(value.to_string())),
            serde_json::Value::Array(_) => Self::Str(value.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Binary(_) => write!(f, "{}", self.to_hex_string().unwrap_or_default()),
        }
    }
}

/// Supported aggregate kinds. `Custom` carries through an engine-specific
/// name the registry does not otherwise model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    BitXor,
    Custom(String),
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count => write!(f, "count"),
            Self::Sum => write!(f, "sum"),
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
            Self::Avg => write!(f, "avg"),
            Self::BitXor => write!(f, "bit_xor"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Supported calculated-field kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculatedKind {
    Length,
    Upper,
    Concat,
    Custom(String),
}

impl fmt::Display for CalculatedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length => write!(f, "length"),
            Self::Upper => write!(f, "upper"),
            Self::Concat => write!(f, "concat"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// A scalar-producing expression: column reference, literal, cast, or a
/// calculated-field application over other value expressions.
#[derive(Debug, Clone)]
pub enum ValueExpr {
    Column(String),
    Literal(Scalar),
    Cast {
        input: Box<ValueExpr>,
        to: ColumnType,
    },
    Calculated {
        kind: CalculatedKind,
        inputs: Vec<ValueExpr>,
    },
    /// Trims trailing whitespace. Not part of the calculated-field
    /// registry — it is a sampler-only normalization step (`trim_string_pks`).
    TrimEnd(Box<ValueExpr>),
}

impl ValueExpr {
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    pub fn cast(self, to: ColumnType) -> Self {
        Self::Cast {
            input: Box::new(self),
            to,
        }
    }

    pub fn trim_end(self) -> Self {
        Self::TrimEnd(Box::new(self))
    }
}

/// An aggregate application over an optional pre-cast input (COUNT(*) has
/// no input).
#[derive(Debug, Clone)]
pub struct AggregateCall {
    pub kind: AggregateKind,
    pub input: Option<ValueExpr>,
}

/// A comparison predicate, restricted to the filter kinds in the config
/// vocabulary (equals, is_in, custom passthrough).
#[derive(Debug, Clone)]
pub enum Predicate {
    Equals(ValueExpr, ValueExpr),
    IsIn(ValueExpr, Vec<Scalar>),
    /// Opaque passthrough for an engine-specific filter the core does not
    /// interpret itself.
    Custom(String),
    And(Vec<Predicate>),
}

/// The relational-algebra expression tree handed to an [`crate::engine::Engine`].
#[derive(Debug, Clone)]
pub enum Expr {
    Table {
        schema: Option<String>,
        name: String,
    },
    Filter {
        input: Box<Expr>,
        predicate: Predicate,
    },
    /// Adds or replaces a single named column (used for calculated fields
    /// and for the binary-primary-key hex mutation in the sampler).
    Mutate {
        input: Box<Expr>,
        column: String,
        value: ValueExpr,
    },
    /// Project named aliased columns. An empty list means "select *".
    Project {
        input: Box<Expr>,
        columns: Vec<(String, ValueExpr)>,
    },
    GroupByAggregate {
        input: Box<Expr>,
        group_by: Vec<(String, ValueExpr)>,
        aggregates: Vec<(String, AggregateCall)>,
    },
    /// A bounded random sample of rows, pushed down to the engine as an
    /// `ORDER BY random() LIMIT n`-style operation.
    RandomSampleLimit {
        input: Box<Expr>,
        limit: u64,
    },
}

impl Expr {
    pub fn table(schema: Option<impl Into<String>>, name: impl Into<String>) -> Self {
        Self::Table {
            schema: schema.map(Into::into),
            name: name.into(),
        }
    }

    pub fn filter(self, predicate: Predicate) -> Self {
        Self::Filter {
            input: Box::new(self),
            predicate,
        }
    }

    pub fn mutate(self, column: impl Into<String>, value: ValueExpr) -> Self {
        Self::Mutate {
            input: Box::new(self),
            column: column.into(),
            value,
        }
    }

    pub fn project(self, columns: Vec<(String, ValueExpr)>) -> Self {
        Self::Project {
            input: Box::new(self),
            columns,
        }
    }

    pub fn group_by_aggregate(
        self,
        group_by: Vec<(String, ValueExpr)>,
        aggregates: Vec<(String, AggregateCall)>,
    ) -> Self {
        Self::GroupByAggregate {
            input: Box::new(self),
            group_by,
            aggregates,
        }
    }

    pub fn random_sample_limit(self, limit: u64) -> Self {
        Self::RandomSampleLimit {
            input: Box::new(self),
            limit,
        }
    }
}
