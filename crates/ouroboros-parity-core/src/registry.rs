//! Metric Registry: the single source of truth for supported aggregate
//! and calculated-field kinds, consulted by the Validation Builder to
//! build expression templates and by the Combiner to decide whether a
//! metric compares numerics, strings, or custom-typed values.

use crate::error::{ParityError, Result};
use crate::expr::{AggregateKind, CalculatedKind};

/// How the Combiner should compare a metric's source/target values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonKind {
    Numeric,
    String,
    /// An engine-specific custom kind the registry does not further
    /// classify; the Combiner falls back to direct equality.
    Custom,
}

/// Entry describing one supported aggregate kind.
pub struct AggregateEntry {
    pub kind: AggregateKind,
    pub comparison: ComparisonKind,
    /// Whether this aggregate accepts no input column (COUNT(*)).
    pub allows_no_input: bool,
}

/// Entry describing one supported calculated-field kind.
pub struct CalculatedEntry {
    pub kind: CalculatedKind,
    pub comparison: ComparisonKind,
    pub min_inputs: usize,
}

/// Enumerates supported aggregate and calculated-field kinds.
pub struct MetricRegistry {
    aggregates: Vec<AggregateEntry>,
    calculated: Vec<CalculatedEntry>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self {
            aggregates: vec![
                AggregateEntry {
                    kind: AggregateKind::Count,
                    comparison: ComparisonKind::Numeric,
                    allows_no_input: true,
                },
                AggregateEntry {
                    kind: AggregateKind::Sum,
                    comparison: ComparisonKind::Numeric,
                    allows_no_input: false,
                },
                AggregateEntry {
                    kind: AggregateKind::Min,
                    comparison: ComparisonKind::Numeric,
                    allows_no_input: false,
                },
                AggregateEntry {
                    kind: AggregateKind::Max,
                    comparison: ComparisonKind::Numeric,
                    allows_no_input: false,
                },
                AggregateEntry {
                    kind: AggregateKind::Avg,
                    comparison: ComparisonKind::Numeric,
                    allows_no_input: false,
                },
                AggregateEntry {
                    kind: AggregateKind::BitXor,
                    comparison: ComparisonKind::Numeric,
                    allows_no_input: false,
                },
            ],
            calculated: vec![
                CalculatedEntry {
                    kind: CalculatedKind::Length,
                    comparison: ComparisonKind::Numeric,
                    min_inputs: 1,
                },
                CalculatedEntry {
                    kind: CalculatedKind::Upper,
                    comparison: ComparisonKind::String,
                    min_inputs: 1,
                },
                CalculatedEntry {
                    kind: CalculatedKind::Concat,
                    comparison: ComparisonKind::String,
                    min_inputs: 1,
                },
            ],
        }
    }
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an additional custom aggregate kind the caller's engine
    /// implements (the in-memory engine does not).
    pub fn with_custom_aggregate(mut self, name: impl Into<String>, comparison: ComparisonKind) -> Self {
        self.aggregates.push(AggregateEntry {
            kind: AggregateKind::Custom(name.into()),
            comparison,
            allows_no_input: false,
        });
        self
    }

    pub fn aggregate(&self, kind: &AggregateKind) -> Result<&AggregateEntry> {
        self.aggregates
            .iter()
            .find(|e| &e.kind == kind)
            .ok_or_else(|| ParityError::config(format!("unknown aggregate kind '{kind}'")))
    }

    pub fn calculated(&self, kind: &CalculatedKind) -> Result<&CalculatedEntry> {
        self.calculated
            .iter()
            .find(|e| &e.kind == kind)
            .ok_or_else(|| ParityError::config(format!("unknown calculated-field kind '{kind}'")))
    }
}
