//! Shared scaffolding for the scenario/invariant integration tests.

use ouroboros_parity_core::engine::{InMemoryEngine, Row, TabularResult};
use ouroboros_parity_core::expr::{ColumnType, Scalar};

/// Builds an [`InMemoryEngine`] with a single table registered under
/// `"public.t"`, from a column/type schema and row literals.
pub fn engine_with_table(schema: &[(&str, ColumnType)], rows: Vec<Vec<Scalar>>) -> InMemoryEngine {
    let engine = InMemoryEngine::new();
    let table_schema: Vec<(String, ColumnType)> =
        schema.iter().map(|(name, ty)| (name.to_string(), *ty)).collect();
    let columns: Vec<String> = table_schema.iter().map(|(n, _)| n.clone()).collect();
    let data_rows: Vec<Row> = rows
        .into_iter()
        .map(|values| {
            let mut row = Row::new();
            for ((name, _), value) in table_schema.iter().zip(values.into_iter()) {
                row.insert(name.clone(), value);
            }
            row
        })
        .collect();
    engine.register_table("public.t", table_schema, TabularResult::new(columns, data_rows));
    engine
}
