//! Loads JSON table fixtures into an [`InMemoryEngine`], standing in for
//! the real connection/client factory this crate does not implement.
//!
//! A fixture file is a JSON object mapping a `"schema.table"` key (the
//! exact string `Engine::schema`/`Engine::execute` will look up) to a
//! `{"schema": [[name, type], ...], "rows": [{...}, ...]}` record.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use ouroboros_parity_core::engine::{InMemoryEngine, Row, TabularResult};
use ouroboros_parity_core::expr::{ColumnType, Scalar};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct FixtureTable {
    schema: Vec<(String, ColumnType)>,
    rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

pub fn load_engine(path: &Path) -> Result<InMemoryEngine> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading fixture file {}", path.display()))?;
    let tables: HashMap<String, FixtureTable> = serde_json::from_str(&text)
        .with_context(|| format!("parsing fixture file {}", path.display()))?;

    let engine = InMemoryEngine::new();
    for (key, table) in tables {
        let columns: Vec<String> = table.schema.iter().map(|(name, _)| name.clone()).collect();
        let rows: Vec<Row> = table
            .rows
            .into_iter()
            .map(|obj| {
                let mut row = Row::new();
                for (name, _) in &table.schema {
                    let value = obj.get(name).map(Scalar::from_json).unwrap_or(Scalar::Null);
                    row.insert(name.clone(), value);
                }
                row
            })
            .collect();
        engine.register_table(key, table.schema, TabularResult::new(columns, rows));
    }
    Ok(engine)
}
