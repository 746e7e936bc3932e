//! End-to-end scenarios E1-E6 and a handful of the invariants, run against
//! two independent `InMemoryEngine` instances through the public `Run` API.

mod common;

use std::sync::Arc;

use ouroboros_parity_core::config::{
    AggregateConfig, ColumnAlias, Config, ConnDescriptor, ReportFormat, ValidationStatus, ValidationType,
};
use ouroboros_parity_core::expr::{AggregateKind, ColumnType, Scalar};
use ouroboros_parity_core::{MetricRegistry, Run};

fn base_config() -> Config {
    Config {
        source_conn: ConnDescriptor {
            kind: "memory".to_string(),
            params: Default::default(),
        },
        target_conn: ConnDescriptor {
            kind: "memory".to_string(),
            params: Default::default(),
        },
        validation_type: ValidationType::Column,
        custom_query_type: None,
        schema_name: Some("public".to_string()),
        table_name: Some("t".to_string()),
        target_schema_name: None,
        target_table_name: None,
        primary_keys: Vec::new(),
        grouped_columns: Vec::new(),
        aggregates: Vec::new(),
        calculated_fields: Vec::new(),
        filters: Vec::new(),
        threshold: 0.0,
        result_handler: Default::default(),
        format: ReportFormat::Json,
        filter_status: Default::default(),
        run_id: Some("test-run".to_string()),
        labels: Default::default(),
        max_recursive_query_size: 10_000,
        random_row_batch_size: 100,
        use_random_rows: false,
        trim_string_pks: false,
        verbose: false,
    }
}

fn count_agg(alias: &str, column: &str) -> AggregateConfig {
    AggregateConfig {
        alias: alias.to_string(),
        kind: AggregateKind::Count,
        source_column: Some(column.to_string()),
        target_column: Some(column.to_string()),
        cast: None,
    }
}

#[tokio::test]
async fn e1_perfect_match_column() {
    let schema = [("col_a", ColumnType::Int64), ("col_b", ColumnType::String)];
    let rows = vec![
        vec![Scalar::Int(1), Scalar::Str("a".to_string())],
        vec![Scalar::Int(1), Scalar::Str("b".to_string())],
    ];
    let source = common::engine_with_table(&schema, rows.clone());
    let target = common::engine_with_table(&schema, rows);

    let mut config = base_config();
    config.aggregates = vec![count_agg("count_a", "col_a"), count_agg("count_b", "col_b")];

    let run = Run::new(config, Arc::new(MetricRegistry::new()), Arc::new(source), Arc::new(target), false);
    let report = run.execute().await.expect("validation run");

    assert_eq!(report.len(), 2);
    for metric in &report {
        assert_eq!(metric.source_agg_value, serde_json::json!(2));
        assert_eq!(metric.target_agg_value, serde_json::json!(2));
        assert_eq!(metric.pct_difference, Some(0.0));
        assert_eq!(metric.validation_status, ValidationStatus::Success);
    }
}

#[tokio::test]
async fn e2_zero_source_rule() {
    let schema = [("col_a", ColumnType::Int64), ("col_b", ColumnType::String)];
    let source = common::engine_with_table(&schema, vec![vec![Scalar::Null, Scalar::Str("a".to_string())]]);
    let target = common::engine_with_table(
        &schema,
        vec![
            vec![Scalar::Int(1), Scalar::Str("a".to_string())],
            vec![Scalar::Int(1), Scalar::Str("b".to_string())],
        ],
    );

    let mut config = base_config();
    config.aggregates = vec![count_agg("count_a", "col_a")];

    let run = Run::new(config, Arc::new(MetricRegistry::new()), Arc::new(source), Arc::new(target), false);
    let report = run.execute().await.expect("validation run");

    assert_eq!(report.len(), 1);
    assert_eq!(report[0].pct_difference, Some(100.0));
    assert_eq!(report[0].validation_status, ValidationStatus::Fail);
}

#[tokio::test]
async fn e3_threshold_boundary_success() {
    let schema = [("col_a", ColumnType::Int64)];
    let source = common::engine_with_table(&schema, vec![vec![Scalar::Int(1)], vec![Scalar::Int(1)]]);
    let target_rows: Vec<Vec<Scalar>> = (0..5).map(|_| vec![Scalar::Int(1)]).collect();
    let target = common::engine_with_table(&schema, target_rows);

    let mut config = base_config();
    config.threshold = 150.0;
    config.aggregates = vec![count_agg("count_a", "col_a")];

    let run = Run::new(config, Arc::new(MetricRegistry::new()), Arc::new(source), Arc::new(target), false);
    let report = run.execute().await.expect("validation run");

    assert_eq!(report.len(), 1);
    assert_eq!(report[0].pct_difference, Some(150.0));
    assert_eq!(report[0].validation_status, ValidationStatus::Success);
}

#[tokio::test]
async fn e3b_threshold_boundary_failure_just_over() {
    let schema = [("col_a", ColumnType::Int64)];
    let source = common::engine_with_table(&schema, vec![vec![Scalar::Int(1)], vec![Scalar::Int(1)]]);
    let target_rows: Vec<Vec<Scalar>> = (0..6).map(|_| vec![Scalar::Int(1)]).collect();
    let target = common::engine_with_table(&schema, target_rows);

    let mut config = base_config();
    config.threshold = 150.0;
    config.aggregates = vec![count_agg("count_a", "col_a")];

    let run = Run::new(config, Arc::new(MetricRegistry::new()), Arc::new(source), Arc::new(target), false);
    let report = run.execute().await.expect("validation run");

    assert_eq!(report.len(), 1);
    assert_eq!(report[0].pct_difference, Some(200.0));
    assert_eq!(report[0].validation_status, ValidationStatus::Fail);
}

#[tokio::test]
async fn e4_grouped_perfect_match() {
    let schema = [("date", ColumnType::Date), ("value", ColumnType::Int64)];
    let rows: Vec<Vec<Scalar>> = (0..10)
        .map(|_| vec![Scalar::Str("2026-07-30".to_string()), Scalar::Int(1)])
        .collect();
    let source = common::engine_with_table(&schema, rows.clone());
    let target = common::engine_with_table(&schema, rows);

    let mut config = base_config();
    config.grouped_columns = vec![ColumnAlias {
        alias: "date_value".to_string(),
        source_column: "date".to_string(),
        target_column: "date".to_string(),
        cast: None,
    }];
    config.aggregates = vec![AggregateConfig {
        alias: "sum_value".to_string(),
        kind: AggregateKind::Sum,
        source_column: Some("value".to_string()),
        target_column: Some("value".to_string()),
        cast: None,
    }];

    let run = Run::new(config, Arc::new(MetricRegistry::new()), Arc::new(source), Arc::new(target), false);
    let report = run.execute().await.expect("validation run");

    assert_eq!(report.len(), 1);
    assert_eq!(
        report[0].group_by_columns.get("date_value"),
        Some(&serde_json::json!("2026-07-30"))
    );
    assert_eq!(report[0].difference, Some(0.0));
    assert_eq!(report[0].validation_status, ValidationStatus::Success);
}

#[tokio::test]
async fn e5_row_level_mismatch_drilldown() {
    let schema = [("id", ColumnType::Int64), ("col_a", ColumnType::Int64)];
    let source_rows: Vec<Vec<Scalar>> = (0..5).map(|i| vec![Scalar::Int(i), Scalar::Int(i)]).collect();
    let target_rows: Vec<Vec<Scalar>> = (0..5).map(|i| vec![Scalar::Int(i), Scalar::Int(i + 100)]).collect();
    let source = common::engine_with_table(&schema, source_rows);
    let target = common::engine_with_table(&schema, target_rows);

    let mut config = base_config();
    config.validation_type = ValidationType::Row;
    config.primary_keys = vec![ColumnAlias {
        alias: "id".to_string(),
        source_column: "id".to_string(),
        target_column: "id".to_string(),
        cast: None,
    }];
    config.aggregates = vec![AggregateConfig {
        alias: "col_a".to_string(),
        kind: AggregateKind::Max,
        source_column: Some("col_a".to_string()),
        target_column: Some("col_a".to_string()),
        cast: None,
    }];

    let run = Run::new(config, Arc::new(MetricRegistry::new()), Arc::new(source), Arc::new(target), false);
    let report = run.execute().await.expect("validation run");

    assert_eq!(report.len(), 5);
    assert!(report.iter().all(|m| m.validation_status == ValidationStatus::Fail));
}

#[tokio::test]
async fn e6_orphans_on_both_sides() {
    let schema = [
        ("id", ColumnType::Int64),
        ("col_a", ColumnType::Int64),
        ("col_b", ColumnType::Int64),
    ];
    let source_rows: Vec<Vec<Scalar>> = (0..100).map(|i| vec![Scalar::Int(i), Scalar::Int(i), Scalar::Int(i)]).collect();
    let target_rows = vec![vec![Scalar::Int(100), Scalar::Int(100), Scalar::Int(100)]];
    let source = common::engine_with_table(&schema, source_rows);
    let target = common::engine_with_table(&schema, target_rows);

    let mut config = base_config();
    config.validation_type = ValidationType::Row;
    config.primary_keys = vec![ColumnAlias {
        alias: "id".to_string(),
        source_column: "id".to_string(),
        target_column: "id".to_string(),
        cast: None,
    }];
    config.aggregates = vec![
        AggregateConfig {
            alias: "col_a".to_string(),
            kind: AggregateKind::Max,
            source_column: Some("col_a".to_string()),
            target_column: Some("col_a".to_string()),
            cast: None,
        },
        AggregateConfig {
            alias: "col_b".to_string(),
            kind: AggregateKind::Max,
            source_column: Some("col_b".to_string()),
            target_column: Some("col_b".to_string()),
            cast: None,
        },
    ];

    let run = Run::new(config, Arc::new(MetricRegistry::new()), Arc::new(source), Arc::new(target), false);
    let report = run.execute().await.expect("validation run");

    assert_eq!(report.len(), 202);
    assert!(report.iter().all(|m| m.validation_status == ValidationStatus::Fail));
}

#[tokio::test]
async fn filter_status_idempotence() {
    let schema = [("id", ColumnType::Int64), ("col_a", ColumnType::Int64)];
    let source_rows: Vec<Vec<Scalar>> = (0..5).map(|i| vec![Scalar::Int(i), Scalar::Int(i)]).collect();
    let target_rows: Vec<Vec<Scalar>> = (0..5)
        .map(|i| vec![Scalar::Int(i), Scalar::Int(if i == 0 { 999 } else { i })])
        .collect();
    let source = common::engine_with_table(&schema, source_rows);
    let target = common::engine_with_table(&schema, target_rows);

    let mut config = base_config();
    config.validation_type = ValidationType::Row;
    config.primary_keys = vec![ColumnAlias {
        alias: "id".to_string(),
        source_column: "id".to_string(),
        target_column: "id".to_string(),
        cast: None,
    }];
    config.aggregates = vec![AggregateConfig {
        alias: "col_a".to_string(),
        kind: AggregateKind::Max,
        source_column: Some("col_a".to_string()),
        target_column: Some("col_a".to_string()),
        cast: None,
    }];
    config.filter_status = [ValidationStatus::Fail].into_iter().collect();

    let run = Run::new(config, Arc::new(MetricRegistry::new()), Arc::new(source), Arc::new(target), false);
    let report = run.execute().await.expect("validation run");

    assert_eq!(report.len(), 1);
    assert_eq!(report[0].validation_status, ValidationStatus::Fail);
}
