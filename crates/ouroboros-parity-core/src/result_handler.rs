//! Result Handler: the sink the Orchestrator hands the finished report to.
//! Out of scope per the purpose/scope section beyond this thin interface;
//! three concrete renderers are provided so the crate is runnable
//! standalone.

use crate::config::ReportFormat;
use crate::error::Result;
use crate::metadata::Metric;

/// `execute(report) -> return value surfaced to caller`, per the external
/// interfaces section. Implementors decide what "handled" means (printed,
/// written, inserted into a sink table).
pub trait ResultHandler: Send + Sync {
    fn execute(&self, report: &[Metric]) -> Result<()>;
}

/// Renders a fixed-width table to stdout. `table` and `text` formats both
/// route here — the two only differ in a real terminal renderer's color
/// support, which this crate does not attempt.
pub struct StdoutTableHandler;

impl ResultHandler for StdoutTableHandler {
    fn execute(&self, report: &[Metric]) -> Result<()> {
        if report.is_empty() {
            println!("(no validation rows)");
            return Ok(());
        }
        println!(
            "{:<28} {:<10} {:<12} {:>14} {:>14} {:>10} {:>8}  status",
            "validation_name", "agg", "group_by", "source", "target", "diff", "pct"
        );
        for row in report {
            let group = if row.group_by_columns.is_empty() {
                "-".to_string()
            } else {
                serde_json::to_string(&row.group_by_columns).unwrap_or_default()
            };
            println!(
                "{:<28} {:<10} {:<12} {:>14} {:>14} {:>10} {:>8}  {}",
                row.validation_name,
                row.aggregate_kind,
                group,
                row.source_agg_value,
                row.target_agg_value,
                row.difference.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
                row.pct_difference.map(|d| format!("{d:.2}")).unwrap_or_else(|| "-".to_string()),
                row.validation_status,
            );
        }
        Ok(())
    }
}

/// Emits the report as a JSON array on stdout.
pub struct JsonHandler;

impl ResultHandler for JsonHandler {
    fn execute(&self, report: &[Metric]) -> Result<()> {
        let text = serde_json::to_string_pretty(report)
            .map_err(|e| crate::error::ParityError::engine(format!("failed to serialize report: {e}")))?;
        println!("{text}");
        Ok(())
    }
}

/// Emits the report as CSV on stdout. Field ordering follows the Metric
/// report-row schema.
pub struct CsvHandler;

impl ResultHandler for CsvHandler {
    fn execute(&self, report: &[Metric]) -> Result<()> {
        println!(
            "run_id,validation_name,validation_type,source_table_name,target_table_name,\
             source_column_name,target_column_name,aggregate_kind,source_agg_value,\
             target_agg_value,difference,pct_difference,pct_threshold,validation_status,\
             group_by_columns,start_time,end_time"
        );
        for row in report {
            println!(
                "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
                row.run_id,
                csv_escape(&row.validation_name),
                row.validation_type,
                row.source_table_name.as_deref().unwrap_or(""),
                row.target_table_name.as_deref().unwrap_or(""),
                row.source_column_name.as_deref().unwrap_or(""),
                row.target_column_name.as_deref().unwrap_or(""),
                row.aggregate_kind,
                row.source_agg_value,
                row.target_agg_value,
                row.difference.map(|d| d.to_string()).unwrap_or_default(),
                row.pct_difference.map(|d| d.to_string()).unwrap_or_default(),
                row.pct_threshold,
                row.validation_status,
                csv_escape(&serde_json::to_string(&row.group_by_columns).unwrap_or_default()),
                row.start_time.to_rfc3339(),
                row.end_time.to_rfc3339(),
            );
        }
        Ok(())
    }
}

fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Builds the configured handler. The `kind` field of `ResultHandlerConfig`
/// names one of `stdout`, `json`, `csv`; anything else is a `ConfigError`.
pub fn build(format: ReportFormat) -> Box<dyn ResultHandler> {
    match format {
        ReportFormat::Table | ReportFormat::Text => Box::new(StdoutTableHandler),
        ReportFormat::Json => Box::new(JsonHandler),
        ReportFormat::Csv => Box::new(CsvHandler),
    }
}
