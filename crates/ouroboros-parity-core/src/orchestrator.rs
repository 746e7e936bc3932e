//! Orchestrator: owns configuration and run metadata, dispatches to the
//! correct validation mode, and forwards the finished report to the
//! Result Handler.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::builder::ValidationBuilder;
use crate::combiner;
use crate::config::{Config, ValidationType};
use crate::engine::Engine;
use crate::error::Result;
use crate::executor;
use crate::metadata::{Metric, RunMetadata};
use crate::recursive::{self, RecursionContext};
use crate::registry::MetricRegistry;
use crate::result_handler::{self, ResultHandler};
use crate::sampler::RandomRowSampler;
use crate::schema_validation;

/// One invocation of the orchestrator against one configuration, tagged by
/// `run_id`. `fresh_connections` records whether `Run` opened the engine
/// handles itself; only then does it own releasing them on exit.
pub struct Run {
    config: Config,
    registry: Arc<MetricRegistry>,
    source: Arc<dyn Engine>,
    target: Arc<dyn Engine>,
    fresh_connections: bool,
    run_meta: RunMetadata,
    result_handler: Box<dyn ResultHandler>,
}

impl Run {
    pub fn new(
        config: Config,
        registry: Arc<MetricRegistry>,
        source: Arc<dyn Engine>,
        target: Arc<dyn Engine>,
        fresh_connections: bool,
    ) -> Self {
        let run_id = config.run_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        let labels = config.labels.clone();
        let run_meta = RunMetadata::new(run_id, labels, config.validation_type);
        let result_handler = result_handler::build(config.format);
        Self {
            config,
            registry,
            source,
            target,
            fresh_connections,
            run_meta,
            result_handler,
        }
    }

    /// Dispatches per the validation type, runs the validation, and hands
    /// the report to the configured result handler before returning it.
    #[tracing::instrument(skip(self), fields(run_id = %self.run_meta.run_id))]
    pub async fn execute(mut self) -> Result<Vec<Metric>> {
        let mut builder = ValidationBuilder::new(self.config.clone(), self.registry.clone())?;
        self.run_meta.validations = builder.get_metadata();

        if self.config.use_random_rows() {
            let sampler = RandomRowSampler::new(self.config.random_row_batch_size, self.config.trim_string_pks);
            sampler.sample(&mut builder, self.source.as_ref()).await?;
        }

        let report = match self.config.validation_type {
            ValidationType::Row => {
                let group_list = builder.pop_grouped_fields();
                let ctx = RecursionContext {
                    source: &self.source,
                    target: &self.target,
                    run_meta: &self.run_meta,
                    registry: self.registry.as_ref(),
                    pct_threshold: self.config.threshold,
                    filter_status: &self.config.filter_status,
                    max_recursive_query_size: self.config.max_recursive_query_size,
                    verbose: self.config.verbose,
                };
                recursive::validate(builder, group_list, &ctx).await?
            }
            ValidationType::Schema => schema_validation::validate(
                &self.config,
                &self.run_meta,
                self.source.as_ref(),
                self.target.as_ref(),
            )?,
            ValidationType::Column | ValidationType::CustomQuery => {
                self.run_single(&builder).await?
            }
        };

        self.result_handler.execute(&report)?;
        if self.fresh_connections {
            tracing::debug!("run opened its own engine handles; releasing them now");
        }
        Ok(report)
    }

    /// Column / custom-query validation: a single Executor+Combiner pass in
    /// in-memory mode, with no drill-down recursion.
    async fn run_single(&self, builder: &ValidationBuilder) -> Result<Vec<Metric>> {
        let start_time = Utc::now();
        let source_expr = builder.get_source_query()?;
        let target_expr = builder.get_target_query()?;
        let (source_result, target_result) = executor::execute(
            self.source.as_ref(),
            self.target.as_ref(),
            &source_expr,
            &target_expr,
            self.config.verbose,
        )
        .await?;
        let end_time = Utc::now();

        let descriptors = builder.get_metadata();
        let join_keys: Vec<String> = if builder.is_row_keyed() {
            builder.get_primary_keys().iter().map(|pk| pk.alias.clone()).collect()
        } else {
            builder.get_group_aliases()
        };

        Ok(combiner::combine(
            &self.run_meta,
            self.registry.as_ref(),
            &descriptors,
            builder.source_table_name().map(|(s, t)| (s.to_string(), t.to_string())),
            builder.target_table_name().map(|(s, t)| (s.to_string(), t.to_string())),
            &join_keys,
            &source_result,
            &target_result,
            builder.is_row_keyed(),
            self.config.threshold,
            &self.config.filter_status,
            start_time,
            end_time,
        ))
    }
}

