//! Random-Row Sampler: an optional preamble that narrows both sides to a
//! bounded random set of primary-key values before the real validation
//! runs, so large tables can still be spot-checked cheaply.

use crate::builder::ValidationBuilder;
use crate::config::FilterConfig;
use crate::engine::Engine;
use crate::error::{ParityError, Result};
use crate::expr::{ColumnType, Scalar, ValueExpr};

pub struct RandomRowSampler {
    batch_size: u64,
    trim_string_pks: bool,
}

impl RandomRowSampler {
    pub fn new(batch_size: u64, trim_string_pks: bool) -> Self {
        Self {
            batch_size,
            trim_string_pks,
        }
    }

    /// Samples a bounded set of primary-key values from `source` and
    /// installs an `IN` filter for that column on both sides of
    /// `builder`. Only the first primary key is ever used (multi-key
    /// random sampling is unsupported).
    #[tracing::instrument(skip(self, builder, source))]
    pub async fn sample(&self, builder: &mut ValidationBuilder, source: &dyn Engine) -> Result<()> {
        let pk = builder
            .get_primary_keys()
            .first()
            .cloned()
            .ok_or_else(|| ParityError::config("Primary Keys are required for Random Row Filters"))?;

        let (schema, table) = builder
            .source_table_name()
            .ok_or_else(|| ParityError::config("missing schema_name/table_name for validation"))?;
        let source_binary = source
            .column_type(Some(schema), table, &pk.source_column)
            .map(ColumnType::is_binary)
            .unwrap_or(false);

        let mut sample_expr = builder.filtered_source_table()?;
        let mut value = ValueExpr::column(pk.source_column.clone());
        if source_binary {
            value = value.cast(ColumnType::String);
        }
        if self.trim_string_pks {
            value = value.trim_end();
        }
        sample_expr = sample_expr
            .project(vec![(pk.alias.clone(), value)])
            .random_sample_limit(self.batch_size);

        let sampled = source.execute(&sample_expr).await?;
        if sampled.is_empty() {
            tracing::debug!("random row sample returned no rows; validation will compare empty sets");
            return Ok(());
        }

        let mut values: Vec<Scalar> = sampled
            .rows
            .iter()
            .filter_map(|row| row.get(&pk.alias).cloned())
            .collect();

        if source_binary {
            values = values
                .into_iter()
                .map(|v| match v {
                    Scalar::Str(hex) => Scalar::from_hex_string(&hex).unwrap_or(Scalar::Null),
                    other => other,
                })
                .collect();
        }

        builder.add_filter(FilterConfig::is_in(
            pk.source_column.clone(),
            pk.target_column.clone(),
            &values,
        ));
        Ok(())
    }
}
