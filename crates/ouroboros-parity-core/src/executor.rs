//! Executor: runs the source and target query expressions concurrently and
//! hands the two materialized results to the Combiner.

use std::sync::Arc;

use crate::engine::{same_engine_instance, Engine, TabularResult};
use crate::error::Result;
use crate::expr::Expr;

/// Chosen strategy for a single Executor dispatch. `Pushdown` is only ever
/// selected when source and target are literally the same engine instance
/// (`same_engine_instance`); no concrete engine shipped here can see both
/// sides of a real cross-engine pair, so in practice every run takes the
/// `InMemory` path. The distinction is kept because the strategy decision
/// belongs to the Orchestrator/Executor boundary, not to the engine trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    InMemory,
    Pushdown,
}

/// Decides between the two execution strategies purely from engine
/// identity, per the "`process_in_memory` is derived, not user-facing"
/// design note.
pub fn choose_strategy(source: &Arc<dyn Engine>, target: &Arc<dyn Engine>) -> ExecutionStrategy {
    if same_engine_instance(source, target) {
        ExecutionStrategy::Pushdown
    } else {
        ExecutionStrategy::InMemory
    }
}

/// Runs both sides' query expressions concurrently and returns both
/// materialized results. On failure from either side, the other result is
/// discarded and the error is surfaced; in `verbose` mode both sides'
/// resolved schemas are logged first.
#[tracing::instrument(skip(source, target, source_expr, target_expr))]
pub async fn execute(
    source: &dyn Engine,
    target: &dyn Engine,
    source_expr: &Expr,
    target_expr: &Expr,
    verbose: bool,
) -> Result<(TabularResult, TabularResult)> {
    let (source_result, target_result) =
        match tokio::try_join!(source.execute(source_expr), target.execute(target_expr)) {
            Ok(pair) => pair,
            Err(err) => {
                if verbose {
                    tracing::error!(
                        source_expr = ?source_expr,
                        target_expr = ?target_expr,
                        error = %err,
                        "engine execute failed; logging both sides' query shapes"
                    );
                }
                return Err(err);
            }
        };
    tracing::debug!(
        source_rows = source_result.rows.len(),
        target_rows = target_result.rows.len(),
        "executor obtained both sides' results"
    );
    Ok((source_result, target_result))
}
