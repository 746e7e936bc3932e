//! Dual-engine dataset validation core.
//!
//! Compares two tabular datasets living in independent query engines and
//! produces a structured, row-per-metric validation report. The public
//! surface is [`orchestrator::Run`]; everything else (the builder, sampler,
//! executor, combiner, recursive row validator) composes underneath it and
//! is exposed for callers who want to drive a validation step by step, or
//! who bring their own [`engine::Engine`] implementation.

pub mod builder;
pub mod combiner;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod expr;
pub mod metadata;
pub mod orchestrator;
pub mod recursive;
pub mod registry;
pub mod result_handler;
pub mod sampler;
pub mod schema_validation;

pub use builder::ValidationBuilder;
pub use config::Config;
pub use engine::{Engine, InMemoryEngine, Row, TabularResult};
pub use error::{ParityError, Result};
pub use metadata::Metric;
pub use orchestrator::Run;
pub use registry::MetricRegistry;
pub use sampler::RandomRowSampler;
