//! The orchestration layer: resolves compositions, gathers render inputs to
//! a fixed point, drives the per-input pipeline concurrently, and renders
//! the aggregated result as a report.

pub mod clients;
pub mod error;
pub mod processor;
pub mod report;
pub mod requirements;
pub mod resolver;

pub use clients::Clients;
pub use error::{PipelineError, Result};
pub use processor::{Processor, ProcessorConfig, ProcessorReport, SchemaValidationError};
pub use requirements::{GatheredInputs, RequirementsProvider};
pub use resolver::{resolve, ResolvedComposition};
