//! Generator module: produces the phase artifacts of a job.
//!
//! The `StepInvoker` trait is the seam between the pipeline engine and the
//! content generator. `ProcessStepInvoker` runs an external program, reads
//! the output directory it reports and renders one markdown document per
//! phase into the project directory.

mod config;
mod error;
mod materialize;
mod process;
mod traits;
mod types;

pub use config::GeneratorConfig;
pub use error::GeneratorError;
pub use materialize::{materialize, render_document, Materialized};
pub use process::{parse_output_dir, ProcessStepInvoker};
pub use traits::StepInvoker;
pub use types::{GenerationOutput, GenerationRequest};
