//! Helpers for generating and post-processing HCL configuration files.
//!
//! Generated configs are noisy: attributes rendered at their default or
//! empty value, and dashboard JSON inlined as giant string literals. The
//! post-processing passes in this module declutter them; both are idempotent
//! so re-running a generation pipeline leaves clean files untouched.

mod config;
mod postprocess;

pub use config::{matches_pattern, GenerateConfig, OutputFormat};
pub use postprocess::{extract_dashboards, strip_defaults};

use thiserror::Error;

/// Errors from the generation helpers.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// A file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An HCL file could not be parsed.
    #[error("HCL parse error: {0}")]
    Parse(String),

    /// Embedded JSON could not be parsed or rendered.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
