//! Shared CLI argument types

mod common;
mod global;

pub use common::{OutputFormat, ReportFormat};
pub use global::GlobalOptions;
