//! Output formatting module
//!
//! Renders templates, validation reports, routes and resolutions.

mod formatter;

pub use formatter::{OutputFormat, ReportFormatter};
