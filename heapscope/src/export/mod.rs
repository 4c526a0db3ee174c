//! Report export functionality
//!
//! This module provides functionality for exporting sampling reports to files.
//! Currently supports a JSON document for offline comparison between runs.

pub mod json;

pub use json::JsonReportExporter;
