//! JSON report document
//!
//! One document holds every run of an invocation, so repeated runs can be
//! compared offline:
//!
//! ```text
//! {
//!   "generator": "heapscope 0.1.0",
//!   "formatVersion": 1,
//!   "runs": [ { "heap_shape": ..., "classes": [ ... ] }, ... ]
//! }
//! ```

use crate::analysis::SamplingReport;
use crate::domain::ExportError;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct ReportDocument<'a> {
    generator: String,
    #[serde(rename = "formatVersion")]
    format_version: u32,
    runs: &'a [SamplingReport],
}

/// Collects sampling runs and writes them as one JSON document
#[derive(Debug, Default)]
pub struct JsonReportExporter {
    runs: Vec<SamplingReport>,
}

impl JsonReportExporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_run(&mut self, report: SamplingReport) {
        self.runs.push(report);
    }

    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Serialize all runs to `writer`
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails
    pub fn export<W: Write>(&self, mut writer: W) -> Result<(), ExportError> {
        let document = ReportDocument {
            generator: format!("heapscope {}", env!("CARGO_PKG_VERSION")),
            format_version: FORMAT_VERSION,
            runs: &self.runs,
        };
        serde_json::to_writer_pretty(&mut writer, &document)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Create (or truncate) `path` and export into it
    ///
    /// # Errors
    /// Returns [`ExportError::WriteFailed`] naming the path if it cannot be
    /// created, otherwise as [`export`](Self::export)
    pub fn export_to_path(&self, path: &Path) -> Result<(), ExportError> {
        let file = File::create(path)
            .map_err(|e| ExportError::WriteFailed(format!("{}: {e}", path.display())))?;
        self.export(BufWriter::new(file))
    }
}
