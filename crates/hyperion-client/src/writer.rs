use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use chrono::Local;
use hyperion_core::config::OutputFormat;
use hyperion_core::error::AppError;
use hyperion_core::models::Record;
use hyperion_core::traits::ResultWriter;
use serde_json::Value;

/// Writes `results_<YYYYmmdd_HHMMSS>.<ext>` files into an output directory.
#[derive(Debug, Clone)]
pub struct FileWriter {
    output_dir: PathBuf,
}

impl FileWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn target_path(&self, format: OutputFormat) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        self.output_dir
            .join(format!("results_{stamp}.{}", format.extension()))
    }
}

impl ResultWriter for FileWriter {
    fn write(&self, records: &[Record], format: OutputFormat) -> Result<PathBuf, AppError> {
        fs::create_dir_all(&self.output_dir).map_err(|e| {
            AppError::Output(format!(
                "Cannot create {}: {e}",
                self.output_dir.display()
            ))
        })?;

        let path = self.target_path(format);
        let file = File::create(&path)
            .map_err(|e| AppError::Output(format!("Cannot create {}: {e}", path.display())))?;
        let mut out = BufWriter::new(file);

        match format {
            OutputFormat::Json => write_json(&mut out, records)?,
            OutputFormat::Csv => write_csv(&mut out, records)?,
        }
        out.flush()
            .map_err(|e| AppError::Output(format!("Cannot write {}: {e}", path.display())))?;

        tracing::debug!(path = %path.display(), records = records.len(), "Results written");
        Ok(path)
    }
}

/// Pretty-printed JSON array, two-space indent.
fn write_json<W: Write>(out: &mut W, records: &[Record]) -> Result<(), AppError> {
    serde_json::to_writer_pretty(&mut *out, records)?;
    writeln!(out).map_err(|e| AppError::Output(e.to_string()))
}

/// Header taken from the first record's keys, in order. Later records are
/// projected onto that header: missing keys become empty cells and extra
/// keys are dropped.
fn write_csv<W: Write>(out: &mut W, records: &[Record]) -> Result<(), AppError> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    let header: Vec<&str> = first.keys().map(String::as_str).collect();

    let mut csv = csv::Writer::from_writer(out);
    csv.write_record(&header)
        .map_err(|e| AppError::Output(e.to_string()))?;

    for record in records {
        let row = header
            .iter()
            .map(|key| record.get(*key).map(cell).unwrap_or_default());
        csv.write_record(row)
            .map_err(|e| AppError::Output(e.to_string()))?;
    }

    csv.flush().map_err(|e| AppError::Output(e.to_string()))
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
