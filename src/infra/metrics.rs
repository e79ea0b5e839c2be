// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per SPIN iteration.
//
// Columns:
//   iteration       0-based iteration index
//   train_loss      mean unscaled composed loss over the epoch
//   real_loss       mean supervised loss on real batches
//   synthetic_loss  mean loss on self-generated batches
//                   (empty for iteration 0 / supervised mode)
//   eval_loss       mean loss over the evaluation batches
//   best_eval_loss  best eval loss so far
//   persisted       1 when the best slot was overwritten
//
// Example:
//   iteration,train_loss,real_loss,synthetic_loss,eval_loss,best_eval_loss,persisted
//   0,3.124500,3.124500,,3.089200,3.089200,1
//   1,3.210100,2.890100,3.200000,2.954300,2.954300,1
//
// Output file: <output_dir>/metrics.csv

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::spin::events::IterationSummary;

pub const METRICS_FILE: &str = "metrics.csv";
const HEADER: &str = "iteration,train_loss,real_loss,synthetic_loss,eval_loss,best_eval_loss,persisted";

/// Logs iteration metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet, so
    /// repeated runs append to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join(METRICS_FILE);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &IterationSummary) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        writeln!(f, "{}", format_row(m))?;

        tracing::debug!(
            "Logged iteration {} metrics: train_loss={:.4}, eval_loss={:.4}",
            m.iteration, m.train_loss, m.eval_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

fn format_row(m: &IterationSummary) -> String {
    let synthetic = m.synthetic_loss.map(|s| format!("{s:.6}")).unwrap_or_default();
    format!(
        "{},{:.6},{:.6},{},{:.6},{:.6},{}",
        m.iteration,
        m.train_loss,
        m.real_loss,
        synthetic,
        m.eval_loss,
        m.best_eval_loss,
        u8::from(m.persisted),
    )
}
