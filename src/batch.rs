//! Batch orchestration: run items sequentially, isolate failures, pace
//! upstream traffic with a fixed delay between items.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub label: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub warnings: Vec<String>,
}

impl BatchReport {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn record_success(&mut self) {
        self.total += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self) {
        self.total += 1;
        self.failed += 1;
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}: {}", self.label, message);
        self.warnings.push(message);
    }

    /// Fold the counts of a sub-batch into this one.
    pub fn merge(&mut self, other: BatchReport) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.warnings.extend(other.warnings);
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} succeeded, {} failed",
            self.label, self.succeeded, self.failed
        )?;
        if !self.warnings.is_empty() {
            write!(f, " ({} warnings)", self.warnings.len())?;
        }
        Ok(())
    }
}

/// Report plus the values produced by the items that succeeded.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub report: BatchReport,
    pub outputs: Vec<T>,
}

impl BatchOutcome<BatchReport> {
    /// For batches whose items are themselves batches: the nested reports
    /// merged, plus one failure per outer item that failed outright.
    pub fn flatten(self) -> BatchReport {
        let mut report = BatchReport::new(self.report.label.clone());
        for nested in self.outputs {
            report.merge(nested);
        }
        report.total += self.report.failed;
        report.failed += self.report.failed;
        report.warnings.extend(self.report.warnings);
        report
    }
}

pub struct BatchRunner {
    label: String,
    delay: Duration,
}

impl BatchRunner {
    pub fn new(label: impl Into<String>, delay: Duration) -> Self {
        Self {
            label: label.into(),
            delay,
        }
    }

    /// Process `items` one after another.
    ///
    /// A failing item is logged with its description and counted; the batch
    /// moves on. The delay is slept between items, never after the last one.
    pub async fn run<I, T, D, F, Fut>(&self, items: Vec<I>, describe: D, mut process: F) -> BatchOutcome<T>
    where
        D: Fn(&I) -> String,
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut report = BatchReport::new(self.label.clone());
        let mut outputs = Vec::new();
        let count = items.len();

        info!("{}: processing {} items", self.label, count);

        for (index, item) in items.into_iter().enumerate() {
            let description = describe(&item);
            match process(item).await {
                Ok(output) => {
                    report.record_success();
                    outputs.push(output);
                }
                Err(e) => {
                    error!("{}: {} failed: {}", self.label, description, e);
                    report.record_failure();
                }
            }

            if index + 1 < count && !self.delay.is_zero() {
                info!(
                    "{}: waiting {}s before next item ({}/{})",
                    self.label,
                    self.delay.as_secs_f64(),
                    index + 1,
                    count
                );
                tokio::time::sleep(self.delay).await;
            }
        }

        info!("{}", report);
        BatchOutcome { report, outputs }
    }
}
