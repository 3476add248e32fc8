use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStage {
    Indexing,
    Compression,
    Processing,
    Finalize,
    Complete,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Indexing => "indexing",
            ProgressStage::Compression => "compression",
            ProgressStage::Processing => "processing",
            ProgressStage::Finalize => "finalize",
            ProgressStage::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub percent: u8,
    pub stage: ProgressStage,
}

/// Reports progress to an optional channel.
///
/// Percent values sent through one reporter never decrease, 100 is sent at
/// most once, and nothing is sent after [`ProgressReporter::fail`]. A
/// disconnected receiver is ignored.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    sink: Option<UnboundedSender<ProgressEvent>>,
    last: AtomicU8,
    closed: AtomicBool,
}

impl ProgressReporter {
    pub fn new(sink: UnboundedSender<ProgressEvent>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::default()
        }
    }

    /// A reporter that drops every event.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn report(&self, stage: ProgressStage, percent: u8) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let percent = percent.min(99);
        // fetch_max keeps the sequence monotonic under concurrent callers
        let previous = self.last.fetch_max(percent, Ordering::AcqRel);
        if percent < previous {
            return;
        }
        self.send(ProgressEvent { percent, stage });
    }

    /// Linear progress through the processing stage, 30 to 90.
    pub fn processing(&self, done: usize, total: usize) {
        let fraction = if total == 0 { 1.0 } else { done as f64 / total as f64 };
        let percent = 30.0 + 60.0 * fraction.clamp(0.0, 1.0);
        self.report(ProgressStage::Processing, percent.round() as u8);
    }

    /// Send the single 100 event and close the reporter.
    pub fn complete(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.last.store(100, Ordering::Release);
        self.send(ProgressEvent {
            percent: 100,
            stage: ProgressStage::Complete,
        });
    }

    /// Close the reporter without completing it.
    pub fn fail(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn last_percent(&self) -> u8 {
        self.last.load(Ordering::Acquire)
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(sink) = &self.sink {
            let _ = sink.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<u8> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event.percent);
        }
        out
    }

    #[test]
    fn test_never_decreases() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let progress = ProgressReporter::new(tx);
        progress.report(ProgressStage::Compression, 20);
        progress.report(ProgressStage::Indexing, 10);
        progress.processing(1, 2);
        progress.complete();
        assert_eq!(drain(&mut rx), vec![20, 60, 100]);
    }

    #[test]
    fn test_complete_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let progress = ProgressReporter::new(tx);
        progress.complete();
        progress.complete();
        progress.report(ProgressStage::Finalize, 95);
        assert_eq!(drain(&mut rx), vec![100]);
    }

    #[test]
    fn test_silent_after_failure() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let progress = ProgressReporter::new(tx);
        progress.report(ProgressStage::Indexing, 10);
        progress.fail();
        progress.processing(1, 1);
        progress.complete();
        assert_eq!(drain(&mut rx), vec![10]);
    }

    #[test]
    fn test_only_complete_reaches_hundred() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let progress = ProgressReporter::new(tx);
        progress.report(ProgressStage::Finalize, 100);
        assert_eq!(drain(&mut rx), vec![99]);
    }
}
