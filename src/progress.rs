use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started {
        url: String,
        total: Option<u64>,
    },
    /// Emitted after every chunk written to disk.
    Advanced {
        bytes_written: u64,
        total: Option<u64>,
    },
    Finished {
        bytes_written: u64,
        elapsed: Duration,
    },
    Failed {
        message: String,
    },
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}
