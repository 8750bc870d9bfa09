use std::fmt;

/// One unit of scheduler work: fetch the chain of a single symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    /// Symbol as listed in the batch file (no marker).
    pub symbol: String,
    /// Failed attempts so far. Requeues for staleness do not count.
    pub attempts: u32,
    /// Set when the task went back to the queue after a stale snapshot.
    pub queued_for_retry: bool,
    /// Number of times the task has been requeued.
    pub requeues: u32,
}

impl FetchTask {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            attempts: 0,
            queued_for_retry: false,
            requeues: 0,
        }
    }

    /// The same task, marked for another pass after a refresh request.
    pub fn requeued(self) -> Self {
        Self {
            queued_for_retry: true,
            requeues: self.requeues + 1,
            ..self
        }
    }
}

/// Lifecycle of a fetch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchState {
    Fetching,
    Succeeded,
    Requeued,
    Failed,
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fetching => "fetching",
            Self::Succeeded => "succeeded",
            Self::Requeued => "requeued",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}
