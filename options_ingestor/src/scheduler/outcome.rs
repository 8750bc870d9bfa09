use std::fmt;

use crate::models::quote::{ChainSnapshot, OptionQuote, StockSnapshot};
use crate::models::task::{FetchState, FetchTask};
use crate::providers::FeedError;

/// Terminal result of one pass of a task through the scheduler.
#[derive(Debug)]
pub enum TaskOutcome {
    Succeeded {
        task: FetchTask,
        snapshot: ChainSnapshot,
    },
    Requeued(FetchTask),
    Failed {
        task: FetchTask,
        error: FeedError,
    },
}

impl TaskOutcome {
    pub fn state(&self) -> FetchState {
        match self {
            Self::Succeeded { .. } => FetchState::Succeeded,
            Self::Requeued(_) => FetchState::Requeued,
            Self::Failed { .. } => FetchState::Failed,
        }
    }
}

/// Counters of a scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Staleness requeues across all symbols.
    pub requeued: usize,
    pub failed_symbols: Vec<String>,
}

impl fmt::Display for FetchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {} symbols successfully, {} failed, {} requeued",
            self.succeeded, self.failed, self.requeued
        )?;
        if !self.failed_symbols.is_empty() {
            write!(f, "\nFailed symbols: {}", self.failed_symbols.join(", "))?;
        }
        Ok(())
    }
}

/// Everything a scheduler run accumulated.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub stocks: Vec<StockSnapshot>,
    pub options: Vec<OptionQuote>,
    pub report: FetchReport,
}

impl FetchOutcome {
    pub(crate) fn record_success(&mut self, snapshot: ChainSnapshot) {
        self.report.succeeded += 1;
        self.stocks.push(snapshot.stock);
        self.options.extend(snapshot.options);
    }

    pub(crate) fn record_failure(&mut self, symbol: String) {
        self.report.failed += 1;
        self.report.failed_symbols.push(symbol);
    }
}
