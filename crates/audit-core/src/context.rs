//! Per-run context threaded through every auditor call: a fixed `now` so age
//! calculations (`> 7 days`, `> 90 days`, ...) are deterministic within a run,
//! a cooperative cancellation flag, and the retry budget cloud calls use.

use crate::cloud::RetryBudget;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cooperative, clonable cancellation flag. Cancelling does not abort
/// in-flight work; auditors and the orchestrator check it between resources
/// and between services respectively.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct RunContext {
    pub now: DateTime<Utc>,
    pub cancel: CancelToken,
    pub retry_budget: RetryBudget,
}

impl RunContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            cancel: CancelToken::new(),
            retry_budget: RetryBudget::default(),
        }
    }
}
