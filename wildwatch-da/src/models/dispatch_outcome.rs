//! Aggregated result of one alert fan-out

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Failure reason recorded for recipients of an abandoned dispatch
pub const DISPATCH_ABANDONED: &str = "dispatch abandoned";

/// Outcome of a single dispatch attempt
///
/// Produced once when every delivery has settled and never mutated afterwards.
/// Every attempted recipient lands in exactly one of `succeeded` / `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// Recipients in the order they were handed to the dispatcher
    pub attempted: Vec<String>,
    pub succeeded: BTreeSet<String>,
    /// Recipient → failure reason
    pub failed: BTreeMap<String, String>,
    /// `failed` empty and `attempted` non-empty
    pub overall_success: bool,
    /// Text that was sent
    pub message: String,
    pub completed_at: DateTime<Utc>,
}

impl DispatchOutcome {
    /// Aggregate per-recipient results
    ///
    /// Results are keyed by recipient; order of `results` is irrelevant.
    pub fn from_results<I>(message: impl Into<String>, attempted: Vec<String>, results: I) -> Self
    where
        I: IntoIterator<Item = (String, Result<(), String>)>,
    {
        let mut succeeded = BTreeSet::new();
        let mut failed = BTreeMap::new();

        for (recipient, result) in results {
            match result {
                Ok(()) => {
                    succeeded.insert(recipient);
                }
                Err(reason) => {
                    failed.insert(recipient, reason);
                }
            }
        }

        let overall_success = failed.is_empty() && !attempted.is_empty();

        Self {
            attempted,
            succeeded,
            failed,
            overall_success,
            message: message.into(),
            completed_at: Utc::now(),
        }
    }

    /// Outcome for a dispatch whose caller stopped waiting
    pub fn abandoned(message: impl Into<String>, attempted: Vec<String>) -> Self {
        let results: Vec<_> = attempted
            .iter()
            .map(|r| (r.clone(), Err(DISPATCH_ABANDONED.to_string())))
            .collect();
        Self::from_results(message, attempted, results)
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}
