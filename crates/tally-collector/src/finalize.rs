//! Helpers for writing finalize handlers.
//!
//! A finalize handler usually does several unrelated things (edit the message,
//! persist the result, clean up reactions). Each is best-effort: one failing
//! must not skip the others. [`FinalizeSteps`] runs them one by one, logs each
//! failure, and folds the failures into a single [`HandlerError`] for the
//! engine to report.

use std::fmt::Display;
use std::future::Future;

use tally_core::MessageId;
use tracing::warn;

use crate::error::HandlerError;

pub struct FinalizeSteps {
    message_id: MessageId,
    failures: Vec<String>,
}

impl FinalizeSteps {
    pub fn new(message_id: MessageId) -> Self {
        Self {
            message_id,
            failures: Vec::new(),
        }
    }

    /// Await one side effect. A failure is recorded and `None` returned.
    pub async fn run<T, E, F>(&mut self, label: &str, step: F) -> Option<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        match step.await {
            Ok(value) => Some(value),
            Err(e) => {
                self.record(label, e);
                None
            }
        }
    }

    /// Record a failure that did not come from [`run`](Self::run).
    pub fn record(&mut self, label: &str, err: impl Display) {
        warn!(message_id = %self.message_id, step = label, error = %err, "finalize step failed");
        self.failures.push(format!("{label}: {err}"));
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// `Ok` when every step succeeded, otherwise one error listing all failures.
    pub fn finish(self) -> Result<(), HandlerError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(HandlerError::Message(self.failures.join("; ")))
        }
    }
}
