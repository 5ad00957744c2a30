use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tally_core::MessageId;
use tokio::sync::mpsc;

use crate::error::CollectorError;
use crate::event::{Event, HandlerFailure};

/// Filter applied to every event before it can touch collector state.
pub type Predicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Immutable description of one collector: what to listen to and when to stop.
#[derive(Clone)]
pub struct CollectorSpec {
    pub target_message_id: MessageId,
    pub predicate: Option<Predicate>,
    pub idle_timeout_ms: Option<u64>,
    pub absolute_timeout_ms: Option<u64>,
    pub max_events: Option<usize>,
    /// Where caught callback failures are reported, besides the log.
    pub failures: Option<mpsc::UnboundedSender<HandlerFailure>>,
}

impl CollectorSpec {
    pub fn new(target_message_id: MessageId) -> Self {
        Self {
            target_message_id,
            predicate: None,
            idle_timeout_ms: None,
            absolute_timeout_ms: None,
            max_events: None,
            failures: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.idle_timeout_ms = Some(ms);
        self
    }

    pub fn idle_timeout(self, d: Duration) -> Self {
        self.idle_timeout_ms(duration_ms(d))
    }

    pub fn absolute_timeout_ms(mut self, ms: u64) -> Self {
        self.absolute_timeout_ms = Some(ms);
        self
    }

    pub fn absolute_timeout(self, d: Duration) -> Self {
        self.absolute_timeout_ms(duration_ms(d))
    }

    pub fn max_events(mut self, n: usize) -> Self {
        self.max_events = Some(n);
        self
    }

    pub fn report_failures_to(mut self, tx: mpsc::UnboundedSender<HandlerFailure>) -> Self {
        self.failures = Some(tx);
        self
    }

    /// Check the spec before any instance or subscription exists.
    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.predicate.is_none() {
            return Err(CollectorError::Validation(
                "a predicate is required".to_string(),
            ));
        }
        if self.idle_timeout_ms == Some(0) {
            return Err(CollectorError::Validation(
                "idle timeout must be a positive number of milliseconds".to_string(),
            ));
        }
        if self.absolute_timeout_ms == Some(0) {
            return Err(CollectorError::Validation(
                "absolute timeout must be a positive number of milliseconds".to_string(),
            ));
        }
        if self.max_events == Some(0) {
            return Err(CollectorError::Validation(
                "max events must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn accepts(&self, event: &Event) -> bool {
        self.predicate.as_ref().is_some_and(|p| p(event))
    }

    pub(crate) fn idle_window(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }

    pub(crate) fn lifetime(&self) -> Option<Duration> {
        self.absolute_timeout_ms.map(Duration::from_millis)
    }
}

impl fmt::Debug for CollectorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorSpec")
            .field("target_message_id", &self.target_message_id)
            .field("predicate", &self.predicate.as_ref().map(|_| ".."))
            .field("idle_timeout_ms", &self.idle_timeout_ms)
            .field("absolute_timeout_ms", &self.absolute_timeout_ms)
            .field("max_events", &self.max_events)
            .finish()
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
