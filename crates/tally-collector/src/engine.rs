//! Collector engine: one Tokio task per collector instance.
//!
//! The task owns the instance outright: its accumulator, collected events and
//! callbacks. Events, deadlines and `stop()` all reach it through a single
//! `select!` loop, so nothing is applied while an `on_collect` call is still
//! in flight. Finalization consumes the instance, which makes a second
//! `on_end` call impossible.

use std::future::pending;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use tally_core::MessageId;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::accumulator::Accumulator;
use crate::error::{CollectorError, HandlerError};
use crate::event::{EndReason, Event, Flow, HandlerFailure, Phase, Status};
use crate::source::{Envelope, EventHub, Subscription};
use crate::spec::CollectorSpec;

/// Consumer callback run for every accepted event.
///
/// It may mutate the accumulator, await platform calls, and ask the
/// collector to stop by returning [`Flow::Stop`].
#[async_trait]
pub trait CollectHandler<A: Send>: Send + 'static {
    async fn on_collect(&mut self, event: &Event, acc: &mut A) -> Result<Flow, HandlerError>;
}

/// Terminal callback, invoked exactly once with the accumulator's output.
#[async_trait]
pub trait FinalizeHandler<O: Send>: Send + 'static {
    async fn on_end(&mut self, output: O, reason: EndReason) -> Result<(), HandlerError>;
}

/// Caller-side handle of a running collector.
///
/// Dropping the handle does not stop the collector; it keeps running until
/// one of its end conditions is met.
pub struct CollectorHandle {
    message_id: MessageId,
    cancel: CancellationToken,
    ended: Arc<AtomicBool>,
    task: JoinHandle<EndReason>,
}

impl CollectorHandle {
    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// End the collector with [`EndReason::Stopped`]. Idempotent; a no-op
    /// once the collector has ended.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn status(&self) -> Status {
        if self.ended.load(Ordering::Acquire) {
            Status::Ended
        } else {
            Status::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.status() == Status::Active
    }

    /// Wait until finalization has completed.
    ///
    /// `None` only if the collector task itself was aborted or panicked.
    pub async fn wait(self) -> Option<EndReason> {
        self.task.await.ok()
    }
}

/// Validate `spec`, subscribe to its message and spawn the collector task.
///
/// Must be called from within a Tokio runtime.
pub fn start<A, C, F>(
    hub: &EventHub,
    spec: CollectorSpec,
    acc: A,
    on_collect: C,
    on_end: F,
) -> Result<CollectorHandle, CollectorError>
where
    A: Accumulator,
    C: CollectHandler<A>,
    F: FinalizeHandler<A::Output>,
{
    spec.validate()?;

    let message_id = spec.target_message_id;
    let subscription = hub.subscribe(message_id);
    let cancel = CancellationToken::new();
    let ended = Arc::new(AtomicBool::new(false));

    debug!(
        message_id = %message_id,
        idle_ms = ?spec.idle_timeout_ms,
        absolute_ms = ?spec.absolute_timeout_ms,
        max_events = ?spec.max_events,
        "collector starting"
    );

    let instance = CollectorInstance {
        spec,
        status: Status::Active,
        start_time: Instant::now(),
        last_accepted: None,
        collected: Vec::new(),
        acc,
        on_collect,
        on_end,
        ended: Arc::clone(&ended),
    };
    let task = tokio::spawn(instance.run(subscription, cancel.clone()));

    Ok(CollectorHandle {
        message_id,
        cancel,
        ended,
        task,
    })
}

struct CollectorInstance<A, C, F> {
    spec: CollectorSpec,
    status: Status,
    start_time: Instant,
    last_accepted: Option<Instant>,
    collected: Vec<Event>,
    acc: A,
    on_collect: C,
    on_end: F,
    /// Shared with the handle; flipped exactly once by `end_once`.
    ended: Arc<AtomicBool>,
}

impl<A, C, F> CollectorInstance<A, C, F>
where
    A: Accumulator,
    C: CollectHandler<A>,
    F: FinalizeHandler<A::Output>,
{
    async fn run(mut self, mut subscription: Subscription, cancel: CancellationToken) -> EndReason {
        let mut rx = match subscription.confirm() {
            Ok(rx) => rx,
            Err(e) => {
                warn!(message_id = %self.spec.target_message_id, error = %e, "collector lost its subscription before starting");
                return self.end_once(EndReason::Stopped, subscription).await;
            }
        };

        let reason = loop {
            let deadline = self.next_deadline();

            tokio::select! {
                biased;

                _ = cancel.cancelled() => break EndReason::Stopped,

                received = rx.recv() => match received {
                    Some(envelope) => {
                        // Arrived after a deadline passed: the timer came first.
                        if let Some((at, reason)) = deadline {
                            if envelope.received_at >= at {
                                break reason;
                            }
                        }
                        if let Some(reason) = self.feed(envelope).await {
                            break reason;
                        }
                    }
                    None => {
                        // Route replaced by a newer subscription or hub dropped:
                        // nothing can reach this collector any more.
                        debug!(message_id = %self.spec.target_message_id, "event source closed");
                        break EndReason::Stopped;
                    }
                },

                reason = wait_for(deadline) => break reason,
            }
        };

        self.end_once(reason, subscription).await
    }

    /// Earliest pending deadline and the reason it would end the collector with.
    fn next_deadline(&self) -> Option<(Instant, EndReason)> {
        let idle = self.spec.idle_window().and_then(|window| {
            let since = self.last_accepted.unwrap_or(self.start_time);
            since
                .checked_add(window)
                .map(|at| (at, EndReason::IdleTimeout))
        });
        let absolute = self.spec.lifetime().and_then(|lifetime| {
            self.start_time
                .checked_add(lifetime)
                .map(|at| (at, EndReason::AbsoluteTimeout))
        });

        match (idle, absolute) {
            (Some(i), Some(a)) => Some(if a.0 <= i.0 { a } else { i }),
            (i, a) => i.or(a),
        }
    }

    /// Filter, record and apply one event. Returns the end reason if the
    /// event triggered one.
    async fn feed(&mut self, envelope: Envelope) -> Option<EndReason> {
        if self.status != Status::Active {
            return None;
        }

        let Envelope { event, received_at } = envelope;
        if !self.passes(&event) {
            trace!(message_id = %self.spec.target_message_id, actor = %event.actor_id, payload = %event.payload, "event rejected");
            return None;
        }

        // Idle window counts from receipt, not from when a queued event got its turn.
        self.last_accepted = Some(received_at);
        self.collected.push(event.clone());
        trace!(
            message_id = %self.spec.target_message_id,
            actor = %event.actor_id,
            payload = %event.payload,
            count = self.collected.len(),
            "event accepted"
        );

        let outcome = AssertUnwindSafe(self.on_collect.on_collect(&event, &mut self.acc))
            .catch_unwind()
            .await;
        let flow = match outcome {
            Ok(Ok(flow)) => flow,
            Ok(Err(e)) => {
                report(&self.spec, Phase::Collect, e);
                Flow::Continue
            }
            Err(panic) => {
                report(&self.spec, Phase::Collect, HandlerError::from_panic(panic));
                Flow::Continue
            }
        };

        if flow == Flow::Stop {
            return Some(EndReason::Stopped);
        }
        if self
            .spec
            .max_events
            .is_some_and(|max| self.collected.len() >= max)
        {
            return Some(EndReason::MaxEvents);
        }
        None
    }

    /// Run the predicate; a panicking predicate rejects the event.
    fn passes(&self, event: &Event) -> bool {
        match std::panic::catch_unwind(AssertUnwindSafe(|| self.spec.accepts(event))) {
            Ok(accepted) => accepted,
            Err(_) => {
                error!(message_id = %self.spec.target_message_id, "collector predicate panicked, event rejected");
                false
            }
        }
    }

    /// The single transition to `Ended`. Consumes the instance.
    async fn end_once(mut self, reason: EndReason, subscription: Subscription) -> EndReason {
        if self.ended.swap(true, Ordering::AcqRel) {
            return reason;
        }

        // Deadlines live only in the loop that just exited; the subscription
        // is the last external resource.
        subscription.unsubscribe();
        self.status = Status::Ended;

        info!(
            message_id = %self.spec.target_message_id,
            reason = %reason,
            collected = self.collected.len(),
            elapsed_ms = self.start_time.elapsed().as_millis() as u64,
            "collector ended"
        );

        let output = self.acc.finish();
        let outcome = AssertUnwindSafe(self.on_end.on_end(output, reason))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => report(&self.spec, Phase::Finalize, e),
            Err(panic) => report(&self.spec, Phase::Finalize, HandlerError::from_panic(panic)),
        }

        reason
    }
}

/// Log a caught callback failure and forward it to the spec's failure channel.
fn report(spec: &CollectorSpec, phase: Phase, err: HandlerError) {
    match phase {
        Phase::Collect => {
            warn!(message_id = %spec.target_message_id, error = %err, "on_collect failed")
        }
        Phase::Finalize => {
            error!(message_id = %spec.target_message_id, error = %err, "on_end failed")
        }
    }
    if let Some(tx) = &spec.failures {
        let _ = tx.send(HandlerFailure {
            message_id: spec.target_message_id,
            phase,
            error: err.to_string(),
        });
    }
}

async fn wait_for(deadline: Option<(Instant, EndReason)>) -> EndReason {
    match deadline {
        Some((at, reason)) => {
            sleep_until(at).await;
            reason
        }
        None => pending().await,
    }
}
