//! Paginated result browsing on top of the collector engine.
//!
//! The owner of the message navigates with first/previous/next/last controls;
//! the view re-renders after every accepted click. Only an idle timeout ends
//! the collector, after which the view disables its controls and leaves the
//! last rendered page in place.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tally_core::{ActorId, MessageId};
use tokio::sync::{mpsc, Mutex};

use crate::accumulator::{PageControl, Pager};
use crate::engine::{start, CollectHandler, CollectorHandle, FinalizeHandler};
use crate::error::{CollectorError, HandlerError};
use crate::event::{EndReason, Event, EventKind, Flow, HandlerFailure};
use crate::source::EventHub;
use crate::spec::CollectorSpec;

/// Rendering side of a paginated message.
#[async_trait]
pub trait PageView: Send + 'static {
    /// Show the page under the cursor, with controls matching its position.
    async fn show(&mut self, pager: &Pager) -> Result<(), HandlerError>;

    /// Collection is over: disable the controls, keep `last_page` on screen.
    async fn close(&mut self, last_page: usize, reason: EndReason) -> Result<(), HandlerError>;
}

/// Parameters of one paginated message.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub message_id: MessageId,
    /// Only this actor may turn pages.
    pub owner: ActorId,
    pub page_count: usize,
    pub idle: Duration,
    pub failures: Option<mpsc::UnboundedSender<HandlerFailure>>,
}

impl Pagination {
    /// Predicate-ready spec: the owner's clicks on known controls only.
    pub fn spec(&self) -> CollectorSpec {
        let owner = self.owner;
        let mut spec = CollectorSpec::new(self.message_id)
            .filter(move |e: &Event| {
                e.actor_id == owner
                    && e.kind == EventKind::ButtonClick
                    && PageControl::parse(&e.payload).is_some()
            })
            .idle_timeout(self.idle);
        if let Some(tx) = &self.failures {
            spec = spec.report_failures_to(tx.clone());
        }
        spec
    }
}

/// Start browsing. Returns `Ok(None)` when there is a single page: the caller
/// renders it once, statically, and no collector exists.
///
/// The caller has already rendered page 0 with its controls.
pub fn paginate<V: PageView>(
    hub: &EventHub,
    pagination: Pagination,
    view: V,
) -> Result<Option<CollectorHandle>, CollectorError> {
    let Some(pager) = Pager::new(pagination.page_count) else {
        return Ok(None);
    };
    let view = Arc::new(Mutex::new(view));
    let handle = start(
        hub,
        pagination.spec(),
        pager,
        Navigate(Arc::clone(&view)),
        Close(view),
    )?;
    Ok(Some(handle))
}

struct Navigate<V>(Arc<Mutex<V>>);

#[async_trait]
impl<V: PageView> CollectHandler<Pager> for Navigate<V> {
    async fn on_collect(&mut self, event: &Event, pager: &mut Pager) -> Result<Flow, HandlerError> {
        let flow = pager.apply_event(event);
        self.0.lock().await.show(pager).await?;
        Ok(flow)
    }
}

struct Close<V>(Arc<Mutex<V>>);

#[async_trait]
impl<V: PageView> FinalizeHandler<usize> for Close<V> {
    async fn on_end(&mut self, last_page: usize, reason: EndReason) -> Result<(), HandlerError> {
        self.0.lock().await.close(last_page, reason).await
    }
}
