//! `tally-collector`: time-boxed interactive event collectors.
//!
//! A collector attaches to one outbound message, listens to the reactions and
//! button clicks published for that message, folds the accepted ones into an
//! accumulator, and finalizes exactly once when collection stops.
//!
//! ```text
//! platform event ─► EventHub::publish ─► Subscription ─► collector task
//!                                                         │ predicate
//!                                                         │ on_collect(acc)
//!                                                         │ stop checks / timers
//!                                                         └► on_end(output, reason)  (once)
//! ```
//!
//! Each collector runs as its own Tokio task, so events, timers and `stop()`
//! for one message are applied strictly one after another. Separate collectors
//! share nothing but the hub's routing table.

pub mod accumulator;
pub mod engine;
pub mod error;
pub mod event;
pub mod finalize;
pub mod pagination;
pub mod source;
pub mod spec;

pub use accumulator::{Accumulator, PageControl, Pager, SelectionSet};
pub use engine::{start, CollectHandler, CollectorHandle, FinalizeHandler};
pub use error::{CollectorError, HandlerError};
pub use event::{EndReason, Event, EventKind, Flow, HandlerFailure, InboundEvent, Phase, Status};
pub use finalize::FinalizeSteps;
pub use pagination::{paginate, PageView, Pagination};
pub use source::{EventHub, Subscription};
pub use spec::CollectorSpec;
