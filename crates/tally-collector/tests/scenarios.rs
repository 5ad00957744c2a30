// End-to-end collector behaviour on a paused Tokio clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tally_collector::{
    paginate, start, Accumulator, CollectHandler, CollectorSpec, EndReason, Event, EventHub,
    FinalizeHandler, Flow, HandlerError, InboundEvent, PageView, Pager, Pagination, SelectionSet,
};
use tally_core::{ActorId, MessageId};
use tokio::time::Instant;

const MSG: MessageId = MessageId(100);
const AUTHOR: ActorId = ActorId(7);
const CONFIRM: &str = "stop";

fn publish(hub: &EventHub, event: Event) {
    hub.publish(InboundEvent::new(MSG, event));
}

/// Counts collect calls and applies the selection policy.
#[derive(Clone, Default)]
struct Choose {
    calls: Arc<Mutex<u32>>,
}

#[async_trait]
impl CollectHandler<SelectionSet> for Choose {
    async fn on_collect(&mut self, event: &Event, acc: &mut SelectionSet) -> Result<Flow, HandlerError> {
        *self.calls.lock().unwrap() += 1;
        Ok(acc.apply(event))
    }
}

/// Records every finalize call with the paused-clock instant it happened at.
#[derive(Clone)]
struct Record<O> {
    calls: Arc<Mutex<Vec<(O, EndReason, Instant)>>>,
}

impl<O> Record<O> {
    fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl<O: Send + 'static> FinalizeHandler<O> for Record<O> {
    async fn on_end(&mut self, output: O, reason: EndReason) -> Result<(), HandlerError> {
        self.calls.lock().unwrap().push((output, reason, Instant::now()));
        Ok(())
    }
}

fn selection_spec() -> CollectorSpec {
    CollectorSpec::new(MSG).filter(|e| e.actor_id == AUTHOR)
}

#[tokio::test(start_paused = true)]
async fn scenario_a_selection_confirmed() {
    let hub = EventHub::new();
    let record = Record::new();
    let t0 = Instant::now();
    let handle = start(
        &hub,
        selection_spec().idle_timeout_ms(20_000),
        SelectionSet::new(CONFIRM),
        Choose::default(),
        record.clone(),
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    publish(&hub, Event::reaction_add(AUTHOR, "A"));
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    publish(&hub, Event::reaction_add(AUTHOR, "B"));
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    publish(&hub, Event::reaction_add(AUTHOR, CONFIRM));

    assert_eq!(handle.wait().await, Some(EndReason::Stopped));
    let calls = record.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "A-B");
    assert_eq!(calls[0].1, EndReason::Stopped);
    assert_eq!(calls[0].2 - t0, Duration::from_millis(3_000));
}

#[tokio::test(start_paused = true)]
async fn selection_pairs_are_recorded_once() {
    let hub = EventHub::new();
    let record = Record::new();
    let handle = start(
        &hub,
        selection_spec(),
        SelectionSet::new(CONFIRM),
        Choose::default(),
        record.clone(),
    )
    .unwrap();

    publish(&hub, Event::reaction_add(AUTHOR, "A"));
    publish(&hub, Event::reaction_add(AUTHOR, "A"));
    publish(&hub, Event::reaction_add(AUTHOR, "B"));
    publish(&hub, Event::reaction_add(AUTHOR, CONFIRM));

    handle.wait().await;
    assert_eq!(record.calls.lock().unwrap()[0].0, "A-B");
}

#[tokio::test(start_paused = true)]
async fn accepted_event_pushes_idle_end_back() {
    let hub = EventHub::new();
    let record = Record::new();
    let t0 = Instant::now();
    let handle = start(
        &hub,
        selection_spec().idle_timeout_ms(20_000),
        SelectionSet::new(CONFIRM),
        Choose::default(),
        record.clone(),
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(19_000)).await;
    publish(&hub, Event::reaction_add(AUTHOR, "A"));

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(handle.is_active(), "idle end must not happen at t=20000");

    assert_eq!(handle.wait().await, Some(EndReason::IdleTimeout));
    let calls = record.calls.lock().unwrap();
    assert!(calls[0].2 - t0 >= Duration::from_millis(39_000));
    assert_eq!(calls[0].0, "A");
}

#[tokio::test(start_paused = true)]
async fn every_end_reason_finalizes_exactly_once() {
    let cases: Vec<(CollectorSpec, Vec<&str>, bool, EndReason)> = vec![
        (selection_spec(), vec![], true, EndReason::Stopped),
        (selection_spec().idle_timeout_ms(500), vec![], false, EndReason::IdleTimeout),
        (selection_spec().absolute_timeout_ms(500), vec!["A"], false, EndReason::AbsoluteTimeout),
        (selection_spec().max_events(2), vec!["A", "B", "C"], false, EndReason::MaxEvents),
    ];

    for (spec, payloads, stop, expected) in cases {
        let hub = EventHub::new();
        let record = Record::new();
        let choose = Choose::default();
        let handle = start(&hub, spec, SelectionSet::new(CONFIRM), choose.clone(), record.clone()).unwrap();

        for p in payloads {
            publish(&hub, Event::reaction_add(AUTHOR, p));
        }
        if stop {
            handle.stop();
            handle.stop();
        }

        assert_eq!(handle.wait().await, Some(expected));
        // Nothing reaches the ended collector.
        publish(&hub, Event::reaction_add(AUTHOR, "Z"));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(record.calls.lock().unwrap().len(), 1, "{expected:?}");
        assert!(!hub.is_listening(MSG));
        if expected == EndReason::MaxEvents {
            assert_eq!(*choose.calls.lock().unwrap(), 2);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn events_after_end_never_reach_on_collect() {
    let hub = EventHub::new();
    let choose = Choose::default();
    let handle = start(
        &hub,
        selection_spec().max_events(1),
        SelectionSet::new(CONFIRM),
        choose.clone(),
        Record::new(),
    )
    .unwrap();

    publish(&hub, Event::reaction_add(AUTHOR, "A"));
    publish(&hub, Event::reaction_add(AUTHOR, "B"));
    publish(&hub, Event::reaction_add(AUTHOR, "C"));
    handle.wait().await;

    assert!(!hub.publish(InboundEvent::new(MSG, Event::reaction_add(AUTHOR, "D"))));
    assert_eq!(*choose.calls.lock().unwrap(), 1);
}

#[derive(Default)]
struct ViewLog {
    shown: Vec<usize>,
    closed: Option<(usize, EndReason)>,
}

#[derive(Clone, Default)]
struct FakeView(Arc<Mutex<ViewLog>>);

#[async_trait]
impl PageView for FakeView {
    async fn show(&mut self, pager: &Pager) -> Result<(), HandlerError> {
        self.0.lock().unwrap().shown.push(pager.cursor());
        Ok(())
    }

    async fn close(&mut self, last_page: usize, reason: EndReason) -> Result<(), HandlerError> {
        self.0.lock().unwrap().closed = Some((last_page, reason));
        Ok(())
    }
}

fn pagination(page_count: usize) -> Pagination {
    Pagination {
        message_id: MSG,
        owner: AUTHOR,
        page_count,
        idle: Duration::from_millis(20_000),
        failures: None,
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_b_pagination_idles_out_on_last_page_shown() {
    let hub = EventHub::new();
    let view = FakeView::default();
    let handle = paginate(&hub, pagination(3), view.clone())
        .unwrap()
        .expect("three pages need a collector");

    publish(&hub, Event::button(AUTHOR, "next"));
    publish(&hub, Event::button(ActorId(99), "last"));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(handle.wait().await, Some(EndReason::IdleTimeout));
    let log = view.0.lock().unwrap();
    assert_eq!(log.shown, vec![1]);
    assert_eq!(log.closed, Some((1, EndReason::IdleTimeout)));
}

#[tokio::test(start_paused = true)]
async fn pagination_cursor_clamps() {
    let hub = EventHub::new();
    let view = FakeView::default();
    let handle = paginate(&hub, pagination(5), view.clone()).unwrap().unwrap();

    for _ in 0..6 {
        publish(&hub, Event::button(AUTHOR, "next"));
    }

    assert_eq!(handle.wait().await, Some(EndReason::IdleTimeout));
    let log = view.0.lock().unwrap();
    assert_eq!(log.shown, vec![1, 2, 3, 4, 4, 4]);
    assert_eq!(log.closed, Some((4, EndReason::IdleTimeout)));
}

#[tokio::test]
async fn scenario_c_single_page_starts_nothing() {
    let hub = EventHub::new();
    let view = FakeView::default();
    let handle = paginate(&hub, pagination(1), view.clone()).unwrap();

    assert!(handle.is_none());
    assert!(hub.is_empty());
    let log = view.0.lock().unwrap();
    assert!(log.shown.is_empty());
    assert!(log.closed.is_none());
}

#[test]
fn pager_output_is_the_cursor() {
    let mut pager = Pager::new(5).unwrap();
    pager.apply(tally_collector::PageControl::Last);
    assert_eq!(pager.finish(), 4);
}
