// State coordinator
// Decision: InstanceState lives inside one task; producers talk to it only through an inbox
// Decision: Every send waits for the coordinator to take the event (rendezvous hand-off),
//           so a slow coordinator stalls its producers instead of queueing work
// Decision: Termination is just another inbox event, whatever its origin
//
// Publication triggers are deliberately asymmetric: ticks, request starts and
// termination publish; request finishes and work-rate reports only mutate.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::CoordinatorError;
use crate::publisher::{MessageSink, StatusPublisher};
use crate::state::InstanceState;

/// Shortest accepted tick period; a zero period cannot drive an interval
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

/// Events accepted by the coordinator inbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A hello request entered its handler
    RequestStarted,
    /// A hello request wrote its response
    RequestFinished,
    /// Hashes per millisecond over the last completed load window
    WorkRate(u64),
    /// Stop the instance (OS signal or programmatic)
    Terminate,
}

/// Final state handed back once the terminal status has been published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shutdown {
    pub state: InstanceState,
}

struct Envelope {
    event: Event,
    accepted: oneshot::Sender<()>,
}

enum Input {
    Tick,
    Event(Event),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    None,
    Publish,
    PublishAndStop,
}

/// Apply one input to the state and report what must follow
fn apply(state: &mut InstanceState, input: Input) -> Effect {
    match input {
        Input::Tick => Effect::Publish,
        Input::Event(Event::RequestStarted) => {
            state.active_requests += 1;
            Effect::Publish
        }
        Input::Event(Event::RequestFinished) => {
            match state.active_requests.checked_sub(1) {
                Some(active) => {
                    state.active_requests = active;
                    state.request_count += 1;
                }
                None => warn!("request finished without a matching start, ignoring"),
            }
            Effect::None
        }
        Input::Event(Event::WorkRate(rate)) => {
            state.work_rate = rate;
            Effect::None
        }
        Input::Event(Event::Terminate) => {
            state.deleted = true;
            Effect::PublishAndStop
        }
    }
}

// ============================================================================
// CoordinatorHandle - Producer side of the inbox
// ============================================================================

/// Cloneable handle used by request handlers, the load generator and the
/// signal listener to feed the coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Envelope>,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope").field("event", &self.event).finish()
    }
}

impl CoordinatorHandle {
    /// Send an event and wait until the coordinator has taken it
    pub async fn send(&self, event: Event) -> Result<(), CoordinatorError> {
        let (accepted, ack) = oneshot::channel();
        self.tx
            .send(Envelope { event, accepted })
            .await
            .map_err(|_| CoordinatorError::InboxClosed)?;
        ack.await.map_err(|_| CoordinatorError::InboxClosed)
    }

    /// Blocking variant of [`send`](Self::send) for plain OS threads
    ///
    /// Must not be called from inside an async context.
    pub fn send_blocking(&self, event: Event) -> Result<(), CoordinatorError> {
        let (accepted, ack) = oneshot::channel();
        self.tx
            .blocking_send(Envelope { event, accepted })
            .map_err(|_| CoordinatorError::InboxClosed)?;
        ack.blocking_recv().map_err(|_| CoordinatorError::InboxClosed)
    }

    pub async fn request_started(&self) -> Result<(), CoordinatorError> {
        self.send(Event::RequestStarted).await
    }

    pub async fn request_finished(&self) -> Result<(), CoordinatorError> {
        self.send(Event::RequestFinished).await
    }

    pub async fn terminate(&self) -> Result<(), CoordinatorError> {
        self.send(Event::Terminate).await
    }

    pub fn report_work_rate_blocking(&self, rate: u64) -> Result<(), CoordinatorError> {
        self.send_blocking(Event::WorkRate(rate))
    }

    /// True once the coordinator has stopped taking events
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// Coordinator - Sole owner of InstanceState
// ============================================================================

/// Single-task event loop that owns the instance state
pub struct Coordinator<S> {
    state: InstanceState,
    publisher: StatusPublisher<S>,
    inbox: mpsc::Receiver<Envelope>,
    tick_period: Duration,
}

impl<S: MessageSink> Coordinator<S> {
    /// Create a coordinator and the handle that feeds it
    ///
    /// `tick_period` is raised to [`MIN_TICK_PERIOD`] if shorter.
    pub fn new(
        state: InstanceState,
        publisher: StatusPublisher<S>,
        tick_period: Duration,
    ) -> (Self, CoordinatorHandle) {
        // Capacity 1 plus the acceptance ack gives rendezvous semantics
        let (tx, inbox) = mpsc::channel(1);
        let coordinator = Self {
            state,
            publisher,
            inbox,
            tick_period: tick_period.max(MIN_TICK_PERIOD),
        };
        (coordinator, CoordinatorHandle { tx })
    }

    /// Run until a termination event has been published
    ///
    /// Publishes once before taking any event. Returns an error as soon as a
    /// publish fails; the caller is expected to bring the process down.
    pub async fn run(mut self) -> Result<Shutdown, CoordinatorError> {
        self.publisher.publish(&self.state).await?;
        info!(
            name = %self.state.name,
            tick_period_ms = self.tick_period.as_millis() as u64,
            "Coordinator running"
        );

        let mut ticker = interval_at(Instant::now() + self.tick_period, self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let input = tokio::select! {
                _ = ticker.tick() => Input::Tick,
                envelope = self.inbox.recv() => {
                    let envelope = envelope.ok_or(CoordinatorError::InboxClosed)?;
                    // The producer may have given up waiting; that is not our problem
                    let _ = envelope.accepted.send(());
                    debug!(event = ?envelope.event, "Coordinator took event");
                    Input::Event(envelope.event)
                }
            };

            match apply(&mut self.state, input) {
                Effect::None => {}
                Effect::Publish => {
                    self.publisher.publish(&self.state).await?;
                }
                Effect::PublishAndStop => {
                    info!(name = %self.state.name, "Termination requested");
                    self.publisher.publish(&self.state).await?;
                    self.inbox.close();
                    return Ok(Shutdown { state: self.state });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySink;
    use crate::state::InstanceStatus;
    use serde_json::Value;

    const TICK: Duration = Duration::from_secs(1);

    fn coordinator(sink: &InMemorySink) -> (Coordinator<InMemorySink>, CoordinatorHandle) {
        Coordinator::new(
            InstanceState::new("steady-falcon"),
            StatusPublisher::new(sink.clone()),
            TICK,
        )
    }

    fn status_of(message: &Value) -> u64 {
        message["InstanceStatus"].as_u64().unwrap()
    }

    #[test]
    fn test_balanced_starts_and_finishes() {
        let mut state = InstanceState::new("steady-falcon");

        // Interleave: two overlapping requests, then a burst of sequential ones
        let script = [
            Event::RequestStarted,
            Event::RequestStarted,
            Event::RequestFinished,
            Event::RequestStarted,
            Event::RequestFinished,
            Event::RequestFinished,
            Event::RequestStarted,
            Event::RequestFinished,
        ];
        for event in script {
            apply(&mut state, Input::Event(event));
        }

        assert_eq!(state.active_requests, 0);
        assert_eq!(state.request_count, 4);
        assert_eq!(state.status(), InstanceStatus::Idle);
    }

    #[test]
    fn test_unmatched_finish_keeps_counters_sane() {
        let mut state = InstanceState::new("steady-falcon");

        let effect = apply(&mut state, Input::Event(Event::RequestFinished));

        assert_eq!(effect, Effect::None);
        assert_eq!(state.active_requests, 0);
        assert_eq!(state.request_count, 0);
    }

    #[test]
    fn test_publish_triggers() {
        let mut state = InstanceState::new("steady-falcon");

        assert_eq!(apply(&mut state, Input::Tick), Effect::Publish);
        assert_eq!(
            apply(&mut state, Input::Event(Event::RequestStarted)),
            Effect::Publish
        );
        assert_eq!(
            apply(&mut state, Input::Event(Event::RequestFinished)),
            Effect::None
        );
        assert_eq!(
            apply(&mut state, Input::Event(Event::WorkRate(17))),
            Effect::None
        );
        assert_eq!(state.work_rate, 17);
        assert_eq!(
            apply(&mut state, Input::Event(Event::Terminate)),
            Effect::PublishAndStop
        );
        assert!(state.deleted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_then_terminate() {
        let sink = InMemorySink::new();
        let (coordinator, handle) = coordinator(&sink);
        let task = tokio::spawn(coordinator.run());

        handle.request_started().await.unwrap();
        handle.terminate().await.unwrap();

        let shutdown = task.await.unwrap().unwrap();
        assert!(shutdown.state.deleted);
        assert!(handle.is_closed());

        let messages = sink.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(status_of(&messages[0]), InstanceStatus::Idle.code() as u64);
        assert_eq!(status_of(&messages[1]), InstanceStatus::Processing.code() as u64);
        assert_eq!(status_of(&messages[2]), InstanceStatus::Killed.code() as u64);

        // Nothing is accepted after termination
        assert!(matches!(
            handle.request_finished().await,
            Err(CoordinatorError::InboxClosed)
        ));
        assert_eq!(sink.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_ticks() {
        let sink = InMemorySink::new();
        let started = Instant::now();
        let (coordinator, _handle) = coordinator(&sink);
        let task = tokio::spawn(coordinator.run());

        // Startup publish plus exactly two ticks, one period apart
        sink.wait_for(2).await;
        assert_eq!(sink.len(), 2);
        assert_eq!(started.elapsed(), TICK);

        sink.wait_for(3).await;
        assert_eq!(sink.len(), 3);
        assert_eq!(started.elapsed(), TICK * 2);
        task.abort();

        let messages = sink.messages();
        for tick in &messages[1..3] {
            assert_eq!(status_of(tick), InstanceStatus::Idle.code() as u64);
            assert_eq!(tick["RequestCount"], 0);
            assert_eq!(tick["WorkRate"], 0);
            assert_eq!(tick["Name"], "steady-falcon");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_carry_last_work_rate() {
        let sink = InMemorySink::new();
        let (coordinator, handle) = coordinator(&sink);
        let task = tokio::spawn(coordinator.run());

        handle.send(Event::WorkRate(120)).await.unwrap();
        handle.send(Event::WorkRate(95)).await.unwrap();

        // Work-rate reports alone never publish
        assert_eq!(sink.len(), 1);

        sink.wait_for(2).await;
        task.abort();

        assert_eq!(sink.messages()[1]["WorkRate"], 95);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_cycle_then_tick() {
        let sink = InMemorySink::new();
        let started = Instant::now();
        let (coordinator, handle) = coordinator(&sink);
        let task = tokio::spawn(coordinator.run());

        handle.request_started().await.unwrap();
        handle.request_finished().await.unwrap();
        tokio::task::yield_now().await;

        // The finish itself publishes nothing: still startup + start only
        assert_eq!(sink.len(), 2);
        assert_eq!(started.elapsed(), Duration::ZERO);

        sink.wait_for(3).await;
        assert_eq!(sink.len(), 3);
        assert_eq!(started.elapsed(), TICK);
        task.abort();

        let messages = sink.messages();
        assert_eq!(status_of(&messages[1]), InstanceStatus::Processing.code() as u64);
        assert_eq!(messages[1]["RequestCount"], 0);
        assert_eq!(status_of(&messages[2]), InstanceStatus::Idle.code() as u64);
        assert_eq!(messages[2]["RequestCount"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_tick_period_is_clamped() {
        let sink = InMemorySink::new();
        let started = Instant::now();
        let (coordinator, _handle) = Coordinator::new(
            InstanceState::new("steady-falcon"),
            StatusPublisher::new(sink.clone()),
            Duration::ZERO,
        );
        let task = tokio::spawn(coordinator.run());

        sink.wait_for(3).await;
        task.abort();

        assert_eq!(started.elapsed(), MIN_TICK_PERIOD * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_is_fatal() {
        let sink = InMemorySink::new();
        let (coordinator, handle) = coordinator(&sink);
        let task = tokio::spawn(coordinator.run());

        sink.wait_for(1).await;
        sink.fail_with("channel unavailable");

        // Acceptance happens before handling, so the send itself succeeds
        handle.request_started().await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(CoordinatorError::Publish(_))));
        assert!(handle.request_finished().await.is_err());
    }

    #[tokio::test]
    async fn test_startup_publish_failure_is_fatal() {
        let sink = InMemorySink::new();
        sink.fail_with("no route");
        let (coordinator, _handle) = coordinator(&sink);

        assert!(matches!(
            coordinator.run().await,
            Err(CoordinatorError::Publish(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_sender_from_thread() {
        let sink = InMemorySink::new();
        let (coordinator, handle) = coordinator(&sink);
        let task = tokio::spawn(coordinator.run());

        let reporter = handle.clone();
        tokio::task::spawn_blocking(move || reporter.report_work_rate_blocking(64))
            .await
            .unwrap()
            .unwrap();

        handle.terminate().await.unwrap();
        let shutdown = task.await.unwrap().unwrap();
        assert_eq!(shutdown.state.work_rate, 64);
    }
}
