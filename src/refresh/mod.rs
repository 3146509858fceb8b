//! Refresh coordination: one provider query in flight per popup.
//!
//! ## Protocol
//!
//! ```text
//! request(P1) ──→ idle? ──yes──→ run query(P1) ───────────┐
//!                   │                                     │
//!                   no                              query done
//!                   ▼                                     │
//!          pending = newest request           ┌──pending?─┴──┐
//!                                             ▼              ▼
//!                              discard results,       emit results
//!                              run query(pending)
//! ```
//!
//! A running query is never cancelled. Requests that arrive while it runs
//! collapse into a single pending slot (newest wins), so a burst
//! `P1, P2, P3` costs exactly two queries: `P1` and `P3`.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::provider::ProviderRegistry;
use crate::surface::{ContentItem, Position, SurfaceHandle};

/// Monotonically increasing id of a refresh request, assigned by the popup.
pub type RequestId = u64;

/// One "get content for this position" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub request: RequestId,
    pub position: Position,
}

/// Merged provider output for a completed request.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshResult {
    pub request: RequestId,
    pub position: Position,
    pub items: Vec<ContentItem>,
}

/// What to do with a newly submitted ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Nothing was running; start querying this ticket now.
    Start(Ticket),
    /// A query is running; the ticket waits in the pending slot.
    Deferred,
}

/// What to do once the running query finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finished {
    /// Nothing newer arrived; deliver the results for this ticket.
    Deliver(Ticket),
    /// Newer work arrived; drop `superseded`'s results and run `next`.
    Rerun { superseded: Ticket, next: Ticket },
}

/// Running / pending bookkeeping, free of I/O.
#[derive(Debug, Default)]
pub struct RefreshState {
    running: Option<Ticket>,
    pending: Option<Ticket>,
}

impl RefreshState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, ticket: Ticket) -> Admission {
        if self.running.is_none() {
            self.running = Some(ticket);
            Admission::Start(ticket)
        } else {
            if let Some(dropped) = self.pending.replace(ticket) {
                tracing::trace!(request = dropped.request, "pending request replaced");
            }
            Admission::Deferred
        }
    }

    /// Record that the running query finished.
    ///
    /// Returns `None` if nothing was running.
    pub fn finish(&mut self) -> Option<Finished> {
        let done = self.running.take()?;
        Some(match self.pending.take() {
            Some(next) => {
                self.running = Some(next);
                Finished::Rerun {
                    superseded: done,
                    next,
                }
            }
            None => Finished::Deliver(done),
        })
    }

    pub fn running(&self) -> Option<Ticket> {
        self.running
    }

    pub fn pending(&self) -> Option<Ticket> {
        self.pending
    }
}

/// Handle to a coordinator task bound to one surface.
///
/// Dropping the handle lets the task finish its current query and exit.
pub struct RefreshCoordinator {
    requests: mpsc::UnboundedSender<Ticket>,
    task: JoinHandle<()>,
}

impl RefreshCoordinator {
    /// Spawn the coordinator. Results are sent on `results`.
    pub fn spawn(
        registry: ProviderRegistry,
        surface: SurfaceHandle,
        results: mpsc::UnboundedSender<RefreshResult>,
    ) -> Self {
        let (requests, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(coordinate(registry, surface, rx, results));
        Self { requests, task }
    }

    /// Ask for content at `position`. Never blocks; the answer arrives on
    /// the results channel, unless a later request supersedes it.
    pub fn request(&self, request: RequestId, position: Position) {
        if self.requests.send(Ticket { request, position }).is_err() {
            tracing::debug!(request, "refresh coordinator gone, request dropped");
        }
    }

    /// Stop accepting requests and wait for the in-flight query to finish.
    pub async fn shutdown(self) {
        drop(self.requests);
        let _ = self.task.await;
    }
}

async fn coordinate(
    registry: ProviderRegistry,
    surface: SurfaceHandle,
    mut requests: mpsc::UnboundedReceiver<Ticket>,
    results: mpsc::UnboundedSender<RefreshResult>,
) {
    let mut state = RefreshState::new();

    while let Some(ticket) = requests.recv().await {
        let Admission::Start(mut ticket) = state.admit(ticket) else {
            continue;
        };

        loop {
            tracing::debug!(
                request = ticket.request,
                line = ticket.position.line,
                character = ticket.position.character,
                "refresh started"
            );
            let query = registry.query(&surface, ticket.position);
            tokio::pin!(query);

            let items = loop {
                tokio::select! {
                    items = &mut query => break items,
                    Some(newer) = requests.recv() => {
                        state.admit(newer);
                    }
                }
            };

            match state.finish() {
                Some(Finished::Rerun { superseded, next }) => {
                    tracing::debug!(
                        superseded = superseded.request,
                        next = next.request,
                        "refresh superseded, rerunning"
                    );
                    ticket = next;
                }
                Some(Finished::Deliver(done)) => {
                    let result = RefreshResult {
                        request: done.request,
                        position: done.position,
                        items,
                    };
                    if results.send(result).is_err() {
                        return;
                    }
                    break;
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::provider::{FixedProvider, HoverProvider};
    use crate::surface::{StaticSurface, SurfaceId};

    fn ticket(request: RequestId, line: u32) -> Ticket {
        Ticket {
            request,
            position: Position::new(line, 0),
        }
    }

    #[test]
    fn idle_state_starts_immediately() {
        let mut state = RefreshState::new();
        assert_eq!(state.admit(ticket(1, 1)), Admission::Start(ticket(1, 1)));
        assert_eq!(state.running(), Some(ticket(1, 1)));
        assert_eq!(state.finish(), Some(Finished::Deliver(ticket(1, 1))));
        assert_eq!(state.running(), None);
    }

    #[test]
    fn burst_collapses_to_newest_pending() {
        let mut state = RefreshState::new();
        state.admit(ticket(1, 1));
        assert_eq!(state.admit(ticket(2, 2)), Admission::Deferred);
        assert_eq!(state.admit(ticket(3, 3)), Admission::Deferred);
        assert_eq!(state.pending(), Some(ticket(3, 3)));

        assert_eq!(
            state.finish(),
            Some(Finished::Rerun {
                superseded: ticket(1, 1),
                next: ticket(3, 3),
            })
        );
        assert_eq!(state.running(), Some(ticket(3, 3)));
        assert_eq!(state.pending(), None);
        assert_eq!(state.finish(), Some(Finished::Deliver(ticket(3, 3))));
    }

    #[test]
    fn finish_without_running_is_none() {
        let mut state = RefreshState::new();
        assert_eq!(state.finish(), None);
    }

    /// Records every position it is asked about.
    struct Recording {
        seen: Arc<Mutex<Vec<Position>>>,
        delay: Duration,
    }

    #[async_trait]
    impl HoverProvider for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn query(
            &self,
            _surface: &SurfaceHandle,
            position: Position,
        ) -> anyhow::Result<Vec<ContentItem>> {
            self.seen.lock().await.push(position);
            tokio::time::sleep(self.delay).await;
            Ok(vec![ContentItem::from(format!("line {}", position.line))])
        }
    }

    async fn recording_coordinator(
        delay: Duration,
    ) -> (
        RefreshCoordinator,
        mpsc::UnboundedReceiver<RefreshResult>,
        Arc<Mutex<Vec<Position>>>,
    ) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = ProviderRegistry::new();
        registry
            .register(Arc::new(Recording {
                seen: Arc::clone(&seen),
                delay,
            }))
            .await;
        let surface = StaticSurface::new(SurfaceId(1), "a\nb\nc\nd").handle();
        let (tx, rx) = mpsc::unbounded_channel();
        (RefreshCoordinator::spawn(registry, surface, tx), rx, seen)
    }

    #[tokio::test(start_paused = true)]
    async fn single_request_delivers() {
        let (coordinator, mut rx, seen) = recording_coordinator(Duration::from_millis(50)).await;
        coordinator.request(1, Position::new(2, 0));

        let result = rx.recv().await.unwrap();
        assert_eq!(result.request, 1);
        assert_eq!(result.position, Position::new(2, 0));
        assert_eq!(result.items, vec![ContentItem::from("line 2")]);
        assert_eq!(*seen.lock().await, vec![Position::new(2, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn requests_during_flight_coalesce_to_latest() {
        let (coordinator, mut rx, seen) = recording_coordinator(Duration::from_millis(100)).await;

        coordinator.request(1, Position::new(1, 0));
        // Let the first query start.
        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.request(2, Position::new(2, 0));
        coordinator.request(3, Position::new(3, 0));

        let result = rx.recv().await.unwrap();
        assert_eq!(result.request, 3);
        assert_eq!(result.items, vec![ContentItem::from("line 3")]);

        // P2 was never queried on its own.
        assert_eq!(
            *seen.lock().await,
            vec![Position::new(1, 0), Position::new(3, 0)]
        );

        // Nothing else is delivered.
        coordinator.shutdown().await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn running_query_is_not_cancelled() {
        let (coordinator, mut rx, seen) = recording_coordinator(Duration::from_millis(100)).await;
        let start = tokio::time::Instant::now();

        coordinator.request(1, Position::new(1, 0));
        tokio::time::sleep(Duration::from_millis(90)).await;
        coordinator.request(2, Position::new(2, 0));

        let result = rx.recv().await.unwrap();
        assert_eq!(result.request, 2);
        // The first query ran its full 100ms before the rerun's 100ms.
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(seen.lock().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_requests_each_deliver() {
        let (coordinator, mut rx, _seen) = recording_coordinator(Duration::from_millis(20)).await;

        coordinator.request(1, Position::new(0, 0));
        assert_eq!(rx.recv().await.unwrap().request, 1);
        coordinator.request(2, Position::new(1, 0));
        assert_eq!(rx.recv().await.unwrap().request, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn merged_in_priority_order() {
        let registry = ProviderRegistry::new();
        registry
            .register(Arc::new(
                FixedProvider::new("B", 1, ["B-text"]).with_delay(Duration::from_millis(5)),
            ))
            .await;
        registry
            .register(Arc::new(
                FixedProvider::new("A", 10, ["<b>A</b>"]).with_delay(Duration::from_millis(50)),
            ))
            .await;
        let surface = StaticSurface::new(SurfaceId(1), "X").handle();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let coordinator = RefreshCoordinator::spawn(registry, surface, tx);

        coordinator.request(7, Position::new(0, 0));
        let result = rx.recv().await.unwrap();
        assert_eq!(
            result.items,
            vec![ContentItem::from("<b>A</b>"), ContentItem::from("B-text")]
        );
    }
}
