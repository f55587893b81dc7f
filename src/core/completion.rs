//! Completion notifications emitted once per task execution.
//!
//! Listeners are registered explicitly on the executor; there is no global
//! signal bus.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::record::{TaskId, TaskKind, TaskStatus};
use crate::util::clock::now_ms;

/// Terminal outcome of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Work finished without error.
    Completed,
    /// Work failed; see the event's `error_message`.
    Failed,
}

impl Outcome {
    /// Record status this outcome maps to.
    #[must_use]
    pub const fn status(self) -> TaskStatus {
        match self {
            Self::Completed => TaskStatus::Completed,
            Self::Failed => TaskStatus::Failed,
        }
    }
}

/// Event published after a task reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    /// Event identifier.
    pub event_id: Uuid,
    /// Finished record.
    pub record_id: TaskId,
    /// Task type of the record.
    pub kind: TaskKind,
    /// How it finished.
    pub outcome: Outcome,
    /// Failure summary when `outcome` is `Failed`.
    pub error_message: Option<String>,
    /// Timestamp milliseconds.
    pub finished_at_ms: u128,
}

impl CompletionEvent {
    /// Build an event stamped with the current time.
    #[must_use]
    pub fn new(
        record_id: TaskId,
        kind: TaskKind,
        outcome: Outcome,
        error_message: Option<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            record_id,
            kind,
            outcome,
            error_message,
            finished_at_ms: now_ms(),
        }
    }
}

/// Listener for completion events.
pub trait CompletionSink: Send + Sync {
    /// Receive one event. Must not block for long.
    fn notify(&self, event: &CompletionEvent);
}

/// In-memory sink with a bounded buffer, for testing and dev.
pub struct InMemoryCompletionSink {
    events: Mutex<VecDeque<CompletionEvent>>,
    max_events: usize,
}

impl InMemoryCompletionSink {
    /// Create a sink keeping at most `max_events` events.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    /// Snapshot of stored events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<CompletionEvent> {
        self.events.lock().iter().cloned().collect()
    }
}

impl CompletionSink for InMemoryCompletionSink {
    fn notify(&self, event: &CompletionEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event.clone());
    }
}

/// Fans events out over a tokio broadcast channel.
pub struct BroadcastCompletionSink {
    tx: broadcast::Sender<CompletionEvent>,
}

impl BroadcastCompletionSink {
    /// Create a channel retaining up to `capacity` unread events per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// New receiver seeing every event sent after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CompletionEvent> {
        self.tx.subscribe()
    }
}

impl CompletionSink for BroadcastCompletionSink {
    fn notify(&self, event: &CompletionEvent) {
        // no receivers is fine
        let _ = self.tx.send(event.clone());
    }
}

/// Ordered list of sinks notified for every event.
#[derive(Clone, Default)]
pub struct CompletionNotifier {
    sinks: Vec<Arc<dyn CompletionSink>>,
}

impl CompletionNotifier {
    /// Notifier without listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener.
    pub fn subscribe(&mut self, sink: Arc<dyn CompletionSink>) {
        self.sinks.push(sink);
    }

    /// Deliver `event` to every listener in registration order.
    pub fn notify(&self, event: &CompletionEvent) {
        for sink in &self.sinks {
            sink.notify(event);
        }
    }

    /// Number of listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}
