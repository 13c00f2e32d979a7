//! Spectator fan-out for one session.
//!
//! The execution unit writes state snapshots to the session's view
//! endpoint. Every snapshot is remembered and forwarded verbatim to the
//! attached observers, so an observer arriving mid-game first sees the
//! latest snapshot and then every later one, in order.
//!
//! Once the session ends the fan-out is frozen: new observers still get
//! the last snapshot, but nothing after it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

/// Something that can receive snapshot frames (a websocket, a console
/// printer, a test channel).
pub trait ObserverSink: Send + Sync {
    /// Deliver one frame. Returns `false` once the observer is gone.
    fn deliver(&self, frame: &str) -> bool;

    /// Whether the observer can still receive frames.
    fn is_open(&self) -> bool;
}

impl ObserverSink for mpsc::UnboundedSender<String> {
    fn deliver(&self, frame: &str) -> bool {
        self.send(frame.to_string()).is_ok()
    }

    fn is_open(&self) -> bool {
        !self.is_closed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
struct FanoutState {
    last_state: Option<String>,
    observers: Vec<(ObserverId, Box<dyn ObserverSink>)>,
    next_id: u64,
    frozen: bool,
}

#[derive(Default)]
pub struct ViewFanout {
    inner: Mutex<FanoutState>,
}

impl ViewFanout {
    pub fn new() -> Self {
        ViewFanout::default()
    }

    fn lock(&self) -> MutexGuard<'_, FanoutState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an observer, replaying the latest snapshot to it first.
    pub fn attach(&self, observer: impl ObserverSink + 'static) -> ObserverId {
        let mut state = self.lock();
        let id = ObserverId(state.next_id);
        state.next_id += 1;

        if let Some(last) = &state.last_state {
            if !observer.deliver(last) {
                return id;
            }
        }
        if !state.frozen {
            state.observers.push((id, Box::new(observer)));
        }
        id
    }

    /// Forget an observer. Returns whether it was still attached.
    pub fn detach(&self, id: ObserverId) -> bool {
        let mut state = self.lock();
        let before = state.observers.len();
        state.observers.retain(|(observer, _)| *observer != id);
        state.observers.len() != before
    }

    /// Remember `frame` as the latest snapshot and forward it to every
    /// open observer. Observers that are closed or fail are pruned.
    pub fn broadcast(&self, frame: String) {
        let mut state = self.lock();
        if state.frozen {
            return;
        }
        state.observers.retain(|(id, observer)| {
            let alive = observer.is_open() && observer.deliver(&frame);
            if !alive {
                debug!(observer = id.0, "pruning closed observer");
            }
            alive
        });
        state.last_state = Some(frame);
    }

    /// Stop forwarding. Attached observers are released.
    pub fn freeze(&self) {
        let mut state = self.lock();
        state.frozen = true;
        state.observers.clear();
    }

    pub fn is_frozen(&self) -> bool {
        self.lock().frozen
    }

    pub fn last_state(&self) -> Option<String> {
        self.lock().last_state.clone()
    }

    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }
}
