//! Request slots: cancel superseded fetches, admit only the newest.
//!
//! Every fetch-capable synchronizer owns one [`RequestSlot`] per fetch
//! channel. Beginning a request aborts whatever the slot had outstanding and
//! bumps the slot generation; a settled request may only touch visible state
//! if its ticket is still the slot's current one. Whether the superseded
//! network call actually stopped is irrelevant to that check.

use casework_core::effects::{AbortController, AbortSignal};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Parameter tuple identifying what a request fetches (id, filters, page).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Key from a single identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Key from an ordered parameter tuple.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = parts
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("|");
        Self(joined)
    }

    /// The joined key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle for one issued request.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    generation: u64,
    key: ResourceKey,
    signal: AbortSignal,
}

impl RequestTicket {
    /// Generation this ticket was issued at.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Key the request was issued for.
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Signal to attach to the transport call.
    pub fn signal(&self) -> &AbortSignal {
        &self.signal
    }
}

#[derive(Debug, Default)]
struct SlotState {
    generation: u64,
    active: Option<ActiveRequest>,
}

#[derive(Debug)]
struct ActiveRequest {
    generation: u64,
    key: ResourceKey,
    controller: AbortController,
}

/// One cancellation-token slot.
#[derive(Debug)]
pub struct RequestSlot {
    name: String,
    state: Mutex<SlotState>,
}

impl RequestSlot {
    /// Empty slot; `name` appears in logs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(SlotState::default()),
        }
    }

    /// Slot name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Issue a request for `key`, aborting the outstanding one.
    pub fn begin(&self, key: ResourceKey) -> RequestTicket {
        let mut state = self.state.lock();
        if let Some(previous) = state.active.take() {
            previous.controller.abort();
            tracing::debug!(
                slot = %self.name,
                generation = previous.generation,
                key = %previous.key,
                "request superseded"
            );
        }
        state.generation += 1;
        let generation = state.generation;
        let controller = AbortController::new();
        let signal = controller.signal();
        state.active = Some(ActiveRequest {
            generation,
            key: key.clone(),
            controller,
        });
        tracing::debug!(slot = %self.name, generation, key = %key, "request issued");
        RequestTicket {
            generation,
            key,
            signal,
        }
    }

    /// Whether `ticket` is still the slot's outstanding request.
    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        if ticket.signal.is_aborted() {
            return false;
        }
        self.state
            .lock()
            .active
            .as_ref()
            .is_some_and(|active| active.generation == ticket.generation)
    }

    /// Settle `ticket`. Returns `true` only for the current request, which
    /// is then cleared from the slot without aborting it.
    pub fn finish(&self, ticket: &RequestTicket) -> bool {
        if ticket.signal.is_aborted() {
            return false;
        }
        let mut state = self.state.lock();
        match &state.active {
            Some(active) if active.generation == ticket.generation => {
                state.active = None;
                true
            }
            _ => false,
        }
    }

    /// Abort the outstanding request, if any.
    pub fn cancel(&self) -> bool {
        let Some(active) = self.state.lock().active.take() else {
            return false;
        };
        active.controller.abort();
        tracing::debug!(
            slot = %self.name,
            generation = active.generation,
            key = %active.key,
            "request cancelled"
        );
        true
    }

    /// Whether a request is outstanding.
    pub fn in_flight(&self) -> bool {
        self.state.lock().active.is_some()
    }

    /// Generation of the most recently issued request (0 before any).
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }
}

impl Drop for RequestSlot {
    fn drop(&mut self) {
        if let Some(active) = self.state.get_mut().active.take() {
            active.controller.abort();
        }
    }
}

/// Named slots for components that own several fetch channels.
#[derive(Debug, Default)]
pub struct AbortCoordinator {
    slots: Mutex<HashMap<String, Arc<RequestSlot>>>,
}

impl AbortCoordinator {
    /// Coordinator with no slots yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot named `name`, created on first use.
    pub fn slot(&self, name: &str) -> Arc<RequestSlot> {
        self.slots
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RequestSlot::new(name)))
            .clone()
    }

    /// Cancel the outstanding request of one slot.
    pub fn cancel(&self, name: &str) -> bool {
        let slot = self.slots.lock().get(name).cloned();
        slot.is_some_and(|slot| slot.cancel())
    }

    /// Cancel every slot. Returns how many requests were aborted.
    pub fn cancel_all(&self) -> usize {
        let slots: Vec<_> = self.slots.lock().values().cloned().collect();
        slots.iter().filter(|slot| slot.cancel()).count()
    }
}
