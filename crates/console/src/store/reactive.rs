//! Leptos bridge: mirror the store into a signal for reactive views.

use leptos::prelude::*;

use super::{ProjectStore, ProjectsState, Subscription};

/// Read-only signal tracking a [`ProjectStore`].
///
/// The mirror stays live for as long as this value is held; dropping it
/// unsubscribes from the store.
pub struct StoreSignal {
    signal: ReadSignal<ProjectsState>,
    _subscription: Subscription,
}

impl StoreSignal {
    pub fn signal(&self) -> ReadSignal<ProjectsState> {
        self.signal
    }

    /// Current value without registering a reactive dependency.
    pub fn snapshot(&self) -> ProjectsState {
        self.signal.get_untracked()
    }
}

impl ProjectStore {
    /// Expose the store as a Leptos signal, seeded with the current state.
    pub fn watch(&self) -> StoreSignal {
        let signal = RwSignal::new(self.state());
        let subscription = self.subscribe(move |state| signal.set(state.clone()));
        StoreSignal {
            signal: signal.read_only(),
            _subscription: subscription,
        }
    }
}
