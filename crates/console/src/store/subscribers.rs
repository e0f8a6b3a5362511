//! Synchronous publish/subscribe fan-out.
//!
//! Every [`Subscribers::publish`] invokes all registered callbacks before it
//! returns. Each callback lives in its own slot keyed by a monotonically
//! increasing id, so registration and removal are O(1) and independent of
//! every other subscriber. A [`Subscription`] guard owns its slot: dropping it
//! unregisters the callback, including from inside a running broadcast.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

type Callback<T> = Rc<dyn Fn(&T)>;

struct Registry<T> {
    next_id: u64,
    callbacks: HashMap<u64, Callback<T>>,
}

/// Fan-out list of callbacks observing values of `T`.
pub struct Subscribers<T> {
    registry: Rc<RefCell<Registry<T>>>,
}

impl<T: 'static> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 0,
                callbacks: HashMap::new(),
            })),
        }
    }

    /// Register `callback`; it stays active until the guard is dropped.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.callbacks.insert(id, Rc::new(callback));
            id
        };

        let weak: Weak<RefCell<Registry<T>>> = Rc::downgrade(&self.registry);
        Subscription {
            release: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    registry.borrow_mut().callbacks.remove(&id);
                }
            })),
        }
    }

    /// Deliver `value` to every active subscriber.
    ///
    /// The registry is not borrowed while callbacks run, so a callback may
    /// subscribe, unsubscribe or publish again without panicking.
    pub fn publish(&self, value: &T) {
        let snapshot: Vec<(u64, Callback<T>)> = self
            .registry
            .borrow()
            .callbacks
            .iter()
            .map(|(id, cb)| (*id, Rc::clone(cb)))
            .collect();

        for (id, callback) in snapshot {
            // Skip slots released earlier in this same broadcast.
            let active = self.registry.borrow().callbacks.contains_key(&id);
            if active {
                callback(value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.registry.borrow().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Subscribers<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

/// Registration guard returned by [`Subscribers::subscribe`].
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Unregister now. Equivalent to dropping the guard.
    pub fn cancel(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}
