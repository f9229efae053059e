//! Change notification
//!
//! [`Channel`] is a synchronous publish/subscribe list: listeners run in
//! registration order on the emitting thread. Every registration returns a
//! [`Subscription`]; dropping it unregisters the listener, so listener
//! lifetime is tied to whoever holds the handle.
//!
//! [`EventBus`] keeps one channel of [`ModelEvent`]s per model type.

use crate::instance::{Attributes, InstanceRef};
use crate::key::ObjectType;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: u64,
    listeners: Vec<(u64, Listener<E>)>,
}

/// Ordered listener list for events of type `E`
pub struct Channel<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E: 'static> Channel<E> {
    /// Create channel with no listeners
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a listener; it stays registered while the returned handle lives
    #[must_use = "dropping the subscription unregisters the listener"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));
        drop(registry);

        let weak: Weak<Mutex<Registry<E>>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = weak.upgrade() {
                registry.lock().listeners.retain(|(other, _)| *other != id);
            }
        })
    }

    /// Deliver an event to every listener registered at the time of the call
    ///
    /// Returns the number of listeners notified. Listeners may subscribe,
    /// unsubscribe or emit again while being notified.
    pub fn emit(&self, event: &E) -> usize {
        let listeners: Vec<Listener<E>> = self
            .registry
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    /// Number of registered listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }
}

impl<E: 'static> Default for Channel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Channel<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E> fmt::Debug for Channel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("listeners", &self.registry.lock().listeners.len())
            .finish()
    }
}

/// Handle keeping one listener registered
///
/// Dropping the handle (or calling [`unsubscribe`](Self::unsubscribe))
/// removes the listener.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unregister the listener now
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Lifecycle event kinds
#[derive(Debug, Clone)]
pub enum ModelEventKind {
    /// Instance was created on the server
    Created,
    /// Instance changed; carries the attributes it had before
    Updated {
        /// Attributes before the change
        previous: Attributes,
    },
    /// Instance was deleted
    Destroyed,
    /// A join record lost one of its endpoints and no longer joins anything
    Orphaned,
}

/// Lifecycle event for one instance
#[derive(Debug, Clone)]
pub struct ModelEvent {
    /// What happened
    pub kind: ModelEventKind,
    /// Live instance the event is about
    pub instance: InstanceRef,
}

impl ModelEvent {
    /// Create event
    #[inline]
    #[must_use]
    pub fn new(kind: ModelEventKind, instance: InstanceRef) -> Self {
        Self { kind, instance }
    }

    /// Short event name for logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.kind {
            ModelEventKind::Created => "created",
            ModelEventKind::Updated { .. } => "updated",
            ModelEventKind::Destroyed => "destroyed",
            ModelEventKind::Orphaned => "orphaned",
        }
    }
}

/// Per-model-type lifecycle event channels
#[derive(Debug, Default)]
pub struct EventBus {
    channels: DashMap<ObjectType, Channel<ModelEvent>>,
}

impl EventBus {
    /// Create bus with no listeners
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Listen for lifecycle events of one model type
    #[must_use = "dropping the subscription unregisters the listener"]
    pub fn subscribe<F>(&self, object_type: &ObjectType, listener: F) -> Subscription
    where
        F: Fn(&ModelEvent) + Send + Sync + 'static,
    {
        let channel = self
            .channels
            .entry(object_type.clone())
            .or_default()
            .value()
            .clone();
        channel.subscribe(listener)
    }

    /// Deliver an event to listeners of the instance's model type
    pub fn publish(&self, event: &ModelEvent) -> usize {
        let channel = self
            .channels
            .get(&event.instance.key().object_type)
            .map(|entry| entry.value().clone());

        let notified = channel.map_or(0, |channel| channel.emit(event));
        tracing::trace!(
            event = event.name(),
            instance = %event.instance.key(),
            notified,
            "model event published"
        );
        notified
    }

    /// Number of listeners on one model type
    #[must_use]
    pub fn listener_count(&self, object_type: &ObjectType) -> usize {
        self.channels
            .get(object_type)
            .map_or(0, |entry| entry.value().listener_count())
    }
}
