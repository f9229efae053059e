//! Bindings
//!
//! A [`Binding`] attaches one loader's live list to an owning instance for one
//! named relationship. It owns:
//! - the ordered, deduplicated list of [`LoaderResult`]s
//! - the listener subscriptions that keep that list current
//! - the source bindings of composite loaders
//!
//! List changes are announced as [`ListEvent`]s to downstream observers
//! (composite loaders, views). Disposing the binding, or dropping its last
//! handle, unregisters every listener it holds.

use crate::loader::{ListLoader, LoaderContext};
use crate::result::LoaderResult;
use crate::LoaderError;
use futures::future::BoxFuture;
use grc_model::{Channel, InstanceKey, InstanceRef, Subscription};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Change to a binding's list
#[derive(Debug, Clone)]
pub enum ListEvent {
    /// Results newly listed, in insertion order
    Added(Vec<LoaderResult>),
    /// Results no longer listed
    Removed(Vec<LoaderResult>),
}

/// Live list of one relationship of one owning instance
pub struct Binding {
    name: String,
    instance: InstanceRef,
    loader: Arc<dyn ListLoader>,
    list: RwLock<IndexMap<InstanceKey, LoaderResult>>,
    source_bindings: RwLock<Vec<Arc<Binding>>>,
    events: Channel<ListEvent>,
    subscriptions: Mutex<Vec<Subscription>>,
    disposed: AtomicBool,
    this: Weak<Binding>,
}

impl Binding {
    /// Create an empty binding; listeners are attached by the loader
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        instance: InstanceRef,
        loader: Arc<dyn ListLoader>,
    ) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|this| Self {
            name,
            instance,
            loader,
            list: RwLock::new(IndexMap::new()),
            source_bindings: RwLock::new(Vec::new()),
            events: Channel::new(),
            subscriptions: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            this: this.clone(),
        })
    }

    /// Relationship name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning instance
    #[inline]
    #[must_use]
    pub fn instance(&self) -> &InstanceRef {
        &self.instance
    }

    /// Loader maintaining this binding
    #[inline]
    #[must_use]
    pub fn loader(&self) -> &Arc<dyn ListLoader> {
        &self.loader
    }

    /// Snapshot of the list in order
    #[must_use]
    pub fn list(&self) -> Vec<LoaderResult> {
        self.list.read().values().cloned().collect()
    }

    /// Listed instances in order
    #[must_use]
    pub fn instances(&self) -> Vec<InstanceRef> {
        self.list
            .read()
            .values()
            .map(|result| Arc::clone(result.instance()))
            .collect()
    }

    /// Listed identities in order
    #[must_use]
    pub fn keys(&self) -> Vec<InstanceKey> {
        self.list.read().keys().cloned().collect()
    }

    /// Entry for one identity
    #[must_use]
    pub fn get(&self, key: &InstanceKey) -> Option<LoaderResult> {
        self.list.read().get(key).cloned()
    }

    /// Check membership in O(1)
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &InstanceKey) -> bool {
        self.list.read().contains_key(key)
    }

    /// Number of listed instances
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.read().len()
    }

    /// Check if nothing is listed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.read().is_empty()
    }

    /// Bindings this one combines (composite loaders only)
    #[must_use]
    pub fn source_bindings(&self) -> Vec<Arc<Binding>> {
        self.source_bindings.read().clone()
    }

    pub(crate) fn set_source_bindings(&self, sources: Vec<Arc<Binding>>) {
        *self.source_bindings.write() = sources;
    }

    /// Observe list changes
    #[must_use = "dropping the subscription unregisters the listener"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ListEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    /// Keep a listener registered for as long as this binding is live
    ///
    /// Subscriptions handed over after disposal are dropped immediately.
    pub fn retain_subscription(&self, subscription: Subscription) {
        if self.is_disposed() {
            return;
        }
        self.subscriptions.lock().push(subscription);
    }

    /// Number of listeners held by this binding
    #[must_use]
    pub fn retained_subscriptions(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Build a result owned by this binding
    #[must_use]
    pub fn make_result(&self, instance: InstanceRef, mappings: Vec<LoaderResult>) -> LoaderResult {
        LoaderResult::new(instance, mappings, self.this.clone())
    }

    /// Insert results, deduplicating by identity
    ///
    /// A result for an instance already listed only contributes its
    /// provenance, except that a snapshot replaces the listed copy in place.
    /// Returns the number of newly listed instances; an [`ListEvent::Added`]
    /// is emitted for them.
    pub fn insert_results(&self, results: Vec<LoaderResult>) -> usize {
        if self.is_disposed() {
            tracing::trace!(binding = %self.name, "insert into disposed binding ignored");
            return 0;
        }

        let mut added = Vec::new();
        let mut list = self.list.write();
        for result in results {
            match list.get_mut(result.key()) {
                Some(existing) => {
                    // Snapshots live outside the cache; the newest copy wins
                    if result.instance().is_snapshot()
                        && !Arc::ptr_eq(existing.instance(), result.instance())
                    {
                        existing.replace_instance(Arc::clone(result.instance()));
                    }
                    existing.merge_mappings(result.into_mappings());
                }
                None => {
                    list.insert(result.key().clone(), result.clone());
                    added.push(result);
                }
            }
        }
        drop(list);

        let count = added.len();
        if count > 0 {
            tracing::debug!(
                binding = %self.name,
                owner = %self.instance.key(),
                added = count,
                "binding list grew"
            );
            self.events.emit(&ListEvent::Added(added));
        }
        count
    }

    /// Remove an instance from the list
    ///
    /// With `via`, only that provenance entry is retracted and the instance
    /// stays listed while other provenance remains; a `via` the entry does not
    /// carry changes nothing. Without `via` the entry is removed outright.
    /// Removing an instance that is not listed is a no-op. Returns whether the
    /// instance left the list.
    pub fn remove_instance(&self, key: &InstanceKey, via: Option<&InstanceKey>) -> bool {
        let mut list = self.list.write();
        let Some(existing) = list.get_mut(key) else {
            return false;
        };

        if let Some(via) = via {
            if !existing.retract_mapping(via) || !existing.mappings().is_empty() {
                return false;
            }
        }

        let removed = list.shift_remove(key);
        drop(list);

        match removed {
            Some(result) => {
                tracing::debug!(
                    binding = %self.name,
                    owner = %self.instance.key(),
                    instance = %key,
                    "binding list shrank"
                );
                self.events.emit(&ListEvent::Removed(vec![result]));
                true
            }
            None => false,
        }
    }

    /// Populate the list through the loader
    ///
    /// Query failures are returned unchanged; the list keeps what it had.
    /// Refreshing a disposed binding fails with [`LoaderError::Disposed`].
    pub fn refresh_stubs<'a>(
        self: &'a Arc<Self>,
        ctx: &'a LoaderContext,
    ) -> BoxFuture<'a, Result<(), LoaderError>> {
        if self.is_disposed() {
            let err = LoaderError::Disposed {
                owner: self.instance.key().clone(),
                name: self.name.clone(),
            };
            return Box::pin(futures::future::ready(Err(err)));
        }
        self.loader.refresh_stubs(self, ctx)
    }

    /// Populate the list, then load full data for every listed stub
    ///
    /// # Errors
    /// Returns error if any query fails
    pub async fn refresh_instances(
        self: &Arc<Self>,
        ctx: &LoaderContext,
    ) -> Result<Vec<InstanceRef>, LoaderError> {
        self.refresh_stubs(ctx).await?;
        let instances = self.instances();
        ctx.repository.reify(&instances).await?;
        Ok(instances)
    }

    /// Populate the list and report how many instances it holds
    ///
    /// # Errors
    /// Returns error if the refresh query fails
    pub async fn refresh_count(self: &Arc<Self>, ctx: &LoaderContext) -> Result<usize, LoaderError> {
        self.refresh_stubs(ctx).await?;
        Ok(self.len())
    }

    /// Unregister every listener and release source bindings; later inserts are ignored
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        let sources = std::mem::take(&mut *self.source_bindings.write());
        tracing::debug!(
            binding = %self.name,
            owner = %self.instance.key(),
            listeners = subscriptions.len(),
            "binding disposed"
        );
        drop(subscriptions);
        drop(sources);
    }

    /// Whether [`dispose`](Self::dispose) was called
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("owner", self.instance.key())
            .field("loader", &self.loader.kind())
            .field("len", &self.len())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
