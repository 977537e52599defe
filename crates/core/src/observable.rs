//! # Observable Containers
//!
//! Every instrumentable subject owns one `Observable<Self>`. The container
//! owns the attached observers, keyed by the [`ObserverId`] handed out at
//! attach time, and drives their callbacks.
//!
//! ## Ownership
//!
//! ```text
//!   caller ──attach(obs)──▶ Observable ──detach(id)──▶ caller
//!   (owns obs)              (owns obs)                 (owns obs again)
//! ```
//!
//! `attach` moves the observer in; `detach` moves it back out. There is no
//! way to hold an observer in two places at once, and identities are never
//! reused, so detaching twice simply reports `NotFound`.
//!
//! ## Ordering
//!
//! Observers are notified in attach order. Attach and detach are serialized
//! with propagation by an internal lock; calling them on the *same*
//! container from inside one of its own callbacks would deadlock and is not
//! supported.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::ObserverError;
use crate::observer::{Observer, ObserverId};

/// An owning, ordered collection of observers for subjects of type `S`.
pub struct Observable<S: ?Sized> {
    observers: Mutex<BTreeMap<ObserverId, Box<dyn Observer<S>>>>,
    len: AtomicUsize,
}

impl<S: ?Sized> Observable<S> {
    /// Create an empty container.
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(BTreeMap::new()),
            len: AtomicUsize::new(0),
        }
    }

    /// Take ownership of `observer` and return the identity to detach it by.
    pub fn attach<O>(&self, observer: O) -> ObserverId
    where
        O: Observer<S> + 'static,
    {
        self.attach_boxed(Box::new(observer))
    }

    /// Like [`Observable::attach`], for observers that are already boxed.
    pub fn attach_boxed(&self, observer: Box<dyn Observer<S>>) -> ObserverId {
        let id = ObserverId::next();
        let name = observer.name();
        let mut observers = self.observers.lock();
        observers.insert(id, observer);
        self.len.store(observers.len(), Ordering::Release);
        debug!(observer = name, %id, count = observers.len(), "observer attached");
        id
    }

    /// Remove the observer attached under `id` and hand it back.
    ///
    /// The container is left untouched when `id` is not attached.
    pub fn detach(&self, id: ObserverId) -> Result<Box<dyn Observer<S>>, ObserverError> {
        let mut observers = self.observers.lock();
        let observer = observers.remove(&id).ok_or(ObserverError::NotFound { id })?;
        self.len.store(observers.len(), Ordering::Release);
        debug!(observer = observer.name(), %id, count = observers.len(), "observer detached");
        Ok(observer)
    }

    /// Whether `id` is currently attached here.
    pub fn contains(&self, id: ObserverId) -> bool {
        self.observers.lock().contains_key(&id)
    }

    /// Identities of the attached observers, in notification order.
    pub fn ids(&self) -> Vec<ObserverId> {
        self.observers.lock().keys().copied().collect()
    }

    /// Number of attached observers.
    ///
    /// Lock-free; safe to call from inside a callback.
    pub fn count(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Whether no observers are attached.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Call `start` on every attached observer.
    ///
    /// Returns the number of observers that reported failure. A failing
    /// observer never stops the others from being notified.
    pub fn start_all(&self, subject: &S) -> usize {
        self.notify(subject, Phase::Start)
    }

    /// Call `stop` on every attached observer.
    ///
    /// Returns the number of observers that reported failure.
    pub fn stop_all(&self, subject: &S) -> usize {
        self.notify(subject, Phase::Stop)
    }

    fn notify(&self, subject: &S, phase: Phase) -> usize {
        let mut observers = self.observers.lock();
        let mut failures = 0;
        for (id, observer) in observers.iter_mut() {
            let ok = match phase {
                Phase::Start => observer.start(subject),
                Phase::Stop => observer.stop(subject),
            };
            if !ok {
                failures += 1;
                warn!(observer = observer.name(), %id, phase = %phase, "observer reported failure");
            }
        }
        failures
    }
}

impl<S: ?Sized> Default for Observable<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized> fmt::Debug for Observable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("count", &self.count())
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Start,
    Stop,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Start => write!(f, "start"),
            Phase::Stop => write!(f, "stop"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
