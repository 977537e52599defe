//! # Observers
//!
//! An observer is a pair of lifecycle callbacks bound to one subject (a net
//! or an operator). The subject owns the observer once it is attached, and
//! hands itself to the callbacks as `&S`, so the observer never stores a
//! reference to its subject and can never outlive it.
//!
//! ## Example
//!
//! ```rust
//! use netobs_core::{Observable, Observer};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! struct Job;
//!
//! struct CountStarts(Arc<AtomicUsize>);
//!
//! impl Observer<Job> for CountStarts {
//!     fn start(&mut self, _job: &Job) -> bool {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         true
//!     }
//!
//!     fn stop(&mut self, _job: &Job) -> bool {
//!         true
//!     }
//! }
//!
//! let starts = Arc::new(AtomicUsize::new(0));
//! let observers: Observable<Job> = Observable::new();
//! let id = observers.attach(CountStarts(Arc::clone(&starts)));
//!
//! observers.start_all(&Job);
//! observers.stop_all(&Job);
//! assert_eq!(starts.load(Ordering::SeqCst), 1);
//!
//! let _owned = observers.detach(id).unwrap();
//! assert_eq!(observers.count(), 0);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle hooks for a subject of type `S`.
///
/// Both callbacks are invoked by the subject's [`crate::Observable`], once
/// per run, `start` strictly before `stop`. The returned flag is advisory:
/// `false` is logged and nothing else happens.
///
/// Callbacks run on the thread executing the subject. They must return
/// quickly; anything that needs to wait should buffer and return.
pub trait Observer<S: ?Sized>: Send {
    /// Called before the subject does its work.
    fn start(&mut self, subject: &S) -> bool;

    /// Called after the subject's work finished, whether it succeeded or not.
    fn stop(&mut self, subject: &S) -> bool;

    /// Name used in log records.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<S: ?Sized, O: Observer<S> + ?Sized> Observer<S> for Box<O> {
    fn start(&mut self, subject: &S) -> bool {
        (**self).start(subject)
    }

    fn stop(&mut self, subject: &S) -> bool {
        (**self).stop(subject)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Stable identity of an attached observer.
///
/// Identities are process-unique and never reused, so a stale identity can
/// only ever miss; it cannot hit an observer attached later or elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u64);

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

impl ObserverId {
    pub(crate) fn next() -> Self {
        Self(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for logging.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}
