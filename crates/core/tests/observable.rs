//! Attach/detach bookkeeping of `Observable` under arbitrary sequences.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use netobs_core::{Observable, Observer, ObserverError};
use proptest::prelude::*;

struct Task;

struct Counting {
    starts: Arc<AtomicUsize>,
}

impl Observer<Task> for Counting {
    fn start(&mut self, _task: &Task) -> bool {
        self.starts.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn stop(&mut self, _task: &Task) -> bool {
        true
    }
}

#[test]
fn test_unknown_id_is_not_found() {
    let starts = Arc::new(AtomicUsize::new(0));
    let a: Observable<Task> = Observable::new();
    let b: Observable<Task> = Observable::new();
    let id = a.attach(Counting { starts });

    assert!(matches!(b.detach(id), Err(ObserverError::NotFound { .. })));
    assert_eq!(a.count(), 1);
    assert!(a.detach(id).is_ok());
}

#[test]
fn test_notified_observer_survives_reattach() {
    let starts = Arc::new(AtomicUsize::new(0));
    let a: Observable<Task> = Observable::new();
    let b: Observable<Task> = Observable::new();

    let id = a.attach(Counting {
        starts: Arc::clone(&starts),
    });
    a.start_all(&Task);
    let observer = a.detach(id).unwrap();

    let moved = b.attach_boxed(observer);
    assert_ne!(moved, id);
    b.start_all(&Task);
    assert_eq!(starts.load(Ordering::SeqCst), 2);
}

proptest! {
    #[test]
    fn prop_count_tracks_attach_and_detach(
        attach in 0usize..64,
        detach_mask in proptest::collection::vec(any::<bool>(), 64),
    ) {
        let starts = Arc::new(AtomicUsize::new(0));
        let observers: Observable<Task> = Observable::new();
        let ids: Vec<_> = (0..attach)
            .map(|_| observers.attach(Counting { starts: Arc::clone(&starts) }))
            .collect();
        prop_assert_eq!(observers.count(), attach);

        let mut remaining = attach;
        for (id, detach) in ids.iter().zip(&detach_mask) {
            if *detach {
                prop_assert!(observers.detach(*id).is_ok());
                prop_assert!(observers.detach(*id).is_err());
                remaining -= 1;
            }
        }
        prop_assert_eq!(observers.count(), remaining);
        prop_assert_eq!(observers.ids().len(), remaining);

        observers.start_all(&Task);
        prop_assert_eq!(starts.load(Ordering::SeqCst), remaining);
    }

    #[test]
    fn prop_ids_are_in_attach_order(n in 1usize..32) {
        let starts = Arc::new(AtomicUsize::new(0));
        let observers: Observable<Task> = Observable::new();
        let ids: Vec<_> = (0..n)
            .map(|_| observers.attach(Counting { starts: Arc::clone(&starts) }))
            .collect();
        prop_assert_eq!(observers.ids(), ids);
    }
}
