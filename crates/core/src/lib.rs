//! # netobs-core - Observer Protocol
//!
//! The hook substrate for instrumenting executable entities:
//!
//! - **Observer**: start/stop callbacks bound to one subject
//! - **Observable**: the owning container every subject carries, handing out
//!   stable identities for detachment and notifying observers in order
//! - **TraceNode**: a timing tree that profiling observers report into
//!
//! Subjects (nets, operators) live in `netobs-runtime`. This crate knows
//! nothing about them; it only fixes how observers are owned and called.
//!
//! ## Lifecycle
//!
//! ```text
//!   Observer::new ──▶ attach ──▶ start/stop per run ──▶ detach ──▶ drop
//!   (caller owns)     (subject owns)                    (caller owns)
//! ```

pub mod error;
pub mod observable;
pub mod observer;
pub mod trace;

pub use error::ObserverError;
pub use observable::Observable;
pub use observer::{Observer, ObserverId};
pub use trace::TraceNode;
