//! Ready-made observers.
//!
//! - [`LoggingObserver`]: emits a `tracing` event at every start/stop
//! - [`ProfileObserver`]: times the net run and every operator run into a
//!   shared [`Profile`], readable as a [`TraceNode`] tree per run
//!
//! Both are [`NetObserver`]s: attach them to a net and every operator is
//! covered.
//!
//! ```rust
//! use netobs_runtime::{create_net, NetDef, OperatorDef, OperatorRegistry, Tensor, Workspace};
//! use netobs_runtime::hooks::{Profile, ProfileObserver};
//! use std::sync::Arc;
//!
//! let def = NetDef::new("demo")
//!     .external_input("x")
//!     .op(OperatorDef::new("Relu").input("x").output("y"));
//! let net = create_net(&def, &OperatorRegistry::with_builtins()).unwrap();
//!
//! let profile = Arc::new(Profile::new());
//! net.attach_observer(ProfileObserver::new(Arc::clone(&profile)));
//!
//! let ws = Workspace::new();
//! ws.feed("x", Tensor::scalar(1.0));
//! net.run(&ws).unwrap();
//!
//! let run = profile.last_run().unwrap();
//! assert_eq!(run.name, "demo");
//! assert_eq!(run.children[0].name, "Relu#0");
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use netobs_core::{Observer, TraceNode};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::net::{Net, NetObserver};
use crate::operator::Operator;

// ============================================================================
// Logging Observer
// ============================================================================

/// Logs net runs at `info` and operator runs at `debug`, with elapsed time.
#[derive(Debug, Default)]
pub struct LoggingObserver {
    started: Option<Instant>,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn elapsed(&mut self) -> Duration {
        self.started.take().map(|t| t.elapsed()).unwrap_or_default()
    }
}

impl Observer<Net> for LoggingObserver {
    fn start(&mut self, net: &Net) -> bool {
        self.started = Some(Instant::now());
        info!(net = net.name(), operators = net.operators().len(), "net started");
        true
    }

    fn stop(&mut self, net: &Net) -> bool {
        let elapsed = self.elapsed();
        info!(net = net.name(), elapsed_us = elapsed.as_micros() as u64, "net stopped");
        true
    }
}

impl Observer<Operator> for LoggingObserver {
    fn start(&mut self, op: &Operator) -> bool {
        self.started = Some(Instant::now());
        debug!(operator = op.name(), op_type = op.op_type(), "operator started");
        true
    }

    fn stop(&mut self, op: &Operator) -> bool {
        let elapsed = self.elapsed();
        debug!(operator = op.name(), elapsed_us = elapsed.as_micros() as u64, "operator stopped");
        true
    }
}

impl NetObserver for LoggingObserver {
    fn operator_observer(&self, _op: &Operator) -> Box<dyn Observer<Operator>> {
        Box::new(LoggingObserver::new())
    }
}

// ============================================================================
// Profiling
// ============================================================================

struct OperatorSample {
    index: usize,
    trace: TraceNode,
}

struct RunInProgress {
    net: String,
    started: Instant,
    operators: Vec<OperatorSample>,
}

#[derive(Default)]
struct ProfileState {
    current: Option<RunInProgress>,
    runs: Vec<TraceNode>,
}

/// Timings collected by a [`ProfileObserver`] and the operator observers it
/// spawned.
///
/// Each completed net run becomes one [`TraceNode`]: the net at the root,
/// one child per operator run, ordered by operator position and offset from
/// the start of the net run. Operator runs that happen outside a net run are
/// not recorded.
#[derive(Default)]
pub struct Profile {
    state: Mutex<ProfileState>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed runs, oldest first.
    pub fn runs(&self) -> Vec<TraceNode> {
        self.state.lock().runs.clone()
    }

    pub fn last_run(&self) -> Option<TraceNode> {
        self.state.lock().runs.last().cloned()
    }

    pub fn num_runs(&self) -> usize {
        self.state.lock().runs.len()
    }

    /// Total time spent in the named operator across all completed runs.
    pub fn operator_total(&self, name: &str) -> Duration {
        self.state
            .lock()
            .runs
            .iter()
            .flat_map(|run| run.children.iter())
            .filter(|op| op.name == name)
            .map(|op| op.duration)
            .sum()
    }

    fn begin_run(&self, net: &str) {
        self.state.lock().current = Some(RunInProgress {
            net: net.to_string(),
            started: Instant::now(),
            operators: Vec::new(),
        });
    }

    fn record_operator(&self, op: &Operator, started: Instant) {
        let duration = started.elapsed();
        if let Some(run) = self.state.lock().current.as_mut() {
            let offset = started.saturating_duration_since(run.started);
            run.operators.push(OperatorSample {
                index: op.index(),
                trace: TraceNode::new(op.name(), duration).at(offset),
            });
        }
    }

    fn end_run(&self) -> bool {
        let mut state = self.state.lock();
        let Some(mut run) = state.current.take() else {
            return false;
        };
        run.operators.sort_by_key(|sample| sample.index);
        let trace = TraceNode::new(run.net, run.started.elapsed())
            .with_children(run.operators.into_iter().map(|s| s.trace).collect());
        state.runs.push(trace);
        true
    }
}

/// Net-level profiler writing into a shared [`Profile`].
pub struct ProfileObserver {
    profile: Arc<Profile>,
}

impl ProfileObserver {
    pub fn new(profile: Arc<Profile>) -> Self {
        Self { profile }
    }
}

impl Observer<Net> for ProfileObserver {
    fn start(&mut self, net: &Net) -> bool {
        self.profile.begin_run(net.name());
        true
    }

    fn stop(&mut self, _net: &Net) -> bool {
        self.profile.end_run()
    }
}

impl NetObserver for ProfileObserver {
    fn operator_observer(&self, _op: &Operator) -> Box<dyn Observer<Operator>> {
        Box::new(OperatorProfiler {
            profile: Arc::clone(&self.profile),
            started: None,
        })
    }
}

/// Per-operator half of [`ProfileObserver`].
struct OperatorProfiler {
    profile: Arc<Profile>,
    started: Option<Instant>,
}

impl Observer<Operator> for OperatorProfiler {
    fn start(&mut self, _op: &Operator) -> bool {
        self.started = Some(Instant::now());
        true
    }

    fn stop(&mut self, op: &Operator) -> bool {
        let Some(started) = self.started.take() else {
            return false;
        };
        self.profile.record_operator(op, started);
        true
    }
}
