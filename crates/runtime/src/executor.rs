//! # Execution Strategies
//!
//! A strategy decides the order (and the threads) operators run on. It
//! knows nothing about observers: it only calls [`Operator::run`], and each
//! operator notifies its own observers around its own work.
//!
//! | Strategy | Order | Threads |
//! |----------|-------|---------|
//! | [`SimpleExecutor`] | list order | caller's thread |
//! | [`DagExecutor`] | dependency order | scoped worker pool |
//!
//! Both return only after every operator they started has finished, which
//! is what lets [`crate::Net::run`] put the net-level stop notification
//! after all operator notifications.
//!
//! A panic inside an operator (its kernel or one of its observers) unwinds
//! out of `run` for both strategies. The DAG strategy first lets the other
//! workers drain, then resumes the panic on the caller's thread.

use std::any::Any;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::error::NetError;
use crate::graph::DependencyGraph;
use crate::operator::Operator;
use crate::workspace::Workspace;

/// Runs a net's operators.
pub trait ExecutionStrategy: Send + Sync {
    /// Run `ops` against `ws`, returning the first operator failure.
    fn run(&self, ops: &[Operator], ws: &Workspace) -> Result<(), NetError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

// ============================================================================
// Sequential
// ============================================================================

/// Runs operators one after another in list order, stopping at the first
/// failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleExecutor;

impl ExecutionStrategy for SimpleExecutor {
    fn run(&self, ops: &[Operator], ws: &Workspace) -> Result<(), NetError> {
        for op in ops {
            op.run(ws)?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "simple"
    }
}

// ============================================================================
// DAG-scheduled
// ============================================================================

/// Runs operators on a pool of worker threads as soon as all their
/// dependencies (see [`DependencyGraph`]) have finished.
///
/// After the first failure no further operators are started; operators
/// already running are waited for, then the first error is returned. A
/// single worker runs the operators in [`DependencyGraph::topological_order`]
/// on the caller's thread.
#[derive(Debug, Clone, Copy)]
pub struct DagExecutor {
    num_workers: NonZeroUsize,
}

impl DagExecutor {
    pub fn new(num_workers: NonZeroUsize) -> Self {
        Self { num_workers }
    }

    /// One worker per available CPU.
    pub fn with_available_parallelism() -> Self {
        let workers = thread::available_parallelism().unwrap_or(NonZeroUsize::MIN);
        Self::new(workers)
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers.get()
    }
}

impl Default for DagExecutor {
    fn default() -> Self {
        Self::with_available_parallelism()
    }
}

struct Schedule {
    ready: VecDeque<usize>,
    pending_parents: Vec<usize>,
    in_flight: usize,
    finished: usize,
    error: Option<NetError>,
    panic: Option<Box<dyn Any + Send>>,
}

impl Schedule {
    fn aborted(&self) -> bool {
        self.error.is_some() || self.panic.is_some()
    }

    /// Nothing is running and nothing more will be started.
    fn drained(&self) -> bool {
        self.in_flight == 0 && (self.ready.is_empty() || self.aborted())
    }
}

impl ExecutionStrategy for DagExecutor {
    fn run(&self, ops: &[Operator], ws: &Workspace) -> Result<(), NetError> {
        if ops.is_empty() {
            return Ok(());
        }

        let graph = DependencyGraph::build(ops.iter().map(Operator::def));
        if self.num_workers.get() == 1 {
            debug!(operators = ops.len(), edges = graph.edge_count(), "dag run inline");
            for op in graph.topological_order() {
                ops[op].run(ws)?;
            }
            return Ok(());
        }

        let pending_parents = graph.in_degrees();
        let ready = pending_parents
            .iter()
            .enumerate()
            .filter(|(_, parents)| **parents == 0)
            .map(|(op, _)| op)
            .collect();

        let schedule = Mutex::new(Schedule {
            ready,
            pending_parents,
            in_flight: 0,
            finished: 0,
            error: None,
            panic: None,
        });
        let wakeup = Condvar::new();
        let workers = self.num_workers.get().min(ops.len());

        debug!(operators = ops.len(), workers, edges = graph.edge_count(), "dag run starting");

        thread::scope(|scope| {
            for worker in 0..workers {
                let (graph, schedule, wakeup) = (&graph, &schedule, &wakeup);
                scope.spawn(move || work(worker, ops, ws, graph, schedule, wakeup));
            }
        });

        let schedule = schedule.into_inner();
        if let Some(payload) = schedule.panic {
            warn!(finished = schedule.finished, "dag run aborted by a panicking operator");
            panic::resume_unwind(payload);
        }
        match schedule.error {
            Some(err) => {
                warn!(
                    finished = schedule.finished,
                    skipped = ops.len() - schedule.finished,
                    error = %err,
                    "dag run aborted"
                );
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "dag"
    }
}

fn work(
    worker: usize,
    ops: &[Operator],
    ws: &Workspace,
    graph: &DependencyGraph,
    schedule: &Mutex<Schedule>,
    wakeup: &Condvar,
) {
    let mut state = schedule.lock();
    loop {
        let next = if !state.aborted() {
            state.ready.pop_front()
        } else {
            None
        };

        if let Some(op) = next {
            state.in_flight += 1;
            drop(state);

            debug!(worker, operator = ops[op].name(), "dispatching operator");
            let result = panic::catch_unwind(AssertUnwindSafe(|| ops[op].run(ws)));

            state = schedule.lock();
            state.in_flight -= 1;
            state.finished += 1;
            match result {
                Ok(Ok(())) => {
                    for child in graph.children(op) {
                        state.pending_parents[child] -= 1;
                        if state.pending_parents[child] == 0 {
                            state.ready.push_back(child);
                        }
                    }
                }
                Ok(Err(err)) => {
                    if state.error.is_none() {
                        state.error = Some(err);
                    }
                }
                Err(payload) => {
                    if state.panic.is_none() {
                        state.panic = Some(payload);
                    }
                }
            }
            wakeup.notify_all();
            continue;
        }

        if state.drained() {
            wakeup.notify_all();
            return;
        }
        wakeup.wait(&mut state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::OperatorDef;
    use crate::error::KernelError;
    use crate::operator::kernel_fn;
    use crate::tensor::Tensor;
    use netobs_core::Observer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn workers(n: usize) -> DagExecutor {
        DagExecutor::new(NonZeroUsize::new(n).unwrap())
    }

    /// An operator that appends its name to `log` when its kernel runs.
    fn logging_op(
        index: usize,
        inputs: &[&str],
        outputs: &[&str],
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Operator {
        let mut def = OperatorDef::new("Log");
        def.inputs = inputs.iter().map(|s| s.to_string()).collect();
        def.outputs = outputs.iter().map(|s| s.to_string()).collect();
        let n_outputs = def.outputs.len();
        let log = Arc::clone(log);
        let name = format!("op{}", index);
        let kernel = kernel_fn(move |_| {
            log.lock().push(name.clone());
            Ok(vec![Tensor::empty(); n_outputs])
        });
        Operator::new(def, index, kernel)
    }

    fn position(log: &[String], name: &str) -> usize {
        log.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_simple_runs_in_list_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ops = vec![
            logging_op(0, &[], &["a"], &log),
            logging_op(1, &[], &["b"], &log),
            logging_op(2, &["a", "b"], &["c"], &log),
        ];
        SimpleExecutor.run(&ops, &Workspace::new()).unwrap();
        assert_eq!(*log.lock(), vec!["op0", "op1", "op2"]);
    }

    #[test]
    fn test_simple_stops_at_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing = Operator::new(
            OperatorDef::new("Fail"),
            1,
            kernel_fn(|_| Err(KernelError::Failed("nope".to_string()))),
        );
        let ops = vec![
            logging_op(0, &[], &["a"], &log),
            failing,
            logging_op(2, &[], &["b"], &log),
        ];
        let result = SimpleExecutor.run(&ops, &Workspace::new());
        assert!(matches!(result, Err(NetError::Kernel { .. })));
        assert_eq!(*log.lock(), vec!["op0"]);
    }

    #[test]
    fn test_dag_respects_dependencies() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ops = vec![
            logging_op(0, &[], &["a"], &log),
            logging_op(1, &["a"], &["b"], &log),
            logging_op(2, &["a"], &["c"], &log),
            logging_op(3, &["b", "c"], &["d"], &log),
        ];
        workers(4).run(&ops, &Workspace::new()).unwrap();

        let log = log.lock();
        assert_eq!(log.len(), 4);
        assert!(position(&log, "op0") < position(&log, "op1"));
        assert!(position(&log, "op0") < position(&log, "op2"));
        assert!(position(&log, "op1") < position(&log, "op3"));
        assert!(position(&log, "op2") < position(&log, "op3"));
    }

    #[test]
    fn test_dag_single_worker_runs_in_topological_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ops = vec![
            logging_op(0, &[], &["a"], &log),
            logging_op(1, &[], &["b"], &log),
            logging_op(2, &["a"], &["c"], &log),
            logging_op(3, &["b", "c"], &["d"], &log),
        ];
        workers(1).run(&ops, &Workspace::new()).unwrap();
        assert_eq!(*log.lock(), vec!["op0", "op1", "op2", "op3"]);
    }

    /// Runs `ops` with `strategy` on a helper thread and reports whether the
    /// run panicked, or `None` if it did not return within five seconds.
    fn run_with_timeout(
        strategy: impl ExecutionStrategy + 'static,
        ops: Vec<Operator>,
    ) -> Option<bool> {
        let (tx, rx) = std::sync::mpsc::channel();
        thread::spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                strategy.run(&ops, &Workspace::new())
            }));
            let _ = tx.send(outcome.is_err());
        });
        rx.recv_timeout(std::time::Duration::from_secs(5)).ok()
    }

    fn panicking_op(index: usize, outputs: &[&str]) -> Operator {
        let mut def = OperatorDef::new("Panic");
        def.outputs = outputs.iter().map(|s| s.to_string()).collect();
        Operator::new(def, index, kernel_fn(|_| panic!("kernel blew up")))
    }

    #[test]
    fn test_dag_panicking_kernel_propagates() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ops = vec![
            panicking_op(0, &["a"]),
            logging_op(1, &["a"], &["b"], &log),
            logging_op(2, &[], &["c"], &log),
        ];
        assert_eq!(run_with_timeout(workers(2), ops), Some(true));
        assert!(!log.lock().contains(&"op1".to_string()));
    }

    #[test]
    fn test_dag_panicking_observer_propagates() {
        struct Exploding;

        impl Observer<Operator> for Exploding {
            fn start(&mut self, _op: &Operator) -> bool {
                panic!("observer blew up");
            }

            fn stop(&mut self, _op: &Operator) -> bool {
                true
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let ops = vec![
            logging_op(0, &[], &["a"], &log),
            logging_op(1, &["a"], &["b"], &log),
        ];
        ops[0].attach_observer(Exploding);
        assert_eq!(run_with_timeout(workers(2), ops), Some(true));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_simple_panicking_kernel_propagates() {
        assert_eq!(
            run_with_timeout(SimpleExecutor, vec![panicking_op(0, &[])]),
            Some(true)
        );
    }

    #[test]
    fn test_dag_overlaps_independent_operators() {
        // Two independent operators that each wait until both have started.
        // Completes only if they really run at the same time.
        let started = Arc::new(AtomicUsize::new(0));
        let make = |index: usize| {
            let started = Arc::clone(&started);
            Operator::new(
                OperatorDef::new("Rendezvous"),
                index,
                kernel_fn(move |_| {
                    started.fetch_add(1, Ordering::SeqCst);
                    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
                    while started.load(Ordering::SeqCst) < 2 {
                        if std::time::Instant::now() > deadline {
                            return Err(KernelError::Failed("peer never started".to_string()));
                        }
                        thread::yield_now();
                    }
                    Ok(vec![])
                }),
            )
        };
        let ops = vec![make(0), make(1)];
        workers(2).run(&ops, &Workspace::new()).unwrap();
    }

    #[test]
    fn test_dag_failure_skips_dependents() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut fail_def = OperatorDef::new("Fail");
        fail_def.outputs = vec!["a".to_string()];
        let failing = Operator::new(
            fail_def,
            0,
            kernel_fn(|_| Err(KernelError::Failed("nope".to_string()))),
        );
        let ops = vec![
            failing,
            logging_op(1, &["a"], &["b"], &log),
            logging_op(2, &["b"], &["c"], &log),
        ];

        let result = workers(2).run(&ops, &Workspace::new());
        assert!(matches!(result, Err(NetError::Kernel { operator, .. }) if operator == "Fail#0"));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_dag_empty() {
        assert!(workers(3).run(&[], &Workspace::new()).is_ok());
    }

    #[test]
    fn test_names() {
        assert_eq!(SimpleExecutor.name(), "simple");
        assert_eq!(workers(2).name(), "dag");
        assert_eq!(workers(2).num_workers(), 2);
        assert!(DagExecutor::default().num_workers() >= 1);
    }
}
