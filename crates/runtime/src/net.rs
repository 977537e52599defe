//! # Nets
//!
//! A `Net` is an ordered list of [`Operator`]s, an [`ExecutionStrategy`] to
//! run them with, and its own observers.
//!
//! ## Propagation
//!
//! Net-level observers implement [`NetObserver`]. Attaching one also builds
//! one operator observer per operator, through
//! [`NetObserver::operator_observer`], and attaches each to its operator:
//!
//! ```text
//!   net.attach_observer(obs)
//!     ├── op0.attach(obs.operator_observer(op0))
//!     ├── op1.attach(obs.operator_observer(op1))
//!     └── net observers ← obs
//! ```
//!
//! Propagation happens once, at attach time. Operators added later with
//! [`Net::add_operator`] are not instrumented by observers that were already
//! attached.
//!
//! The spawned operator observers are owned by their operators. The net
//! remembers their identities so that detaching the net-level observer also
//! detaches what it spawned.
//!
//! ## Run order
//!
//! ```text
//!   net.start ─▶ strategy.run(ops) ─▶ net.stop
//!                  └─ per op: op.start ─▶ work ─▶ op.stop
//! ```
//!
//! The net-level stop only happens after the strategy returned, that is
//! after every operator's stop, for both strategies.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;

use netobs_core::{Observable, Observer, ObserverError, ObserverId};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::def::{NetDef, NetType};
use crate::error::NetError;
use crate::executor::{DagExecutor, ExecutionStrategy, SimpleExecutor};
use crate::operator::Operator;
use crate::registry::OperatorRegistry;
use crate::workspace::Workspace;

/// A net-level observer that knows how to instrument the net's operators.
pub trait NetObserver: Observer<Net> {
    /// Build the observer attached to `op` when `self` is attached to the
    /// net that owns it.
    fn operator_observer(&self, op: &Operator) -> Box<dyn Observer<Operator>>;
}

/// Operator observers spawned for one net-level observer: `(operator index, id)`.
type Spawned = Vec<(usize, ObserverId)>;

/// An observable collection of operators run by an execution strategy.
pub struct Net {
    name: String,
    operators: Vec<Operator>,
    strategy: Box<dyn ExecutionStrategy>,
    observers: Observable<Net>,
    spawned: Mutex<HashMap<ObserverId, Spawned>>,
}

impl Net {
    /// Create an empty net run by `strategy`.
    pub fn new(name: impl Into<String>, strategy: Box<dyn ExecutionStrategy>) -> Self {
        Self {
            name: name.into(),
            operators: Vec::new(),
            strategy,
            observers: Observable::new(),
            spawned: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    pub fn operator(&self, index: usize) -> Option<&Operator> {
        self.operators.get(index)
    }

    /// Append an operator, moving it to the end of the net.
    ///
    /// The operator takes the next position whatever index it was built
    /// with. Observers already attached to the net do not see it.
    pub fn add_operator(&mut self, mut op: Operator) {
        op.set_index(self.operators.len());
        self.operators.push(op);
    }

    /// Attach a net-level observer, instrumenting every current operator.
    pub fn attach_observer<O>(&self, observer: O) -> ObserverId
    where
        O: NetObserver + 'static,
    {
        let spawned = self.attach_recursive_propagation(|op| observer.operator_observer(op));
        let id = self.observers.attach(observer);
        debug!(net = %self.name, %id, operators = spawned.len(), "net observer propagated");
        self.spawned.lock().insert(id, spawned);
        id
    }

    /// Attach one factory-built observer to every operator currently in the
    /// net, returning where each one went.
    pub fn attach_recursive_propagation<F>(&self, factory: F) -> Vec<(usize, ObserverId)>
    where
        F: Fn(&Operator) -> Box<dyn Observer<Operator>>,
    {
        self.operators
            .iter()
            .enumerate()
            .map(|(index, op)| (index, op.attach_boxed_observer(factory(op))))
            .collect()
    }

    /// Detach a net-level observer and the operator observers spawned for it.
    ///
    /// Operator observers the caller already detached by hand are skipped.
    pub fn detach_observer(&self, id: ObserverId) -> Result<Box<dyn Observer<Net>>, ObserverError> {
        let observer = self.observers.detach(id)?;
        let spawned = self.spawned.lock().remove(&id).unwrap_or_default();
        for (index, child) in spawned {
            if let Some(op) = self.operators.get(index) {
                // Dropping the spawned observer ends its life with its parent.
                let _ = op.detach_observer(child);
            }
        }
        Ok(observer)
    }

    /// Number of net-level observers.
    pub fn num_observers(&self) -> usize {
        self.observers.count()
    }

    /// Identities of the net-level observers, in notification order.
    pub fn observer_ids(&self) -> Vec<ObserverId> {
        self.observers.ids()
    }

    pub fn has_observer(&self, id: ObserverId) -> bool {
        self.observers.contains(id)
    }

    /// Run every operator once, bracketed by the net-level observers.
    pub fn run(&self, ws: &Workspace) -> Result<(), NetError> {
        info!(net = %self.name, strategy = self.strategy.name(), operators = self.operators.len(), "net run starting");
        self.observers.start_all(self);
        let result = self.strategy.run(&self.operators, ws);
        self.observers.stop_all(self);
        match &result {
            Ok(()) => info!(net = %self.name, "net run finished"),
            Err(err) => info!(net = %self.name, error = %err, "net run failed"),
        }
        result
    }
}

impl fmt::Debug for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Net")
            .field("name", &self.name)
            .field("strategy", &self.strategy.name())
            .field("operators", &self.operators)
            .field("observers", &self.observers.count())
            .finish()
    }
}

/// Build a net from its definition.
///
/// The definition is validated, every operator's kernel is created through
/// `registry`, and the strategy is picked from `def.net_type`.
pub fn create_net(def: &NetDef, registry: &OperatorRegistry) -> Result<Net, NetError> {
    def.validate()?;

    let strategy: Box<dyn ExecutionStrategy> = match def.net_type {
        NetType::Simple => Box::new(SimpleExecutor),
        NetType::Dag => {
            let requested = def
                .num_workers
                .and_then(NonZeroUsize::new)
                .map(DagExecutor::new)
                .unwrap_or_default();
            let workers = requested.num_workers().min(def.ops.len().max(1));
            Box::new(DagExecutor::new(
                NonZeroUsize::new(workers).unwrap_or(NonZeroUsize::MIN),
            ))
        }
    };

    let mut net = Net::new(def.name.clone(), strategy);
    for (index, op_def) in def.ops.iter().enumerate() {
        let kernel = registry.create_kernel(op_def)?;
        net.add_operator(Operator::new(op_def.clone(), index, kernel));
    }

    debug!(net = %net.name, net_type = %def.net_type, operators = net.operators.len(), "net created");
    Ok(net)
}
