//! # Operators
//!
//! An `Operator` is one node of a net: an [`OperatorDef`] naming its blobs,
//! a [`Kernel`] doing the work, and the operator's own observers.
//!
//! ## Run contract
//!
//! ```text
//!   start_all ──▶ fetch inputs ──▶ kernel ──▶ store outputs ──▶ stop_all
//! ```
//!
//! Observers bracket the operator's work and nothing else. `stop_all` runs
//! even when the work fails, so every observer sees a matched start/stop
//! pair per attempt.

use std::fmt;

use netobs_core::{Observable, Observer, ObserverError, ObserverId};
use tracing::debug;

use crate::def::{display_name, OperatorDef};
use crate::error::{KernelError, NetError};
use crate::tensor::Tensor;
use crate::workspace::Workspace;

/// The work an operator performs: input tensors in, output tensors out.
///
/// Kernels are shared across DAG worker threads and must not keep
/// per-run mutable state outside of interior synchronization.
pub trait Kernel: Send + Sync {
    fn run(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>, KernelError>;
}

impl<F> Kernel for F
where
    F: Fn(&[Tensor]) -> Result<Vec<Tensor>, KernelError> + Send + Sync,
{
    fn run(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>, KernelError> {
        self(inputs)
    }
}

/// Box a closure as a kernel.
///
/// ```rust
/// use netobs_runtime::{kernel_fn, Kernel, Tensor};
///
/// let double = kernel_fn(|inputs| Ok(vec![inputs[0].map(|x| x * 2.0)]));
/// let out = double.run(&[Tensor::scalar(2.0)]).unwrap();
/// assert_eq!(out[0].data, vec![4.0]);
/// ```
pub fn kernel_fn<F>(f: F) -> Box<dyn Kernel>
where
    F: Fn(&[Tensor]) -> Result<Vec<Tensor>, KernelError> + Send + Sync + 'static,
{
    Box::new(f)
}

/// An executable, observable node of a net.
pub struct Operator {
    def: OperatorDef,
    index: usize,
    name: String,
    kernel: Box<dyn Kernel>,
    observers: Observable<Operator>,
}

impl Operator {
    /// Wrap `kernel` as the operator at position `index` of its net.
    pub fn new(def: OperatorDef, index: usize, kernel: Box<dyn Kernel>) -> Self {
        let name = display_name(&def, index);
        Self {
            def,
            index,
            name,
            kernel,
            observers: Observable::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of this operator in its net.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Move the operator to position `index`, renaming it if its name was
    /// derived from the old position.
    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
        self.name = display_name(&self.def, index);
    }

    pub fn op_type(&self) -> &str {
        &self.def.op_type
    }

    pub fn def(&self) -> &OperatorDef {
        &self.def
    }

    /// Attach an observer to this operator only.
    pub fn attach_observer<O>(&self, observer: O) -> ObserverId
    where
        O: Observer<Operator> + 'static,
    {
        self.observers.attach(observer)
    }

    pub fn attach_boxed_observer(&self, observer: Box<dyn Observer<Operator>>) -> ObserverId {
        self.observers.attach_boxed(observer)
    }

    pub fn detach_observer(
        &self,
        id: ObserverId,
    ) -> Result<Box<dyn Observer<Operator>>, ObserverError> {
        self.observers.detach(id)
    }

    pub fn num_observers(&self) -> usize {
        self.observers.count()
    }

    pub fn observers(&self) -> &Observable<Operator> {
        &self.observers
    }

    /// Run the operator against `ws`, notifying its observers around the work.
    pub fn run(&self, ws: &Workspace) -> Result<(), NetError> {
        self.observers.start_all(self);
        let result = self.run_kernel(ws);
        self.observers.stop_all(self);
        debug!(operator = %self.name, ok = result.is_ok(), "operator finished");
        result
    }

    fn run_kernel(&self, ws: &Workspace) -> Result<(), NetError> {
        let inputs = self
            .def
            .inputs
            .iter()
            .map(|blob| ws.fetch(blob))
            .collect::<Result<Vec<_>, _>>()?;

        let outputs = self.kernel.run(&inputs).map_err(|source| NetError::Kernel {
            operator: self.name.clone(),
            source,
        })?;

        if outputs.len() != self.def.outputs.len() {
            return Err(NetError::OutputArity {
                operator: self.name.clone(),
                expected: self.def.outputs.len(),
                got: outputs.len(),
            });
        }

        for (blob, tensor) in self.def.outputs.iter().zip(outputs) {
            ws.feed(blob.clone(), tensor);
        }
        Ok(())
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("def", &self.def)
            .field("observers", &self.observers.count())
            .finish()
    }
}
