//! # Runtime - Observable Operator Nets
//!
//! Nets of operators over a shared blob [`Workspace`], instrumented with the
//! observer protocol from `netobs-core`.
//!
//! ## Architecture
//!
//! ```text
//! NetDef (JSON) ──create_net──▶ Net ──run──▶ ExecutionStrategy
//!                   │            │              ├── SimpleExecutor
//!          OperatorRegistry      │              └── DagExecutor (DependencyGraph)
//!                                │
//!                    Observable<Net> + Vec<Operator>
//!                                        └── Observable<Operator> + Kernel
//! ```
//!
//! ## Modules
//!
//! - [`def`] - Serializable net and operator definitions
//! - [`operator`] - Kernels and observable operators
//! - [`registry`] - Operator type name → kernel factory
//! - [`net`] - Observable nets, propagation of net observers to operators
//! - [`executor`] - Sequential and DAG-scheduled execution strategies
//! - [`graph`] - Blob-dependency DAG over a net's operators
//! - [`hooks`] - Logging and profiling observers
//! - [`tensor`], [`workspace`] - Minimal dense tensors and the blob store
//!
//! ## Example
//!
//! ```rust
//! use netobs_runtime::{create_net, NetDef, NetType, OperatorDef, OperatorRegistry, Tensor, Workspace};
//! use netobs_runtime::hooks::LoggingObserver;
//!
//! let def = NetDef::new("example")
//!     .with_type(NetType::Dag)
//!     .external_input("x")
//!     .external_output("y")
//!     .op(OperatorDef::new("Relu").input("x").output("h"))
//!     .op(OperatorDef::new("SumAll").input("h").output("y"));
//!
//! let net = create_net(&def, &OperatorRegistry::with_builtins()).unwrap();
//! net.attach_observer(LoggingObserver::new());
//!
//! let ws = Workspace::new();
//! ws.feed("x", Tensor::vector(vec![-1.0, 2.0, 3.0]));
//! net.run(&ws).unwrap();
//! assert_eq!(ws.fetch("y").unwrap(), Tensor::scalar(5.0));
//! ```

pub mod def;
pub mod error;
pub mod executor;
pub mod graph;
pub mod hooks;
pub mod net;
pub mod operator;
pub mod registry;
pub mod tensor;
pub mod workspace;

// Re-export key types
pub use def::{NetDef, NetType, OperatorDef};
pub use error::{KernelError, NetError};
pub use executor::{DagExecutor, ExecutionStrategy, SimpleExecutor};
pub use graph::DependencyGraph;
pub use hooks::{LoggingObserver, Profile, ProfileObserver};
pub use net::{create_net, Net, NetObserver};
pub use operator::{kernel_fn, Kernel, Operator};
pub use registry::{BuiltinKernel, KernelFactory, OperatorRegistry};
pub use tensor::Tensor;
pub use workspace::Workspace;

pub use netobs_core::{Observable, Observer, ObserverError, ObserverId, TraceNode};
