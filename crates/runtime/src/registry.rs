//! # Operator Registry
//!
//! Maps operator type names to kernel factories. [`crate::create_net`] looks
//! up every [`OperatorDef`] here to build the net's operators.
//!
//! ## Built-in operators
//!
//! | Type | Inputs | Outputs | Work |
//! |------|--------|---------|------|
//! | `Add` | a, b | a + b | element-wise sum |
//! | `Mul` | a, b | a * b | element-wise product |
//! | `Relu` | x | max(0, x) | element-wise ReLU |
//! | `SumAll` | x | sum(x) | reduce to scalar |
//! | `Copy` | x₁..xₙ | x₁..xₙ | copy each input to the matching output |
//! | `NoOp` | any | empty blobs | nothing |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::def::OperatorDef;
use crate::error::{KernelError, NetError};
use crate::operator::Kernel;
use crate::tensor::Tensor;

/// Builds the kernel for one operator definition.
pub type KernelFactory = Arc<dyn Fn(&OperatorDef) -> Result<Box<dyn Kernel>, NetError> + Send + Sync>;

/// Kernels shipped with the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKernel {
    Add,
    Mul,
    Relu,
    SumAll,
    Copy,
    NoOp { n_outputs: usize },
}

impl Kernel for BuiltinKernel {
    fn run(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>, KernelError> {
        match self {
            BuiltinKernel::Add => {
                expect_inputs(inputs, 2)?;
                Ok(vec![inputs[0].add(&inputs[1])?])
            }

            BuiltinKernel::Mul => {
                expect_inputs(inputs, 2)?;
                Ok(vec![inputs[0].mul(&inputs[1])?])
            }

            BuiltinKernel::Relu => {
                expect_inputs(inputs, 1)?;
                Ok(vec![inputs[0].relu()])
            }

            BuiltinKernel::SumAll => {
                expect_inputs(inputs, 1)?;
                Ok(vec![inputs[0].sum_all()])
            }

            BuiltinKernel::Copy => Ok(inputs.to_vec()),

            BuiltinKernel::NoOp { n_outputs } => Ok(vec![Tensor::empty(); *n_outputs]),
        }
    }
}

fn expect_inputs(inputs: &[Tensor], expected: usize) -> Result<(), KernelError> {
    if inputs.len() != expected {
        return Err(KernelError::InputCount {
            expected,
            got: inputs.len(),
        });
    }
    Ok(())
}

/// Type name → kernel factory.
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    factories: HashMap<String, KernelFactory>,
}

impl OperatorRegistry {
    /// A registry with no operator types.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in operator types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtin("Add", BuiltinKernel::Add);
        registry.register_builtin("Mul", BuiltinKernel::Mul);
        registry.register_builtin("Relu", BuiltinKernel::Relu);
        registry.register_builtin("SumAll", BuiltinKernel::SumAll);
        registry.register("Copy", |def: &OperatorDef| {
            if def.inputs.len() != def.outputs.len() {
                return Err(NetError::InvalidDefinition {
                    reason: format!(
                        "Copy needs as many outputs as inputs ({} vs {})",
                        def.outputs.len(),
                        def.inputs.len()
                    ),
                });
            }
            Ok(Box::new(BuiltinKernel::Copy) as Box<dyn Kernel>)
        });
        registry.register("NoOp", |def: &OperatorDef| {
            Ok(Box::new(BuiltinKernel::NoOp {
                n_outputs: def.outputs.len(),
            }) as Box<dyn Kernel>)
        });
        registry
    }

    /// Register (or replace) the factory for `op_type`.
    pub fn register<F>(&mut self, op_type: impl Into<String>, factory: F)
    where
        F: Fn(&OperatorDef) -> Result<Box<dyn Kernel>, NetError> + Send + Sync + 'static,
    {
        self.factories.insert(op_type.into(), Arc::new(factory));
    }

    /// Register a kernel that needs no per-definition configuration.
    pub fn register_kernel<K>(&mut self, op_type: impl Into<String>, kernel: K)
    where
        K: Kernel + Clone + 'static,
    {
        self.register(op_type, move |_: &OperatorDef| {
            Ok(Box::new(kernel.clone()) as Box<dyn Kernel>)
        });
    }

    fn register_builtin(&mut self, op_type: &str, kernel: BuiltinKernel) {
        self.register_kernel(op_type, kernel);
    }

    /// Registered type names, sorted.
    pub fn op_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Build the kernel for `def`.
    pub fn create_kernel(&self, def: &OperatorDef) -> Result<Box<dyn Kernel>, NetError> {
        let factory = self
            .factories
            .get(&def.op_type)
            .ok_or_else(|| NetError::UnknownOperatorType(def.op_type.clone()))?;
        factory(def)
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("op_types", &self.op_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = OperatorRegistry::with_builtins();
        assert_eq!(
            registry.op_types(),
            vec!["Add", "Copy", "Mul", "NoOp", "Relu", "SumAll"]
        );
    }

    #[test]
    fn test_unknown_type() {
        let registry = OperatorRegistry::with_builtins();
        let err = registry.create_kernel(&OperatorDef::new("Conv")).err();
        assert!(matches!(err, Some(NetError::UnknownOperatorType(t)) if t == "Conv"));
    }

    #[test]
    fn test_add_kernel() {
        let registry = OperatorRegistry::with_builtins();
        let add = registry
            .create_kernel(&OperatorDef::new("Add").input("a").input("b").output("c"))
            .unwrap();
        let out = add
            .run(&[Tensor::vector(vec![1.0, 2.0]), Tensor::vector(vec![3.0, 4.0])])
            .unwrap();
        assert_eq!(out, vec![Tensor::vector(vec![4.0, 6.0])]);
    }

    #[test]
    fn test_input_count_checked() {
        let out = BuiltinKernel::Mul.run(&[Tensor::scalar(1.0)]);
        assert_eq!(
            out,
            Err(KernelError::InputCount {
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn test_copy_requires_matching_arity() {
        let registry = OperatorRegistry::with_builtins();
        let bad = OperatorDef::new("Copy").input("a").output("b").output("c");
        assert!(matches!(
            registry.create_kernel(&bad),
            Err(NetError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_noop_emits_declared_outputs() {
        let registry = OperatorRegistry::with_builtins();
        let noop = registry
            .create_kernel(&OperatorDef::new("NoOp").input("x").output("y").output("z"))
            .unwrap();
        let out = noop.run(&[Tensor::scalar(1.0)]).unwrap();
        assert_eq!(out, vec![Tensor::empty(), Tensor::empty()]);
    }

    #[test]
    fn test_register_custom_kernel_replaces() {
        let mut registry = OperatorRegistry::with_builtins();
        registry.register_kernel("Relu", BuiltinKernel::SumAll);
        let k = registry.create_kernel(&OperatorDef::new("Relu")).unwrap();
        let out = k.run(&[Tensor::vector(vec![-1.0, 3.0])]).unwrap();
        assert_eq!(out[0].data, vec![2.0]);
    }
}
