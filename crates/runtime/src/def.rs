//! # Net Definitions
//!
//! A `NetDef` is the declarative description a [`crate::Net`] is built
//! from: an ordered operator list with named inputs and outputs, plus the
//! execution strategy to run them with. Definitions are plain serde types
//! and are usually loaded from JSON:
//!
//! ```json
//! {
//!   "name": "two_step",
//!   "type": "dag",
//!   "num_workers": 4,
//!   "external_inputs": ["in"],
//!   "external_outputs": ["out"],
//!   "ops": [
//!     { "type": "Relu", "inputs": ["in"], "outputs": ["hidden"] },
//!     { "type": "Relu", "inputs": ["hidden"], "outputs": ["out"] }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::NetError;

/// Which execution strategy a net runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetType {
    /// Operators run one after another, in list order.
    #[default]
    Simple,
    /// Operators run on a worker pool as soon as their dependencies finish.
    Dag,
}

impl fmt::Display for NetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetType::Simple => write!(f, "simple"),
            NetType::Dag => write!(f, "dag"),
        }
    }
}

/// One operator in a net.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperatorDef {
    /// Registry key of the kernel.
    #[serde(rename = "type")]
    pub op_type: String,
    /// Optional display name; defaults to the type and position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl OperatorDef {
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn input(mut self, blob: impl Into<String>) -> Self {
        self.inputs.push(blob.into());
        self
    }

    pub fn output(mut self, blob: impl Into<String>) -> Self {
        self.outputs.push(blob.into());
        self
    }
}

/// A whole net: operators, boundary blobs and execution settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetDef {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub net_type: NetType,
    /// Worker threads for DAG execution. Ignored by simple nets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_workers: Option<usize>,
    #[serde(default)]
    pub ops: Vec<OperatorDef>,
    #[serde(default)]
    pub external_inputs: Vec<String>,
    #[serde(default)]
    pub external_outputs: Vec<String>,
}

impl NetDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, net_type: NetType) -> Self {
        self.net_type = net_type;
        self
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = Some(num_workers);
        self
    }

    pub fn op(mut self, op: OperatorDef) -> Self {
        self.ops.push(op);
        self
    }

    pub fn external_input(mut self, blob: impl Into<String>) -> Self {
        self.external_inputs.push(blob.into());
        self
    }

    pub fn external_output(mut self, blob: impl Into<String>) -> Self {
        self.external_outputs.push(blob.into());
        self
    }

    /// Parse a definition from JSON.
    pub fn from_json(json: &str) -> Result<Self, NetError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON definition file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, NetError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, NetError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that the definition can be built into a net.
    ///
    /// Checks:
    /// - Every operator has a type
    /// - Every operator input is an external input or an earlier output
    /// - Every external output is produced by some operator
    /// - `num_workers`, when set, is positive
    pub fn validate(&self) -> Result<(), NetError> {
        if self.num_workers == Some(0) {
            return Err(NetError::InvalidDefinition {
                reason: "num_workers must be at least 1".to_string(),
            });
        }

        let mut defined: HashSet<&str> = self.external_inputs.iter().map(String::as_str).collect();

        for (index, op) in self.ops.iter().enumerate() {
            if op.op_type.is_empty() {
                return Err(NetError::InvalidDefinition {
                    reason: format!("operator #{} has no type", index),
                });
            }
            for blob in &op.inputs {
                if !defined.contains(blob.as_str()) {
                    return Err(NetError::UndefinedInput {
                        operator: display_name(op, index),
                        blob: blob.clone(),
                    });
                }
            }
            defined.extend(op.outputs.iter().map(String::as_str));
        }

        for blob in &self.external_outputs {
            let produced = self.ops.iter().any(|op| op.outputs.contains(blob));
            if !produced {
                return Err(NetError::InvalidDefinition {
                    reason: format!("external output '{}' is never produced", blob),
                });
            }
        }

        Ok(())
    }
}

pub(crate) fn display_name(op: &OperatorDef, index: usize) -> String {
    match &op.name {
        Some(name) => name.clone(),
        None => format!("{}#{}", op.op_type, index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_step() -> NetDef {
        NetDef::new("two_step")
            .external_input("in")
            .external_output("out")
            .op(OperatorDef::new("Relu").input("in").output("hidden"))
            .op(OperatorDef::new("Relu").input("hidden").output("out"))
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "name": "two_step",
            "type": "dag",
            "num_workers": 2,
            "external_inputs": ["in"],
            "external_outputs": ["out"],
            "ops": [
                { "type": "Relu", "inputs": ["in"], "outputs": ["hidden"] },
                { "type": "Relu", "name": "last", "inputs": ["hidden"], "outputs": ["out"] }
            ]
        }"#;

        let def = NetDef::from_json(json).unwrap();
        assert_eq!(def.net_type, NetType::Dag);
        assert_eq!(def.num_workers, Some(2));
        assert_eq!(def.ops.len(), 2);
        assert_eq!(display_name(&def.ops[0], 0), "Relu#0");
        assert_eq!(display_name(&def.ops[1], 1), "last");
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let def = NetDef::from_json(r#"{ "ops": [ { "type": "NoOp" } ] }"#).unwrap();
        assert_eq!(def.net_type, NetType::Simple);
        assert_eq!(def.num_workers, None);
        assert!(def.ops[0].inputs.is_empty());
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            NetDef::from_json("{ not json"),
            Err(NetError::Json(_))
        ));
        assert!(matches!(
            NetDef::from_json(r#"{ "type": "parallel" }"#),
            Err(NetError::Json(_))
        ));
    }

    #[test]
    fn test_json_roundtrip_preserves_type() {
        let def = two_step().with_type(NetType::Dag);
        let back = NetDef::from_json(&def.to_json().unwrap()).unwrap();
        assert_eq!(back, def);
    }

    #[test]
    fn test_validate_undefined_input() {
        let def = NetDef::new("bad").op(OperatorDef::new("Relu").input("ghost").output("x"));
        match def.validate() {
            Err(NetError::UndefinedInput { operator, blob }) => {
                assert_eq!(operator, "Relu#0");
                assert_eq!(blob, "ghost");
            }
            other => panic!("expected UndefinedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_input_must_come_from_earlier_op() {
        let def = NetDef::new("backwards")
            .op(OperatorDef::new("Relu").input("late").output("x"))
            .op(OperatorDef::new("NoOp").output("late"));
        assert!(matches!(
            def.validate(),
            Err(NetError::UndefinedInput { .. })
        ));
    }

    #[test]
    fn test_validate_unproduced_output() {
        let def = two_step().external_output("missing");
        assert!(matches!(
            def.validate(),
            Err(NetError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_validate_zero_workers() {
        let def = two_step().with_workers(0);
        assert!(matches!(
            def.validate(),
            Err(NetError::InvalidDefinition { .. })
        ));
    }
}
