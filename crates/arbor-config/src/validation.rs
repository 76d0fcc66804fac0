//! Network description validation.
//!
//! Validation is advisory: a live network silently drops connections it
//! cannot resolve, so a description that fails here still builds. The checks
//! catch the mistakes that would otherwise go unnoticed.
//!
//! # Example
//!
//! ```rust
//! use arbor_config::{ConnectionConfig, NetworkConfig, NodeConfig, ParameterConfig, validate_network};
//!
//! let mut config = NetworkConfig::new("demo", "container.chain")
//!     .with_node(NodeConfig::new("gain", "core.gain"));
//! assert!(validate_network(&config).is_ok());
//!
//! config.root.parameters.push(
//!     ParameterConfig::new("Level", 0.0).with_connection(ConnectionConfig::new("nowhere", "Gain")),
//! );
//! assert!(validate_network(&config).is_err());
//! ```

use std::collections::HashSet;
use std::str::FromStr;

use arbor_core::{Converter, NodeFactory, OperatorType};
use thiserror::Error;

use crate::network::NetworkConfig;
use crate::node::{ConnectionConfig, NodeConfig};

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A node without an id.
    #[error("node of type '{path}' has an empty id")]
    EmptyId {
        /// Factory path of the node.
        path: String,
    },

    /// Two nodes share an id.
    #[error("duplicate node id '{0}'")]
    DuplicateId(String),

    /// A factory path the factory does not know.
    #[error("unknown node type '{path}' for node '{node}'")]
    UnknownNodeType {
        /// Node id.
        node: String,
        /// Unregistered factory path.
        path: String,
    },

    /// A connection naming a node that is not in the network.
    #[error("connection from '{source_id}' targets unknown node '{target}'")]
    UnknownTarget {
        /// `node.parameter` the connection belongs to.
        source_id: String,
        /// Missing node id.
        target: String,
    },

    /// A range with `min > max`.
    #[error("range of '{owner}' is inverted: min {min} > max {max}")]
    InvertedRange {
        /// Parameter or connection owning the range.
        owner: String,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },

    /// A range bound that is NaN or infinite.
    #[error("range of '{owner}' has a non-finite bound")]
    NonFiniteRange {
        /// Parameter or connection owning the range.
        owner: String,
    },

    /// An unknown operator id.
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    /// An unknown converter id.
    #[error("unknown converter '{0}'")]
    UnknownConverter(String),

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Collects validation errors over a network description.
#[derive(Debug, Default)]
pub struct NetworkValidator<'a> {
    factory: Option<&'a NodeFactory>,
    errors: Vec<ValidationError>,
}

impl<'a> NetworkValidator<'a> {
    /// A validator that checks structure, ranges and identifiers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also check node types against `factory`.
    pub fn with_factory(mut self, factory: &'a NodeFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Validates `config`, reporting every problem found.
    pub fn validate(mut self, config: &NetworkConfig) -> ValidationResult<()> {
        let nodes = config.root.walk();
        let mut ids = HashSet::new();
        for node in &nodes {
            self.check_node(node, &mut ids);
        }
        for node in &nodes {
            for parameter in &node.parameters {
                let owner = format!("{}.{}", node.id, parameter.id);
                let bounds = [parameter.min, parameter.max];
                if bounds.iter().flatten().any(|b| !b.is_finite()) {
                    self.errors.push(ValidationError::NonFiniteRange {
                        owner: owner.clone(),
                    });
                } else if let Some((min, max)) = parameter.bounds()
                    && min > max
                {
                    self.errors.push(ValidationError::InvertedRange {
                        owner: owner.clone(),
                        min,
                        max,
                    });
                }
                for connection in &parameter.connections {
                    self.check_connection(&owner, connection, &ids);
                }
            }
            let owner = format!("{}.{}", node.id, arbor_core::MODULATION_OUTPUT_ID);
            for connection in &node.modulation_targets {
                self.check_connection(&owner, connection, &ids);
            }
        }
        self.finish()
    }

    fn check_node<'n>(&mut self, node: &'n NodeConfig, ids: &mut HashSet<&'n str>) {
        if node.id.is_empty() {
            self.errors.push(ValidationError::EmptyId {
                path: node.path.clone(),
            });
        } else if !ids.insert(node.id.as_str()) {
            self.errors.push(ValidationError::DuplicateId(node.id.clone()));
        }
        if let Some(factory) = self.factory
            && !factory.contains(&node.path)
        {
            self.errors.push(ValidationError::UnknownNodeType {
                node: node.id.clone(),
                path: node.path.clone(),
            });
        }
    }

    fn check_connection(&mut self, owner: &str, connection: &ConnectionConfig, ids: &HashSet<&str>) {
        if !ids.contains(connection.node.as_str()) {
            self.errors.push(ValidationError::UnknownTarget {
                source_id: owner.to_string(),
                target: connection.node.clone(),
            });
        }
        let range_owner = || format!("{owner} -> {}.{}", connection.node, connection.parameter);
        if !connection.min.is_finite() || !connection.max.is_finite() {
            self.errors.push(ValidationError::NonFiniteRange {
                owner: range_owner(),
            });
        } else if connection.min > connection.max {
            self.errors.push(ValidationError::InvertedRange {
                owner: range_owner(),
                min: connection.min,
                max: connection.max,
            });
        }
        if let Some(op) = &connection.op
            && OperatorType::from_str(op).is_err()
        {
            self.errors.push(ValidationError::UnknownOperator(op.clone()));
        }
        if let Some(converter) = &connection.converter
            && Converter::from_str(converter).is_err()
        {
            self.errors
                .push(ValidationError::UnknownConverter(converter.clone()));
        }
    }

    fn finish(mut self) -> ValidationResult<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(ValidationError::Multiple(self.errors)),
        }
    }
}

/// Validate a network description without checking node types.
pub fn validate_network(config: &NetworkConfig) -> ValidationResult<()> {
    NetworkValidator::new().validate(config)
}

/// Validate a network description, including node types against `factory`.
pub fn validate_network_with(config: &NetworkConfig, factory: &NodeFactory) -> ValidationResult<()> {
    NetworkValidator::new().with_factory(factory).validate(config)
}
