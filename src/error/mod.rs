/////////////////////////////////////////////////////////////////////////////////////
//
// Network contagion model
//
// error module
//
// SimError covers the simulation core (graph, seeding, risk functions)
// ConfigError covers everything read from or written to the model directory
//
////////////////////////////////////////////////////////////////////////////////////

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the simulation core. None of them are retryable.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("Initial compartments hold {actual} people but the population is {expected}")]
    InvalidSeed { expected: usize, actual: usize },

    #[error("Risk function {function} returned {value} for individual {individual}")]
    InvalidProbability {
        function: &'static str,
        individual: usize,
        value: f64,
    },

    #[error("No edge between {a} and {b}")]
    MissingEdge { a: usize, b: usize },

    #[error("Population is empty")]
    EmptyPopulation,

    #[error("Individual {id} is stored at position {position}")]
    MisplacedIndividual { position: usize, id: usize },

    #[error("Node {node} is not in a graph of {node_count} nodes")]
    UnknownNode { node: usize, node_count: usize },

    #[error("Cannot make edge from {0} to itself")]
    SelfLoop(usize),

    #[error("Edge {a}-{b} already exists")]
    DuplicateEdge { a: usize, b: usize },

    #[error("Edge {a}-{b} has weight {weight} outside [0, 1]")]
    InvalidWeight { a: usize, b: usize, weight: f64 },
}

/// Errors raised while loading parameters, reading graphs or writing results.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML - {0}")]
    Yaml(#[from] yaml_rust::ScanError),

    #[error("CSV - {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML - Expected '{0}' parameter")]
    MissingParameter(String),

    #[error("YAML - Invalid '{name}' parameter: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("S + A + I + R + D = {actual} does not match population size {expected}")]
    PopulationMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Simulation(#[from] SimError),
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
