//! Error types.
//!
//! Configuration problems are collected and reported together; agent
//! initialization fails on the first unusable agent. Deficits, deaths and
//! events during a step are simulation outcomes, not errors.

use std::fmt;

use biosphere_logic::units::Unit;
use biosphere_logic::CurveError;
use thiserror::Error;

/// One problem found while validating a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted location in the configuration, e.g. `agent_desc.human.inputs[0]`.
    pub path: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration ({} issue(s)):\n{}", .0.len(), list(.0))]
    Invalid(Vec<ConfigIssue>),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Issues found by validation; empty for parse failures.
    pub fn issues(&self) -> &[ConfigIssue] {
        match self {
            ConfigError::Invalid(issues) => issues,
            ConfigError::Parse(_) => &[],
        }
    }
}

fn list(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("  - {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fatal problems while wiring agents together.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("{agent}: {currency} flow is in {flow_unit} but storage {storage} holds {storage_unit}")]
    UnitMismatch {
        agent: String,
        currency: String,
        storage: String,
        flow_unit: Unit,
        storage_unit: Unit,
    },
    #[error("{agent}: unknown currency '{currency}'")]
    UnknownCurrency { agent: String, currency: String },
    #[error("{agent}: no connection found for {currency}")]
    NoConnection { agent: String, currency: String },
    #[error("{agent}: storage {storage} has no capacity for {currency}")]
    MissingCapacity {
        agent: String,
        storage: String,
        currency: String,
    },
    #[error("{agent}: storage {storage} has no volume")]
    MissingVolume { agent: String, storage: String },
    #[error("{agent}: references agent type '{target}' which has no instances")]
    UnknownAgent { agent: String, target: String },
    #[error("{agent}: lamp target '{target}' is not a plant")]
    NotAPlant { agent: String, target: String },
    #[error("{agent}: cannot build {currency} curve: {source}")]
    Curve {
        agent: String,
        currency: String,
        #[source]
        source: CurveError,
    },
}

/// Anything that can stop a model from being constructed.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Init(#[from] InitError),
}

/// Misuse of a storage view. Validation rules these out for configured
/// flows, so hitting one indicates a programming error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("deposits must target a single currency, not class '{0}'")]
    ClassDeposit(String),
    #[error("storage has no capacity for '{0}'")]
    NoCapacity(String),
}

/// Save/load failures.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_lists_every_issue() {
        let err = ConfigError::Invalid(vec![
            ConfigIssue::new("currencies", "duplicate currency 'o2'"),
            ConfigIssue::new("agents.rover", "no agent descriptor"),
        ]);
        let text = err.to_string();
        assert!(text.contains("2 issue(s)"));
        assert!(text.contains("currencies: duplicate currency 'o2'"));
        assert!(text.contains("agents.rover: no agent descriptor"));
        assert_eq!(err.issues().len(), 2);
    }

    #[test]
    fn test_build_error_is_transparent() {
        let err: BuildError = InitError::NoConnection {
            agent: "human".into(),
            currency: "o2".into(),
        }
        .into();
        assert_eq!(err.to_string(), "human: no connection found for o2");
    }
}
