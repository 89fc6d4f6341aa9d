use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::graph::StageId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing mandatory run parameter: {0}")]
    MissingParameter(&'static str),

    #[error("input {name} does not exist: {path}")]
    UnresolvedInput { name: &'static str, path: PathBuf },

    #[error("invalid memory value: {0}")]
    InvalidMemory(String),

    #[error("invalid parameter {key}: {message}")]
    InvalidParameter { key: String, message: String },
}

/// Error type for graph operations
#[derive(Debug, Clone)]
pub struct GraphError {
    pub message: String,
    pub kind: GraphErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphErrorKind {
    /// Included stage consumes an artifact whose producer is excluded
    DanglingInput,
    /// Artifact consumed but produced by no stage at all
    UnknownArtifact,
    /// Artifact produced by more than one stage
    DuplicateProducer,
    /// Stage lists the same artifact as input and output
    OverlappingArtifacts,
    /// Circular dependency detected
    CyclicDependency,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph error: {}", self.message)
    }
}

impl std::error::Error for GraphError {}

impl GraphError {
    pub fn dangling_input(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GraphErrorKind::DanglingInput,
        }
    }

    pub fn unknown_artifact(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GraphErrorKind::UnknownArtifact,
        }
    }

    pub fn duplicate_producer(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GraphErrorKind::DuplicateProducer,
        }
    }

    pub fn overlapping(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GraphErrorKind::OverlappingArtifacts,
        }
    }

    pub fn cyclic(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GraphErrorKind::CyclicDependency,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("artifact {name} already registered by {existing} (attempted by {producer})")]
    DuplicateArtifact {
        name: String,
        producer: StageId,
        existing: StageId,
    },

    #[error("artifact {0} has not been produced yet")]
    UnresolvedArtifact(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssembleError {
    #[error("terminal artifact {0} is missing")]
    MissingTerminalArtifact(String),

    #[error("artifact {name} at {path} is outside the run root")]
    OutsideRunRoot { name: String, path: PathBuf },
}

#[derive(Debug, Error)]
pub enum StageFailure {
    #[error("command exited with {}: {command}\n{stderr}", exit_label(.code))]
    Process {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("declared output {name} was not produced at {path}")]
    MissingOutput { name: String, path: PathBuf },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled after an upstream failure")]
    Cancelled,

    #[error("stage panicked: {0}")]
    Panicked(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

#[derive(Debug, Error)]
#[error("stage {stage} failed: {cause}")]
pub struct StageError {
    pub stage: StageId,
    pub cause: StageFailure,
}

impl StageError {
    pub fn new(stage: StageId, cause: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}
