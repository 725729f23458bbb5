//! Error types for TCL generation

use thiserror::Error;

/// Errors raised while emitting TCL for a model.
///
/// None of these are retried: the whole write pass is aborted and the error
/// is surfaced to the caller.
#[derive(Error, Debug)]
pub enum EmitError {
    #[error("{entity}: missing attribute '{attribute}'")]
    MissingAttribute { entity: String, attribute: String },

    #[error("{entity}: attribute '{attribute}' is not of type {expected}")]
    AttributeType {
        entity: String,
        attribute: String,
        expected: &'static str,
    },

    #[error("{entity}: invalid value for '{attribute}': {reason}")]
    InvalidValue {
        entity: String,
        attribute: String,
        reason: String,
    },

    #[error("node {node}: dimension ({ndm}, {ndf}) does not match ({other_ndm}, {other_ndf})")]
    DimensionMismatch {
        node: u64,
        ndm: u32,
        ndf: u32,
        other_ndm: u32,
        other_ndf: u32,
    },

    #[error("{entity}: element {element} has the wrong geometry: {reason}")]
    WrongGeometry {
        entity: String,
        element: u64,
        reason: String,
    },

    #[error("{entity}: wrong physical property type: {reason}")]
    WrongProperty { entity: String, reason: String },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("process id {pid} out of range [0, {count})")]
    ProcessIdOutOfRange { pid: i64, count: usize },

    #[error("no emitter registered for {namespace}/{name}")]
    UnknownEntityKind { namespace: String, name: String },

    #[error("unknown entity {0}")]
    UnknownEntity(u64),

    #[error("node {0} has not been declared")]
    UnknownNode(u64),

    #[error("element {0} not found in model")]
    UnknownElement(u64),

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("cdata remap failed: {0}")]
    Cdata(#[from] CdataError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the `mpco.cdata` reconciliation pass.
#[derive(Error, Debug)]
pub enum CdataError {
    #[error("{file}:{line}: {reason}")]
    Malformed {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to replace {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("invalid block header pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Errors from writing or launching the solver runner scripts.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("solver not found: {0}")]
    SolverNotFound(String),

    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EmitResult<T> = Result<T, EmitError>;
