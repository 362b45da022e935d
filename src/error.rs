use crate::features::FeatureFamily;
use crate::nodes::NodeKind;
use thiserror::Error;

/// Errors that can occur while turning a flow-graph document into pipelines.
///
/// These are the only errors that abort a whole request: when the node set
/// cannot be built there is nothing to run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Failed to parse flow-graph document: {0}")]
    InvalidDocument(String),

    #[error("Flow-graph document has no '{0}' module")]
    MissingHomeModule(String),

    #[error("Node '{node_id}' has an unregistered node type: '{type_name}'")]
    UnknownNodeType { node_id: String, type_name: String },

    #[error(
        "Node '{missing_node_id}' not found, which is required by a connection from node '{source_node_id}'"
    )]
    NodeNotFound {
        missing_node_id: String,
        source_node_id: String,
    },

    #[error("Node '{node_id}' ({kind}) has invalid parameters: {message}")]
    InvalidParameters {
        node_id: String,
        kind: NodeKind,
        message: String,
    },

    #[error("Extraction node '{node_id}' requests unknown feature family '{family}'")]
    UnknownFeatureFamily { node_id: String, family: String },

    #[error("Extraction node '{node_id}' requests unknown {family} feature '{feature}'")]
    UnknownFeature {
        node_id: String,
        family: FeatureFamily,
        feature: String,
    },

    #[error("Node '{node_id}' has {parents} inbound connections; joining branches is not supported")]
    JoinNotSupported { node_id: String, parents: usize },

    #[error("Cycle detected: node '{node_id}' is reachable from itself")]
    CycleDetected { node_id: String },
}

/// Errors raised while a single stage runs. They are recovered by the
/// pipeline and reported as data, never propagated to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("{stage}: an upstream {required} node is required (missing '{artifact}')")]
    MissingPrerequisite {
        stage: String,
        artifact: &'static str,
        required: NodeKind,
    },

    #[error("computation failed for {stage}: {message}")]
    Computation { stage: String, message: String },

    #[error("computation failed for {stage}: {source}")]
    Library {
        stage: String,
        #[source]
        source: LibraryError,
    },
}

impl StageError {
    pub fn library(stage: impl Into<String>, source: LibraryError) -> Self {
        StageError::Library {
            stage: stage.into(),
            source,
        }
    }

    pub fn computation(stage: impl Into<String>, message: impl Into<String>) -> Self {
        StageError::Computation {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by an imaging backend or a scan store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LibraryError {
    #[error("ROI '{0}' not found in scan")]
    RoiNotFound(String),

    #[error("{0} is not supported by this backend")]
    Unsupported(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to decode scan: {0}")]
    Decode(String),

    #[error("Could not read scan '{path}': {message}")]
    Io { path: String, message: String },
}

/// Errors that can occur when persisting or restoring a workflow snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Serialization failed: {0}")]
    Encode(String),

    #[error("Deserialization failed: {0}")]
    Decode(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when loading a settings template.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to parse settings template: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Could not read settings template '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
