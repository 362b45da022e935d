use crate::error::SnapshotError;
use crate::nodes::{NodeKind, NodeOutput};
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub id: String,
    pub kind: NodeKind,
    pub output: NodeOutput,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PipelineSnapshot {
    pub id: usize,
    pub name: String,
    pub nodes: Vec<NodeSnapshot>,
}

/// The node outputs of a workflow, detached from the workflow itself so a
/// viewer can look them up later.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct WorkflowSnapshot {
    pub pipelines: Vec<PipelineSnapshot>,
}

impl WorkflowSnapshot {
    /// First node with this id, with the pipeline that holds it.
    pub fn node_output(&self, node_id: &str) -> Option<(&NodeSnapshot, &PipelineSnapshot)> {
        self.pipelines.iter().find_map(|pipeline| {
            pipeline
                .nodes
                .iter()
                .find(|node| node.id == node_id)
                .map(|node| (node, pipeline))
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        encode_to_vec(self, standard()).map_err(|e| SnapshotError::Encode(e.to_string()))
    }

    /// Saves the snapshot to a file using the bincode format.
    pub fn save(&self, path: &str) -> Result<(), SnapshotError> {
        let bytes = self.to_bytes()?;
        let io_error = |source: std::io::Error| SnapshotError::Io {
            path: path.to_string(),
            source,
        };
        let mut file = fs::File::create(path).map_err(io_error)?;
        file.write_all(&bytes).map_err(io_error)?;
        Ok(())
    }

    /// Loads a snapshot from a file.
    pub fn load(path: &str) -> Result<Self, SnapshotError> {
        let io_error = |source: std::io::Error| SnapshotError::Io {
            path: path.to_string(),
            source,
        };
        let mut file = fs::File::open(path).map_err(io_error)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(io_error)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        decode_from_slice(bytes, standard())
            .map(|(snapshot, _)| snapshot) // bincode 2 returns (value, bytes_read)
            .map_err(|e| SnapshotError::Decode(e.to_string()))
    }
}
