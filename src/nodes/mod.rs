//! Processing nodes and the registry that builds them from type tags.
//!
//! Each node kind lives in its own module and implements [`Node`]. The set
//! of kinds is closed: [`PipelineNode`] enumerates them and the registry in
//! [`registry`] is generated from the same list, so a kind cannot exist
//! without being constructible.

mod discretization;
mod extraction;
mod filter;
mod input;
mod interpolation;
mod re_segmentation;
pub mod registry;
mod roi_extraction;
mod segmentation;

pub use discretization::DiscretizationNode;
pub use extraction::{ExtractionNode, ExtractionParams};
pub use filter::FilterNode;
pub use input::{InputNode, InputParams};
pub use interpolation::InterpolationNode;
pub use re_segmentation::ReSegmentationNode;
pub use registry::{NodeKind, NodeRegistry, PipelineNode};
pub use roi_extraction::RoiExtractionNode;
pub use segmentation::{RoiSelection, SegmentationNode, SegmentationParams};

use crate::backend::Services;
use crate::error::{BuildError, StageError};
use crate::imaging::{Mask, Volume};
use crate::pipeline::ExecutionContext;
use crate::settings::ParamOverride;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a node produced during the last run, kept for inspection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub vol: Option<Volume>,
    pub roi: Option<Mask>,
    pub vol_texture: Option<Volume>,
    pub roi_texture: Option<Mask>,
    pub error: Option<String>,
}

impl NodeOutput {
    pub fn is_empty(&self) -> bool {
        *self == NodeOutput::default()
    }

    pub fn clear(&mut self) {
        *self = NodeOutput::default();
    }
}

/// A single stage of a pipeline.
pub trait Node {
    fn id(&self) -> &str;
    fn kind(&self) -> NodeKind;
    fn output(&self) -> &NodeOutput;
    fn output_mut(&mut self) -> &mut NodeOutput;

    /// The template section this node overwrites, if it carries one.
    fn param_override(&self) -> Option<ParamOverride> {
        None
    }

    /// Whether this node needs the texture track to be seeded.
    fn requires_texture(&self) -> bool {
        false
    }

    fn run(&mut self, ctx: &mut ExecutionContext, services: &Services<'_>)
    -> Result<(), StageError>;
}

/// The raw material a node is built from.
#[derive(Debug, Clone, Copy)]
pub struct NodeSpec<'a> {
    pub id: &'a str,
    pub kind: NodeKind,
    pub data: &'a Value,
}

impl NodeSpec<'_> {
    /// Decodes the node's data payload. Missing fields fall back to the
    /// parameter type's defaults.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, BuildError> {
        let data = if self.data.is_null() {
            Value::Object(Default::default())
        } else {
            self.data.clone()
        };
        serde_json::from_value(data).map_err(|e| self.invalid(e.to_string()))
    }

    pub fn invalid(&self, message: impl Into<String>) -> BuildError {
        BuildError::InvalidParameters {
            node_id: self.id.to_string(),
            kind: self.kind,
            message: message.into(),
        }
    }
}

/// Construction of a node from its spec.
pub trait FromSpec: Sized {
    fn from_spec(spec: &NodeSpec<'_>) -> Result<Self, BuildError>;
}

pub(crate) fn settings_value<T: Serialize>(params: &T) -> Value {
    serde_json::to_value(params).unwrap_or(Value::Null)
}
