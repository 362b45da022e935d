//! Expansion of a flow-graph document into linear pipelines.
//!
//! Every input node with no inbound connection is a root. The expander
//! walks its primary output depth-first and emits one [`Pipeline`] per
//! root-to-leaf path. At a branch point each child gets its own deep copy
//! of the path, so nodes are never shared between pipelines.
//!
//! The home module is validated first: dangling connections, cycles and
//! multi-parent joins are rejected before any node is built.

mod validation;

use crate::error::BuildError;
use crate::graph::{FlowGraphDocument, HOME_MODULE, Module, NodeEntry, extraction_module_name};
use crate::nodes::{Node, NodeKind, NodeRegistry, PipelineNode};
use crate::pipeline::Pipeline;
use crate::settings::ImageParams;
use ahash::AHashSet;
use serde_json::Value;
use tracing::{debug, info, warn};

pub struct GraphExpander<'d> {
    document: &'d FlowGraphDocument,
    registry: NodeRegistry,
    image_params: ImageParams,
}

pub struct GraphExpanderBuilder<'d> {
    document: &'d FlowGraphDocument,
    registry: NodeRegistry,
    image_params: ImageParams,
}

impl<'d> GraphExpanderBuilder<'d> {
    pub fn new(document: &'d FlowGraphDocument) -> Self {
        Self {
            document,
            registry: NodeRegistry::default(),
            image_params: ImageParams::default(),
        }
    }

    /// Accepts `tag` as a node type and builds it as `kind`.
    pub fn with_type_alias(mut self, tag: &str, kind: NodeKind) -> Self {
        self.registry.alias(tag, kind);
        self
    }

    /// The settings template every pipeline starts from.
    pub fn with_image_params(mut self, image_params: ImageParams) -> Self {
        self.image_params = image_params;
        self
    }

    pub fn build(self) -> GraphExpander<'d> {
        GraphExpander {
            document: self.document,
            registry: self.registry,
            image_params: self.image_params,
        }
    }
}

impl<'d> GraphExpander<'d> {
    pub fn builder(document: &'d FlowGraphDocument) -> GraphExpanderBuilder<'d> {
        GraphExpanderBuilder::new(document)
    }

    /// Expands the home module into pipelines, numbered from 1 in natural
    /// root order and connection order.
    pub fn expand(&self) -> Result<Vec<Pipeline>, BuildError> {
        let home = self
            .document
            .module(HOME_MODULE)
            .ok_or_else(|| BuildError::MissingHomeModule(HOME_MODULE.to_string()))?;
        validation::validate(home)?;

        // A node listed as a target counts as having a parent even if its
        // own input ports are empty.
        let targeted: AHashSet<&str> = home.data.values().flat_map(|e| e.targets()).collect();

        let mut pipelines = Vec::new();
        for (key, entry) in home.nodes_in_order() {
            if !entry.is_root() || targeted.contains(key) {
                continue;
            }
            if self.registry.kind_of(&entry.name) == Some(NodeKind::Input) {
                self.walk(home, key, Vec::new(), &mut pipelines)?;
            } else {
                debug!(node = key, kind = %entry.name, "skipping non-input root");
            }
        }

        info!(pipelines = pipelines.len(), "expanded flow graph");
        Ok(pipelines)
    }

    fn walk(
        &self,
        home: &Module,
        key: &str,
        mut path: Vec<PipelineNode>,
        pipelines: &mut Vec<Pipeline>,
    ) -> Result<(), BuildError> {
        let entry = home.node(key).ok_or_else(|| BuildError::NodeNotFound {
            missing_node_id: key.to_string(),
            source_node_id: path
                .last()
                .map(|node| node.id().to_string())
                .unwrap_or_default(),
        })?;
        path.push(self.materialize(entry)?);

        match entry.targets().as_slice() {
            [] => {
                let pipeline = Pipeline::new(pipelines.len() + 1, path, self.image_params.clone());
                debug!(pipeline = pipeline.name(), "pipeline complete");
                pipelines.push(pipeline);
            }
            [next] => self.walk(home, next, path, pipelines)?,
            branches => {
                for next in branches {
                    self.walk(home, next, path.clone(), pipelines)?;
                }
            }
        }
        Ok(())
    }

    fn materialize(&self, entry: &NodeEntry) -> Result<PipelineNode, BuildError> {
        if self.registry.kind_of(&entry.name) != Some(NodeKind::Extraction) {
            return self.registry.create(&entry.name, &entry.id, &entry.data);
        }

        let module_name = extraction_module_name(&entry.id);
        let data = match self.document.module(&module_name) {
            Some(module) => serde_json::to_value(&module.data)
                .map_err(|e| BuildError::InvalidDocument(e.to_string()))?,
            None => {
                warn!(node = %entry.id, module = %module_name, "extraction node has no feature module");
                Value::Null
            }
        };
        self.registry.create(&entry.name, &entry.id, &data)
    }
}
