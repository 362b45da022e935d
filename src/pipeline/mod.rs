//! A linear sequence of nodes and the loop that runs it.

mod context;
mod progress;

pub use context::{ExecutionContext, SettingsResults, TrackOutputs, require};
pub use progress::{NoProgress, ProgressSink, ProgressState, SharedProgress};

use crate::backend::Services;
use crate::features::FeatureResults;
use crate::nodes::{Node, PipelineNode};
use crate::settings::ImageParams;
use itertools::Itertools;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

/// Where a run stops. The node it names is included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StopAt {
    #[default]
    All,
    Node(String),
}

impl StopAt {
    pub fn matches(&self, node_id: &str) -> bool {
        match self {
            StopAt::All => false,
            StopAt::Node(id) => id == node_id,
        }
    }
}

impl From<&str> for StopAt {
    fn from(value: &str) -> Self {
        match value.trim() {
            "" | "ALL" | "all" => StopAt::All,
            id => StopAt::Node(id.to_string()),
        }
    }
}

/// What one run of a pipeline produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunResult {
    pub features: FeatureResults,
    pub settings: SettingsResults,
}

/// One root-to-leaf path of the flow graph, ready to run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    id: usize,
    name: String,
    nodes: Vec<PipelineNode>,
    context: ExecutionContext,
}

impl Pipeline {
    pub const NAME_PREFIX: &'static str = "pip";

    /// Builds a pipeline over `nodes` with its own copy of `template`.
    pub fn new(id: usize, nodes: Vec<PipelineNode>, template: ImageParams) -> Self {
        let name = Self::compose_name(nodes.iter().map(|node| node.id()));
        let overrides = nodes.iter().filter_map(|node| node.param_override()).collect();
        let texture_enabled = nodes.iter().any(|node| node.requires_texture());
        Self {
            id,
            name,
            nodes,
            context: ExecutionContext::new(template, overrides, texture_enabled),
        }
    }

    /// `pip/<id1>/<id2>/...`
    pub fn compose_name<'a>(ids: impl IntoIterator<Item = &'a str>) -> String {
        std::iter::once(Self::NAME_PREFIX).chain(ids).join("/")
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[PipelineNode] {
        &self.nodes
    }

    pub fn node(&self, node_id: &str) -> Option<&PipelineNode> {
        self.nodes.iter().find(|node| node.id() == node_id)
    }

    /// Mutable access to a node, e.g. to edit its parameters before a rerun.
    pub fn node_mut(&mut self, node_id: &str) -> Option<&mut PipelineNode> {
        self.nodes.iter_mut().find(|node| node.id() == node_id)
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Runs the nodes in order and returns the features and settings.
    ///
    /// A node that fails records `{"error": ...}` under its stage name and
    /// the remaining nodes still run. Progress is reported after every node
    /// as `(k / n) * 100`.
    pub fn run(
        &mut self,
        services: &Services<'_>,
        progress: &mut dyn ProgressSink,
        stop_at: &StopAt,
    ) -> RunResult {
        info!(pipeline = %self.name, nodes = self.nodes.len(), "running pipeline");
        // Node parameters may have been edited since the last run.
        let overrides = self.nodes.iter().filter_map(|node| node.param_override()).collect();
        let texture_enabled = self.nodes.iter().any(|node| node.requires_texture());
        self.context.begin_run(overrides, texture_enabled);
        for node in &mut self.nodes {
            node.output_mut().clear();
        }

        let total = self.nodes.len();
        for (index, node) in self.nodes.iter_mut().enumerate() {
            debug!(pipeline = %self.name, node = node.id(), kind = %node.kind(), "running node");
            if let Err(err) = node.run(&mut self.context, services) {
                warn!(
                    pipeline = %self.name,
                    node = node.id(),
                    kind = %node.kind(),
                    error = %err,
                    "stage failed"
                );
                let message = err.to_string();
                self.context
                    .record_settings(node.kind().tag(), json!({ "error": message }));
                node.output_mut().error = Some(message);
            }

            let percent = (index + 1) as f64 / total as f64 * 100.0;
            let label = format!("{} | {} node {}", self.name, node.kind(), node.id());
            progress.update(percent, &label);

            if stop_at.matches(node.id()) {
                debug!(pipeline = %self.name, node = node.id(), "stopping after node");
                break;
            }
        }

        self.context.end_run();
        RunResult {
            features: self.context.feature_results.clone(),
            settings: self.context.settings_results.clone(),
        }
    }
}
