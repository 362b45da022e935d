//! The top-level object a front end talks to: build pipelines from a
//! document, run them, and aggregate the results by scan file.

mod snapshot;

pub use snapshot::{NodeSnapshot, PipelineSnapshot, WorkflowSnapshot};

use crate::backend::{ImagingBackend, ScanStore, Services};
use crate::error::BuildError;
use crate::expander::GraphExpander;
use crate::graph::FlowGraphDocument;
use crate::nodes::{Node, PipelineNode};
use crate::pipeline::{Pipeline, ProgressSink, RunResult, StopAt};
use crate::settings::ImageParams;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Scan file path → pipeline name → that pipeline's result.
pub type WorkflowResults = BTreeMap<String, BTreeMap<String, RunResult>>;

pub struct ExtractionWorkflow {
    pipelines: Vec<Pipeline>,
    backend: Arc<dyn ImagingBackend>,
    store: Arc<dyn ScanStore>,
}

impl ExtractionWorkflow {
    pub fn new(
        pipelines: Vec<Pipeline>,
        backend: Arc<dyn ImagingBackend>,
        store: Arc<dyn ScanStore>,
    ) -> Self {
        Self {
            pipelines,
            backend,
            store,
        }
    }

    /// Expands `document` with the default node registry.
    pub fn build_pipelines(
        document: &FlowGraphDocument,
        image_params: ImageParams,
        backend: Arc<dyn ImagingBackend>,
        store: Arc<dyn ScanStore>,
    ) -> Result<Self, BuildError> {
        let pipelines = GraphExpander::builder(document)
            .with_image_params(image_params)
            .build()
            .expand()?;
        Ok(Self::new(pipelines, backend, store))
    }

    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    pub fn pipelines_mut(&mut self) -> &mut [Pipeline] {
        &mut self.pipelines
    }

    /// Runs every pipeline in order. Each pipeline reports its own progress
    /// from 0 to 100.
    pub fn run_pipelines(
        &mut self,
        progress: &mut dyn ProgressSink,
        stop_at: &StopAt,
    ) -> WorkflowResults {
        let services = Services::new(self.backend.as_ref(), self.store.as_ref());
        let mut results = WorkflowResults::new();

        for pipeline in &mut self.pipelines {
            let result = pipeline.run(&services, progress, stop_at);
            match result_filepath(pipeline, &result) {
                Some(filepath) => {
                    results
                        .entry(filepath)
                        .or_default()
                        .insert(pipeline.name().to_string(), result);
                }
                None => warn!(
                    pipeline = pipeline.name(),
                    "pipeline has no scan path; result not recorded"
                ),
            }
        }

        info!(
            pipelines = self.pipelines.len(),
            files = results.len(),
            "workflow finished"
        );
        results
    }

    /// First node with this id across all pipelines, with its pipeline.
    pub fn node_output(&self, node_id: &str) -> Option<(&PipelineNode, &Pipeline)> {
        self.pipelines
            .iter()
            .find_map(|pipeline| pipeline.node(node_id).map(|node| (node, pipeline)))
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            pipelines: self
                .pipelines
                .iter()
                .map(|pipeline| PipelineSnapshot {
                    id: pipeline.id(),
                    name: pipeline.name().to_string(),
                    nodes: pipeline
                        .nodes()
                        .iter()
                        .map(|node| NodeSnapshot {
                            id: node.id().to_string(),
                            kind: node.kind(),
                            output: node.output().clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// The scan a result belongs to: the path segmentation or input recorded,
/// or the input node's configured path when loading the scan failed.
fn result_filepath(pipeline: &Pipeline, result: &RunResult) -> Option<String> {
    let recorded = ["segmentation", "input"].iter().find_map(|stage| {
        result
            .settings
            .get(*stage)
            .and_then(|settings| settings.get("filepath"))
            .and_then(Value::as_str)
            .filter(|path| !path.is_empty())
            .map(str::to_string)
    });
    recorded.or_else(|| {
        pipeline.nodes().iter().find_map(|node| match node {
            PipelineNode::Input(input) => Some(input.params.filepath.clone()),
            _ => None,
        })
    })
}
