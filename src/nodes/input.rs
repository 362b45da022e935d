use super::{FromSpec, Node, NodeKind, NodeOutput, NodeSpec};
use crate::backend::Services;
use crate::error::{BuildError, StageError};
use crate::imaging::Mask;
use crate::pipeline::ExecutionContext;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputParams {
    pub filepath: String,
}

/// Loads the scan and initialises its processing parameters.
#[derive(Debug, Clone)]
pub struct InputNode {
    id: String,
    pub params: InputParams,
    output: NodeOutput,
}

impl FromSpec for InputNode {
    fn from_spec(spec: &NodeSpec<'_>) -> Result<Self, BuildError> {
        let params: InputParams = spec.params()?;
        if params.filepath.trim().is_empty() {
            return Err(spec.invalid("an input node needs a filepath"));
        }
        Ok(Self {
            id: spec.id.to_string(),
            params,
            output: NodeOutput::default(),
        })
    }
}

impl Node for InputNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Input
    }

    fn output(&self) -> &NodeOutput {
        &self.output
    }

    fn output_mut(&mut self) -> &mut NodeOutput {
        &mut self.output
    }

    fn run(
        &mut self,
        ctx: &mut ExecutionContext,
        services: &Services<'_>,
    ) -> Result<(), StageError> {
        let stage = NodeKind::Input.tag();
        let bytes = services
            .store
            .read(&self.params.filepath)
            .map_err(|e| StageError::library(stage, e))?;
        let mut scan = services
            .backend
            .load_scan(&bytes)
            .map_err(|e| StageError::library(stage, e))?;
        scan.source = self.params.filepath.clone();

        ctx.apply_overrides(&scan);
        services
            .backend
            .init_params(&mut scan, &ctx.image_params)
            .map_err(|e| StageError::library(stage, e))?;
        debug!(
            source = %scan.source,
            scan_type = %scan.scan_type,
            shape = ?scan.volume.shape(),
            "scan loaded"
        );

        let volume = scan.volume.clone();
        ctx.latest_output.roi = Some(Mask::full(volume.shape(), volume.spacing));
        ctx.latest_output.vol = Some(volume.clone());
        self.output.vol = Some(volume);

        ctx.record_settings(
            stage,
            json!({
                "filepath": self.params.filepath,
                "scan_type": scan.scan_type.params_key(),
                "patient_id": scan.patient_id,
            }),
        );
        ctx.scan = Some(scan);
        Ok(())
    }
}
