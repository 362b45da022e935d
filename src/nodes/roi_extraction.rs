use super::{FromSpec, Node, NodeKind, NodeOutput, NodeSpec};
use crate::backend::{ImagingBackend, Services};
use crate::error::{BuildError, StageError};
use crate::imaging::Volume;
use crate::pipeline::{ExecutionContext, TrackOutputs, require};
use serde_json::Value;

/// Blanks every voxel outside the current ROI.
#[derive(Debug, Clone)]
pub struct RoiExtractionNode {
    id: String,
    pub params: Value,
    output: NodeOutput,
}

impl FromSpec for RoiExtractionNode {
    fn from_spec(spec: &NodeSpec<'_>) -> Result<Self, BuildError> {
        Ok(Self {
            id: spec.id.to_string(),
            params: spec.data.clone(),
            output: NodeOutput::default(),
        })
    }
}

fn extract(
    backend: &dyn ImagingBackend,
    track: &TrackOutputs,
    stage: &str,
) -> Result<Volume, StageError> {
    let vol = require(&track.vol, stage, "vol", NodeKind::Input)?;
    let roi = require(&track.roi, stage, "roi", NodeKind::Input)?;
    backend
        .extract_roi(vol, roi)
        .map_err(|e| StageError::library(stage, e))
}

impl Node for RoiExtractionNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::RoiExtraction
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
        let stage = NodeKind::RoiExtraction.tag();
        let vol_int_re = extract(services.backend, &ctx.latest_output, stage)?;
        let texture = if ctx.latest_output_texture.is_live() {
            Some(extract(services.backend, &ctx.latest_output_texture, stage)?)
        } else {
            None
        };

        if let Some(vol) = texture {
            self.output.vol_texture = Some(vol.clone());
            self.output.roi_texture = ctx.latest_output_texture.roi.clone();
            ctx.latest_output_texture.vol_int_re = Some(vol);
        }
        self.output.vol = Some(vol_int_re.clone());
        self.output.roi = ctx.latest_output.roi.clone();
        ctx.latest_output.vol_int_re = Some(vol_int_re);

        ctx.record_settings(stage, self.params.clone());
        Ok(())
    }
}
