use super::{FromSpec, Node, NodeKind, NodeOutput, NodeSpec, settings_value};
use crate::backend::{ImagingBackend, Services};
use crate::error::{BuildError, StageError};
use crate::imaging::{Mask, ProcessingParams};
use crate::pipeline::{ExecutionContext, TrackOutputs, require};
use crate::settings::{ParamOverride, ReSegParams};

/// Restricts the intensity mask to a value range and, optionally, drops
/// outliers.
#[derive(Debug, Clone)]
pub struct ReSegmentationNode {
    id: String,
    pub params: ReSegParams,
    output: NodeOutput,
}

impl FromSpec for ReSegmentationNode {
    fn from_spec(spec: &NodeSpec<'_>) -> Result<Self, BuildError> {
        let params: ReSegParams = spec.params()?;
        let [low, high] = params.range;
        if low > high {
            return Err(spec.invalid(format!("range [{low}, {high}] is inverted")));
        }
        Ok(Self {
            id: spec.id.to_string(),
            params,
            output: NodeOutput::default(),
        })
    }
}

fn re_segment(
    backend: &dyn ImagingBackend,
    track: &TrackOutputs,
    processing: &ProcessingParams,
    stage: &str,
) -> Result<Mask, StageError> {
    let vol = require(&track.vol, stage, "vol", NodeKind::Input)?;
    let roi_morph = require(
        &track.roi_obj_morph,
        stage,
        "roi_obj_morph",
        NodeKind::Interpolation,
    )?;
    let in_range = backend
        .range_filter(vol, roi_morph, processing.im_range)
        .map_err(|e| StageError::library(stage, e))?;
    let without_outliers = backend
        .outlier_filter(vol, roi_morph, processing.outliers)
        .map_err(|e| StageError::library(stage, e))?;
    in_range
        .intersect(&without_outliers)
        .map_err(|e| StageError::library(stage, e))
}

impl Node for ReSegmentationNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::ReSegmentation
    }

    fn output(&self) -> &NodeOutput {
        &self.output
    }

    fn output_mut(&mut self) -> &mut NodeOutput {
        &mut self.output
    }

    fn param_override(&self) -> Option<ParamOverride> {
        Some(ParamOverride::ReSeg(self.params.clone()))
    }

    fn run(
        &mut self,
        ctx: &mut ExecutionContext,
        services: &Services<'_>,
    ) -> Result<(), StageError> {
        let stage = NodeKind::ReSegmentation.tag();
        let processing = ctx.processing(stage)?;

        let roi = re_segment(services.backend, &ctx.latest_output, processing, stage)?;
        let roi_texture = if ctx.latest_output_texture.is_live() {
            Some(re_segment(
                services.backend,
                &ctx.latest_output_texture,
                processing,
                stage,
            )?)
        } else {
            None
        };

        if let Some(roi) = roi_texture {
            self.output.roi_texture = Some(roi.clone());
            self.output.vol_texture = ctx.latest_output_texture.vol.clone();
            ctx.latest_output_texture.roi_obj_int = Some(roi.clone());
            ctx.latest_output_texture.roi = Some(roi);
        }
        self.output.roi = Some(roi.clone());
        self.output.vol = ctx.latest_output.vol.clone();
        ctx.latest_output.roi_obj_int = Some(roi.clone());
        ctx.latest_output.roi = Some(roi);

        ctx.record_settings(stage, settings_value(&self.params));
        Ok(())
    }
}
