use super::{FromSpec, Node, NodeKind, NodeOutput, NodeSpec, settings_value};
use crate::backend::{ImagingBackend, Services};
use crate::error::{BuildError, StageError};
use crate::imaging::{Mask, ProcessingParams, Spacing, Volume};
use crate::pipeline::{ExecutionContext, TrackOutputs, require};
use crate::settings::{InterpParams, ParamOverride};

/// Resamples both tracks to their target voxel spacing.
#[derive(Debug, Clone)]
pub struct InterpolationNode {
    id: String,
    pub params: InterpParams,
    output: NodeOutput,
}

impl FromSpec for InterpolationNode {
    fn from_spec(spec: &NodeSpec<'_>) -> Result<Self, BuildError> {
        let params: InterpParams = spec.params()?;
        if params.scale_non_text.iter().any(|s| !(*s > 0.0)) {
            return Err(spec.invalid("voxel spacing must be positive"));
        }
        if !(0.0..=1.0).contains(&params.roi_pv) {
            return Err(spec.invalid("roi_pv must lie in [0, 1]"));
        }
        Ok(Self {
            id: spec.id.to_string(),
            params,
            output: NodeOutput::default(),
        })
    }
}

fn resample(
    backend: &dyn ImagingBackend,
    track: &TrackOutputs,
    spacing: Spacing,
    processing: &ProcessingParams,
    stage: &str,
) -> Result<(Volume, Mask), StageError> {
    let vol = require(&track.vol, stage, "vol", NodeKind::Input)?;
    let roi = require(&track.roi, stage, "roi", NodeKind::Input)?;
    let vol = backend
        .interpolate_volume(vol, spacing, processing.vol_interp, processing.gl_round)
        .map_err(|e| StageError::library(stage, e))?;
    let roi = backend
        .interpolate_mask(roi, spacing, processing.roi_interp, processing.roi_pv)
        .map_err(|e| StageError::library(stage, e))?;
    Ok((vol, roi))
}

impl Node for InterpolationNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Interpolation
    }

    fn output(&self) -> &NodeOutput {
        &self.output
    }

    fn output_mut(&mut self) -> &mut NodeOutput {
        &mut self.output
    }

    fn param_override(&self) -> Option<ParamOverride> {
        Some(ParamOverride::Interp(self.params.clone()))
    }

    fn run(
        &mut self,
        ctx: &mut ExecutionContext,
        services: &Services<'_>,
    ) -> Result<(), StageError> {
        let stage = NodeKind::Interpolation.tag();
        let processing = ctx.processing(stage)?;

        let (vol, roi) = resample(
            services.backend,
            &ctx.latest_output,
            processing.scale_non_text,
            processing,
            stage,
        )?;
        let texture = if ctx.latest_output_texture.is_live() {
            Some(resample(
                services.backend,
                &ctx.latest_output_texture,
                processing.scale_text,
                processing,
                stage,
            )?)
        } else {
            None
        };

        if let Some((vol, roi)) = texture {
            self.output.vol_texture = Some(vol.clone());
            self.output.roi_texture = Some(roi.clone());
            let track = &mut ctx.latest_output_texture;
            track.vol = Some(vol);
            track.roi_obj_morph = Some(roi.clone());
            track.roi = Some(roi);
        }
        self.output.vol = Some(vol.clone());
        self.output.roi = Some(roi.clone());
        let track = &mut ctx.latest_output;
        track.vol = Some(vol);
        track.roi_obj_morph = Some(roi.clone());
        track.roi = Some(roi);

        ctx.record_settings(stage, settings_value(&self.params));
        Ok(())
    }
}
