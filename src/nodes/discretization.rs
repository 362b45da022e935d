use super::{FromSpec, Node, NodeKind, NodeOutput, NodeSpec, settings_value};
use crate::backend::Services;
use crate::error::{BuildError, LibraryError, StageError};
use crate::pipeline::{ExecutionContext, require};
use crate::settings::{DiscretisationParams, ParamOverride};

/// Discretises the ROI-extracted volume for the histogram, the intensity
/// volume histogram and the texture families.
#[derive(Debug, Clone)]
pub struct DiscretizationNode {
    id: String,
    pub params: DiscretisationParams,
    output: NodeOutput,
}

impl FromSpec for DiscretizationNode {
    fn from_spec(spec: &NodeSpec<'_>) -> Result<Self, BuildError> {
        let params: DiscretisationParams = spec.params()?;
        if !(params.ih.val > 0.0) {
            return Err(spec.invalid("the IH discretisation value must be positive"));
        }
        Ok(Self {
            id: spec.id.to_string(),
            params,
            output: NodeOutput::default(),
        })
    }
}

impl Node for DiscretizationNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Discretization
    }

    fn output(&self) -> &NodeOutput {
        &self.output
    }

    fn output_mut(&mut self) -> &mut NodeOutput {
        &mut self.output
    }

    fn param_override(&self) -> Option<ParamOverride> {
        Some(ParamOverride::Discretisation(self.params.clone()))
    }

    fn run(
        &mut self,
        ctx: &mut ExecutionContext,
        services: &Services<'_>,
    ) -> Result<(), StageError> {
        let stage = NodeKind::Discretization.tag();
        let backend = services.backend;
        let processing = ctx.processing(stage)?;
        let lib = |e: LibraryError| StageError::library(stage, e);

        let vol_int_re = require(
            &ctx.latest_output.vol_int_re,
            stage,
            "vol_int_re",
            NodeKind::RoiExtraction,
        )?;
        let (vol_quant_re, _) = backend
            .discretize(vol_int_re, &processing.ih, processing.user_set_min_value, false)
            .map_err(lib)?;
        let (vol_quant_re_ivh, wd) = match &processing.ivh {
            Some(ivh) => backend
                .discretize(vol_int_re, ivh, processing.user_set_min_value, true)
                .map_err(lib)?,
            None => (vol_int_re.clone(), 1.0),
        };

        let texture = if ctx.latest_output_texture.is_live() {
            let vol_int_re = require(
                &ctx.latest_output_texture.vol_int_re,
                stage,
                "vol_int_re",
                NodeKind::RoiExtraction,
            )?;
            let (quantized, _) = backend
                .discretize(
                    vol_int_re,
                    &processing.texture,
                    processing.user_set_min_value,
                    false,
                )
                .map_err(lib)?;
            Some(quantized)
        } else {
            None
        };

        if let Some(quantized) = texture {
            self.output.vol_texture = Some(quantized.clone());
            self.output.roi_texture = ctx.latest_output_texture.roi.clone();
            ctx.latest_output_texture.vol_quant_re = Some(quantized);
        }
        self.output.vol = Some(vol_quant_re.clone());
        self.output.roi = ctx.latest_output.roi.clone();
        let track = &mut ctx.latest_output;
        track.vol_quant_re = Some(vol_quant_re);
        track.vol_quant_re_ivh = Some(vol_quant_re_ivh);
        track.wd = Some(wd);

        ctx.record_settings(stage, settings_value(&self.params));
        Ok(())
    }
}
