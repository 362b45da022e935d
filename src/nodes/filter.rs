use super::{FromSpec, Node, NodeKind, NodeOutput, NodeSpec, settings_value};
use crate::backend::Services;
use crate::error::{BuildError, StageError};
use crate::pipeline::{ExecutionContext, require};
use crate::settings::{FilterParams, ParamOverride};

/// Replaces the volume of both tracks with its filtered response.
#[derive(Debug, Clone)]
pub struct FilterNode {
    id: String,
    pub params: FilterParams,
    output: NodeOutput,
}

impl FromSpec for FilterNode {
    fn from_spec(spec: &NodeSpec<'_>) -> Result<Self, BuildError> {
        let params: FilterParams = spec.params()?;
        if params.filter_type.trim().is_empty() {
            return Err(spec.invalid("a filter node needs a filter_type"));
        }
        Ok(Self {
            id: spec.id.to_string(),
            params,
            output: NodeOutput::default(),
        })
    }
}

impl Node for FilterNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Filter
    }

    fn output(&self) -> &NodeOutput {
        &self.output
    }

    fn output_mut(&mut self) -> &mut NodeOutput {
        &mut self.output
    }

    fn param_override(&self) -> Option<ParamOverride> {
        Some(ParamOverride::Filter(self.params.clone()))
    }

    fn run(
        &mut self,
        ctx: &mut ExecutionContext,
        services: &Services<'_>,
    ) -> Result<(), StageError> {
        let stage = NodeKind::Filter.tag();
        let filter = &ctx.processing(stage)?.filter;

        let vol = require(&ctx.latest_output.vol, stage, "vol", NodeKind::Input)?;
        let filtered = services
            .backend
            .apply_filter(vol, filter)
            .map_err(|e| StageError::library(stage, e))?;
        let filtered_texture = match &ctx.latest_output_texture.vol {
            Some(vol) => Some(
                services
                    .backend
                    .apply_filter(vol, filter)
                    .map_err(|e| StageError::library(stage, e))?,
            ),
            None => None,
        };

        if let Some(vol) = filtered_texture {
            self.output.vol_texture = Some(vol.clone());
            self.output.roi_texture = ctx.latest_output_texture.roi.clone();
            ctx.latest_output_texture.vol = Some(vol);
        }
        self.output.vol = Some(filtered.clone());
        self.output.roi = ctx.latest_output.roi.clone();
        ctx.latest_output.vol = Some(filtered);

        ctx.record_settings(stage, settings_value(&self.params));
        Ok(())
    }
}
