use super::{FromSpec, Node, NodeKind, NodeOutput, NodeSpec, settings_value};
use crate::backend::Services;
use crate::error::{BuildError, StageError};
use crate::pipeline::ExecutionContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The ROIs to combine, either as an expression such as `"{GTV}+{GTV2}"`
/// or as a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoiSelection {
    Expression(String),
    Names(Vec<String>),
}

impl RoiSelection {
    pub fn names(&self) -> Vec<String> {
        match self {
            RoiSelection::Names(names) => names
                .iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
            RoiSelection::Expression(expression) => expression
                .split('+')
                .map(|term| {
                    term.trim()
                        .trim_start_matches('{')
                        .trim_end_matches('}')
                        .trim()
                        .to_string()
                })
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationParams {
    #[serde(alias = "rois")]
    pub rois_data: RoiSelection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_string: Option<String>,
}

/// Builds the ROI mask and seeds both tracks with it.
#[derive(Debug, Clone)]
pub struct SegmentationNode {
    id: String,
    pub params: SegmentationParams,
    output: NodeOutput,
}

impl FromSpec for SegmentationNode {
    fn from_spec(spec: &NodeSpec<'_>) -> Result<Self, BuildError> {
        let params: SegmentationParams = spec.params()?;
        if params.rois_data.names().is_empty() {
            return Err(spec.invalid("no ROI selected"));
        }
        Ok(Self {
            id: spec.id.to_string(),
            params,
            output: NodeOutput::default(),
        })
    }
}

impl Node for SegmentationNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Segmentation
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
        let stage = NodeKind::Segmentation.tag();
        let scan = ctx.scan(stage)?;
        let box_string = match &self.params.box_string {
            Some(box_string) => box_string.clone(),
            None => ctx.processing(stage)?.box_string.clone(),
        };
        let names = self.params.rois_data.names();
        let (vol, roi) = services
            .backend
            .get_roi(scan, &names, &box_string)
            .map_err(|e| StageError::library(stage, e))?;

        let mut settings = settings_value(&self.params);
        if let Value::Object(map) = &mut settings {
            map.insert("filepath".to_string(), Value::from(scan.source.as_str()));
            map.insert("box_string".to_string(), Value::from(box_string));
        }

        if ctx.texture_enabled() {
            ctx.latest_output_texture.vol = Some(vol.clone());
            ctx.latest_output_texture.roi = Some(roi.clone());
            self.output.vol_texture = Some(vol.clone());
            self.output.roi_texture = Some(roi.clone());
        }
        self.output.vol = Some(vol.clone());
        self.output.roi = Some(roi.clone());
        ctx.latest_output.vol = Some(vol);
        ctx.latest_output.roi = Some(roi);
        ctx.record_settings(stage, settings);
        Ok(())
    }
}
