use super::{FromSpec, Node, NodeKind, NodeOutput, NodeSpec, settings_value};
use crate::backend::{ImagingBackend, Services};
use crate::error::{BuildError, LibraryError, StageError};
use crate::features::{FamilyOutcome, FeatureFamily, FeatureMap, FeatureSelection};
use crate::imaging::{ProcessingParams, Volume};
use crate::pipeline::{ExecutionContext, TrackOutputs, require};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// The families an extraction node computes, in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionParams {
    pub families: BTreeMap<FeatureFamily, FeatureSelection>,
}

impl ExtractionParams {
    pub fn requires_texture(&self) -> bool {
        self.families.keys().any(|family| family.is_texture())
    }
}

/// One entry of an `extraction-<id>` sub-module.
#[derive(Debug, Deserialize)]
struct FamilyEntry {
    name: String,
    #[serde(default)]
    data: FamilyData,
}

#[derive(Debug, Default, Deserialize)]
struct FamilyData {
    #[serde(default)]
    features: Vec<String>,
}

/// Computes the requested feature families. A family that fails records
/// its error and the others still run.
#[derive(Debug, Clone)]
pub struct ExtractionNode {
    id: String,
    pub params: ExtractionParams,
    output: NodeOutput,
}

impl FromSpec for ExtractionNode {
    fn from_spec(spec: &NodeSpec<'_>) -> Result<Self, BuildError> {
        let entries: BTreeMap<String, FamilyEntry> = spec.params()?;
        let mut families = BTreeMap::new();
        for entry in entries.into_values() {
            let family = FeatureFamily::from_tag(&entry.name).ok_or_else(|| {
                BuildError::UnknownFeatureFamily {
                    node_id: spec.id.to_string(),
                    family: entry.name.clone(),
                }
            })?;
            let selection = FeatureSelection::from_requested(family, &entry.data.features)
                .map_err(|feature| BuildError::UnknownFeature {
                    node_id: spec.id.to_string(),
                    family,
                    feature,
                })?;
            families.insert(family, selection);
        }
        Ok(Self {
            id: spec.id.to_string(),
            params: ExtractionParams { families },
            output: NodeOutput::default(),
        })
    }
}

/// What every family extractor may draw on.
struct ExtractionInputs<'a> {
    stage: &'a str,
    latest: &'a TrackOutputs,
    texture: &'a TrackOutputs,
    processing: &'a ProcessingParams,
    backend: &'a dyn ImagingBackend,
}

impl ExtractionInputs<'_> {
    fn lib(&self, error: LibraryError) -> StageError {
        StageError::library(self.stage, error)
    }
}

type Extractor = fn(&ExtractionInputs<'_>) -> Result<FeatureMap, StageError>;

fn extractor(family: FeatureFamily) -> Extractor {
    match family {
        FeatureFamily::Morph => morph,
        FeatureFamily::LocalIntensity => local_intensity,
        FeatureFamily::Stats => stats,
        FeatureFamily::IntensityHistogram => intensity_histogram,
        FeatureFamily::IntVolHist => int_vol_hist,
        FeatureFamily::Glcm => glcm,
        FeatureFamily::Glrlm => glrlm,
        FeatureFamily::Glszm => glszm,
        FeatureFamily::Gldzm => gldzm,
        FeatureFamily::Ngtdm => ngtdm,
        FeatureFamily::Ngldm => ngldm,
    }
}

fn morph(i: &ExtractionInputs<'_>) -> Result<FeatureMap, StageError> {
    let vol = require(&i.latest.vol, i.stage, "vol", NodeKind::Input)?;
    let roi = require(&i.latest.roi, i.stage, "roi", NodeKind::Input)?;
    let roi_morph = require(
        &i.latest.roi_obj_morph,
        i.stage,
        "roi_obj_morph",
        NodeKind::Interpolation,
    )?;
    i.backend
        .morph_features(vol, roi, roi_morph, i.processing)
        .map_err(|e| i.lib(e))
}

fn local_intensity(i: &ExtractionInputs<'_>) -> Result<FeatureMap, StageError> {
    let vol = require(&i.latest.vol, i.stage, "vol", NodeKind::Input)?;
    let roi = require(&i.latest.roi, i.stage, "roi", NodeKind::Input)?;
    i.backend
        .local_intensity_features(vol, roi, i.processing)
        .map_err(|e| i.lib(e))
}

fn stats(i: &ExtractionInputs<'_>) -> Result<FeatureMap, StageError> {
    let vol_int_re = require(
        &i.latest.vol_int_re,
        i.stage,
        "vol_int_re",
        NodeKind::RoiExtraction,
    )?;
    i.backend
        .stats_features(vol_int_re, i.processing)
        .map_err(|e| i.lib(e))
}

fn intensity_histogram(i: &ExtractionInputs<'_>) -> Result<FeatureMap, StageError> {
    let vol_quant_re = require(
        &i.latest.vol_quant_re,
        i.stage,
        "vol_quant_re",
        NodeKind::Discretization,
    )?;
    i.backend
        .intensity_histogram_features(vol_quant_re)
        .map_err(|e| i.lib(e))
}

fn int_vol_hist(i: &ExtractionInputs<'_>) -> Result<FeatureMap, StageError> {
    let vol_quant_re_ivh = require(
        &i.latest.vol_quant_re_ivh,
        i.stage,
        "vol_quant_re_ivh",
        NodeKind::Discretization,
    )?;
    let vol_int_re = require(
        &i.latest.vol_int_re,
        i.stage,
        "vol_int_re",
        NodeKind::RoiExtraction,
    )?;
    let wd = require(&i.latest.wd, i.stage, "wd", NodeKind::Discretization)?;
    i.backend
        .int_vol_hist_features(vol_quant_re_ivh, vol_int_re, *wd)
        .map_err(|e| i.lib(e))
}

/// The texture track only exists once a segmentation has seeded it.
fn texture_levels<'a>(i: &'a ExtractionInputs<'_>) -> Result<&'a Volume, StageError> {
    require(&i.texture.vol, i.stage, "vol_texture", NodeKind::Segmentation)?;
    require(
        &i.texture.vol_quant_re,
        i.stage,
        "vol_quant_re",
        NodeKind::Discretization,
    )
}

fn glcm(i: &ExtractionInputs<'_>) -> Result<FeatureMap, StageError> {
    let levels = texture_levels(i)?;
    i.backend
        .glcm_features(levels, i.processing)
        .map_err(|e| i.lib(e))
}

fn glrlm(i: &ExtractionInputs<'_>) -> Result<FeatureMap, StageError> {
    let levels = texture_levels(i)?;
    i.backend
        .glrlm_features(levels, i.processing)
        .map_err(|e| i.lib(e))
}

fn glszm(i: &ExtractionInputs<'_>) -> Result<FeatureMap, StageError> {
    let levels = texture_levels(i)?;
    i.backend.glszm_features(levels).map_err(|e| i.lib(e))
}

fn gldzm(i: &ExtractionInputs<'_>) -> Result<FeatureMap, StageError> {
    let levels = texture_levels(i)?;
    let roi_morph = require(
        &i.texture.roi_obj_morph,
        i.stage,
        "roi_obj_morph",
        NodeKind::Interpolation,
    )?;
    i.backend
        .gldzm_features(levels, roi_morph)
        .map_err(|e| i.lib(e))
}

fn ngtdm(i: &ExtractionInputs<'_>) -> Result<FeatureMap, StageError> {
    let levels = texture_levels(i)?;
    i.backend.ngtdm_features(levels).map_err(|e| i.lib(e))
}

fn ngldm(i: &ExtractionInputs<'_>) -> Result<FeatureMap, StageError> {
    let levels = texture_levels(i)?;
    i.backend.ngldm_features(levels).map_err(|e| i.lib(e))
}

fn select(
    family: FeatureFamily,
    selection: &FeatureSelection,
    mut computed: FeatureMap,
    stage: &str,
) -> Result<FeatureMap, StageError> {
    match selection {
        FeatureSelection::All => Ok(computed),
        FeatureSelection::Named(names) => names
            .iter()
            .map(|name| {
                let key = family.feature_key(name);
                computed
                    .remove(&key)
                    .map(|value| (key.clone(), value))
                    .ok_or_else(|| {
                        StageError::computation(stage, format!("feature '{key}' was not produced"))
                    })
            })
            .collect(),
    }
}

fn extract_family(
    family: FeatureFamily,
    selection: &FeatureSelection,
    ctx: &ExecutionContext,
    backend: &dyn ImagingBackend,
) -> Result<FeatureMap, StageError> {
    let stage = format!("{family} features");
    let inputs = ExtractionInputs {
        stage: &stage,
        latest: &ctx.latest_output,
        texture: &ctx.latest_output_texture,
        processing: ctx.processing(&stage)?,
        backend,
    };
    let computed = extractor(family)(&inputs)?;
    select(family, selection, computed, &stage)
}

impl Node for ExtractionNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Extraction
    }

    fn output(&self) -> &NodeOutput {
        &self.output
    }

    fn output_mut(&mut self) -> &mut NodeOutput {
        &mut self.output
    }

    fn requires_texture(&self) -> bool {
        self.params.requires_texture()
    }

    fn run(
        &mut self,
        ctx: &mut ExecutionContext,
        services: &Services<'_>,
    ) -> Result<(), StageError> {
        for (family, selection) in &self.params.families {
            let outcome = match extract_family(*family, selection, ctx, services.backend) {
                Ok(features) => {
                    debug!(node = %self.id, %family, count = features.len(), "features extracted");
                    FamilyOutcome::Features(features)
                }
                Err(err) => {
                    warn!(node = %self.id, %family, error = %err, "feature family failed");
                    FamilyOutcome::Failed {
                        error: err.to_string(),
                    }
                }
            };
            ctx.feature_results.insert(*family, outcome);
        }
        ctx.record_settings(NodeKind::Extraction.tag(), settings_value(&self.params));
        Ok(())
    }
}
