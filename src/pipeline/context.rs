use crate::error::StageError;
use crate::features::FeatureResults;
use crate::imaging::{Mask, ProcessingParams, Scan, Volume};
use crate::nodes::NodeKind;
use crate::settings::{ImageParams, ParamOverride};
use serde_json::Value;
use std::collections::BTreeMap;

/// Stage name to the parameters that stage ran with, or `{"error": ...}`.
pub type SettingsResults = BTreeMap<String, Value>;

/// The artifacts one track has accumulated so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackOutputs {
    pub vol: Option<Volume>,
    pub roi: Option<Mask>,
    pub roi_obj_morph: Option<Mask>,
    pub roi_obj_int: Option<Mask>,
    pub vol_int_re: Option<Volume>,
    pub vol_quant_re: Option<Volume>,
    pub vol_quant_re_ivh: Option<Volume>,
    pub wd: Option<f64>,
}

impl TrackOutputs {
    pub fn is_empty(&self) -> bool {
        *self == TrackOutputs::default()
    }

    pub fn clear(&mut self) {
        *self = TrackOutputs::default();
    }

    /// A track is live once a segmentation has seeded it.
    pub fn is_live(&self) -> bool {
        self.vol.is_some()
    }
}

/// Looks up an upstream artifact, naming the node kind that produces it
/// when it is missing.
pub fn require<'a, T>(
    slot: &'a Option<T>,
    stage: &str,
    artifact: &'static str,
    required: NodeKind,
) -> Result<&'a T, StageError> {
    slot.as_ref().ok_or_else(|| StageError::MissingPrerequisite {
        stage: stage.to_string(),
        artifact,
        required,
    })
}

/// Everything the stages of one pipeline share while it runs.
///
/// Stages read their inputs from `latest_output` (full resolution, used by
/// the non-texture families) and `latest_output_texture` (texture
/// resolution). The texture track is only seeded when the pipeline ends in
/// an extraction that requests a texture family.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub scan: Option<Scan>,
    pub latest_output: TrackOutputs,
    pub latest_output_texture: TrackOutputs,
    pub settings_results: SettingsResults,
    pub feature_results: FeatureResults,
    pub image_params: ImageParams,
    template: ImageParams,
    overrides: Vec<ParamOverride>,
    texture_enabled: bool,
}

impl ExecutionContext {
    pub fn new(template: ImageParams, overrides: Vec<ParamOverride>, texture_enabled: bool) -> Self {
        Self {
            scan: None,
            latest_output: TrackOutputs::default(),
            latest_output_texture: TrackOutputs::default(),
            settings_results: SettingsResults::new(),
            feature_results: FeatureResults::new(),
            image_params: template.clone(),
            template,
            overrides,
            texture_enabled,
        }
    }

    pub fn texture_enabled(&self) -> bool {
        self.texture_enabled
    }

    pub fn overrides(&self) -> &[ParamOverride] {
        &self.overrides
    }

    /// Resets everything a previous run left behind.
    pub(crate) fn begin_run(&mut self, overrides: Vec<ParamOverride>, texture_enabled: bool) {
        self.overrides = overrides;
        self.texture_enabled = texture_enabled;
        self.scan = None;
        self.latest_output.clear();
        self.latest_output_texture.clear();
        self.settings_results.clear();
        self.feature_results.clear();
        self.image_params = self.template.clone();
    }

    /// Drops the track artifacts and the scan. Results stay readable.
    pub(crate) fn end_run(&mut self) {
        self.scan = None;
        self.latest_output.clear();
        self.latest_output_texture.clear();
    }

    /// Writes this pipeline's node parameters into its copy of the template.
    pub(crate) fn apply_overrides(&mut self, scan: &Scan) {
        for param_override in &self.overrides {
            self.image_params.apply(scan.scan_type, param_override);
        }
    }

    pub fn record_settings(&mut self, stage: &str, settings: Value) {
        self.settings_results.insert(stage.to_string(), settings);
    }

    pub fn scan(&self, stage: &str) -> Result<&Scan, StageError> {
        require(&self.scan, stage, "scan", NodeKind::Input)
    }

    pub fn processing(&self, stage: &str) -> Result<&ProcessingParams, StageError> {
        let scan = self.scan(stage)?;
        require(&scan.processing, stage, "processing parameters", NodeKind::Input)
    }
}
