//! The image-processing settings template.
//!
//! A template holds one parameter section per modality plus a shared filter
//! section. Every pipeline starts from its own copy; parameter-bearing nodes
//! overwrite the matching part before the scan is initialised.

use crate::error::SettingsError;
use crate::imaging::{ScanType, Spacing};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageParams {
    #[serde(rename = "imParamCT")]
    pub ct: ModalityParams,
    #[serde(rename = "imParamMR")]
    pub mr: ModalityParams,
    #[serde(rename = "imParamPET")]
    pub pet: ModalityParams,
    #[serde(rename = "imParamFilter")]
    pub filter: FilterParams,
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            ct: ModalityParams::ct(),
            mr: ModalityParams::mr(),
            pet: ModalityParams::pet(),
            filter: FilterParams::default(),
        }
    }
}

impl ImageParams {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &str) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn modality(&self, scan_type: ScanType) -> &ModalityParams {
        match scan_type {
            ScanType::Ct => &self.ct,
            ScanType::Mr => &self.mr,
            ScanType::Pet => &self.pet,
        }
    }

    pub fn modality_mut(&mut self, scan_type: ScanType) -> &mut ModalityParams {
        match scan_type {
            ScanType::Ct => &mut self.ct,
            ScanType::Mr => &mut self.mr,
            ScanType::Pet => &mut self.pet,
        }
    }

    /// Writes a node's parameters into the section the scan type selects.
    /// Filter parameters are shared by all modalities.
    pub fn apply(&mut self, scan_type: ScanType, param_override: &ParamOverride) {
        match param_override {
            ParamOverride::Filter(filter) => self.filter = filter.clone(),
            ParamOverride::Interp(interp) => self.modality_mut(scan_type).interp = interp.clone(),
            ParamOverride::ReSeg(re_seg) => self.modality_mut(scan_type).re_seg = re_seg.clone(),
            ParamOverride::Discretisation(discretisation) => {
                self.modality_mut(scan_type).discretisation = discretisation.clone()
            }
        }
    }
}

/// A parameter section contributed by a node of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamOverride {
    Filter(FilterParams),
    Interp(InterpParams),
    ReSeg(ReSegParams),
    Discretisation(DiscretisationParams),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModalityParams {
    pub box_string: String,
    pub interp: InterpParams,
    #[serde(rename = "reSeg")]
    pub re_seg: ReSegParams,
    pub discretisation: DiscretisationParams,
    pub intensity_type: IntensityType,
    pub glcm: MatrixParams,
    pub glrlm: MatrixParams,
    pub ngtdm: MatrixParams,
}

impl Default for ModalityParams {
    fn default() -> Self {
        Self::ct()
    }
}

impl ModalityParams {
    pub fn ct() -> Self {
        Self {
            box_string: "full".to_string(),
            interp: InterpParams {
                gl_round: Some(1.0),
                ..InterpParams::default()
            },
            re_seg: ReSegParams {
                range: [-1000.0, 400.0],
                outliers: String::new(),
            },
            discretisation: DiscretisationParams::fixed_bin_size(25.0),
            intensity_type: IntensityType::Definite,
            glcm: MatrixParams::default(),
            glrlm: MatrixParams::default(),
            ngtdm: MatrixParams::default(),
        }
    }

    pub fn mr() -> Self {
        Self {
            re_seg: ReSegParams {
                range: [f64::NEG_INFINITY, f64::INFINITY],
                outliers: "Collewet".to_string(),
            },
            discretisation: DiscretisationParams {
                ih: QuantSpec {
                    algo: "FBN".to_string(),
                    val: 32.0,
                },
                ivh: IvhSpec::default(),
                texture: TextureQuantSpec {
                    algo: vec!["FBN".to_string()],
                    val: vec![vec![32.0]],
                },
            },
            intensity_type: IntensityType::Arbitrary,
            interp: InterpParams::default(),
            ..Self::ct()
        }
    }

    pub fn pet() -> Self {
        Self {
            re_seg: ReSegParams {
                range: [0.0, f64::INFINITY],
                outliers: String::new(),
            },
            discretisation: DiscretisationParams {
                ivh: IvhSpec {
                    algo: Some("FBS".to_string()),
                    val: Some(0.1),
                },
                ..DiscretisationParams::fixed_bin_size(0.25)
            },
            interp: InterpParams {
                gl_round: None,
                ..InterpParams::default()
            },
            ..Self::ct()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpParams {
    pub scale_non_text: Spacing,
    pub scale_text: Vec<Spacing>,
    pub vol_interp: Interpolator,
    pub roi_interp: Interpolator,
    pub roi_pv: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub gl_round: Option<f64>,
}

impl Default for InterpParams {
    fn default() -> Self {
        Self {
            scale_non_text: [2.0, 2.0, 2.0],
            scale_text: vec![[2.0, 2.0, 2.0]],
            vol_interp: Interpolator::Linear,
            roi_interp: Interpolator::Linear,
            roi_pv: 0.5,
            gl_round: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolator {
    Linear,
    Nearest,
    Spline,
    Cubic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReSegParams {
    /// Lower and upper intensity bound. Open bounds travel as `"inf"`.
    #[serde(with = "intensity_bounds")]
    pub range: [f64; 2],
    /// Empty, or the name of an outlier method such as `"Collewet"`.
    pub outliers: String,
}

impl Default for ReSegParams {
    fn default() -> Self {
        Self {
            range: [f64::NEG_INFINITY, f64::INFINITY],
            outliers: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscretisationParams {
    #[serde(rename = "IH")]
    pub ih: QuantSpec,
    #[serde(rename = "IVH")]
    pub ivh: IvhSpec,
    pub texture: TextureQuantSpec,
}

impl Default for DiscretisationParams {
    fn default() -> Self {
        Self::fixed_bin_size(25.0)
    }
}

impl DiscretisationParams {
    pub fn fixed_bin_size(width: f64) -> Self {
        Self {
            ih: QuantSpec {
                algo: "FBS".to_string(),
                val: width,
            },
            ivh: IvhSpec {
                algo: Some("FBS".to_string()),
                val: Some(width / 10.0),
            },
            texture: TextureQuantSpec {
                algo: vec!["FBS".to_string()],
                val: vec![vec![width]],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantSpec {
    #[serde(rename = "type")]
    pub algo: String,
    pub val: f64,
}

/// The IVH pass only runs when both fields are filled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IvhSpec {
    #[serde(rename = "type", deserialize_with = "lenient_text")]
    pub algo: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub val: Option<f64>,
}

impl IvhSpec {
    pub fn configured(&self) -> Option<QuantSpec> {
        match (&self.algo, self.val) {
            (Some(algo), Some(val)) => Some(QuantSpec {
                algo: algo.clone(),
                val,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureQuantSpec {
    #[serde(rename = "type")]
    pub algo: Vec<String>,
    pub val: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityType {
    #[default]
    Definite,
    Arbitrary,
    Filtered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixParams {
    pub dist_correction: bool,
    pub merge_method: String,
}

impl Default for MatrixParams {
    fn default() -> Self {
        Self {
            dist_correction: false,
            merge_method: "vol_merge".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub filter_type: String,
    pub mean: MeanFilterParams,
    pub log: LogFilterParams,
    /// Sections for filter families this crate does not interpret. They are
    /// kept so the settings record shows what the user asked for.
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            filter_type: "mean".to_string(),
            mean: MeanFilterParams::default(),
            log: LogFilterParams::default(),
            other: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanFilterParams {
    pub ndims: usize,
    pub size: usize,
    pub padding: Padding,
}

impl Default for MeanFilterParams {
    fn default() -> Self {
        Self {
            ndims: 3,
            size: 5,
            padding: Padding::Symmetric,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogFilterParams {
    pub ndims: usize,
    pub sigma: f64,
    pub padding: Padding,
    pub orthogonal_rot: bool,
}

impl Default for LogFilterParams {
    fn default() -> Self {
        Self {
            ndims: 3,
            sigma: 1.5,
            padding: Padding::Symmetric,
            orthogonal_rot: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Padding {
    Constant,
    Edge,
    Symmetric,
    Wrap,
}

/// Accepts a number, or `null`, `""` and `[]` for "not set".
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => Ok(n.as_f64()),
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.trim().parse().map(Some).map_err(de::Error::custom),
        Value::Array(items) if items.is_empty() => Ok(None),
        other => Err(de::Error::custom(format!("expected a number, found {other}"))),
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Null => Ok(None),
        other => Err(de::Error::custom(format!("expected a string, found {other}"))),
    }
}

/// Serializes open intensity bounds as `"inf"` / `"-inf"` strings.
mod intensity_bounds {
    use super::*;

    pub fn serialize<S>(range: &[f64; 2], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded: Vec<Value> = range.iter().map(|bound| encode(*bound)).collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[f64; 2], D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<Value>::deserialize(deserializer)?;
        match raw.as_slice() {
            [low, high] => Ok([
                decode(low, f64::NEG_INFINITY).map_err(de::Error::custom)?,
                decode(high, f64::INFINITY).map_err(de::Error::custom)?,
            ]),
            _ => Err(de::Error::custom(format!(
                "expected two range bounds, found {}",
                raw.len()
            ))),
        }
    }

    fn encode(bound: f64) -> Value {
        if bound == f64::INFINITY {
            Value::from("inf")
        } else if bound == f64::NEG_INFINITY {
            Value::from("-inf")
        } else {
            Value::from(bound)
        }
    }

    fn decode(raw: &Value, open: f64) -> Result<f64, String> {
        match raw {
            Value::Number(n) => n.as_f64().ok_or_else(|| format!("invalid bound {n}")),
            Value::Null => Ok(open),
            Value::String(s) => match s.trim() {
                "" => Ok(open),
                "inf" | "+inf" | "Inf" => Ok(f64::INFINITY),
                "-inf" | "-Inf" => Ok(f64::NEG_INFINITY),
                other => other
                    .parse()
                    .map_err(|_| format!("invalid bound '{other}'")),
            },
            other => Err(format!("invalid bound {other}")),
        }
    }
}
