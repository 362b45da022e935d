//! Feature families, feature selections and the shape of extraction results.

mod catalog;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Features of one family keyed by their prefixed name (`Fstat_mean`).
pub type FeatureMap = BTreeMap<String, FeatureValue>;

/// Outcome of every family an extraction node requested. Iterates in
/// canonical family order.
pub type FeatureResults = BTreeMap<FeatureFamily, FamilyOutcome>;

/// A radiomic feature family. The declaration order is the canonical
/// extraction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFamily {
    Morph,
    LocalIntensity,
    Stats,
    IntensityHistogram,
    IntVolHist,
    Glcm,
    Glrlm,
    Glszm,
    Gldzm,
    Ngtdm,
    Ngldm,
}

impl FeatureFamily {
    pub const ALL: [FeatureFamily; 11] = [
        FeatureFamily::Morph,
        FeatureFamily::LocalIntensity,
        FeatureFamily::Stats,
        FeatureFamily::IntensityHistogram,
        FeatureFamily::IntVolHist,
        FeatureFamily::Glcm,
        FeatureFamily::Glrlm,
        FeatureFamily::Glszm,
        FeatureFamily::Gldzm,
        FeatureFamily::Ngtdm,
        FeatureFamily::Ngldm,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            FeatureFamily::Morph => "morph",
            FeatureFamily::LocalIntensity => "local_intensity",
            FeatureFamily::Stats => "stats",
            FeatureFamily::IntensityHistogram => "intensity_histogram",
            FeatureFamily::IntVolHist => "int_vol_hist",
            FeatureFamily::Glcm => "glcm",
            FeatureFamily::Glrlm => "glrlm",
            FeatureFamily::Glszm => "glszm",
            FeatureFamily::Gldzm => "gldzm",
            FeatureFamily::Ngtdm => "ngtdm",
            FeatureFamily::Ngldm => "ngldm",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|family| family.tag() == tag)
    }

    /// Prefix of every feature key this family produces.
    pub fn prefix(self) -> &'static str {
        match self {
            FeatureFamily::Morph => "Fmorph_",
            FeatureFamily::LocalIntensity => "Floc_",
            FeatureFamily::Stats => "Fstat_",
            FeatureFamily::IntensityHistogram => "Fih_",
            FeatureFamily::IntVolHist => "Fivh_",
            FeatureFamily::Glcm => "Fcm_",
            FeatureFamily::Glrlm => "Frlm_",
            FeatureFamily::Glszm => "Fszm_",
            FeatureFamily::Gldzm => "Fdzm_",
            FeatureFamily::Ngtdm => "Fngt_",
            FeatureFamily::Ngldm => "Fngl_",
        }
    }

    /// Texture families read the texture track of the execution context.
    pub fn is_texture(self) -> bool {
        matches!(
            self,
            FeatureFamily::Glcm
                | FeatureFamily::Glrlm
                | FeatureFamily::Glszm
                | FeatureFamily::Gldzm
                | FeatureFamily::Ngtdm
                | FeatureFamily::Ngldm
        )
    }

    /// Unprefixed names of every feature in the family.
    pub fn feature_names(self) -> &'static [&'static str] {
        catalog::names(self)
    }

    pub fn feature_key(self, name: &str) -> String {
        format!("{}{}", self.prefix(), name)
    }

    pub fn knows(self, name: &str) -> bool {
        self.feature_names().contains(&name)
    }
}

impl fmt::Display for FeatureFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Which features of a family the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSelection {
    All,
    Named(Vec<String>),
}

impl FeatureSelection {
    /// The sentinel the UI sends to request every feature of a family.
    pub const EXTRACT_ALL: &'static str = "extract_all";

    /// Builds a selection from the UI's feature list. An empty list or the
    /// `extract_all` sentinel selects everything; otherwise the first
    /// unknown name is returned as the error.
    pub fn from_requested(family: FeatureFamily, requested: &[String]) -> Result<Self, String> {
        if requested.is_empty() || requested.iter().any(|name| name == Self::EXTRACT_ALL) {
            return Ok(FeatureSelection::All);
        }
        match requested.iter().find(|name| !family.knows(name)) {
            Some(unknown) => Err(unknown.clone()),
            None => Ok(FeatureSelection::Named(requested.to_vec())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl FeatureValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            FeatureValue::Scalar(value) => Some(*value),
            FeatureValue::Vector(_) => None,
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Scalar(value)
    }
}

/// Result of one family: its features, or the error that stopped it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FamilyOutcome {
    Features(FeatureMap),
    Failed { error: String },
}

impl FamilyOutcome {
    pub fn features(&self) -> Option<&FeatureMap> {
        match self {
            FamilyOutcome::Features(map) => Some(map),
            FamilyOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FamilyOutcome::Features(_) => None,
            FamilyOutcome::Failed { error } => Some(error),
        }
    }
}
