//! Volumes, masks and scans as they travel between stages.

use crate::error::LibraryError;
use crate::settings::{
    FilterParams, ImageParams, IntensityType, Interpolator, MatrixParams, QuantSpec,
};
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use ndarray::{Array3, Zip};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Voxel spacing in millimetres along the three array axes.
pub type Spacing = [f64; 3];

/// An intensity volume. Voxels outside an extracted ROI hold `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub data: Array3<f64>,
    pub spacing: Spacing,
}

impl Volume {
    pub fn new(data: Array3<f64>, spacing: Spacing) -> Self {
        Self { data, spacing }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn voxel_volume(&self) -> f64 {
        self.spacing.iter().product()
    }

    /// All non-`NaN` voxel values in memory order.
    pub fn finite_values(&self) -> Vec<f64> {
        self.data.iter().copied().filter(|v| !v.is_nan()).collect()
    }
}

/// A binary region-of-interest mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mask {
    pub data: Array3<bool>,
    pub spacing: Spacing,
}

impl Mask {
    pub fn new(data: Array3<bool>, spacing: Spacing) -> Self {
        Self { data, spacing }
    }

    /// A mask that includes every voxel of a volume with the given shape.
    pub fn full(shape: (usize, usize, usize), spacing: Spacing) -> Self {
        Self::new(Array3::from_elem(shape, true), spacing)
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&inside| inside).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&inside| inside)
    }

    pub fn intersect(&self, other: &Mask) -> Result<Mask, LibraryError> {
        ensure_same_shape(self.shape(), other.shape(), "mask intersection")?;
        let data = Zip::from(&self.data)
            .and(&other.data)
            .map_collect(|&a, &b| a && b);
        Ok(Mask::new(data, self.spacing))
    }
}

pub(crate) fn ensure_same_shape(
    left: (usize, usize, usize),
    right: (usize, usize, usize),
    operation: &str,
) -> Result<(), LibraryError> {
    if left == right {
        Ok(())
    } else {
        Err(LibraryError::InvalidInput(format!(
            "{operation} needs matching shapes, got {left:?} and {right:?}"
        )))
    }
}

/// Imaging modality. Selects the parameter section of the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanType {
    Ct,
    Mr,
    Pet,
}

impl ScanType {
    /// Maps a scan container's modality tag (`"CTscan"`, `"MRscan"`, `"PTscan"`).
    pub fn from_modality(tag: &str) -> Option<Self> {
        match tag {
            "CTscan" | "CT" => Some(ScanType::Ct),
            "MRscan" | "MR" => Some(ScanType::Mr),
            "PTscan" | "PETscan" | "PT" | "PET" => Some(ScanType::Pet),
            _ => None,
        }
    }

    /// Key of this modality's section in a settings template.
    pub fn params_key(self) -> &'static str {
        match self {
            ScanType::Ct => "imParamCT",
            ScanType::Mr => "imParamMR",
            ScanType::Pet => "imParamPET",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanType::Ct => "CT",
            ScanType::Mr => "MR",
            ScanType::Pet => "PET",
        };
        f.write_str(name)
    }
}

/// The serialized scan container read from a scan store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub patient_id: String,
    pub modality: String,
    pub volume: Volume,
    pub rois: BTreeMap<String, Mask>,
}

impl ScanRecord {
    pub fn to_bytes(&self) -> Result<Vec<u8>, LibraryError> {
        encode_to_vec(self, standard())
            .map_err(|e| LibraryError::Decode(format!("could not encode scan: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LibraryError> {
        decode_from_slice(bytes, standard())
            .map(|(record, _)| record)
            .map_err(|e| LibraryError::Decode(e.to_string()))
    }
}

/// A loaded scan plus the processing parameters it was initialised with.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    pub source: String,
    pub patient_id: String,
    pub scan_type: ScanType,
    pub volume: Volume,
    pub rois: BTreeMap<String, Mask>,
    pub processing: Option<ProcessingParams>,
}

impl Scan {
    pub fn from_record(record: ScanRecord) -> Result<Self, LibraryError> {
        let scan_type = ScanType::from_modality(&record.modality).ok_or_else(|| {
            LibraryError::InvalidInput(format!("unknown modality '{}'", record.modality))
        })?;
        for (name, mask) in &record.rois {
            ensure_same_shape(record.volume.shape(), mask.shape(), &format!("ROI '{name}'"))?;
        }
        Ok(Self {
            source: String::new(),
            patient_id: record.patient_id,
            scan_type,
            volume: record.volume,
            rois: record.rois,
            processing: None,
        })
    }
}

/// Discretisation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinningAlgo {
    /// Fixed bin number.
    Fbn,
    /// Fixed bin size.
    Fbs,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantization {
    pub algo: BinningAlgo,
    pub value: f64,
}

impl Quantization {
    pub fn parse(algo: &str, value: f64) -> Result<Self, LibraryError> {
        let algo = match algo {
            "FBN" => BinningAlgo::Fbn,
            "FBS" => BinningAlgo::Fbs,
            other => {
                return Err(LibraryError::Unsupported(format!(
                    "discretisation algorithm '{other}'"
                )));
            }
        };
        if !(value.is_finite() && value > 0.0) {
            return Err(LibraryError::InvalidInput(format!(
                "discretisation value must be positive, got {value}"
            )));
        }
        Ok(Self { algo, value })
    }

    fn from_spec(spec: &QuantSpec) -> Result<Self, LibraryError> {
        Self::parse(&spec.algo, spec.val)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutlierMethod {
    None,
    /// Keep voxels within three standard deviations of the ROI mean.
    Collewet,
}

/// Processing configuration resolved for one scan from its template section.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingParams {
    pub scale_non_text: Spacing,
    pub scale_text: Spacing,
    pub vol_interp: Interpolator,
    pub roi_interp: Interpolator,
    pub roi_pv: f64,
    pub gl_round: Option<f64>,
    pub im_range: [f64; 2],
    pub outliers: OutlierMethod,
    pub ih: Quantization,
    pub ivh: Option<Quantization>,
    pub texture: Quantization,
    /// Lower edge of the first bin for fixed-bin-size discretisation.
    pub user_set_min_value: Option<f64>,
    pub intensity_type: IntensityType,
    pub box_string: String,
    pub filter: FilterParams,
    pub glcm: MatrixParams,
    pub glrlm: MatrixParams,
}

impl ProcessingParams {
    pub fn resolve(params: &ImageParams, scan_type: ScanType) -> Result<Self, LibraryError> {
        let section = params.modality(scan_type);
        let interp = &section.interp;
        let discretisation = &section.discretisation;

        let ih = Quantization::from_spec(&discretisation.ih)?;
        let ivh = discretisation
            .ivh
            .configured()
            .map(|spec| Quantization::from_spec(&spec))
            .transpose()?;
        let texture_algo = discretisation
            .texture
            .algo
            .first()
            .map(String::as_str)
            .unwrap_or(discretisation.ih.algo.as_str());
        let texture_value = discretisation
            .texture
            .val
            .first()
            .and_then(|values| values.first())
            .copied()
            .unwrap_or(discretisation.ih.val);
        let texture = Quantization::parse(texture_algo, texture_value)?;

        let outliers = match section.re_seg.outliers.as_str() {
            "" | "none" | "None" => OutlierMethod::None,
            "Collewet" | "collewet" => OutlierMethod::Collewet,
            other => {
                return Err(LibraryError::Unsupported(format!("outlier method '{other}'")));
            }
        };

        let [low, high] = section.re_seg.range;
        if low > high {
            return Err(LibraryError::InvalidInput(format!(
                "re-segmentation range is inverted: [{low}, {high}]"
            )));
        }
        let user_set_min_value = low.is_finite().then_some(low);

        Ok(Self {
            scale_non_text: interp.scale_non_text,
            scale_text: interp
                .scale_text
                .first()
                .copied()
                .unwrap_or(interp.scale_non_text),
            vol_interp: interp.vol_interp,
            roi_interp: interp.roi_interp,
            roi_pv: interp.roi_pv,
            gl_round: interp.gl_round,
            im_range: section.re_seg.range,
            outliers,
            ih,
            ivh,
            texture,
            user_set_min_value,
            intensity_type: section.intensity_type,
            box_string: section.box_string.clone(),
            filter: params.filter.clone(),
            glcm: section.glcm.clone(),
            glrlm: section.glrlm.clone(),
        })
    }
}
