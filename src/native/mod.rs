//! A self-contained imaging backend.
//!
//! `NativeBackend` implements every [`ImagingBackend`] operation on top of
//! `ndarray`. It decodes the crate's own scan container
//! ([`ScanRecord`](crate::imaging::ScanRecord)) and computes voxel-based
//! feature approximations, which is enough to drive pipelines end to end
//! and to test them without an external imaging library.

mod filters;
mod first_order;
mod morphology;
mod processing;
mod texture;

use crate::backend::ImagingBackend;
use crate::error::LibraryError;
use crate::features::{FeatureFamily, FeatureMap};
use crate::imaging::{
    Mask, OutlierMethod, ProcessingParams, Quantization, Scan, ScanRecord, Spacing, Volume,
};
use crate::settings::{FilterParams, ImageParams, Interpolator};
use tracing::trace;

#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ImagingBackend for NativeBackend {
    fn load_scan(&self, bytes: &[u8]) -> Result<Scan, LibraryError> {
        let record = ScanRecord::from_bytes(bytes)?;
        trace!(
            patient_id = %record.patient_id,
            modality = %record.modality,
            rois = record.rois.len(),
            "decoded scan record"
        );
        Scan::from_record(record)
    }

    fn init_params(&self, scan: &mut Scan, params: &ImageParams) -> Result<(), LibraryError> {
        scan.processing = Some(ProcessingParams::resolve(params, scan.scan_type)?);
        Ok(())
    }

    fn get_roi(
        &self,
        scan: &Scan,
        names: &[String],
        box_string: &str,
    ) -> Result<(Volume, Mask), LibraryError> {
        processing::get_roi(scan, names, box_string)
    }

    fn interpolate_volume(
        &self,
        vol: &Volume,
        spacing: Spacing,
        method: Interpolator,
        gl_round: Option<f64>,
    ) -> Result<Volume, LibraryError> {
        processing::interpolate_volume(vol, spacing, method, gl_round)
    }

    fn interpolate_mask(
        &self,
        mask: &Mask,
        spacing: Spacing,
        method: Interpolator,
        roi_pv: f64,
    ) -> Result<Mask, LibraryError> {
        processing::interpolate_mask(mask, spacing, method, roi_pv)
    }

    fn range_filter(
        &self,
        vol: &Volume,
        mask: &Mask,
        range: [f64; 2],
    ) -> Result<Mask, LibraryError> {
        processing::range_filter(vol, mask, range)
    }

    fn outlier_filter(
        &self,
        vol: &Volume,
        mask: &Mask,
        method: OutlierMethod,
    ) -> Result<Mask, LibraryError> {
        processing::outlier_filter(vol, mask, method)
    }

    fn extract_roi(&self, vol: &Volume, mask: &Mask) -> Result<Volume, LibraryError> {
        processing::extract_roi(vol, mask)
    }

    fn discretize(
        &self,
        vol: &Volume,
        quantization: &Quantization,
        user_set_min_value: Option<f64>,
        ivh: bool,
    ) -> Result<(Volume, f64), LibraryError> {
        processing::discretize(vol, quantization, user_set_min_value, ivh)
    }

    fn apply_filter(&self, vol: &Volume, filter: &FilterParams) -> Result<Volume, LibraryError> {
        filters::apply_filter(vol, filter)
    }

    fn morph_features(
        &self,
        vol: &Volume,
        mask_int: &Mask,
        mask_morph: &Mask,
        _params: &ProcessingParams,
    ) -> Result<FeatureMap, LibraryError> {
        morphology::morph(vol, mask_int, mask_morph)
    }

    fn local_intensity_features(
        &self,
        vol: &Volume,
        mask_int: &Mask,
        _params: &ProcessingParams,
    ) -> Result<FeatureMap, LibraryError> {
        first_order::local_intensity(vol, mask_int)
    }

    fn stats_features(
        &self,
        vol_int_re: &Volume,
        _params: &ProcessingParams,
    ) -> Result<FeatureMap, LibraryError> {
        first_order::stats(vol_int_re)
    }

    fn intensity_histogram_features(
        &self,
        vol_quant_re: &Volume,
    ) -> Result<FeatureMap, LibraryError> {
        first_order::intensity_histogram(vol_quant_re)
    }

    fn int_vol_hist_features(
        &self,
        vol_quant_re_ivh: &Volume,
        vol_int_re: &Volume,
        wd: f64,
    ) -> Result<FeatureMap, LibraryError> {
        first_order::int_vol_hist(vol_quant_re_ivh, vol_int_re, wd)
    }

    fn glcm_features(
        &self,
        vol_quant_re: &Volume,
        params: &ProcessingParams,
    ) -> Result<FeatureMap, LibraryError> {
        texture::glcm(vol_quant_re, &params.glcm)
    }

    fn glrlm_features(
        &self,
        vol_quant_re: &Volume,
        params: &ProcessingParams,
    ) -> Result<FeatureMap, LibraryError> {
        texture::glrlm(vol_quant_re, &params.glrlm)
    }

    fn glszm_features(&self, vol_quant_re: &Volume) -> Result<FeatureMap, LibraryError> {
        texture::glszm(vol_quant_re)
    }

    fn gldzm_features(
        &self,
        vol_quant_re: &Volume,
        mask_morph: &Mask,
    ) -> Result<FeatureMap, LibraryError> {
        texture::gldzm(vol_quant_re, mask_morph)
    }

    fn ngtdm_features(&self, vol_quant_re: &Volume) -> Result<FeatureMap, LibraryError> {
        texture::ngtdm(vol_quant_re)
    }

    fn ngldm_features(&self, vol_quant_re: &Volume) -> Result<FeatureMap, LibraryError> {
        texture::ngldm(vol_quant_re)
    }
}

/// Collects one family's features under their prefixed keys.
pub(crate) struct FeatureBuilder {
    family: FeatureFamily,
    map: FeatureMap,
}

impl FeatureBuilder {
    pub(crate) fn new(family: FeatureFamily) -> Self {
        Self {
            family,
            map: FeatureMap::new(),
        }
    }

    pub(crate) fn set(&mut self, name: &str, value: f64) -> &mut Self {
        self.map
            .insert(self.family.feature_key(name), value.into());
        self
    }

    pub(crate) fn finish(self) -> FeatureMap {
        self.map
    }
}

/// Voxel offsets whose centres lie within `radius_mm` of the origin.
pub(crate) fn neighbourhood_offsets(spacing: Spacing, radius_mm: f64) -> Vec<[isize; 3]> {
    let reach = spacing.map(|s| (radius_mm / s).floor() as isize);
    let mut offsets = Vec::new();
    for dx in -reach[0]..=reach[0] {
        for dy in -reach[1]..=reach[1] {
            for dz in -reach[2]..=reach[2] {
                let distance = ((dx as f64 * spacing[0]).powi(2)
                    + (dy as f64 * spacing[1]).powi(2)
                    + (dz as f64 * spacing[2]).powi(2))
                .sqrt();
                if distance <= radius_mm {
                    offsets.push([dx, dy, dz]);
                }
            }
        }
    }
    offsets
}
