use crate::error::LibraryError;
use crate::features::FeatureMap;
use crate::imaging::{Mask, OutlierMethod, ProcessingParams, Quantization, Scan, Spacing, Volume};
use crate::settings::{FilterParams, ImageParams, Interpolator};
use ahash::AHashMap;
use std::fs;
use std::path::PathBuf;

/// The imaging library a pipeline delegates its numerical work to.
///
/// Nodes only orchestrate: they pick inputs out of the execution context,
/// call one of these operations and store what comes back. Any
/// implementation that honours these signatures can drive a pipeline.
pub trait ImagingBackend: Send + Sync {
    /// Decodes a scan container.
    fn load_scan(&self, bytes: &[u8]) -> Result<Scan, LibraryError>;

    /// Resolves the scan's processing parameters from a settings template.
    fn init_params(&self, scan: &mut Scan, params: &ImageParams) -> Result<(), LibraryError>;

    /// Builds the ROI mask as the union of the named regions and crops the
    /// volume and mask to `box_string` (`"full"`, `"box"` or `"box<N>"`).
    fn get_roi(
        &self,
        scan: &Scan,
        names: &[String],
        box_string: &str,
    ) -> Result<(Volume, Mask), LibraryError>;

    fn interpolate_volume(
        &self,
        vol: &Volume,
        spacing: Spacing,
        method: Interpolator,
        gl_round: Option<f64>,
    ) -> Result<Volume, LibraryError>;

    fn interpolate_mask(
        &self,
        mask: &Mask,
        spacing: Spacing,
        method: Interpolator,
        roi_pv: f64,
    ) -> Result<Mask, LibraryError>;

    fn range_filter(&self, vol: &Volume, mask: &Mask, range: [f64; 2])
    -> Result<Mask, LibraryError>;

    fn outlier_filter(
        &self,
        vol: &Volume,
        mask: &Mask,
        method: OutlierMethod,
    ) -> Result<Mask, LibraryError>;

    /// Copies the volume with every voxel outside `mask` set to `NaN`.
    fn extract_roi(&self, vol: &Volume, mask: &Mask) -> Result<Volume, LibraryError>;

    /// Discretises an ROI-extracted volume. Returns the discretised volume
    /// and the bin width. With `ivh` set, voxels hold bin centres instead of
    /// bin numbers.
    fn discretize(
        &self,
        vol: &Volume,
        quantization: &Quantization,
        user_set_min_value: Option<f64>,
        ivh: bool,
    ) -> Result<(Volume, f64), LibraryError>;

    fn apply_filter(&self, vol: &Volume, filter: &FilterParams) -> Result<Volume, LibraryError>;

    fn morph_features(
        &self,
        vol: &Volume,
        mask_int: &Mask,
        mask_morph: &Mask,
        params: &ProcessingParams,
    ) -> Result<FeatureMap, LibraryError>;

    fn local_intensity_features(
        &self,
        vol: &Volume,
        mask_int: &Mask,
        params: &ProcessingParams,
    ) -> Result<FeatureMap, LibraryError>;

    fn stats_features(
        &self,
        vol_int_re: &Volume,
        params: &ProcessingParams,
    ) -> Result<FeatureMap, LibraryError>;

    fn intensity_histogram_features(&self, vol_quant_re: &Volume)
    -> Result<FeatureMap, LibraryError>;

    fn int_vol_hist_features(
        &self,
        vol_quant_re_ivh: &Volume,
        vol_int_re: &Volume,
        wd: f64,
    ) -> Result<FeatureMap, LibraryError>;

    fn glcm_features(
        &self,
        vol_quant_re: &Volume,
        params: &ProcessingParams,
    ) -> Result<FeatureMap, LibraryError>;

    fn glrlm_features(
        &self,
        vol_quant_re: &Volume,
        params: &ProcessingParams,
    ) -> Result<FeatureMap, LibraryError>;

    fn glszm_features(&self, vol_quant_re: &Volume) -> Result<FeatureMap, LibraryError>;

    fn gldzm_features(
        &self,
        vol_quant_re: &Volume,
        mask_morph: &Mask,
    ) -> Result<FeatureMap, LibraryError>;

    fn ngtdm_features(&self, vol_quant_re: &Volume) -> Result<FeatureMap, LibraryError>;

    fn ngldm_features(&self, vol_quant_re: &Volume) -> Result<FeatureMap, LibraryError>;
}

/// Where input nodes read their scan containers from.
pub trait ScanStore: Send + Sync {
    fn read(&self, name: &str) -> Result<Vec<u8>, LibraryError>;
}

/// Reads scans relative to a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ScanStore for DirectoryStore {
    fn read(&self, name: &str) -> Result<Vec<u8>, LibraryError> {
        let path = self.root.join(name);
        fs::read(&path).map_err(|e| LibraryError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Keeps scan containers in memory, keyed by the name input nodes use.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: AHashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(name.into(), bytes);
    }

    pub fn with_file(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(name, bytes);
        self
    }
}

impl ScanStore for MemoryStore {
    fn read(&self, name: &str) -> Result<Vec<u8>, LibraryError> {
        self.files.get(name).cloned().ok_or_else(|| LibraryError::Io {
            path: name.to_string(),
            message: "no such scan in memory store".to_string(),
        })
    }
}

/// The collaborators a pipeline run borrows.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub backend: &'a dyn ImagingBackend,
    pub store: &'a dyn ScanStore,
}

impl<'a> Services<'a> {
    pub fn new(backend: &'a dyn ImagingBackend, store: &'a dyn ScanStore) -> Self {
        Self { backend, store }
    }
}
