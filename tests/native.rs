//! Numeric sanity checks for the native backend.
mod common;
use common::*;
use ndarray::Array3;
use radiomics_flow::imaging::{BinningAlgo, Mask, OutlierMethod, Quantization, Scan, Volume};
use radiomics_flow::prelude::*;
use radiomics_flow::settings::{FilterParams, Interpolator};

fn scan() -> Scan {
    let backend = NativeBackend::new();
    let bytes = phantom_record().to_bytes().expect("phantom should encode");
    let mut scan = backend.load_scan(&bytes).expect("phantom should load");
    backend
        .init_params(&mut scan, &ImageParams::default())
        .expect("params resolve");
    scan
}

fn cube(values: Array3<f64>) -> Volume {
    Volume::new(values, [1.0, 1.0, 1.0])
}

#[test]
fn test_load_scan_resolves_ct_parameters() {
    let scan = scan();
    assert_eq!(scan.patient_id, "PAT-001");
    let processing = scan.processing.as_ref().expect("processing params");
    assert_eq!(processing.ih.algo, BinningAlgo::Fbs);
    assert_eq!(processing.user_set_min_value, Some(-1000.0));
    assert_eq!(processing.box_string, "full");
}

#[test]
fn test_get_roi_unions_and_crops() {
    let backend = NativeBackend::new();
    let scan = scan();

    let (vol, roi) = backend
        .get_roi(&scan, &["GTV".to_string()], "box")
        .expect("roi");
    assert_eq!(vol.shape(), roi.shape());
    assert_eq!(roi.shape(), (8, 8, 8));
    assert_eq!(roi.count(), scan.rois["GTV"].count());

    let (_, union) = backend
        .get_roi(&scan, &["GTV".to_string(), "SPOT".to_string()], "full")
        .expect("roi");
    assert_eq!(union.count(), scan.rois["GTV"].count() + 1);

    let missing = backend.get_roi(&scan, &["LIVER".to_string()], "full");
    assert!(matches!(missing, Err(LibraryError::RoiNotFound(name)) if name == "LIVER"));
}

#[test]
fn test_interpolation_halves_the_grid() {
    let backend = NativeBackend::new();
    let scan = scan();
    let vol = backend
        .interpolate_volume(&scan.volume, [2.0, 2.0, 2.0], Interpolator::Linear, None)
        .expect("interpolates");
    assert_eq!(vol.shape(), (6, 6, 6));
    assert_eq!(vol.spacing, [2.0, 2.0, 2.0]);

    let mask = backend
        .interpolate_mask(&scan.rois["GTV"], [2.0, 2.0, 2.0], Interpolator::Nearest, 0.5)
        .expect("interpolates");
    assert_eq!(mask.shape(), (6, 6, 6));
    assert!(mask.count() > 0);

    let cubic = backend.interpolate_volume(&scan.volume, [2.0, 2.0, 2.0], Interpolator::Cubic, None);
    assert!(matches!(cubic, Err(LibraryError::Unsupported(_))));
}

#[test]
fn test_range_and_outlier_filters() {
    let backend = NativeBackend::new();
    let mut data = Array3::from_elem((3, 3, 3), 10.0);
    data[[1, 1, 1]] = 1000.0;
    let vol = cube(data);
    let mask = Mask::full((3, 3, 3), [1.0, 1.0, 1.0]);

    let ranged = backend.range_filter(&vol, &mask, [0.0, 100.0]).expect("filters");
    assert_eq!(ranged.count(), 26);
    assert!(!ranged.data[[1, 1, 1]]);

    let kept = backend
        .outlier_filter(&vol, &mask, OutlierMethod::None)
        .expect("filters");
    assert_eq!(kept, mask);
}

#[test]
fn test_fixed_bin_number_uses_all_bins() {
    let backend = NativeBackend::new();
    let vol = cube(Array3::from_shape_fn((4, 4, 4), |(i, j, k)| (i * 16 + j * 4 + k) as f64));
    let quantization = Quantization::parse("FBN", 8.0).expect("valid");

    let (levels, width) = backend.discretize(&vol, &quantization, None, false).expect("bins");
    assert!((width - 63.0 / 8.0).abs() < 1e-12);
    let min = levels.data.iter().copied().fold(f64::INFINITY, f64::min);
    let max = levels.data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(min, 1.0);
    assert_eq!(max, 8.0);
}

#[test]
fn test_fixed_bin_size_starts_at_the_range_minimum() {
    let backend = NativeBackend::new();
    let vol = cube(Array3::from_elem((2, 2, 2), 30.0));
    let quantization = Quantization {
        algo: BinningAlgo::Fbs,
        value: 25.0,
    };

    let (levels, _) = backend
        .discretize(&vol, &quantization, Some(0.0), false)
        .expect("bins");
    assert!(levels.data.iter().all(|v| *v == 2.0));

    let (centres, width) = backend
        .discretize(&vol, &quantization, Some(0.0), true)
        .expect("bins");
    assert_eq!(width, 25.0);
    assert!(centres.data.iter().all(|v| (*v - 37.5).abs() < 1e-12));
}

#[test]
fn test_unsupported_discretisation_algorithm() {
    assert!(matches!(
        Quantization::parse("FBSequal", 10.0),
        Err(LibraryError::Unsupported(_))
    ));
    assert!(matches!(
        Quantization::parse("FBN", 0.0),
        Err(LibraryError::InvalidInput(_))
    ));
}

#[test]
fn test_extract_roi_blanks_outside_voxels() {
    let backend = NativeBackend::new();
    let vol = cube(Array3::from_elem((2, 2, 2), 5.0));
    let mut mask = Mask::full((2, 2, 2), [1.0, 1.0, 1.0]);
    mask.data[[0, 0, 0]] = false;

    let extracted = backend.extract_roi(&vol, &mask).expect("extracts");
    assert!(extracted.data[[0, 0, 0]].is_nan());
    assert_eq!(extracted.finite_values().len(), 7);
}

#[test]
fn test_mean_filter_keeps_constant_volumes() {
    let backend = NativeBackend::new();
    let vol = cube(Array3::from_elem((5, 5, 5), 7.0));
    let filtered = backend
        .apply_filter(&vol, &FilterParams::default())
        .expect("filters");
    assert!(filtered.data.iter().all(|v| (v - 7.0).abs() < 1e-9));

    let log = FilterParams {
        filter_type: "log".to_string(),
        ..FilterParams::default()
    };
    let response = backend.apply_filter(&vol, &log).expect("filters");
    assert!(response.data.iter().all(|v| v.abs() < 1e-9));

    let wavelet = FilterParams {
        filter_type: "wavelet".to_string(),
        ..FilterParams::default()
    };
    assert!(matches!(
        backend.apply_filter(&vol, &wavelet),
        Err(LibraryError::Unsupported(_))
    ));
}

#[test]
fn test_cube_morphology() {
    let backend = NativeBackend::new();
    let scan = scan();
    let processing = scan.processing.clone().expect("processing params");
    let mut inside = Array3::from_elem((5, 5, 5), false);
    for i in 1..4 {
        for j in 1..4 {
            for k in 1..4 {
                inside[[i, j, k]] = true;
            }
        }
    }
    let mask = Mask::new(inside, [1.0, 1.0, 1.0]);
    let vol = cube(Array3::from_elem((5, 5, 5), 1.0));

    let features = backend
        .morph_features(&vol, &mask, &mask, &processing)
        .expect("morph");
    assert_eq!(features["Fmorph_vol_approx"].as_scalar(), Some(27.0));
    assert_eq!(features["Fmorph_area_approx"].as_scalar(), Some(54.0));
    assert_eq!(features["Fmorph_v_dens_aabb"].as_scalar(), Some(1.0));
    let com = features["Fmorph_com"].as_scalar().expect("scalar");
    assert!(com.abs() < 1e-12);
}

#[test]
fn test_uniform_region_texture() {
    let backend = NativeBackend::new();
    let scan = scan();
    let processing = scan.processing.clone().expect("processing params");
    let levels = cube(Array3::from_elem((3, 3, 3), 1.0));
    let mask = Mask::full((3, 3, 3), [1.0, 1.0, 1.0]);

    let glcm = backend.glcm_features(&levels, &processing).expect("glcm");
    assert_eq!(glcm["Fcm_joint_max"].as_scalar(), Some(1.0));
    assert_eq!(glcm["Fcm_contrast"].as_scalar(), Some(0.0));
    assert_eq!(glcm["Fcm_corr"].as_scalar(), Some(1.0));

    let glszm = backend.glszm_features(&levels).expect("glszm");
    // A single zone covering all 27 voxels.
    assert_eq!(glszm["Fszm_z_perc"].as_scalar(), Some(1.0 / 27.0));

    let gldzm = backend.gldzm_features(&levels, &mask).expect("gldzm");
    assert_eq!(gldzm["Fdzm_sde"].as_scalar(), Some(1.0));

    let ngtdm = backend.ngtdm_features(&levels).expect("ngtdm");
    assert_eq!(ngtdm["Fngt_coarseness"].as_scalar(), Some(1.0e6));
}

#[test]
fn test_texture_rejects_empty_roi() {
    let backend = NativeBackend::new();
    let empty = cube(Array3::from_elem((2, 2, 2), f64::NAN));
    assert!(matches!(
        backend.ngldm_features(&empty),
        Err(LibraryError::InvalidInput(_))
    ));
}
