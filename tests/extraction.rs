//! Tests for the extraction node: family outcomes, prerequisites and
//! feature selection.
mod common;
use common::*;
use radiomics_flow::prelude::*;
use serde_json::json;

fn features_of(result: &RunResult, family: FeatureFamily) -> &radiomics_flow::features::FeatureMap {
    result
        .features
        .get(&family)
        .and_then(FamilyOutcome::features)
        .unwrap_or_else(|| panic!("{family} should succeed, got {:?}", result.features.get(&family)))
}

#[test]
fn test_missing_discretization_fails_only_dependent_families() {
    let builder = FlowBuilder::new()
        .node(1, "input", input_data())
        .node(2, "segmentation", segmentation_data())
        .node(3, "interpolation", identity_interpolation())
        .node(4, "roi_extraction", json!({}))
        .node(5, "extraction", json!({}))
        .connect(1, 2)
        .connect(2, 3)
        .connect(3, 4)
        .connect(4, 5)
        .extraction_module(5, &[("morph", &[]), ("intensity_histogram", &[]), ("stats", &[])]);

    let result = run_single(&builder.document());

    features_of(&result, FeatureFamily::Morph);
    features_of(&result, FeatureFamily::Stats);
    let error = result.features[&FeatureFamily::IntensityHistogram]
        .error()
        .expect("intensity histogram should fail");
    assert!(error.contains("discretization"), "{error}");
    assert!(error.contains("intensity_histogram"), "{error}");
}

#[test]
fn test_morph_requires_interpolation() {
    let builder = FlowBuilder::new()
        .node(1, "input", input_data())
        .node(2, "segmentation", segmentation_data())
        .node(3, "extraction", json!({}))
        .connect(1, 2)
        .connect(2, 3)
        .extraction_module(3, &[("morph", &[]), ("local_intensity", &[])]);

    let result = run_single(&builder.document());
    let error = result.features[&FeatureFamily::Morph]
        .error()
        .expect("morph should fail");
    assert!(error.contains("interpolation"), "{error}");
    features_of(&result, FeatureFamily::LocalIntensity);
}

#[test]
fn test_texture_without_segmentation_names_segmentation() {
    let builder = FlowBuilder::new()
        .node(1, "input", input_data())
        .node(2, "discretization", json!({}))
        .node(3, "extraction", json!({}))
        .connect(1, 2)
        .connect(2, 3)
        .extraction_module(3, &[("glcm", &[])]);

    let result = run_single(&builder.document());
    let error = result.features[&FeatureFamily::Glcm]
        .error()
        .expect("glcm should fail");
    assert!(error.contains("segmentation node"), "{error}");
    assert!(!error.contains("discretization node"), "{error}");
}

#[test]
fn test_families_are_reported_in_canonical_order() {
    let builder = full_chain(&[
        ("ngldm", &[]),
        ("stats", &[]),
        ("glcm", &[]),
        ("morph", &[]),
        ("int_vol_hist", &[]),
    ]);
    let result = run_single(&builder.document());

    let order: Vec<FeatureFamily> = result.features.keys().copied().collect();
    assert_eq!(
        order,
        vec![
            FeatureFamily::Morph,
            FeatureFamily::Stats,
            FeatureFamily::IntVolHist,
            FeatureFamily::Glcm,
            FeatureFamily::Ngldm,
        ]
    );

    let json = serde_json::to_string(&result.features).expect("features serialize");
    let positions: Vec<usize> = ["\"morph\"", "\"stats\"", "\"int_vol_hist\"", "\"glcm\"", "\"ngldm\""]
        .iter()
        .map(|key| json.find(key).expect("family key present"))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
}

#[test]
fn test_extract_all_yields_every_catalog_feature() {
    let builder = full_chain(&[
        ("morph", &[]),
        ("local_intensity", &[]),
        ("stats", &[]),
        ("intensity_histogram", &[]),
        ("int_vol_hist", &[]),
        ("glcm", &[]),
        ("glrlm", &[]),
        ("glszm", &[]),
        ("gldzm", &[]),
        ("ngtdm", &[]),
        ("ngldm", &[]),
    ]);
    let result = run_single(&builder.document());

    for family in FeatureFamily::ALL {
        let features = features_of(&result, family);
        let mut expected: Vec<String> = family
            .feature_names()
            .iter()
            .map(|name| family.feature_key(name))
            .collect();
        expected.sort();
        let produced: Vec<String> = features.keys().cloned().collect();
        assert_eq!(produced, expected, "feature set of {family}");
        for (key, value) in features {
            let value = value.as_scalar().expect("scalar feature");
            assert!(value.is_finite(), "{key} = {value}");
        }
    }
}

#[test]
fn test_named_subset_keeps_only_requested_features() {
    let builder = full_chain(&[("stats", &["mean", "max"])]);
    let result = run_single(&builder.document());

    let stats = features_of(&result, FeatureFamily::Stats);
    let keys: Vec<&str> = stats.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["Fstat_max", "Fstat_mean"]);
}

#[test]
fn test_stats_match_the_phantom() {
    let result = run_single(&full_chain(&[("stats", &[])]).document());
    let stats = features_of(&result, FeatureFamily::Stats);

    let mean = stats["Fstat_mean"].as_scalar().expect("scalar");
    assert!((mean - phantom_gtv_mean()).abs() < 1e-9, "mean {mean}");
    assert_eq!(stats["Fstat_min"].as_scalar(), Some(40.0));
    assert_eq!(stats["Fstat_max"].as_scalar(), Some(80.0));
    assert_eq!(stats["Fstat_range"].as_scalar(), Some(40.0));
}

#[test]
fn test_extraction_settings_record_the_selection() {
    let result = run_single(&full_chain(&[("stats", &["mean"])]).document());
    let extraction = &result.settings["extraction"];
    assert_eq!(
        extraction["families"]["stats"],
        json!({ "named": ["mean"] })
    );
}
