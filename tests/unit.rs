//! Unit tests for core radiomics-flow types.
mod common;
use radiomics_flow::features::FeatureSelection;
use radiomics_flow::graph::{Module, natural_order};
use radiomics_flow::imaging::ScanType;
use radiomics_flow::nodes::RoiSelection;
use radiomics_flow::prelude::*;
use radiomics_flow::settings::{Interpolator, ParamOverride, ReSegParams};
use serde_json::json;
use std::cmp::Ordering;

#[test]
fn test_error_display() {
    let err = BuildError::NodeNotFound {
        missing_node_id: "node_B".to_string(),
        source_node_id: "node_A".to_string(),
    };
    assert!(err.to_string().contains("node_B"));
    assert!(err.to_string().contains("node_A"));

    let stage_err = StageError::MissingPrerequisite {
        stage: "glcm features".to_string(),
        artifact: "vol_quant_re",
        required: NodeKind::Discretization,
    };
    assert_eq!(
        stage_err.to_string(),
        "glcm features: an upstream discretization node is required (missing 'vol_quant_re')"
    );
    let no_scan = StageError::MissingPrerequisite {
        stage: "segmentation".to_string(),
        artifact: "scan",
        required: NodeKind::Input,
    };
    assert_eq!(
        no_scan.to_string(),
        "segmentation: an upstream input node is required (missing 'scan')"
    );

    let lib_err = StageError::library("segmentation", LibraryError::RoiNotFound("GTV".to_string()));
    assert!(lib_err.to_string().starts_with("computation failed for segmentation"));
    assert!(lib_err.to_string().contains("GTV"));
}

#[test]
fn test_registry_covers_every_kind() {
    let registry = NodeRegistry::default();
    assert_eq!(registry.len(), NodeKind::ALL.len());
    for kind in NodeKind::ALL {
        assert_eq!(registry.kind_of(kind.tag()), Some(*kind));
    }
    assert_eq!(registry.kind_of("wavelet"), None);
    assert_eq!(NodeRegistry::global().len(), registry.len());
}

#[test]
fn test_registry_creates_nodes_with_their_id() {
    let node = NodeRegistry::global()
        .create("input", "17", &json!({ "filepath": "scan.bin" }))
        .expect("input node");
    assert_eq!(node.id(), "17");
    assert_eq!(node.kind(), NodeKind::Input);
    assert!(node.output().is_empty());
    assert!(node.param_override().is_none());

    let filter = NodeRegistry::global()
        .create("filter", "3", &json!({ "filter_type": "log" }))
        .expect("filter node");
    assert!(matches!(filter.param_override(), Some(ParamOverride::Filter(_))));
}

#[test]
fn test_pipeline_name_composition() {
    assert_eq!(Pipeline::compose_name(["1", "2", "5"]), "pip/1/2/5");
    assert_eq!(Pipeline::compose_name(Vec::<&str>::new()), "pip");
}

#[test]
fn test_natural_order_of_node_ids() {
    assert_eq!(natural_order("2", "10"), Ordering::Less);
    assert_eq!(natural_order("10", "abc"), Ordering::Less);
    assert_eq!(natural_order("abc", "abd"), Ordering::Less);

    let module: Module = serde_json::from_value(json!({
        "data": {
            "10": { "id": 10, "name": "input", "inputs": [], "outputs": [] },
            "9": { "id": "9", "name": "input" },
        }
    }))
    .expect("module parses");
    let keys: Vec<&str> = module.nodes_in_order().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["9", "10"]);
}

#[test]
fn test_roi_selection_parsing() {
    let expression = RoiSelection::Expression("{GTV} + {GTV_2}".to_string());
    assert_eq!(expression.names(), vec!["GTV", "GTV_2"]);
    let list = RoiSelection::Names(vec!["A".to_string(), " ".to_string()]);
    assert_eq!(list.names(), vec!["A"]);
}

#[test]
fn test_feature_selection_from_requested() {
    assert_eq!(
        FeatureSelection::from_requested(FeatureFamily::Stats, &[]),
        Ok(FeatureSelection::All)
    );
    assert_eq!(
        FeatureSelection::from_requested(FeatureFamily::Stats, &["extract_all".to_string()]),
        Ok(FeatureSelection::All)
    );
    assert_eq!(
        FeatureSelection::from_requested(FeatureFamily::Glcm, &["joint_max".to_string()]),
        Ok(FeatureSelection::Named(vec!["joint_max".to_string()]))
    );
    assert_eq!(
        FeatureSelection::from_requested(FeatureFamily::Glcm, &["mean".to_string()]),
        Err("mean".to_string())
    );
}

#[test]
fn test_feature_family_catalog() {
    assert_eq!(FeatureFamily::ALL.len(), 11);
    assert_eq!(FeatureFamily::from_tag("int_vol_hist"), Some(FeatureFamily::IntVolHist));
    assert_eq!(FeatureFamily::Stats.feature_key("mean"), "Fstat_mean");
    assert!(FeatureFamily::Glszm.is_texture());
    assert!(!FeatureFamily::Morph.is_texture());
    for family in FeatureFamily::ALL {
        assert!(!family.feature_names().is_empty(), "{family} has no features");
    }
}

#[test]
fn test_infinite_ranges_travel_as_strings() {
    let params = ReSegParams {
        range: [-1000.0, f64::INFINITY],
        outliers: String::new(),
    };
    let value = serde_json::to_value(&params).expect("serializes");
    assert_eq!(value["range"], json!([-1000.0, "inf"]));

    let parsed: ReSegParams =
        serde_json::from_value(json!({ "range": ["-inf", "inf"], "outliers": "Collewet" }))
            .expect("parses");
    assert_eq!(parsed.range, [f64::NEG_INFINITY, f64::INFINITY]);
}

#[test]
fn test_settings_template_uses_editor_keys() {
    let template = ImageParams::from_json(
        r#"{
            "imParamCT": {
                "box_string": "box10",
                "interp": { "scale_non_text": [1, 1, 3], "vol_interp": "nearest", "gl_round": "" }
            }
        }"#,
    )
    .expect("template parses");
    assert_eq!(template.ct.box_string, "box10");
    assert_eq!(template.ct.interp.scale_non_text, [1.0, 1.0, 3.0]);
    assert_eq!(template.ct.interp.vol_interp, Interpolator::Nearest);
    assert_eq!(template.ct.interp.gl_round, None);
    assert_eq!(template.mr, ImageParams::default().mr);
}

#[test]
fn test_overrides_target_the_scan_modality() {
    let mut params = ImageParams::default();
    let re_seg = ReSegParams {
        range: [0.0, 10.0],
        outliers: String::new(),
    };
    params.apply(ScanType::Pet, &ParamOverride::ReSeg(re_seg.clone()));
    assert_eq!(params.pet.re_seg, re_seg);
    assert_eq!(params.ct.re_seg, ImageParams::default().ct.re_seg);
}

#[test]
fn test_scan_type_from_modality() {
    assert_eq!(ScanType::from_modality("CTscan"), Some(ScanType::Ct));
    assert_eq!(ScanType::from_modality("PTscan"), Some(ScanType::Pet));
    assert_eq!(ScanType::from_modality("USscan"), None);
    assert_eq!(ScanType::Mr.params_key(), "imParamMR");
}

#[test]
fn test_scan_record_roundtrip_keeps_masks() {
    let record = common::phantom_record();
    let bytes = record.to_bytes().expect("encodes");
    let decoded = radiomics_flow::imaging::ScanRecord::from_bytes(&bytes).expect("decodes");
    assert_eq!(decoded, record);
}
