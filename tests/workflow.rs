//! End-to-end tests for the extraction workflow: aggregation by scan file,
//! node lookup and snapshots.
mod common;
use common::*;
use radiomics_flow::prelude::*;
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;

fn two_branch_document() -> FlowGraphDocument {
    FlowBuilder::new()
        .node(1, "input", input_data())
        .node(2, "segmentation", segmentation_data())
        .node(3, "roi_extraction", json!({}))
        .node(4, "extraction", json!({}))
        .node(5, "interpolation", identity_interpolation())
        .node(6, "roi_extraction", json!({}))
        .node(7, "extraction", json!({}))
        .connect(1, 2)
        .connect(2, 3)
        .connect(3, 4)
        .connect(2, 5)
        .connect(5, 6)
        .connect(6, 7)
        .extraction_module(4, &[("stats", &[])])
        .extraction_module(7, &[("stats", &[]), ("morph", &[])])
        .document()
}

#[test]
fn test_results_are_grouped_by_file_and_pipeline() {
    let document = two_branch_document();
    let mut workflow = phantom_workflow(&document);
    let results = workflow.run_pipelines(&mut NoProgress, &StopAt::All);

    assert_eq!(results.len(), 1);
    let by_pipeline = &results[PHANTOM_FILE];
    let names: Vec<&str> = by_pipeline.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["pip/1/2/3/4", "pip/1/2/5/6/7"]);

    let first = &by_pipeline["pip/1/2/3/4"];
    assert!(first.features[&FeatureFamily::Stats].features().is_some());
    let second = &by_pipeline["pip/1/2/5/6/7"];
    assert!(second.features[&FeatureFamily::Morph].features().is_some());
    assert_eq!(
        second.settings["segmentation"]["filepath"],
        json!(PHANTOM_FILE)
    );
    assert_eq!(second.settings["input"]["scan_type"], json!("imParamCT"));
    assert_eq!(second.settings["input"]["patient_id"], json!("PAT-001"));
}

#[test]
fn test_end_to_end_stats_through_serialized_results() {
    let document = full_chain(&[("stats", &[])]).document();
    let mut workflow = phantom_workflow(&document);
    let results = workflow.run_pipelines(&mut NoProgress, &StopAt::All);

    let json = serde_json::to_value(&results).expect("results serialize");
    let mean = &json[PHANTOM_FILE]["pip/1/2/3/4/5/6/7"]["features"]["stats"]["Fstat_mean"];
    let mean = mean.as_f64().expect("mean is a number");
    assert!((mean - phantom_gtv_mean()).abs() < 1e-9);

    let stats = &results[PHANTOM_FILE]["pip/1/2/3/4/5/6/7"].features[&FeatureFamily::Stats];
    assert!(!matches!(stats, FamilyOutcome::Failed { .. }), "{stats:?}");

    let settings = &json[PHANTOM_FILE]["pip/1/2/3/4/5/6/7"]["settings"];
    let stages: Vec<&str> = settings
        .as_object()
        .expect("settings object")
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(
        stages,
        vec![
            "discretization",
            "extraction",
            "input",
            "interpolation",
            "re_segmentation",
            "roi_extraction",
            "segmentation",
        ]
    );
    assert_eq!(settings["re_segmentation"]["range"], json!([-1000.0, 400.0]));
    assert_eq!(settings["discretization"]["IH"]["type"], json!("FBS"));
}

#[test]
fn test_failed_scan_load_is_reported_under_its_path() {
    let builder = FlowBuilder::new()
        .node(1, "input", input_data())
        .node(2, "segmentation", segmentation_data())
        .node(3, "input", json!({ "filepath": "typo.scan" }))
        .node(4, "segmentation", segmentation_data())
        .connect(1, 2)
        .connect(3, 4);
    let mut workflow = phantom_workflow(&builder.document());
    assert_eq!(workflow.pipelines().len(), 2);
    let results = workflow.run_pipelines(&mut NoProgress, &StopAt::All);

    let files: Vec<&str> = results.keys().map(String::as_str).collect();
    assert_eq!(files, vec![PHANTOM_FILE, "typo.scan"]);
    let failed = &results["typo.scan"]["pip/3/4"];
    for stage in ["input", "segmentation"] {
        let error = failed.settings[stage]["error"]
            .as_str()
            .unwrap_or_else(|| panic!("{stage} should record an error"));
        assert!(!error.is_empty());
    }
    assert!(results[PHANTOM_FILE]["pip/1/2"].settings["input"].get("error").is_none());
}

#[test]
fn test_different_scans_are_keyed_separately() {
    let bytes = phantom_record().to_bytes().expect("phantom should encode");
    let store = MemoryStore::new()
        .with_file("a.scan", bytes.clone())
        .with_file("b.scan", bytes);
    let document = FlowBuilder::new()
        .node(1, "input", json!({ "filepath": "a.scan" }))
        .node(2, "segmentation", segmentation_data())
        .node(3, "input", json!({ "filepath": "b.scan" }))
        .node(4, "segmentation", json!({ "rois_data": ["GTV", "SPOT"] }))
        .connect(1, 2)
        .connect(3, 4)
        .document();

    let mut workflow = ExtractionWorkflow::build_pipelines(
        &document,
        ImageParams::default(),
        Arc::new(NativeBackend::new()),
        Arc::new(store),
    )
    .expect("workflow should build");
    let results = workflow.run_pipelines(&mut NoProgress, &StopAt::All);

    let files: Vec<&str> = results.keys().map(String::as_str).collect();
    assert_eq!(files, vec!["a.scan", "b.scan"]);
    assert!(results["b.scan"].contains_key("pip/3/4"));
}

#[test]
fn test_node_output_finds_the_first_pipeline_holding_a_node() {
    let document = two_branch_document();
    let mut workflow = phantom_workflow(&document);
    workflow.run_pipelines(&mut NoProgress, &StopAt::All);

    let (node, pipeline) = workflow.node_output("2").expect("node 2 exists");
    assert_eq!(node.kind(), NodeKind::Segmentation);
    assert_eq!(pipeline.name(), "pip/1/2/3/4");
    assert!(node.output().roi.is_some());

    let (node, pipeline) = workflow.node_output("5").expect("node 5 exists");
    assert_eq!(node.kind(), NodeKind::Interpolation);
    assert_eq!(pipeline.name(), "pip/1/2/5/6/7");

    assert!(workflow.node_output("42").is_none());
}

#[test]
fn test_snapshot_survives_a_save_and_load() {
    let document = two_branch_document();
    let mut workflow = phantom_workflow(&document);
    workflow.run_pipelines(&mut NoProgress, &StopAt::All);
    let snapshot = workflow.snapshot();

    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("workflow.snapshot");
    let path = path.to_str().expect("utf-8 path");
    snapshot.save(path).expect("snapshot saves");
    let loaded = WorkflowSnapshot::load(path).expect("snapshot loads");

    // Extracted volumes hold NaN outside the ROI, so compare structure.
    assert_eq!(loaded.pipelines.len(), snapshot.pipelines.len());
    for (restored, original) in loaded.pipelines.iter().zip(&snapshot.pipelines) {
        assert_eq!(restored.name, original.name);
        assert_eq!(restored.nodes.len(), original.nodes.len());
    }
    let (node, pipeline) = loaded.node_output("6").expect("node 6 exists");
    assert_eq!(node.kind, NodeKind::RoiExtraction);
    assert_eq!(pipeline.name, "pip/1/2/5/6/7");
    assert!(node.output.vol.is_some());
}

#[test]
fn test_loading_a_missing_snapshot_fails() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("absent.snapshot");
    let result = WorkflowSnapshot::load(path.to_str().expect("utf-8 path"));
    assert!(matches!(result, Err(SnapshotError::Io { .. })));
}
