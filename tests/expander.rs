//! Tests for flow-graph expansion into pipelines.
mod common;
use common::*;
use proptest::prelude::*;
use radiomics_flow::prelude::*;
use serde_json::json;

fn expand(builder: &FlowBuilder) -> std::result::Result<Vec<Pipeline>, BuildError> {
    GraphExpander::builder(&builder.document()).build().expand()
}

fn names(pipelines: &[Pipeline]) -> Vec<String> {
    pipelines.iter().map(|p| p.name().to_string()).collect()
}

#[test]
fn test_linear_chain_yields_one_pipeline() {
    let pipelines = expand(&full_chain(&[("stats", &[])])).expect("should expand");

    assert_eq!(names(&pipelines), vec!["pip/1/2/3/4/5/6/7"]);
    assert_eq!(pipelines[0].id(), 1);
    let kinds: Vec<NodeKind> = pipelines[0].nodes().iter().map(|n| n.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            NodeKind::Input,
            NodeKind::Segmentation,
            NodeKind::Interpolation,
            NodeKind::ReSegmentation,
            NodeKind::RoiExtraction,
            NodeKind::Discretization,
            NodeKind::Extraction,
        ]
    );
}

#[test]
fn test_branch_yields_one_pipeline_per_leaf() {
    let builder = FlowBuilder::new()
        .node(1, "input", input_data())
        .node(2, "segmentation", segmentation_data())
        .node(3, "roi_extraction", json!({}))
        .node(4, "extraction", json!({}))
        .node(5, "interpolation", identity_interpolation())
        .node(6, "extraction", json!({}))
        .connect(1, 2)
        .connect(2, 3)
        .connect(3, 4)
        .connect(2, 5)
        .connect(5, 6)
        .extraction_module(4, &[("stats", &[])])
        .extraction_module(6, &[("morph", &[])]);

    let pipelines = expand(&builder).expect("should expand");
    assert_eq!(names(&pipelines), vec!["pip/1/2/3/4", "pip/1/2/5/6"]);
    assert_eq!(
        pipelines.iter().map(|p| p.id()).collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[test]
fn test_multiple_roots_are_ordered_naturally() {
    let builder = FlowBuilder::new()
        .node(10, "input", input_data())
        .node(11, "segmentation", segmentation_data())
        .node(2, "input", input_data())
        .node(3, "segmentation", segmentation_data())
        .connect(10, 11)
        .connect(2, 3);

    let pipelines = expand(&builder).expect("should expand");
    assert_eq!(names(&pipelines), vec!["pip/2/3", "pip/10/11"]);
}

#[test]
fn test_graph_without_input_roots_yields_nothing() {
    let builder = FlowBuilder::new()
        .node(1, "segmentation", segmentation_data())
        .node(2, "roi_extraction", json!({}))
        .connect(1, 2);

    let pipelines = expand(&builder).expect("should expand");
    assert!(pipelines.is_empty());
}

#[test]
fn test_unknown_node_type_is_rejected() {
    let builder = FlowBuilder::new()
        .node(1, "input", input_data())
        .node(2, "wavelet", json!({}))
        .connect(1, 2);

    match expand(&builder) {
        Err(BuildError::UnknownNodeType { node_id, type_name }) => {
            assert_eq!(node_id, "2");
            assert_eq!(type_name, "wavelet");
        }
        other => panic!("expected UnknownNodeType, got {:?}", other),
    }
}

#[test]
fn test_type_alias_resolves_to_kind() {
    let builder = FlowBuilder::new()
        .node(1, "input", input_data())
        .node(2, "segmentation_node", segmentation_data())
        .connect(1, 2);
    let document = builder.document();

    let pipelines = GraphExpander::builder(&document)
        .with_type_alias("segmentation_node", NodeKind::Segmentation)
        .build()
        .expand()
        .expect("alias should be accepted");
    assert_eq!(pipelines[0].nodes()[1].kind(), NodeKind::Segmentation);
}

#[test]
fn test_missing_home_module() {
    let document = FlowGraphDocument::from_value(json!({ "drawflow": { "Other": { "data": {} } } }))
        .expect("document should parse");
    let result = GraphExpander::builder(&document).build().expand();
    assert!(matches!(result, Err(BuildError::MissingHomeModule(_))));
}

#[test]
fn test_dangling_connection_is_rejected() {
    let mut value = FlowBuilder::new()
        .node(1, "input", input_data())
        .to_json();
    value["drawflow"]["Home"]["data"]["1"]["outputs"]["output_1"]["connections"] =
        json!([{ "node": "99", "output": "input_1" }]);
    let document = FlowGraphDocument::from_value(value).expect("document should parse");

    match GraphExpander::builder(&document).build().expand() {
        Err(BuildError::NodeNotFound {
            missing_node_id,
            source_node_id,
        }) => {
            assert_eq!(missing_node_id, "99");
            assert_eq!(source_node_id, "1");
        }
        other => panic!("expected NodeNotFound, got {:?}", other),
    }
}

#[test]
fn test_targeted_input_is_not_a_second_root() {
    let mut value = FlowBuilder::new()
        .node(1, "input", input_data())
        .node(2, "input", input_data())
        .node(3, "roi_extraction", json!({}))
        .connect(2, 3)
        .to_json();
    // Node 2 declares no parent, but node 1 still points at it.
    value["drawflow"]["Home"]["data"]["1"]["outputs"]["output_1"]["connections"] =
        json!([{ "node": "2", "output": "input_1" }]);
    let document = FlowGraphDocument::from_value(value).expect("document should parse");

    let pipelines = GraphExpander::builder(&document)
        .build()
        .expand()
        .expect("should expand");
    assert_eq!(names(&pipelines), vec!["pip/1/2/3"]);
}

#[test]
fn test_join_is_rejected() {
    let builder = FlowBuilder::new()
        .node(1, "input", input_data())
        .node(2, "segmentation", segmentation_data())
        .node(3, "interpolation", identity_interpolation())
        .node(4, "roi_extraction", json!({}))
        .connect(1, 2)
        .connect(1, 3)
        .connect(2, 4)
        .connect(3, 4);

    match expand(&builder) {
        Err(BuildError::JoinNotSupported { node_id, parents }) => {
            assert_eq!(node_id, "4");
            assert_eq!(parents, 2);
        }
        other => panic!("expected JoinNotSupported, got {:?}", other),
    }
}

#[test]
fn test_cycle_is_rejected() {
    let builder = FlowBuilder::new()
        .node(1, "input", input_data())
        .node(2, "segmentation", segmentation_data())
        .node(3, "interpolation", identity_interpolation())
        .connect(1, 2)
        .connect(2, 3)
        .connect(3, 2);

    let result = expand(&builder);
    assert!(
        matches!(result, Err(BuildError::CycleDetected { .. })),
        "got {:?}",
        result
    );
}

#[test]
fn test_invalid_parameters_name_the_node() {
    let builder = FlowBuilder::new()
        .node(1, "input", json!({ "filepath": "" }));

    match expand(&builder) {
        Err(BuildError::InvalidParameters { node_id, kind, .. }) => {
            assert_eq!(node_id, "1");
            assert_eq!(kind, NodeKind::Input);
        }
        other => panic!("expected InvalidParameters, got {:?}", other),
    }
}

#[test]
fn test_extraction_module_feature_selection() {
    let builder = full_chain(&[("glcm", &["joint_max", "contrast"]), ("stats", &[])]);
    let pipelines = expand(&builder).expect("should expand");
    let extraction = pipelines[0].node("7").expect("extraction node");

    assert!(extraction.requires_texture());
    match extraction {
        PipelineNode::Extraction(node) => {
            let families: Vec<FeatureFamily> = node.params.families.keys().copied().collect();
            assert_eq!(families, vec![FeatureFamily::Stats, FeatureFamily::Glcm]);
        }
        other => panic!("expected an extraction node, got {:?}", other.kind()),
    }
}

#[test]
fn test_unknown_family_and_feature_are_rejected() {
    let unknown_family = full_chain(&[("wavelets", &[])]);
    assert!(matches!(
        expand(&unknown_family),
        Err(BuildError::UnknownFeatureFamily { .. })
    ));

    let unknown_feature = full_chain(&[("stats", &["mean", "definitely_not_a_feature"])]);
    match expand(&unknown_feature) {
        Err(BuildError::UnknownFeature {
            family, feature, ..
        }) => {
            assert_eq!(family, FeatureFamily::Stats);
            assert_eq!(feature, "definitely_not_a_feature");
        }
        other => panic!("expected UnknownFeature, got {:?}", other),
    }
}

#[test]
fn test_missing_extraction_module_yields_empty_extraction() {
    let builder = FlowBuilder::new()
        .node(1, "input", input_data())
        .node(2, "extraction", json!({}))
        .connect(1, 2);

    let pipelines = expand(&builder).expect("should expand");
    match pipelines[0].node("2") {
        Some(PipelineNode::Extraction(node)) => assert!(node.params.families.is_empty()),
        other => panic!("expected an extraction node, got {:?}", other.map(|n| n.kind())),
    }
}

#[test]
fn test_branches_do_not_share_nodes() {
    let builder = FlowBuilder::new()
        .node(1, "input", input_data())
        .node(2, "segmentation", segmentation_data())
        .node(3, "roi_extraction", json!({}))
        .node(4, "roi_extraction", json!({}))
        .connect(1, 2)
        .connect(2, 3)
        .connect(2, 4);

    let mut pipelines = expand(&builder).expect("should expand");
    if let Some(PipelineNode::Segmentation(node)) = pipelines[0].node_mut("2") {
        node.params.box_string = Some("box".to_string());
    }
    match pipelines[1].node("2") {
        Some(PipelineNode::Segmentation(node)) => assert_eq!(node.params.box_string, None),
        other => panic!("expected a segmentation node, got {:?}", other.map(|n| n.kind())),
    }
}

#[test]
fn test_expansion_is_deterministic() {
    let builder = full_chain(&[("stats", &[]), ("morph", &[])]);
    let first = names(&expand(&builder).expect("should expand"));
    let second = names(&expand(&builder).expect("should expand"));
    assert_eq!(first, second);
}

#[test]
fn test_bare_module_map_is_accepted() {
    let wrapped = full_chain(&[("stats", &[])]).to_json();
    let bare = wrapped["drawflow"].clone();
    let document = FlowGraphDocument::from_value(bare).expect("bare map should parse");
    let pipelines = GraphExpander::builder(&document)
        .build()
        .expand()
        .expect("should expand");
    assert_eq!(pipelines.len(), 1);
}

proptest! {
    /// A fan-out of `n` leaves under one segmentation node yields `n`
    /// pipelines, named in connection order.
    #[test]
    fn prop_fan_out_yields_one_pipeline_per_leaf(n in 1usize..8) {
        let mut builder = FlowBuilder::new()
            .node(1, "input", input_data())
            .node(2, "segmentation", segmentation_data())
            .connect(1, 2);
        for leaf in 0..n as u32 {
            builder = builder
                .node(100 + leaf, "roi_extraction", json!({}))
                .connect(2, 100 + leaf);
        }

        let pipelines = expand(&builder).expect("should expand");
        prop_assert_eq!(pipelines.len(), n);
        for (index, pipeline) in pipelines.iter().enumerate() {
            prop_assert_eq!(pipeline.id(), index + 1);
            prop_assert_eq!(pipeline.name(), format!("pip/1/2/{}", 100 + index));
        }
    }
}
