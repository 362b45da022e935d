//! Common test utilities for building flow-graph documents and scans.
use ndarray::Array3;
use radiomics_flow::imaging::{Mask, ScanRecord, Volume};
use radiomics_flow::prelude::*;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// File name the phantom is stored under in [`phantom_store`].
#[allow(dead_code)]
pub const PHANTOM_FILE: &str = "phantom.scan";

/// Builds drawflow documents the way the node editor exports them.
#[derive(Debug, Clone, Default)]
pub struct FlowBuilder {
    home: Map<String, Value>,
    modules: Map<String, Value>,
}

#[allow(dead_code)]
impl FlowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, id: u32, name: &str, data: Value) -> Self {
        self.home.insert(
            id.to_string(),
            json!({
                "id": id,
                "name": name,
                "data": data,
                "class": name,
                "html": "",
                "typenode": false,
                "inputs": { "input_1": { "connections": [] } },
                "outputs": { "output_1": { "connections": [] } },
                "pos_x": 0,
                "pos_y": 0,
            }),
        );
        self
    }

    /// Connects `from`'s primary output to `to`'s first input.
    pub fn connect(mut self, from: u32, to: u32) -> Self {
        if let Some(source) = self.home.get_mut(&from.to_string()) {
            if let Some(connections) =
                source["outputs"]["output_1"]["connections"].as_array_mut()
            {
                connections.push(json!({ "node": to.to_string(), "output": "input_1" }));
            }
        }
        if let Some(target) = self.home.get_mut(&to.to_string()) {
            if let Some(connections) = target["inputs"]["input_1"]["connections"].as_array_mut() {
                connections.push(json!({ "node": from.to_string(), "input": "output_1" }));
            }
        }
        self
    }

    /// Adds the `extraction-<id>` module listing the requested families.
    /// An empty feature list requests every feature of the family.
    pub fn extraction_module(mut self, id: u32, families: &[(&str, &[&str])]) -> Self {
        let mut data = Map::new();
        for (index, (family, features)) in families.iter().enumerate() {
            let features: Vec<&str> = if features.is_empty() {
                vec!["extract_all"]
            } else {
                features.to_vec()
            };
            data.insert(
                (index + 1).to_string(),
                json!({
                    "id": index + 1,
                    "name": family,
                    "data": { "features": features },
                    "inputs": {},
                    "outputs": {},
                }),
            );
        }
        self.modules
            .insert(format!("extraction-{id}"), json!({ "data": data }));
        self
    }

    pub fn to_json(&self) -> Value {
        let mut modules = self.modules.clone();
        modules.insert("Home".to_string(), json!({ "data": self.home }));
        json!({ "drawflow": modules })
    }

    pub fn document(&self) -> FlowGraphDocument {
        FlowGraphDocument::from_value(self.to_json()).expect("test document should parse")
    }
}

/// Interpolation parameters that keep the phantom's 1 mm grid.
#[allow(dead_code)]
pub fn identity_interpolation() -> Value {
    json!({
        "scale_non_text": [1.0, 1.0, 1.0],
        "scale_text": [[1.0, 1.0, 1.0]],
        "vol_interp": "linear",
        "roi_interp": "linear",
        "roi_pv": 0.5,
        "gl_round": 1.0,
    })
}

#[allow(dead_code)]
pub fn input_data() -> Value {
    json!({ "filepath": PHANTOM_FILE })
}

#[allow(dead_code)]
pub fn segmentation_data() -> Value {
    json!({ "rois_data": "{GTV}" })
}

/// The standard processing chain: input, segmentation, interpolation,
/// re-segmentation, ROI extraction and discretisation, with ids 1 to 6,
/// followed by an extraction node 7 requesting `families`.
#[allow(dead_code)]
pub fn full_chain(families: &[(&str, &[&str])]) -> FlowBuilder {
    FlowBuilder::new()
        .node(1, "input", input_data())
        .node(2, "segmentation", segmentation_data())
        .node(3, "interpolation", identity_interpolation())
        .node(
            4,
            "re_segmentation",
            json!({ "range": [-1000.0, 400.0], "outliers": "" }),
        )
        .node(5, "roi_extraction", json!({}))
        .node(
            6,
            "discretization",
            json!({
                "IH": { "type": "FBS", "val": 25.0 },
                "IVH": { "type": "FBS", "val": 2.5 },
                "texture": { "type": ["FBS"], "val": [[25.0]] },
            }),
        )
        .node(7, "extraction", json!({}))
        .connect(1, 2)
        .connect(2, 3)
        .connect(3, 4)
        .connect(4, 5)
        .connect(5, 6)
        .connect(6, 7)
        .extraction_module(7, families)
}

/// A 12³ CT phantom with 1 mm voxels: a sphere of radius 4 ("GTV") with
/// intensities between 40 and 80 on a background of -200, plus a second
/// single-voxel region ("SPOT").
#[allow(dead_code)]
pub fn phantom_record() -> ScanRecord {
    let spacing = [1.0, 1.0, 1.0];
    let centre = 5.5;
    let inside = |(i, j, k): (usize, usize, usize)| {
        (i as f64 - centre).powi(2) + (j as f64 - centre).powi(2) + (k as f64 - centre).powi(2)
            <= 16.0
    };
    let shape = (12, 12, 12);
    let data = Array3::from_shape_fn(shape, |(i, j, k)| {
        if inside((i, j, k)) {
            40.0 + ((i + j + k) % 5) as f64 * 10.0
        } else {
            -200.0
        }
    });
    let gtv = Array3::from_shape_fn(shape, inside);
    let mut spot = Array3::from_elem(shape, false);
    spot[[0, 0, 0]] = true;

    let mut rois = BTreeMap::new();
    rois.insert("GTV".to_string(), Mask::new(gtv, spacing));
    rois.insert("SPOT".to_string(), Mask::new(spot, spacing));
    ScanRecord {
        patient_id: "PAT-001".to_string(),
        modality: "CTscan".to_string(),
        volume: Volume::new(data, spacing),
        rois,
    }
}

/// Mean intensity of the phantom's GTV.
#[allow(dead_code)]
pub fn phantom_gtv_mean() -> f64 {
    let record = phantom_record();
    let gtv = &record.rois["GTV"];
    let values: Vec<f64> = record
        .volume
        .data
        .iter()
        .zip(gtv.data.iter())
        .filter(|(_, inside)| **inside)
        .map(|(value, _)| *value)
        .collect();
    values.iter().sum::<f64>() / values.len() as f64
}

#[allow(dead_code)]
pub fn phantom_store() -> MemoryStore {
    let bytes = phantom_record().to_bytes().expect("phantom should encode");
    MemoryStore::new().with_file(PHANTOM_FILE, bytes)
}

/// A workflow over `document` backed by the native backend and the phantom.
#[allow(dead_code)]
pub fn phantom_workflow(document: &FlowGraphDocument) -> ExtractionWorkflow {
    ExtractionWorkflow::build_pipelines(
        document,
        ImageParams::default(),
        Arc::new(NativeBackend::new()),
        Arc::new(phantom_store()),
    )
    .expect("workflow should build")
}

/// Runs every pipeline of `document` and returns the single result keyed
/// under the phantom file.
#[allow(dead_code)]
pub fn run_single(document: &FlowGraphDocument) -> RunResult {
    let mut workflow = phantom_workflow(document);
    let mut results = workflow.run_pipelines(&mut NoProgress, &StopAt::All);
    let mut by_pipeline = results
        .remove(PHANTOM_FILE)
        .expect("results should be keyed by the scan file");
    assert_eq!(by_pipeline.len(), 1, "expected exactly one pipeline");
    by_pipeline
        .pop_first()
        .map(|(_, result)| result)
        .expect("one result")
}
