//! # radiomics-flow - Pipeline Engine for Node-Based Radiomics Flows
//!
//! **radiomics-flow** turns the flow graph a visual node editor produces into
//! linear image-processing pipelines and runs them against medical scans to
//! extract radiomic features. Every root-to-leaf path of the graph becomes
//! one independent pipeline, so a single document can describe many
//! processing variants of the same scan.
//!
//! ## Core Workflow
//!
//! The engine is backend-agnostic. Nodes only orchestrate; the numerical
//! work goes through the [`ImagingBackend`](backend::ImagingBackend) trait.
//! The primary workflow is:
//!
//! 1.  **Load the Document**: Parse the editor's export into a [`FlowGraphDocument`](graph::FlowGraphDocument).
//! 2.  **Expand**: Use [`GraphExpander::builder`](expander::GraphExpander::builder) (or [`ExtractionWorkflow::build_pipelines`](workflow::ExtractionWorkflow::build_pipelines)) to validate the graph and emit one [`Pipeline`](pipeline::Pipeline) per path.
//! 3.  **Run**: Each pipeline reads its scan through a [`ScanStore`](backend::ScanStore), threads the intermediate volumes and masks through its nodes, and reports progress after every node.
//! 4.  **Collect**: Results are aggregated as `file path -> pipeline name -> {features, settings}`.
//!
//! A failing node never aborts a run: its error is recorded under its stage
//! name and the remaining nodes still execute.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use radiomics_flow::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() -> Result<()> {
//!     // 1. Load the flow graph exported by the editor.
//!     let json = std::fs::read_to_string("flow.json")?;
//!     let document = FlowGraphDocument::from_json(&json)?;
//!
//!     // 2. Expand it against the default settings template.
//!     let mut workflow = ExtractionWorkflow::build_pipelines(
//!         &document,
//!         ImageParams::default(),
//!         Arc::new(NativeBackend::new()),
//!         Arc::new(DirectoryStore::new("scans")),
//!     )?;
//!     println!("Built {} pipelines", workflow.pipelines().len());
//!
//!     // 3. Run all of them, printing progress as it goes.
//!     let mut progress = |percent: f64, label: &str| println!("[{percent:>5.1}%] {label}");
//!     let results = workflow.run_pipelines(&mut progress, &StopAt::All);
//!
//!     // 4. Inspect the aggregated results.
//!     for (filepath, pipelines) in &results {
//!         for (name, result) in pipelines {
//!             println!("{filepath} / {name}: {} families", result.features.len());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod expander;
pub mod features;
pub mod graph;
pub mod imaging;
pub mod native;
pub mod nodes;
pub mod pipeline;
pub mod prelude;
pub mod settings;
pub mod workflow;
