//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the
//! radiomics-flow crate. Import it to get the document model, the expander,
//! pipelines and the workflow without importing each type individually.
//!
//! # Example
//!
//! ```rust,no_run
//! use radiomics_flow::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let json = std::fs::read_to_string("path/to/flow.json")?;
//! let document = FlowGraphDocument::from_json(&json)?;
//! let pipelines = GraphExpander::builder(&document).build().expand()?;
//!
//! for pipeline in &pipelines {
//!     println!("{}", pipeline.name());
//! }
//! # Ok(())
//! # }
//! ```

// Document model and expansion
pub use crate::expander::{GraphExpander, GraphExpanderBuilder};
pub use crate::graph::FlowGraphDocument;

// Nodes
pub use crate::nodes::{Node, NodeKind, NodeRegistry, PipelineNode};

// Pipelines and workflow
pub use crate::pipeline::{
    ExecutionContext, NoProgress, Pipeline, ProgressSink, RunResult, SharedProgress, StopAt,
};
pub use crate::workflow::{ExtractionWorkflow, WorkflowResults, WorkflowSnapshot};

// Backend seams
pub use crate::backend::{DirectoryStore, ImagingBackend, MemoryStore, ScanStore, Services};
pub use crate::native::NativeBackend;

// Settings and features
pub use crate::features::{FamilyOutcome, FeatureFamily, FeatureValue};
pub use crate::settings::ImageParams;

// Error types
pub use crate::error::{BuildError, LibraryError, SnapshotError, StageError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
