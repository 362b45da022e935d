//! The flow-graph document model produced by the node editor.

mod document;

pub use document::{Connection, FlowGraphDocument, Module, NodeEntry, Port, natural_order};

/// Module holding the main processing graph.
pub const HOME_MODULE: &str = "Home";

/// Prefix of the sub-module holding an extraction node's family selection.
pub const EXTRACTION_MODULE_PREFIX: &str = "extraction-";

pub fn extraction_module_name(node_id: &str) -> String {
    format!("{EXTRACTION_MODULE_PREFIX}{node_id}")
}
