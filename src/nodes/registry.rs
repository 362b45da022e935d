use super::{
    DiscretizationNode, ExtractionNode, FilterNode, FromSpec, InputNode, InterpolationNode, Node,
    NodeOutput, NodeSpec, ReSegmentationNode, RoiExtractionNode, SegmentationNode,
};
use crate::backend::Services;
use crate::error::{BuildError, StageError};
use crate::pipeline::ExecutionContext;
use crate::settings::ParamOverride;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

type NodeConstructor = fn(&NodeSpec<'_>) -> Result<PipelineNode, BuildError>;

fn construct<N>(spec: &NodeSpec<'_>) -> Result<PipelineNode, BuildError>
where
    N: FromSpec,
    PipelineNode: From<N>,
{
    N::from_spec(spec).map(PipelineNode::from)
}

/// Master macro defining the node kinds, the closed node enum and the
/// default tag table from one list.
macro_rules! define_node_kinds {
    ( $( ($variant:ident, $tag:expr, $node:ident) ),* $(,)? ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum NodeKind { $( $variant, )* }

        impl NodeKind {
            pub const ALL: &'static [NodeKind] = &[ $( NodeKind::$variant, )* ];

            /// The type tag the node editor uses for this kind.
            pub fn tag(self) -> &'static str {
                match self { $( NodeKind::$variant => $tag, )* }
            }
        }

        #[derive(Debug, Clone)]
        pub enum PipelineNode { $( $variant($node), )* }

        $(
            impl From<$node> for PipelineNode {
                fn from(node: $node) -> Self { PipelineNode::$variant(node) }
            }
        )*

        impl PipelineNode {
            fn as_node(&self) -> &dyn Node {
                match self { $( PipelineNode::$variant(node) => node, )* }
            }

            fn as_node_mut(&mut self) -> &mut dyn Node {
                match self { $( PipelineNode::$variant(node) => node, )* }
            }
        }

        fn default_entries() -> AHashMap<String, (NodeKind, NodeConstructor)> {
            let mut entries = AHashMap::new();
            $( entries.insert($tag.to_string(), (NodeKind::$variant, construct::<$node> as NodeConstructor)); )*
            entries
        }
    };
}

define_node_kinds! {
    (Input, "input", InputNode),
    (Segmentation, "segmentation", SegmentationNode),
    (Interpolation, "interpolation", InterpolationNode),
    (ReSegmentation, "re_segmentation", ReSegmentationNode),
    (RoiExtraction, "roi_extraction", RoiExtractionNode),
    (Discretization, "discretization", DiscretizationNode),
    (Filter, "filter", FilterNode),
    (Extraction, "extraction", ExtractionNode),
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Node for PipelineNode {
    fn id(&self) -> &str {
        self.as_node().id()
    }

    fn kind(&self) -> NodeKind {
        self.as_node().kind()
    }

    fn output(&self) -> &NodeOutput {
        self.as_node().output()
    }

    fn output_mut(&mut self) -> &mut NodeOutput {
        self.as_node_mut().output_mut()
    }

    fn param_override(&self) -> Option<ParamOverride> {
        self.as_node().param_override()
    }

    fn requires_texture(&self) -> bool {
        self.as_node().requires_texture()
    }

    fn run(
        &mut self,
        ctx: &mut ExecutionContext,
        services: &Services<'_>,
    ) -> Result<(), StageError> {
        self.as_node_mut().run(ctx, services)
    }
}

static DEFAULT_REGISTRY: LazyLock<NodeRegistry> = LazyLock::new(|| NodeRegistry {
    entries: default_entries(),
});

/// Maps type tags to node constructors.
#[derive(Clone)]
pub struct NodeRegistry {
    entries: AHashMap<String, (NodeKind, NodeConstructor)>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        DEFAULT_REGISTRY.clone()
    }
}

impl NodeRegistry {
    /// The registry holding every built-in kind under its default tag.
    pub fn global() -> &'static NodeRegistry {
        &DEFAULT_REGISTRY
    }

    /// Registers `tag` as another name for `kind`.
    pub fn alias(&mut self, tag: &str, kind: NodeKind) {
        if let Some(entry) = DEFAULT_REGISTRY.entries.get(kind.tag()).copied() {
            self.entries.insert(tag.to_string(), entry);
        }
    }

    pub fn kind_of(&self, tag: &str) -> Option<NodeKind> {
        self.entries.get(tag).map(|(kind, _)| *kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn create(&self, tag: &str, id: &str, data: &Value) -> Result<PipelineNode, BuildError> {
        let (kind, constructor) =
            self.entries
                .get(tag)
                .copied()
                .ok_or_else(|| BuildError::UnknownNodeType {
                    node_id: id.to_string(),
                    type_name: tag.to_string(),
                })?;
        constructor(&NodeSpec { id, kind, data })
    }
}
