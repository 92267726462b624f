//! Per-frame render graph with topological sort for compositing order.
//!
//! Each node is one operation (source layer, effect, mix, composite).
//! Edges are data dependencies. Filters never touch the graph directly:
//! they return a [`GraphFragment`] that is spliced in after their input.

use crate::blend::BlendMode;
use smallvec::{smallvec, SmallVec};
use std::collections::HashMap;

/// Unique identifier for a render node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// Named scalar parameters of an effect node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectParams(SmallVec<[(&'static str, f32); 4]>);

impl EffectParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: &'static str, value: f32) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &'static str, value: f32) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<f32> {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    pub fn get_or(&self, key: &str, default: f32) -> f32 {
        self.get(key).unwrap_or(default)
    }
}

/// The operation a node performs.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOp {
    /// A decoded frame; `layer` indexes the layers passed to the executor.
    Source { layer: usize },
    /// Single-input effect looked up by name in the executor.
    Effect { name: String, params: EffectParams },
    /// Cross-fade between two inputs; `amount` 0 is all first input.
    Mix { amount: f32 },
    /// Second input over first input.
    Composite { blend: BlendMode, opacity: f32 },
    /// Final output target.
    Output,
}

impl NodeOp {
    pub fn effect(name: &str, params: EffectParams) -> Self {
        Self::Effect {
            name: name.to_string(),
            params,
        }
    }
}

/// A node in the render graph.
#[derive(Debug, Clone)]
pub struct RenderNode {
    pub id: NodeId,
    pub op: NodeOp,
    /// Input node IDs (data dependencies).
    pub inputs: SmallVec<[NodeId; 2]>,
}

/// Where a fragment node reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentInput {
    /// Whatever feeds the filter.
    Upstream,
    /// An earlier node of the same fragment.
    Node(usize),
}

#[derive(Debug, Clone)]
pub struct FragmentNode {
    pub op: NodeOp,
    pub inputs: SmallVec<[FragmentInput; 2]>,
}

/// Ordered node descriptors a filter contributes. The last node is the
/// fragment's output; an empty fragment passes its input through.
#[derive(Debug, Clone, Default)]
pub struct GraphFragment {
    nodes: Vec<FragmentNode>,
}

impl GraphFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single node reading the upstream input.
    pub fn single(op: NodeOp) -> Self {
        let mut f = Self::new();
        f.push(op, &[FragmentInput::Upstream]);
        f
    }

    /// Append a node and return its fragment-local index.
    pub fn push(&mut self, op: NodeOp, inputs: &[FragmentInput]) -> usize {
        self.nodes.push(FragmentNode {
            op,
            inputs: inputs.iter().copied().collect(),
        });
        self.nodes.len() - 1
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[FragmentNode] {
        &self.nodes
    }
}

/// The complete render graph for one frame.
#[derive(Debug, Default)]
pub struct RenderGraph {
    nodes: Vec<RenderNode>,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its ID.
    pub fn add_node(&mut self, op: NodeOp, inputs: &[NodeId]) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(RenderNode {
            id,
            op,
            inputs: inputs.iter().copied().collect(),
        });
        id
    }

    /// Insert `fragment` after `upstream` and return the fragment's output.
    /// Fragment inputs pointing forward or out of range fall back to
    /// `upstream`.
    pub fn splice(&mut self, fragment: &GraphFragment, upstream: NodeId) -> NodeId {
        let mut placed: SmallVec<[NodeId; 4]> = smallvec![];
        for (i, node) in fragment.nodes.iter().enumerate() {
            let inputs: SmallVec<[NodeId; 2]> = node
                .inputs
                .iter()
                .map(|input| match *input {
                    FragmentInput::Node(j) if j < i => placed[j],
                    _ => upstream,
                })
                .collect();
            placed.push(self.add_node(node.op.clone(), &inputs));
        }
        placed.last().copied().unwrap_or(upstream)
    }

    pub fn node(&self, id: NodeId) -> Option<&RenderNode> {
        self.nodes.get(id.0 as usize)
    }

    pub fn nodes(&self) -> &[RenderNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The output node, if one was added.
    pub fn output(&self) -> Option<NodeId> {
        self.nodes
            .iter()
            .rev()
            .find(|n| matches!(n.op, NodeOp::Output))
            .map(|n| n.id)
    }

    /// Perform topological sort (Kahn's algorithm).
    /// Returns nodes in execution order, or None if there's a cycle or a
    /// dangling input.
    pub fn topological_sort(&self) -> Option<Vec<NodeId>> {
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

        for node in &self.nodes {
            in_degree.entry(node.id).or_insert(0);
            for &input in &node.inputs {
                *in_degree.entry(node.id).or_insert(0) += 1;
                dependents.entry(input).or_default().push(node.id);
            }
        }

        let mut queue: Vec<NodeId> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();
        // Pop from the back, lowest id first.
        queue.sort_by_key(|id| std::cmp::Reverse(id.0));

        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(id) = queue.pop() {
            result.push(id);
            if let Some(deps) = dependents.get(&id) {
                for &dep in deps {
                    if let Some(deg) = in_degree.get_mut(&dep) {
                        *deg -= 1;
                        if *deg == 0 {
                            queue.push(dep);
                            queue.sort_by_key(|id| std::cmp::Reverse(id.0));
                        }
                    }
                }
            }
        }

        if result.len() == self.nodes.len() {
            Some(result)
        } else {
            None
        }
    }

    /// Clear the graph for reuse.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blur() -> NodeOp {
        NodeOp::effect("blur", EffectParams::new().with("radius", 3.0))
    }

    #[test]
    fn test_topological_sort_linear() {
        let mut graph = RenderGraph::new();
        let a = graph.add_node(NodeOp::Source { layer: 0 }, &[]);
        let b = graph.add_node(blur(), &[a]);
        let c = graph.add_node(NodeOp::Output, &[b]);

        let sorted = graph.topological_sort().unwrap();
        assert_eq!(sorted, vec![a, b, c]);
    }

    #[test]
    fn test_topological_sort_diamond() {
        let mut graph = RenderGraph::new();
        let src = graph.add_node(NodeOp::Source { layer: 0 }, &[]);
        let left = graph.add_node(blur(), &[src]);
        let right = graph.add_node(NodeOp::effect("opacity", EffectParams::new()), &[src]);
        let merge = graph.add_node(
            NodeOp::Composite {
                blend: BlendMode::Normal,
                opacity: 1.0,
            },
            &[left, right],
        );

        let sorted = graph.topological_sort().unwrap();
        assert_eq!(sorted.len(), 4);
        let pos = |id| sorted.iter().position(|&x| x == id).unwrap();
        assert!(pos(src) < pos(left));
        assert!(pos(right) < pos(merge));
    }

    #[test]
    fn test_topological_sort_dangling_input() {
        let mut graph = RenderGraph::new();
        let a = graph.add_node(NodeOp::Source { layer: 0 }, &[]);
        graph.add_node(blur(), &[a, NodeId(99)]);
        assert!(graph.topological_sort().is_none());
    }

    #[test]
    fn test_splice_blur_then_mask() {
        let mut graph = RenderGraph::new();
        let src = graph.add_node(NodeOp::Source { layer: 0 }, &[]);

        let mut fragment = GraphFragment::new();
        let b = fragment.push(blur(), &[FragmentInput::Upstream]);
        fragment.push(
            NodeOp::effect("mask", EffectParams::new()),
            &[FragmentInput::Node(b)],
        );

        let out = graph.splice(&fragment, src);
        let mask = graph.node(out).unwrap();
        assert!(matches!(&mask.op, NodeOp::Effect { name, .. } if name == "mask"));
        let blur_id = mask.inputs[0];
        assert_eq!(graph.node(blur_id).unwrap().inputs.as_slice(), &[src]);
    }

    #[test]
    fn test_splice_two_input_node() {
        let mut graph = RenderGraph::new();
        let src = graph.add_node(NodeOp::Source { layer: 0 }, &[]);
        let mut fragment = GraphFragment::new();
        let b = fragment.push(blur(), &[FragmentInput::Upstream]);
        fragment.push(
            NodeOp::Mix { amount: 0.3 },
            &[FragmentInput::Upstream, FragmentInput::Node(b)],
        );
        let out = graph.splice(&fragment, src);
        let mix = graph.node(out).unwrap();
        assert_eq!(mix.inputs[0], src);
        assert_ne!(mix.inputs[1], src);
    }

    #[test]
    fn test_empty_fragment_passes_through() {
        let mut graph = RenderGraph::new();
        let src = graph.add_node(NodeOp::Source { layer: 0 }, &[]);
        assert_eq!(graph.splice(&GraphFragment::new(), src), src);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_effect_params() {
        let mut p = EffectParams::new().with("radius", 2.0);
        p.set("radius", 4.0);
        assert_eq!(p.get("radius"), Some(4.0));
        assert_eq!(p.get_or("missing", 1.5), 1.5);
    }
}
