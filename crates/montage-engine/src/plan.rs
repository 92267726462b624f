//! Per-frame snapshot of what the scene shows, and the render graph built
//! from it.

use montage_core::{Profile, Pts};
use montage_effects::Filter;
use montage_gpu::{BlendMode, NodeId, NodeOp, RenderGraph};
use montage_timeline::{Clip, Scene, Transition};
use smallvec::SmallVec;

/// One visible track at a timestamp, copied out of the scene so the lock
/// is not held while frames are decoded.
#[derive(Debug, Clone)]
pub struct LayerPlan {
    pub track: usize,
    pub muted: bool,
    pub clip: Clip,
    /// The clip being blended away from inside a transition.
    pub outgoing: Option<Clip>,
    pub transition: Option<Transition>,
}

pub type Plan = SmallVec<[LayerPlan; 4]>;

/// Snapshot the active clips at `pts`, front track first.
pub fn plan_layers(scene: &Scene, pts: Pts) -> Plan {
    scene
        .active_clips(pts)
        .into_iter()
        .map(|(track, active)| LayerPlan {
            track,
            muted: scene.track(track).is_some_and(|t| t.muted),
            clip: active.clip.clone(),
            outgoing: active.outgoing.cloned(),
            transition: active.transition.cloned(),
        })
        .collect()
}

/// Indices into the executor's layer list of the pictures decoded for one
/// track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pictures {
    pub clip: Option<usize>,
    pub outgoing: Option<usize>,
}

/// Source node for `layer` followed by the clip's video filters active at
/// `pts`, each spliced after the previous one.
fn clip_chain(graph: &mut RenderGraph, clip: &Clip, layer: usize, pts: Pts, profile: &Profile) -> NodeId {
    let mut node = graph.add_node(NodeOp::Source { layer }, &[]);
    let source_pts = clip.source_pts(pts);
    for filter in clip.video_filters_at(pts) {
        if let Filter::Video(f) = filter {
            node = graph.splice(&f.graph(source_pts, profile), node);
        }
    }
    node
}

/// Build the graph for one output frame.
///
/// Tracks are composited back to front: the highest track index is the
/// bottom layer. Inside a transition the outgoing and incoming chains meet
/// in the transition's blend node. A track whose pictures are missing is
/// left out; with nothing to show the graph renders an empty source.
pub fn build_render_graph(plan: &[LayerPlan], pictures: &[Pictures], pts: Pts, profile: &Profile) -> RenderGraph {
    let mut graph = RenderGraph::new();
    let mut current: Option<NodeId> = None;

    for (layer, pics) in plan.iter().zip(pictures).rev() {
        let incoming = pics
            .clip
            .map(|i| clip_chain(&mut graph, &layer.clip, i, pts, profile));
        let outgoing = match (pics.outgoing, &layer.outgoing) {
            (Some(i), Some(clip)) => Some(clip_chain(&mut graph, clip, i, pts, profile)),
            _ => None,
        };
        let node = match (outgoing, incoming, &layer.transition) {
            (Some(out), Some(inc), Some(t)) => graph.add_node(t.style.node(t.progress(pts)), &[out, inc]),
            (out, inc, _) => match inc.or(out) {
                Some(n) => n,
                None => continue,
            },
        };
        current = Some(match current {
            Some(below) => graph.add_node(
                NodeOp::Composite {
                    blend: BlendMode::Normal,
                    opacity: 1.0,
                },
                &[below, node],
            ),
            None => node,
        });
    }

    let top = current.unwrap_or_else(|| graph.add_node(NodeOp::Source { layer: 0 }, &[]));
    graph.add_node(NodeOp::Output, &[top]);
    graph
}
