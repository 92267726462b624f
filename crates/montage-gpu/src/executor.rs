//! Render backends that turn a render graph into an output frame.

use crate::render_graph::RenderGraph;
use montage_core::{Frame, Result};

/// Executes render graphs for the composer.
///
/// `layers` are the decoded frames that `Source` nodes index. `target`
/// arrives with its output profile and PTS set; the executor attaches the
/// rendered payload (pixels or a texture plus fence).
pub trait GraphExecutor: Send {
    fn name(&self) -> &'static str;

    fn execute(&mut self, graph: &RenderGraph, layers: &[&Frame], target: &mut Frame) -> Result<()>;
}
