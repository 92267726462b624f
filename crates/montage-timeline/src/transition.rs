//! Overlap regions between neighbouring clips.

use crate::clip::ClipId;
use montage_core::Pts;
use montage_effects::{TransitionCurve, TransitionStyle};

/// Blend region at the head of a clip that starts before its predecessor
/// ends. Derived from placement; the scene recomputes it after every edit
/// and keeps only the style and curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Timeline start, equal to the owning clip's position.
    pub position: Pts,
    pub length: Pts,
    /// The outgoing clip.
    pub from: ClipId,
    pub style: TransitionStyle,
    pub curve: TransitionCurve,
}

impl Transition {
    pub fn new(position: Pts, length: Pts, from: ClipId) -> Self {
        Self {
            position,
            length,
            from,
            style: TransitionStyle::default(),
            curve: TransitionCurve::default(),
        }
    }

    #[inline]
    pub fn end(&self) -> Pts {
        self.position + self.length
    }

    #[inline]
    pub fn contains(&self, pts: Pts) -> bool {
        pts >= self.position && pts < self.end()
    }

    /// Progress of the incoming clip at `pts`, 0 to 1.
    pub fn progress(&self, pts: Pts) -> f32 {
        self.curve.progress(pts, self.position, self.length)
    }
}
