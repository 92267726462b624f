//! Clip placements and their effect chains.

use crate::source::Source;
use crate::transition::Transition;
use montage_core::{Pts, PTS_EPSILON};
use montage_effects::Filter;
use std::sync::Arc;
use uuid::Uuid;

pub type ClipId = Uuid;

/// A filter applied over part of a clip.
#[derive(Debug, Clone)]
pub struct PlacedFilter {
    pub filter: Filter,
    /// Start relative to the clip position.
    pub offset: Pts,
    /// `None` runs to the end of the clip.
    pub length: Option<Pts>,
}

impl PlacedFilter {
    /// A filter covering the whole clip.
    pub fn whole(filter: Filter) -> Self {
        Self {
            filter,
            offset: 0.0,
            length: None,
        }
    }

    pub fn new(filter: Filter, offset: Pts, length: Pts) -> Self {
        Self {
            filter,
            offset,
            length: Some(length),
        }
    }

    /// Whether the filter applies at `rel`, relative to the clip position.
    pub fn covers(&self, rel: Pts) -> bool {
        rel >= self.offset && self.length.map_or(true, |l| rel < self.offset + l)
    }

    /// Portion of the filter falling inside `[from, to)`, rebased to `from`.
    fn slice(&self, from: Pts, to: Pts) -> Option<Self> {
        let start = self.offset.max(from);
        let end = self.length.map_or(to, |l| (self.offset + l).min(to));
        if end - start <= PTS_EPSILON {
            return None;
        }
        Some(Self {
            filter: self.filter.clone(),
            offset: start - from,
            length: self.length.map(|_| end - start),
        })
    }
}

/// A cut of a source placed on a track.
#[derive(Debug, Clone)]
pub struct Clip {
    id: ClipId,
    source: Arc<Source>,
    /// Timeline position.
    pub(crate) position: Pts,
    /// Source timestamp shown at `position`.
    pub(crate) start: Pts,
    /// Timeline length.
    pub(crate) length: Pts,
    pub(crate) speed: f64,
    pub video_filters: Vec<PlacedFilter>,
    pub audio_filters: Vec<PlacedFilter>,
    /// Blend with the previous clip on the same track.
    pub(crate) transition: Option<Transition>,
}

impl Clip {
    pub(crate) fn new(source: Arc<Source>, position: Pts, start: Pts, length: Pts) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            position,
            start,
            length,
            speed: 1.0,
            video_filters: Vec::new(),
            audio_filters: Vec::new(),
            transition: None,
        }
    }

    #[inline]
    pub fn id(&self) -> ClipId {
        self.id
    }

    #[inline]
    pub fn source(&self) -> &Arc<Source> {
        &self.source
    }

    #[inline]
    pub fn position(&self) -> Pts {
        self.position
    }

    #[inline]
    pub fn start(&self) -> Pts {
        self.start
    }

    #[inline]
    pub fn length(&self) -> Pts {
        self.length
    }

    #[inline]
    pub fn end(&self) -> Pts {
        self.position + self.length
    }

    #[inline]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Playback speed; negative speeds are not supported.
    pub fn set_speed(&mut self, speed: f64) {
        if speed > 0.0 {
            self.speed = speed;
        }
    }

    #[inline]
    pub fn transition(&self) -> Option<&Transition> {
        self.transition.as_ref()
    }

    /// Mutable access to the style and curve of the head transition.
    pub fn transition_mut(&mut self) -> Option<&mut Transition> {
        self.transition.as_mut()
    }

    #[inline]
    pub fn contains(&self, pts: Pts) -> bool {
        pts >= self.position && pts < self.end()
    }

    /// Source timestamp shown at timeline `pts`.
    pub fn source_pts(&self, pts: Pts) -> Pts {
        self.start + (pts - self.position) * self.speed
    }

    /// Source time consumed by the whole clip.
    pub fn source_length(&self) -> Pts {
        self.length * self.speed
    }

    /// Video filters active at timeline `pts`.
    pub fn video_filters_at(&self, pts: Pts) -> impl Iterator<Item = &Filter> {
        let rel = pts - self.position;
        self.video_filters
            .iter()
            .filter(move |f| f.covers(rel))
            .map(|f| &f.filter)
    }

    /// Audio filters active at timeline `pts`.
    pub fn audio_filters_at(&self, pts: Pts) -> impl Iterator<Item = &Filter> {
        let rel = pts - self.position;
        self.audio_filters
            .iter()
            .filter(move |f| f.covers(rel))
            .map(|f| &f.filter)
    }

    /// Cut at timeline `pts`: this clip keeps the head, the returned clip
    /// is the tail. Filters are divided at the cut. `pts` must lie strictly
    /// inside the clip.
    pub(crate) fn split_off(&mut self, pts: Pts) -> Clip {
        let rel = pts - self.position;
        let split = |filters: &[PlacedFilter], from: Pts, to: Pts| -> Vec<PlacedFilter> {
            filters.iter().filter_map(|f| f.slice(from, to)).collect()
        };
        let tail = Clip {
            id: Uuid::new_v4(),
            source: Arc::clone(&self.source),
            position: pts,
            start: self.source_pts(pts),
            length: self.length - rel,
            speed: self.speed,
            video_filters: split(&self.video_filters, rel, self.length),
            audio_filters: split(&self.audio_filters, rel, self.length),
            transition: None,
        };
        self.video_filters = split(&self.video_filters, 0.0, rel);
        self.audio_filters = split(&self.audio_filters, 0.0, rel);
        self.length = rel;
        tail
    }
}
