use tracing::debug;

use crate::tree::{EventArena, NodeId, TimeRange, TrackType};

/// Record name of the pipeline-item markers that correlate one frame's UI
/// and raster work by shared id.
pub const PIPELINE_ITEM: &str = "PipelineItem";

/// Frame readiness state machine. A frame leaves the pending table only when
/// it reaches `Ready`: both flows attached and the pipeline-end marker
/// observed, in any order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Empty,
    Partial,
    Ready,
}

/// Correlation record for one rendered frame, keyed by pipeline item id.
///
/// Holds the UI and raster tree roots it owns (as arena ids) plus the raw
/// scheduling window from the pipeline marker and a derived time range
/// recomputed as flows attach.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub id: String,
    /// Raw scheduling window from the pipeline-item marker. `end` stays
    /// unset until the matching end marker is observed.
    pub pipeline_time: TimeRange,
    pub ui_flow: Option<NodeId>,
    pub raster_flow: Option<NodeId>,
    /// Recomputed from attached flows: earliest flow start, latest flow end.
    /// The end bound is monotonic and never retracts.
    pub derived_time: TimeRange,
    state: FlowState,
}

impl FrameRecord {
    pub fn new(id: String, pipeline_start: u64) -> Self {
        FrameRecord {
            id,
            pipeline_time: TimeRange {
                start: Some(pipeline_start),
                end: None,
            },
            ui_flow: None,
            raster_flow: None,
            derived_time: TimeRange::default(),
            state: FlowState::Empty,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == FlowState::Ready
    }

    pub fn flow(&self, track: TrackType) -> Option<NodeId> {
        match track {
            TrackType::Ui => self.ui_flow,
            TrackType::Raster => self.raster_flow,
            TrackType::Async | TrackType::Unknown => None,
        }
    }

    /// Records the pipeline-end marker timestamp and re-evaluates readiness.
    pub fn mark_pipeline_end(&mut self, ts: u64) {
        self.pipeline_time.end = Some(ts);
        self.update_state();
    }

    /// Whether a bounded candidate range lies within the pipeline scheduling
    /// window. The window is open-ended while the pipeline end is unobserved.
    pub fn window_contains(&self, candidate: TimeRange) -> bool {
        let (Some(start), Some(end)) = (candidate.start, candidate.end) else {
            return false;
        };
        let Some(window_start) = self.pipeline_time.start else {
            return false;
        };
        if start < window_start {
            return false;
        }
        match self.pipeline_time.end {
            Some(window_end) => end <= window_end,
            None => true,
        }
    }

    /// Cross-thread causal ordering check for a candidate flow.
    ///
    /// The candidate's range must lie within the pipeline scheduling window.
    /// A raster flow must additionally start no earlier than an
    /// already-attached UI flow; a UI flow is never blocked by an existing
    /// raster flow, since raster work is expected to follow UI work.
    pub fn satisfies_ui_raster_order(
        &self,
        arena: &EventArena,
        candidate: TimeRange,
        track: TrackType,
    ) -> bool {
        if !self.window_contains(candidate) {
            return false;
        }
        if track == TrackType::Raster {
            if let (Some(ui), Some(candidate_start)) = (self.ui_flow, candidate.start) {
                let ui_start = arena.node(ui).time.start;
                if ui_start.map_or(true, |s| s > candidate_start) {
                    return false;
                }
            }
        }
        true
    }

    /// Attaches `node` as this frame's UI or raster flow if the slot is free
    /// and the ordering check passes. Returns whether the node was attached;
    /// rejected candidates stay ordinary tree roots.
    pub fn set_event_flow(&mut self, arena: &EventArena, node: NodeId, track: TrackType) -> bool {
        if self.flow(track).is_some() {
            return false;
        }
        let candidate = arena.node(node).time;
        if !self.satisfies_ui_raster_order(arena, candidate, track) {
            debug!(
                frame = %self.id,
                track = ?track,
                candidate = %candidate,
                window = %self.pipeline_time,
                "rejecting out-of-order frame flow"
            );
            return false;
        }
        match track {
            TrackType::Ui => self.ui_flow = Some(node),
            TrackType::Raster => self.raster_flow = Some(node),
            TrackType::Async | TrackType::Unknown => return false,
        }
        self.recompute_derived_time(arena, node);
        self.update_state();
        true
    }

    fn recompute_derived_time(&mut self, arena: &EventArena, attached: NodeId) {
        self.derived_time.start = [self.ui_flow, self.raster_flow]
            .into_iter()
            .flatten()
            .filter_map(|id| arena.node(id).time.start)
            .min();
        // end only ever moves later: a later-completing flow extends the
        // frame, an earlier-completing one never retracts it
        if let Some(new_end) = arena.node(attached).time.end {
            if self.derived_time.end.map_or(true, |end| new_end > end) {
                self.derived_time.end = Some(new_end);
            }
        }
    }

    fn update_state(&mut self) {
        let flows = self.ui_flow.is_some() as usize + self.raster_flow.is_some() as usize;
        self.state = if flows == 2 && self.pipeline_time.end.is_some() {
            FlowState::Ready
        } else if flows > 0 {
            FlowState::Partial
        } else {
            FlowState::Empty
        };
    }
}
