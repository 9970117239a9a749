use crate::frame::FrameRecord;
use crate::tree::{EventArena, NodeId};

/// Growable collection of completed tree roots and completed frames.
///
/// The store owns the node arena, so clearing it invalidates every
/// outstanding [`NodeId`] in one step. Only the engine mutates the store;
/// readers treat it as a read-only snapshot per call.
#[derive(Debug, Default)]
pub struct TimelineStore {
    arena: EventArena,
    events: Vec<NodeId>,
    frames: Vec<FrameRecord>,
}

impl TimelineStore {
    pub fn new() -> Self {
        TimelineStore::default()
    }

    pub fn arena(&self) -> &EventArena {
        &self.arena
    }

    pub(crate) fn arena_mut(&mut self) -> &mut EventArena {
        &mut self.arena
    }

    /// Completed tree roots, in completion order.
    pub fn events(&self) -> &[NodeId] {
        &self.events
    }

    /// Completed frames, in completion order.
    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    pub(crate) fn push_event(&mut self, root: NodeId) {
        self.events.push(root);
    }

    pub(crate) fn push_frame(&mut self, frame: FrameRecord) {
        self.frames.push(frame);
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.events.clear();
        self.frames.clear();
    }
}
