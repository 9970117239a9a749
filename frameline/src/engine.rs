// Copyright (C) 2025 Category Labs, Inc.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use trace_format::{Phase, TraceRecord};

use crate::classify::{classify, ThreadRoles};
use crate::config::{ConfigError, TrackConfig};
use crate::frame::{FrameRecord, PIPELINE_ITEM};
use crate::store::TimelineStore;
use crate::tree::{EventNode, NodeId, TimeRange, TrackType};

/// One active nesting stack per duration track. Multiple thread ids may feed
/// the same stack; async records never touch these.
#[derive(Debug, Default)]
struct OpenStacks {
    ui: Vec<NodeId>,
    raster: Vec<NodeId>,
    unknown: Vec<NodeId>,
}

impl OpenStacks {
    fn stack(&self, track: TrackType) -> &Vec<NodeId> {
        match track {
            TrackType::Ui => &self.ui,
            TrackType::Raster => &self.raster,
            TrackType::Unknown => &self.unknown,
            TrackType::Async => unreachable!("async records are correlated by id, not by stack"),
        }
    }

    fn stack_mut(&mut self, track: TrackType) -> &mut Vec<NodeId> {
        match track {
            TrackType::Ui => &mut self.ui,
            TrackType::Raster => &mut self.raster,
            TrackType::Unknown => &mut self.unknown,
            TrackType::Async => unreachable!("async records are correlated by id, not by stack"),
        }
    }

    fn clear(&mut self) {
        self.ui.clear();
        self.raster.clear();
        self.unknown.clear();
    }
}

/// Pending-frame table keyed by pipeline item id, in creation order. Flow
/// attachment scans it front to back, so the earliest matching scheduling
/// window wins.
#[derive(Debug, Default)]
struct PendingFrames {
    frames: Vec<FrameRecord>,
}

impl PendingFrames {
    fn contains(&self, id: &str) -> bool {
        self.frames.iter().any(|frame| frame.id == id)
    }

    fn insert(&mut self, frame: FrameRecord) {
        self.frames.push(frame);
    }

    fn get(&self, id: &str) -> Option<&FrameRecord> {
        self.frames.iter().find(|frame| frame.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut FrameRecord> {
        self.frames.iter_mut().find(|frame| frame.id == id)
    }

    fn remove(&mut self, id: &str) -> Option<FrameRecord> {
        let index = self.frames.iter().position(|frame| frame.id == id)?;
        Some(self.frames.remove(index))
    }

    fn iter(&self) -> impl Iterator<Item = &FrameRecord> {
        self.frames.iter()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut FrameRecord> {
        self.frames.iter_mut()
    }

    fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Stateful reconstruction engine.
///
/// Consumes decoded records in input order and rebuilds duration-span trees
/// and frame records into its [`TimelineStore`]. All anomaly handling is
/// best-effort recovery: no input condition fails the engine, anomalies only
/// change the shape of the output collections.
///
/// Processing is single-threaded; one engine instance reconstructs one
/// logical stream. State persists across [`TimelineProcessor::process`]
/// calls, so a caller embedded in a latency-sensitive host can feed one
/// stream in chunks and yield between them.
pub struct TimelineProcessor {
    roles: ThreadRoles,
    open: OpenStacks,
    open_async: HashMap<String, NodeId>,
    pending: PendingFrames,
    /// Ids of finalized frames; a retired frame is never resurrected by a
    /// late duplicate of its begin marker.
    retired: HashSet<String>,
    store: TimelineStore,
}

impl TimelineProcessor {
    pub fn new(config: &TrackConfig) -> Result<Self, ConfigError> {
        Ok(TimelineProcessor {
            roles: ThreadRoles::from_config(config)?,
            open: OpenStacks::default(),
            open_async: HashMap::new(),
            pending: PendingFrames::default(),
            retired: HashSet::new(),
            store: TimelineStore::new(),
        })
    }

    /// Consumes a batch of records. With `reset_beforehand` the engine and
    /// result store are cleared first; otherwise state carries over from the
    /// previous call and the batch is treated as the next chunk of the same
    /// logical stream.
    pub fn process(&mut self, records: &[TraceRecord], reset_beforehand: bool) {
        if reset_beforehand {
            self.reset();
        }
        for record in records {
            self.process_record(record);
        }
    }

    pub fn process_record(&mut self, record: &TraceRecord) {
        if record.name == PIPELINE_ITEM {
            self.handle_pipeline_marker(record);
            return;
        }
        match classify(record, &self.roles) {
            TrackType::Async => self.handle_async(record),
            track => self.handle_duration(track, record),
        }
    }

    /// Clears open stacks, the async table, the pending-frame table and the
    /// result store wholesale. Every previously returned [`NodeId`] is
    /// invalid afterwards.
    pub fn reset(&mut self) {
        self.open.clear();
        self.open_async.clear();
        self.pending.clear();
        self.retired.clear();
        self.store.clear();
    }

    pub fn store(&self) -> &TimelineStore {
        &self.store
    }

    pub fn into_store(self) -> TimelineStore {
        self.store
    }

    /// Diagnostics view of frames still waiting for flows or their pipeline
    /// end marker. Frames never finalized by stream exhaustion stay here.
    pub fn pending_frames(&self) -> impl Iterator<Item = &FrameRecord> {
        self.pending.iter()
    }

    fn handle_duration(&mut self, track: TrackType, record: &TraceRecord) {
        match record.ph {
            Phase::Begin => self.begin_span(track, record),
            Phase::End => self.end_span(track, record),
            Phase::Complete | Phase::Instant => self.leaf_span(track, record),
            Phase::AsyncBegin | Phase::AsyncInstant | Phase::AsyncEnd => {}
        }
    }

    fn begin_span(&mut self, track: TrackType, record: &TraceRecord) {
        if let Some(&top) = self.open.stack(track).last() {
            let node = self.store.arena().node(top);
            if node.is_open()
                && node.name == record.name
                && node.category == record.cat
                && node.time.start == Some(record.ts)
            {
                debug!(
                    name = %record.name,
                    tid = record.tid,
                    ts = record.ts,
                    "discarding duplicate begin"
                );
                return;
            }
        }
        let mut node = EventNode::new(record.name.clone(), record.cat.clone(), track);
        node.time.start = Some(record.ts);
        let parent = self.open.stack(track).last().copied();
        let id = self.store.arena_mut().alloc(node);
        if let Some(parent) = parent {
            self.store.arena_mut().attach_child(parent, id);
        }
        self.open.stack_mut(track).push(id);
    }

    fn end_span(&mut self, track: TrackType, record: &TraceRecord) {
        let Some(&top) = self.open.stack(track).last() else {
            debug!(name = %record.name, tid = record.tid, "discarding stray end");
            return;
        };
        if self.store.arena().node(top).name == record.name {
            self.open.stack_mut(track).pop();
            self.store.arena_mut().node_mut(top).time.end = Some(record.ts);
            if self.open.stack(track).is_empty() {
                self.emit_root(top, track);
            }
            return;
        }
        // one level of duplicate tolerance: when the entry below the top
        // matches, the top is a phantom span left behind by a doubled record
        let depth = self.open.stack(track).len();
        if depth >= 2 {
            let below = self.open.stack(track)[depth - 2];
            if self.store.arena().node(below).name == record.name {
                debug!(
                    name = %record.name,
                    phantom = %self.store.arena().node(top).name,
                    tid = record.tid,
                    "dropping phantom span from duplicated end"
                );
                self.open.stack_mut(track).pop();
                self.store.arena_mut().detach_child(below, top);
                self.open.stack_mut(track).pop();
                self.store.arena_mut().node_mut(below).time.end = Some(record.ts);
                if self.open.stack(track).is_empty() {
                    self.emit_root(below, track);
                }
                return;
            }
        }
        debug!(
            name = %record.name,
            expected = %self.store.arena().node(top).name,
            tid = record.tid,
            depth,
            "unrecoverable nesting, clearing track stack"
        );
        self.open.stack_mut(track).clear();
    }

    fn leaf_span(&mut self, track: TrackType, record: &TraceRecord) {
        let end = match record.ph {
            Phase::Complete => record.ts.saturating_add(record.dur.unwrap_or(0)),
            _ => record.ts,
        };
        let mut node = EventNode::new(record.name.clone(), record.cat.clone(), track);
        node.time = TimeRange::span(record.ts, end);
        let parent = self.open.stack(track).last().copied();
        let id = self.store.arena_mut().alloc(node);
        match parent {
            Some(parent) => self.store.arena_mut().attach_child(parent, id),
            None => self.store.push_event(id),
        }
    }

    /// Routes a completed root either into a pending frame's flow slot or
    /// into the result store's event list.
    fn emit_root(&mut self, root: NodeId, track: TrackType) {
        if matches!(track, TrackType::Ui | TrackType::Raster) && self.try_attach_flow(root, track) {
            return;
        }
        self.store.push_event(root);
    }

    fn try_attach_flow(&mut self, root: NodeId, track: TrackType) -> bool {
        let candidate = self.store.arena().node(root).time;
        let mut attached = None;
        for frame in self.pending.iter_mut() {
            if frame.flow(track).is_some() || !frame.window_contains(candidate) {
                continue;
            }
            if frame.set_event_flow(self.store.arena(), root, track) {
                attached = Some(frame.id.clone());
                break;
            }
        }
        match attached {
            Some(id) => {
                self.finalize_if_ready(&id);
                true
            }
            None => false,
        }
    }

    fn finalize_if_ready(&mut self, id: &str) {
        let ready = self.pending.get(id).map(FrameRecord::is_ready).unwrap_or(false);
        if !ready {
            return;
        }
        if let Some(frame) = self.pending.remove(id) {
            debug!(frame = %frame.id, time = %frame.derived_time, "frame completed");
            self.retired.insert(frame.id.clone());
            self.store.push_frame(frame);
        }
    }

    fn handle_pipeline_marker(&mut self, record: &TraceRecord) {
        let Some(frame_id) = record.async_id() else {
            debug!(tid = record.tid, ts = record.ts, "discarding pipeline marker without frame id");
            return;
        };
        match record.ph {
            Phase::Begin | Phase::AsyncBegin => {
                if self.pending.contains(&frame_id) || self.retired.contains(&frame_id) {
                    debug!(frame = %frame_id, "discarding duplicate pipeline begin");
                    return;
                }
                self.pending.insert(FrameRecord::new(frame_id, record.ts));
            }
            Phase::End | Phase::AsyncEnd => {
                let Some(frame) = self.pending.get_mut(&frame_id) else {
                    debug!(frame = %frame_id, "discarding pipeline end for unknown frame");
                    return;
                };
                frame.mark_pipeline_end(record.ts);
                self.finalize_if_ready(&frame_id);
            }
            Phase::Complete | Phase::Instant | Phase::AsyncInstant => {}
        }
    }

    fn handle_async(&mut self, record: &TraceRecord) {
        let Some(key) = record.async_id() else {
            debug!(name = %record.name, tid = record.tid, "discarding async record without id");
            return;
        };
        match record.ph {
            Phase::AsyncBegin => {
                let mut node =
                    EventNode::new(record.name.clone(), record.cat.clone(), TrackType::Async);
                node.time.start = Some(record.ts);
                node.async_id = Some(key.clone());
                let id = self.store.arena_mut().alloc(node);
                if let Some(parent) = record
                    .parent_async_id()
                    .and_then(|parent_key| self.open_async.get(&parent_key).copied())
                {
                    self.store.arena_mut().attach_child(parent, id);
                }
                if self.open_async.insert(key.clone(), id).is_some() {
                    debug!(async_id = %key, "async begin replaced an already-open operation");
                }
            }
            Phase::AsyncInstant => {
                let Some(&open) = self.open_async.get(&key) else {
                    debug!(async_id = %key, "discarding async instant for unknown operation");
                    return;
                };
                let mut node =
                    EventNode::new(record.name.clone(), record.cat.clone(), TrackType::Async);
                node.time = TimeRange::point(record.ts);
                let id = self.store.arena_mut().alloc(node);
                self.store.arena_mut().attach_child(open, id);
            }
            Phase::AsyncEnd => {
                let Some(open) = self.open_async.remove(&key) else {
                    debug!(async_id = %key, "discarding async end for unknown operation");
                    return;
                };
                self.store.arena_mut().node_mut(open).time.end = Some(record.ts);
                if self.store.arena().node(open).parent().is_none() {
                    self.store.push_event(open);
                }
            }
            Phase::Begin | Phase::End | Phase::Complete | Phase::Instant => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use trace_format::{Id, TraceRecord};

    #[fixture]
    fn engine() -> TimelineProcessor {
        TimelineProcessor::new(&TrackConfig {
            ui_threads: vec![1],
            raster_threads: vec![2],
        })
        .unwrap()
    }

    fn record(name: &str, ph: Phase, tid: u32, ts: u64) -> TraceRecord {
        TraceRecord::builder()
            .name(name)
            .cat("engine")
            .ph(ph)
            .ts(ts)
            .pid(1)
            .tid(tid)
            .build()
    }

    fn async_record(name: &str, ph: Phase, ts: u64, id: &str) -> TraceRecord {
        TraceRecord::builder()
            .name(name)
            .cat("engine")
            .ph(ph)
            .ts(ts)
            .pid(1)
            .tid(1)
            .id(Id::String(id.to_string()))
            .build()
    }

    #[rstest]
    fn test_duplicate_begin_discarded(mut engine: TimelineProcessor) {
        engine.process_record(&record("build", Phase::Begin, 1, 1000));
        engine.process_record(&record("build", Phase::Begin, 1, 1000));

        assert_eq!(engine.open.ui.len(), 1);
        assert_eq!(engine.store.arena().len(), 1);
    }

    #[rstest]
    fn test_same_name_different_start_nests(mut engine: TimelineProcessor) {
        engine.process_record(&record("build", Phase::Begin, 1, 1000));
        engine.process_record(&record("build", Phase::Begin, 1, 1500));

        assert_eq!(engine.open.ui.len(), 2);
    }

    #[rstest]
    fn test_stray_end_discarded(mut engine: TimelineProcessor) {
        engine.process_record(&record("build", Phase::End, 1, 1000));

        assert!(engine.open.ui.is_empty());
        assert!(engine.store.arena().is_empty());
        assert!(engine.store.events().is_empty());
    }

    #[rstest]
    fn test_duplicated_end_drops_phantom_span(mut engine: TimelineProcessor) {
        engine.process_record(&record("outer", Phase::Begin, 1, 1000));
        engine.process_record(&record("phantom", Phase::Begin, 1, 1200));
        engine.process_record(&record("outer", Phase::End, 1, 2000));

        assert!(engine.open.ui.is_empty());
        assert_eq!(engine.store.events().len(), 1);
        let root = engine.store.events()[0];
        let node = engine.store.arena().node(root);
        assert_eq!(node.name, "outer");
        assert_eq!(node.time, TimeRange::span(1000, 2000));
        assert!(node.children().is_empty());
    }

    #[rstest]
    fn test_unrecoverable_nesting_clears_track(mut engine: TimelineProcessor) {
        engine.process_record(&record("a", Phase::Begin, 1, 1000));
        engine.process_record(&record("b", Phase::Begin, 1, 1100));
        engine.process_record(&record("c", Phase::End, 1, 1200));

        assert!(engine.open.ui.is_empty());
        assert!(engine.store.events().is_empty());

        // the track recovers and processes subsequent records cleanly
        engine.process_record(&record("d", Phase::Begin, 1, 2000));
        engine.process_record(&record("d", Phase::End, 1, 2500));
        assert_eq!(engine.store.events().len(), 1);
        assert_eq!(
            engine.store.arena().node(engine.store.events()[0]).name,
            "d"
        );
    }

    #[rstest]
    fn test_unrecoverable_reset_is_per_track(mut engine: TimelineProcessor) {
        engine.process_record(&record("raster_work", Phase::Begin, 2, 900));
        engine.process_record(&record("a", Phase::Begin, 1, 1000));
        engine.process_record(&record("c", Phase::End, 1, 1200));

        assert!(engine.open.ui.is_empty());
        assert_eq!(engine.open.raster.len(), 1);
    }

    #[rstest]
    fn test_instant_is_never_pushed(mut engine: TimelineProcessor) {
        engine.process_record(&record("marker", Phase::Instant, 1, 1000));

        assert!(engine.open.ui.is_empty());
        assert_eq!(engine.store.events().len(), 1);
        let node = engine.store.arena().node(engine.store.events()[0]);
        assert_eq!(node.time, TimeRange::point(1000));
    }

    #[rstest]
    fn test_complete_closes_at_ts_plus_dur(mut engine: TimelineProcessor) {
        let complete = TraceRecord::builder()
            .name("upload")
            .cat("engine")
            .ph(Phase::Complete)
            .ts(1000)
            .pid(1)
            .tid(1)
            .dur(250)
            .build();
        engine.process_record(&record("outer", Phase::Begin, 1, 500));
        engine.process_record(&complete);
        engine.process_record(&record("outer", Phase::End, 1, 2000));

        let root = engine.store.events()[0];
        let children = engine.store.arena().node(root).children();
        assert_eq!(children.len(), 1);
        assert_eq!(
            engine.store.arena().node(children[0]).time,
            TimeRange::span(1000, 1250)
        );
    }

    #[rstest]
    fn test_unknown_thread_uses_its_own_track(mut engine: TimelineProcessor) {
        engine.process_record(&record("mystery", Phase::Begin, 42, 1000));

        assert!(engine.open.ui.is_empty());
        assert!(engine.open.raster.is_empty());
        assert_eq!(engine.open.unknown.len(), 1);
        assert_eq!(
            engine.store.arena().node(engine.open.unknown[0]).track,
            TrackType::Unknown
        );
    }

    #[rstest]
    fn test_async_end_without_begin_discarded(mut engine: TimelineProcessor) {
        engine.process_record(&async_record("op", Phase::AsyncEnd, 1000, "missing"));

        assert!(engine.store.arena().is_empty());
        assert!(engine.open_async.is_empty());
    }

    #[rstest]
    fn test_async_instant_attaches_to_open_operation(mut engine: TimelineProcessor) {
        engine.process_record(&async_record("op", Phase::AsyncBegin, 1000, "x"));
        engine.process_record(&async_record("step", Phase::AsyncInstant, 1500, "x"));
        engine.process_record(&async_record("op", Phase::AsyncEnd, 2000, "x"));

        assert_eq!(engine.store.events().len(), 1);
        let root = engine.store.events()[0];
        let node = engine.store.arena().node(root);
        assert_eq!(node.async_id.as_deref(), Some("x"));
        assert_eq!(node.children().len(), 1);
    }

    #[rstest]
    fn test_async_child_nests_under_parent(mut engine: TimelineProcessor) {
        engine.process_record(&async_record("parent", Phase::AsyncBegin, 1000, "p"));
        let child = TraceRecord::builder()
            .name("child")
            .cat("engine")
            .ph(Phase::AsyncBegin)
            .ts(1100)
            .pid(1)
            .tid(1)
            .id(Id::String("c".to_string()))
            .args(serde_json::json!({"parentId": "p"}))
            .build();
        engine.process_record(&child);
        engine.process_record(&async_record("child", Phase::AsyncEnd, 1400, "c"));
        engine.process_record(&async_record("parent", Phase::AsyncEnd, 1500, "p"));

        // only the parent is a root; the child closed into its child list
        assert_eq!(engine.store.events().len(), 1);
        let root = engine.store.arena().node(engine.store.events()[0]);
        assert_eq!(root.name, "parent");
        assert_eq!(root.children().len(), 1);
    }

    #[rstest]
    fn test_pipeline_end_for_unknown_frame_discarded(mut engine: TimelineProcessor) {
        engine.process_record(&async_record(PIPELINE_ITEM, Phase::AsyncEnd, 1000, "f9"));

        assert_eq!(engine.pending_frames().count(), 0);
        assert!(engine.store.frames().is_empty());
    }

    #[rstest]
    fn test_retired_frame_is_not_resurrected(mut engine: TimelineProcessor) {
        engine.process_record(&async_record(PIPELINE_ITEM, Phase::AsyncBegin, 1000, "f1"));
        engine.process_record(&record("vsync", Phase::Begin, 1, 1500));
        engine.process_record(&record("vsync", Phase::End, 1, 2000));
        engine.process_record(&record("rasterize", Phase::Begin, 2, 2100));
        engine.process_record(&record("rasterize", Phase::End, 2, 2600));
        engine.process_record(&async_record(PIPELINE_ITEM, Phase::AsyncEnd, 3000, "f1"));
        assert_eq!(engine.store.frames().len(), 1);

        engine.process_record(&async_record(PIPELINE_ITEM, Phase::AsyncBegin, 4000, "f1"));
        assert_eq!(engine.pending_frames().count(), 0);
        assert_eq!(engine.store.frames().len(), 1);
    }

    #[rstest]
    fn test_completion_gating_single_flow(mut engine: TimelineProcessor) {
        engine.process_record(&async_record(PIPELINE_ITEM, Phase::AsyncBegin, 1000, "f1"));
        engine.process_record(&record("vsync", Phase::Begin, 1, 2000));
        engine.process_record(&record("vsync", Phase::End, 1, 3000));
        engine.process_record(&async_record(PIPELINE_ITEM, Phase::AsyncEnd, 5000, "f1"));

        // one flow attached, pipeline end observed: still pending
        assert!(engine.store.frames().is_empty());
        let pending: Vec<_> = engine.pending_frames().collect();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].ui_flow.is_some());
        assert!(pending[0].raster_flow.is_none());
    }
}
