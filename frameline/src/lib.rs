//! Reconstruction of timeline event trees and frame records from a decoded
//! rendering-engine trace stream.
//!
//! The engine consumes [`trace_format::TraceRecord`] sequences in input order
//! and rebuilds two derived structures: nested duration-span trees (one root
//! per top-level span on a logical track) and frame records correlating the
//! UI-thread and raster-thread work that produced one rendered frame.
//! Malformed input (duplicates, stray ends, inconsistent nesting) degrades
//! the output shape instead of failing; see [`engine::TimelineProcessor`].

pub mod classify;
pub mod config;
pub mod engine;
pub mod frame;
pub mod queries;
pub mod store;
pub mod tree;

pub use classify::{classify, ThreadRoles};
pub use config::{ConfigError, TrackConfig};
pub use engine::TimelineProcessor;
pub use frame::{FlowState, FrameRecord, PIPELINE_ITEM};
pub use store::TimelineStore;
pub use tree::{EventArena, EventNode, NodeId, TimeRange, TrackType};
