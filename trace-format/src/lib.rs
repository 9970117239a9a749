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

//! # Trace Record Format
//!
//! This crate provides Rust types for the decoded trace records emitted by a
//! rendering engine's tracing subsystem. It is the input contract for the
//! `frameline` reconstruction engine: any upstream decoder that produces a
//! sequence of [`TraceRecord`] values can drive reconstruction, regardless of
//! the wire format it decoded them from.
//!
//! The record shape follows the Chrome Trace Event Format's JSON fields
//! (`name`, `cat`, `ph`, `ts`, `pid`, `tid`, `args`, `id`, `dur`), restricted
//! to the phases the reconstruction engine consumes:
//!
//! - **Duration Events** (B/E): Mark the beginning and end of nested work
//!   spans on a thread
//! - **Complete Events** (X): Combine begin/end into a single record with an
//!   explicit duration
//! - **Instant Events** (i): Mark points in time with no duration
//! - **Async Events** (b/n/e): Track operations whose begin/end pairs do not
//!   nest on a single thread, correlated by id
//!
//! ## Timestamps
//!
//! All timestamps are in microseconds. Records are expected in non-decreasing
//! timestamp order; consumers must tolerate violations without failing.

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record phase, determining how a record advances reconstruction.
///
/// Serialized with the single-character phase codes of the Chrome Trace Event
/// Format, so decoded JSON streams map onto this enum directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Begin phase of a duration span.
    /// Must be paired with a corresponding End (E) record on the same track.
    #[serde(rename = "B")]
    Begin,
    /// End phase of a duration span.
    /// Must follow a corresponding Begin (B) record on the same track.
    #[serde(rename = "E")]
    End,
    /// Complete span combining begin and end with an explicit duration.
    #[serde(rename = "X")]
    Complete,
    /// Instant record with no duration.
    #[serde(rename = "i")]
    Instant,
    /// Begin phase of an async operation, correlated by id.
    #[serde(rename = "b")]
    AsyncBegin,
    /// Instant record within an async operation.
    /// Marks an intermediate point without opening or closing the operation.
    #[serde(rename = "n")]
    AsyncInstant,
    /// End phase of an async operation, correlated by id.
    #[serde(rename = "e")]
    AsyncEnd,
}

impl Phase {
    /// True for the async phases (b/n/e), which correlate by id rather than
    /// by nesting on a single thread.
    pub fn is_async(&self) -> bool {
        matches!(self, Phase::AsyncBegin | Phase::AsyncInstant | Phase::AsyncEnd)
    }

    /// True for the paired duration phases (B/E).
    pub fn is_duration(&self) -> bool {
        matches!(self, Phase::Begin | Phase::End)
    }
}

/// Record identifier used to correlate async operations and pipeline items.
///
/// Emitters produce either string ids or numeric ids; both map onto the same
/// correlation key via [`Id::to_string`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    String(String),
    Number(u64),
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Id::String(s) => f.write_str(s),
            Id::Number(n) => write!(f, "{}", n),
        }
    }
}

/// One decoded trace record.
///
/// Immutable once decoded. The reconstruction engine consumes records in
/// input order and never mutates them.
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
pub struct TraceRecord {
    /// Display name of the record. Duration begin/end pairs are matched by
    /// name; a dedicated name identifies pipeline-item markers.
    #[builder(into)]
    pub name: String,
    /// Comma-separated category list assigned by the emitter.
    #[serde(default)]
    #[builder(into, default)]
    pub cat: String,
    /// Record phase.
    pub ph: Phase,
    /// Timestamp in microseconds.
    pub ts: u64,
    /// Process ID of the emitting process.
    pub pid: u32,
    /// Thread ID of the emitting thread. Thread ids are mapped to logical
    /// tracks (UI / raster) by the consumer's configuration.
    pub tid: u32,
    /// Custom arguments attached by the emitter.
    ///
    /// Arguments can contain any JSON data. The reconstruction engine reads
    /// only string-valued keys it knows about (`id`, `parentId`) and carries
    /// the rest opaquely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    /// Correlation id for async records and pipeline-item markers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    /// Duration in microseconds, only present on Complete (X) records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dur: Option<u64>,
}

impl TraceRecord {
    /// String-valued argument lookup inside `args`.
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.as_ref()?.get(key)?.as_str()
    }

    /// Canonical correlation key for async records and pipeline markers:
    /// the `id` field, falling back to a string `args["id"]`.
    pub fn async_id(&self) -> Option<String> {
        if let Some(id) = &self.id {
            return Some(id.to_string());
        }
        self.arg_str("id").map(str::to_owned)
    }

    /// Parent correlation key linking nested async chains, carried by the
    /// emitter in `args["parentId"]`.
    pub fn parent_async_id(&self) -> Option<String> {
        self.arg_str("parentId").map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_deserialize_duration_record() {
        let json = r#"{"name":"build","cat":"ui","ph":"B","ts":1000,"pid":1,"tid":7}"#;
        let record: TraceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.name, "build");
        assert_eq!(record.cat, "ui");
        assert_eq!(record.ph, Phase::Begin);
        assert_eq!(record.ts, 1000);
        assert_eq!(record.tid, 7);
        assert!(record.args.is_none());
        assert!(record.id.is_none());
    }

    #[rstest]
    fn test_deserialize_async_record_with_numeric_id() {
        let json = r#"{"name":"frame","cat":"embedder","ph":"b","ts":500,"pid":1,"tid":7,"id":12}"#;
        let record: TraceRecord = serde_json::from_str(json).unwrap();
        assert!(record.ph.is_async());
        assert_eq!(record.async_id().as_deref(), Some("12"));
    }

    #[rstest]
    fn test_async_id_falls_back_to_args() {
        let record = TraceRecord::builder()
            .name("PipelineItem")
            .ph(Phase::Begin)
            .ts(100)
            .pid(1)
            .tid(7)
            .args(serde_json::json!({"id": "f42"}))
            .build();
        assert_eq!(record.async_id().as_deref(), Some("f42"));
    }

    #[rstest]
    fn test_parent_async_id() {
        let record = TraceRecord::builder()
            .name("stage")
            .ph(Phase::AsyncBegin)
            .ts(100)
            .pid(1)
            .tid(7)
            .id(Id::String("child".to_string()))
            .args(serde_json::json!({"parentId": "root"}))
            .build();
        assert_eq!(record.parent_async_id().as_deref(), Some("root"));
    }

    #[rstest]
    fn test_serialize_skips_absent_fields() {
        let record = TraceRecord::builder()
            .name("paint")
            .cat("raster")
            .ph(Phase::Complete)
            .ts(2000)
            .pid(1)
            .tid(8)
            .dur(150)
            .build();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""ph":"X""#));
        assert!(json.contains(r#""dur":150"#));
        assert!(!json.contains("args"));
        assert!(!json.contains("id"));
    }

    #[rstest]
    #[case(Phase::Begin, false)]
    #[case(Phase::Complete, false)]
    #[case(Phase::AsyncBegin, true)]
    #[case(Phase::AsyncInstant, true)]
    #[case(Phase::AsyncEnd, true)]
    fn test_phase_is_async(#[case] phase: Phase, #[case] expected: bool) {
        assert_eq!(phase.is_async(), expected);
    }
}
