//! Example reconstructing one rendered frame and an async operation from an
//! inline record sequence, printing the resulting trees and frame records.
//!
//! Usage: reconstruct

use frameline::{EventArena, NodeId, TimelineProcessor, TrackConfig, PIPELINE_ITEM};
use trace_format::{Id, Phase, TraceRecord};

const UI_TID: u32 = 1;
const RASTER_TID: u32 = 2;

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

fn print_tree(arena: &EventArena, id: NodeId, depth: usize) {
    let node = arena.node(id);
    println!("{}{} {}", "  ".repeat(depth), node.name, node.time);
    for &child in node.children() {
        print_tree(arena, child, depth + 1);
    }
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = TrackConfig {
        ui_threads: vec![UI_TID],
        raster_threads: vec![RASTER_TID],
    };

    let records = vec![
        TraceRecord::builder()
            .name(PIPELINE_ITEM)
            .cat("engine")
            .ph(Phase::AsyncBegin)
            .ts(1000)
            .pid(1)
            .tid(UI_TID)
            .id(Id::Number(1))
            .build(),
        record("vsync", Phase::Begin, UI_TID, 1500),
        record("layout", Phase::Begin, UI_TID, 1600),
        record("layout", Phase::End, UI_TID, 2100),
        record("paint", Phase::Begin, UI_TID, 2200),
        record("paint", Phase::End, UI_TID, 2800),
        record("vsync", Phase::End, UI_TID, 3000),
        record("rasterize", Phase::Begin, RASTER_TID, 3100),
        record("upload", Phase::Instant, RASTER_TID, 3500),
        record("rasterize", Phase::End, RASTER_TID, 4200),
        TraceRecord::builder()
            .name(PIPELINE_ITEM)
            .cat("engine")
            .ph(Phase::AsyncEnd)
            .ts(4500)
            .pid(1)
            .tid(UI_TID)
            .id(Id::Number(1))
            .build(),
        TraceRecord::builder()
            .name("image_decode")
            .cat("io")
            .ph(Phase::AsyncBegin)
            .ts(1200)
            .pid(1)
            .tid(UI_TID)
            .id(Id::String("decode-7".to_string()))
            .build(),
        TraceRecord::builder()
            .name("image_decode")
            .cat("io")
            .ph(Phase::AsyncEnd)
            .ts(3900)
            .pid(1)
            .tid(UI_TID)
            .id(Id::String("decode-7".to_string()))
            .build(),
    ];

    let mut engine = TimelineProcessor::new(&config)?;
    engine.process(&records, false);

    let store = engine.store();
    println!("timeline roots: {}", store.events().len());
    for &root in store.events() {
        print_tree(store.arena(), root, 1);
    }

    println!("frames: {}", store.frames().len());
    for frame in store.frames() {
        println!("  frame {} {}", frame.id, frame.derived_time);
        if let Some(ui) = frame.ui_flow {
            print_tree(store.arena(), ui, 2);
        }
        if let Some(raster) = frame.raster_flow {
            print_tree(store.arena(), raster, 2);
        }
    }

    println!("pending frames: {}", engine.pending_frames().count());
    Ok(())
}
