use divan::Bencher;
use frameline::{TimelineProcessor, TrackConfig, PIPELINE_ITEM};
use std::hint::black_box;
use trace_format::{Id, Phase, TraceRecord};

#[global_allocator]
static ALLOC: divan::AllocProfiler = divan::AllocProfiler::system();

const UI_TID: u32 = 1;
const RASTER_TID: u32 = 2;

fn record(name: &str, ph: Phase, tid: u32, ts: u64, id: Option<u64>) -> TraceRecord {
    TraceRecord::builder()
        .name(name)
        .cat("engine")
        .ph(ph)
        .ts(ts)
        .pid(1)
        .tid(tid)
        .maybe_id(id.map(Id::Number))
        .build()
}

fn frame_stream(frames: u64) -> Vec<TraceRecord> {
    let mut records = Vec::with_capacity(frames as usize * 8);
    for n in 0..frames {
        let base = n * 1000;
        records.push(record(PIPELINE_ITEM, Phase::AsyncBegin, UI_TID, base, Some(n)));
        records.push(record("vsync", Phase::Begin, UI_TID, base + 100, None));
        records.push(record("layout", Phase::Begin, UI_TID, base + 150, None));
        records.push(record("layout", Phase::End, UI_TID, base + 300, None));
        records.push(record("vsync", Phase::End, UI_TID, base + 400, None));
        records.push(record("rasterize", Phase::Begin, RASTER_TID, base + 450, None));
        records.push(record("rasterize", Phase::End, RASTER_TID, base + 800, None));
        records.push(record(PIPELINE_ITEM, Phase::AsyncEnd, UI_TID, base + 900, Some(n)));
    }
    records
}

#[divan::bench(args = [100, 1000, 10000])]
fn process_frames(bencher: Bencher, frames: u64) {
    let config = TrackConfig {
        ui_threads: vec![UI_TID],
        raster_threads: vec![RASTER_TID],
    };
    let records = frame_stream(frames);

    bencher.bench_local(|| {
        let mut engine = TimelineProcessor::new(&config).unwrap();
        engine.process(&records, false);
        black_box(engine.store().frames().len());
    });
}

fn main() {
    divan::main();
}
