//! Example emitting a decoded record sequence as JSON, one record per line.
//!
//! Usage: emit_records

use trace_format::{Id, Phase, TraceRecord};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let records = vec![
        TraceRecord::builder()
            .name("PipelineItem")
            .cat("engine")
            .ph(Phase::AsyncBegin)
            .ts(1000)
            .pid(1234)
            .tid(1)
            .id(Id::Number(1))
            .build(),
        TraceRecord::builder()
            .name("vsync")
            .cat("engine")
            .ph(Phase::Begin)
            .ts(1500)
            .pid(1234)
            .tid(1)
            .build(),
        TraceRecord::builder()
            .name("vsync")
            .cat("engine")
            .ph(Phase::End)
            .ts(3000)
            .pid(1234)
            .tid(1)
            .build(),
        TraceRecord::builder()
            .name("image_decode")
            .cat("io")
            .ph(Phase::AsyncBegin)
            .ts(1600)
            .pid(1234)
            .tid(1)
            .id(Id::String("decode-7".to_string()))
            .args(serde_json::json!({"source": "network"}))
            .build(),
        TraceRecord::builder()
            .name("upload")
            .cat("raster")
            .ph(Phase::Complete)
            .ts(3200)
            .pid(1234)
            .tid(2)
            .dur(250)
            .build(),
    ];

    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}
