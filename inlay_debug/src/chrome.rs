// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Task drains become complete (`"X"`) slices on a per-runner track; every
//! other event is an instant.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use inlay_core::task::QueueKind;
use inlay_core::time::HostTime;
use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

const TID_PANEL: u64 = 0;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
/// Timestamps are host nanoseconds converted to microseconds.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        let ts = to_us(recorded.timestamp());
        match recorded {
            RecordedEvent::TaskDrain(e) => {
                events.push(json!({
                    "ph": "X",
                    "name": format!("{:?} drain", e.queue),
                    "cat": "Tasks",
                    "ts": ts,
                    "dur": e.elapsed.nanos() as f64 / 1000.0,
                    "pid": 0,
                    "tid": e.queue.identifier(),
                    "args": {
                        "executed": e.executed,
                    }
                }));
            }
            RecordedEvent::VsyncDelivered(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Vsync",
                    "cat": "Frame",
                    "ts": ts,
                    "pid": 0,
                    "tid": QueueKind::Platform.identifier(),
                    "s": "t",
                    "args": {
                        "batons": e.count,
                        "frame_target_us": to_us(e.frame_target),
                    }
                }));
            }
            RecordedEvent::Pointer(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("{:?}", e.phase),
                    "cat": "Input",
                    "ts": ts,
                    "pid": 0,
                    "tid": TID_PANEL,
                    "s": "t",
                    "args": {
                        "synthesized": e.synthesized,
                    }
                }));
            }
            RecordedEvent::SurfaceRecreated(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "SurfaceRecreated",
                    "cat": "Surface",
                    "ts": ts,
                    "pid": 0,
                    "tid": QueueKind::Render.identifier(),
                    "s": "p",
                    "args": {
                        "width": e.width,
                        "height": e.height,
                        "fbo": e.fbo,
                    }
                }));
            }
            RecordedEvent::Lifecycle(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("{:?}", e.stage),
                    "cat": "Lifecycle",
                    "ts": ts,
                    "pid": 0,
                    "tid": TID_PANEL,
                    "s": "g",
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn to_us(t: HostTime) -> f64 {
    t.nanos() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use inlay_core::pointer::PointerPhase;
    use inlay_core::time::Duration;
    use inlay_core::trace::{
        LifecycleEvent, LifecycleStage, PointerTraceEvent, TaskDrainEvent, TraceSink,
    };

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_lifecycle(&LifecycleEvent {
            stage: LifecycleStage::Enabled,
            timestamp: HostTime(500_000),
        });
        rec.on_task_drain(&TaskDrainEvent {
            queue: QueueKind::Platform,
            executed: 2,
            started: HostTime(1_000_000),
            elapsed: Duration(250_000),
        });
        rec.on_pointer_event(&PointerTraceEvent {
            phase: PointerPhase::Down,
            synthesized: false,
            timestamp_micros: 1_200,
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 3);

        assert_eq!(parsed[0]["ph"], "i");
        assert_eq!(parsed[0]["name"], "Enabled");

        assert_eq!(parsed[1]["ph"], "X");
        assert_eq!(parsed[1]["name"], "Platform drain");
        assert_eq!(parsed[1]["ts"], 1000.0);
        assert_eq!(parsed[1]["dur"], 250.0);
        assert_eq!(parsed[1]["tid"], 2);

        assert_eq!(parsed[2]["name"], "Down");
        assert_eq!(parsed[2]["ts"], 1200.0);
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}
