//! DAQ list-mode ingest: text exports in, per-run event files out.
//!
//! The event store is a JSON-lines file per run, one [`EventRecord`] per
//! line, read back sequentially by run number. A run with zero events is a
//! valid outcome; a run whose export violates the record structure is
//! rejected whole.

mod parser;

pub use parser::{parse_daq_list, DaqParseError};

use crate::domain::{CalibError, CalibResult, EventRecord};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Per-channel gain constants measured before the beam period, applied at
/// ingest to populate the equalized low-gain branch.
pub const CHANNEL_EQUALIZATION: [f64; 16] = [
    203.7, 190.8, 192.3, 201.1, 199.1, 207.2, 196.2, 218.2, 199.0, 201.0, 203.7, 203.7, 192.9,
    187.7, 186.5, 181.5,
];

pub(crate) fn equalization_mean() -> f64 {
    CHANNEL_EQUALIZATION.iter().sum::<f64>() / CHANNEL_EQUALIZATION.len() as f64
}

pub fn list_file_path(data_dir: &Path, run: u32) -> PathBuf {
    data_dir.join(format!("Run{run}_list.txt"))
}

pub fn event_file_path(events_dir: &Path, run: u32) -> PathBuf {
    events_dir.join(format!("Run{run}_events.jsonl"))
}

/// Convert one run's DAQ export into an event file. Returns the event count.
pub fn ingest_run(data_dir: &Path, events_dir: &Path, run: u32) -> CalibResult<usize> {
    let list_path = list_file_path(data_dir, run);
    let source = fs::read_to_string(&list_path).map_err(|source| {
        CalibError::missing_data(
            "IO.LIST_FILE",
            format!("failed to read '{}': {source}", list_path.display()),
        )
    })?;

    let events = parse_daq_list(&source).map_err(|source| {
        CalibError::computation(
            "INGEST.MALFORMED_EVENT",
            format!("run {run}: {source}"),
        )
    })?;

    write_run_events(events_dir, run, &events)?;
    info!(run, events = events.len(), "ingested run");
    Ok(events.len())
}

/// Write one run's events as a JSON-lines event file.
pub fn write_run_events(events_dir: &Path, run: u32, events: &[EventRecord]) -> CalibResult<()> {
    let mut rendered = String::new();
    for event in events {
        let line = serde_json::to_string(event).map_err(|source| {
            CalibError::internal(
                "INGEST.ENCODE",
                format!("run {run}: failed to encode event: {source}"),
            )
        })?;
        rendered.push_str(&line);
        rendered.push('\n');
    }

    let out_path = event_file_path(events_dir, run);
    fs::write(&out_path, rendered).map_err(|source| {
        CalibError::internal(
            "IO.EVENT_WRITE",
            format!("failed to write '{}': {source}", out_path.display()),
        )
    })
}

/// Sequential read of one run's event file.
pub fn read_run_events(events_dir: &Path, run: u32) -> CalibResult<Vec<EventRecord>> {
    let path = event_file_path(events_dir, run);
    let source = fs::read_to_string(&path).map_err(|source| {
        CalibError::missing_data(
            "IO.EVENT_FILE",
            format!("failed to read '{}': {source}", path.display()),
        )
    })?;

    let mut events = Vec::new();
    for (index, line) in source.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event: EventRecord = serde_json::from_str(line).map_err(|source| {
            CalibError::computation(
                "INGEST.MALFORMED_EVENT",
                format!("run {run} event {index}: {source}"),
            )
        })?;
        events.push(event);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::{equalization_mean, event_file_path, ingest_run, read_run_events};
    use std::fs;
    use tempfile::TempDir;

    fn render_export(event_count: usize) -> String {
        let mut lines = Vec::new();
        lines.push("// CAEN export".to_string());
        for event in 0..event_count {
            lines.push(format!("1  00  0  0  {}.0  {event}  0", 100 + event));
            for channel in 0..16 {
                lines.push(format!("1  {channel:02}  {}  {}", 900 + channel, 40 + channel));
            }
        }
        lines.join("\n")
    }

    #[test]
    fn ingest_then_read_round_trips_all_events() {
        let temp = TempDir::new().expect("tempdir should be created");
        let data_dir = temp.path().join("data");
        let events_dir = temp.path().join("events");
        fs::create_dir_all(&data_dir).expect("data dir");
        fs::create_dir_all(&events_dir).expect("events dir");
        fs::write(data_dir.join("Run500_list.txt"), render_export(3)).expect("export written");

        let count = ingest_run(&data_dir, &events_dir, 500).expect("ingest succeeds");
        assert_eq!(count, 3);

        let events = read_run_events(&events_dir, 500).expect("read succeeds");
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].trig_id, 1);
        assert_eq!(events[2].ch_lg[5], 905);
        assert!(events[0].ch_lg_equalized[0] > 0.0);
    }

    #[test]
    fn missing_export_is_a_missing_data_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let error = ingest_run(temp.path(), temp.path(), 412).expect_err("no export file");
        assert_eq!(error.placeholder(), "IO.LIST_FILE");
    }

    #[test]
    fn zero_event_export_writes_an_empty_event_file() {
        let temp = TempDir::new().expect("tempdir should be created");
        fs::write(temp.path().join("Run600_list.txt"), "// empty\n").expect("export written");
        let count = ingest_run(temp.path(), temp.path(), 600).expect("ingest succeeds");
        assert_eq!(count, 0);
        assert!(event_file_path(temp.path(), 600).exists());
        assert!(read_run_events(temp.path(), 600)
            .expect("read succeeds")
            .is_empty());
    }

    #[test]
    fn malformed_export_fails_the_whole_run() {
        let temp = TempDir::new().expect("tempdir should be created");
        let mut export = render_export(1);
        export.push_str("\n1  03  17  17\n");
        fs::write(temp.path().join("Run601_list.txt"), export).expect("export written");
        let error = ingest_run(temp.path(), temp.path(), 601).expect_err("trailing partial event");
        assert_eq!(error.placeholder(), "INGEST.MALFORMED_EVENT");
    }

    #[test]
    fn equalization_mean_matches_the_constants() {
        let mean = equalization_mean();
        assert!((mean - 197.7875).abs() < 1.0e-9);
    }
}
