use crate::common::geometry::CHANNEL_COUNT;
use crate::domain::EventRecord;

use super::{CHANNEL_EQUALIZATION, equalization_mean};

const HEADER_FIELD_COUNT: usize = 7;
const CHANNEL_FIELD_COUNT: usize = 4;
const HEADER_TIME_FIELD: usize = 4;
const HEADER_TRIG_FIELD: usize = 5;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DaqParseError {
    #[error("line {line}: malformed trigger header field '{field}'")]
    MalformedHeader { line: usize, field: String },
    #[error("line {line}: malformed channel sample field '{field}'")]
    MalformedChannelSample { line: usize, field: String },
    #[error("line {line}: channel index {channel} outside 0..{CHANNEL_COUNT}")]
    ChannelOutOfRange { line: usize, channel: usize },
    #[error("line {line}: duplicate sample for channel {channel} in event {event_index}")]
    DuplicateChannel {
        line: usize,
        channel: usize,
        event_index: usize,
    },
    #[error("event {event_index} closed with {channels_seen} of {CHANNEL_COUNT} channel samples")]
    IncompleteEvent {
        event_index: usize,
        channels_seen: usize,
    },
}

#[derive(Debug, Default)]
struct PendingEvent {
    lg: [u32; CHANNEL_COUNT],
    hg: [u32; CHANNEL_COUNT],
    filled: [bool; CHANNEL_COUNT],
    count: usize,
}

impl PendingEvent {
    fn is_started(&self) -> bool {
        self.count > 0
    }

    fn is_complete(&self) -> bool {
        self.count == CHANNEL_COUNT
    }
}

/// Parse one run's DAQ list-mode text export.
///
/// The format interleaves comment lines, a 7-field board header carrying the
/// trigger id and timestamp, and one 4-field line per channel sample. An
/// event is complete when all 16 channels have reported; a header arriving
/// over a partially-filled event, or a truncated trailing event, is a
/// malformed-input error for the whole run rather than a silently padded
/// record.
pub fn parse_daq_list(source: &str) -> Result<Vec<EventRecord>, DaqParseError> {
    let equalization_mean = equalization_mean();
    let mut events = Vec::new();
    let mut pending = PendingEvent::default();
    let mut trig_id = 0;
    let mut trig_time = 0.0;

    for (index, raw_line) in source.lines().enumerate() {
        let line = index + 1;
        if raw_line.contains("//") || raw_line.contains("Tstamp") {
            continue;
        }
        let fields: Vec<&str> = raw_line.split_whitespace().collect();
        if fields.is_empty() || fields[0] != "1" {
            continue;
        }

        if fields.len() == HEADER_FIELD_COUNT {
            if pending.is_started() {
                return Err(DaqParseError::IncompleteEvent {
                    event_index: events.len(),
                    channels_seen: pending.count,
                });
            }
            trig_time = fields[HEADER_TIME_FIELD].parse().map_err(|_| {
                DaqParseError::MalformedHeader {
                    line,
                    field: fields[HEADER_TIME_FIELD].to_string(),
                }
            })?;
            trig_id = fields[HEADER_TRIG_FIELD].parse().map_err(|_| {
                DaqParseError::MalformedHeader {
                    line,
                    field: fields[HEADER_TRIG_FIELD].to_string(),
                }
            })?;
            continue;
        }

        if fields.len() == CHANNEL_FIELD_COUNT {
            let channel: usize =
                fields[1]
                    .parse()
                    .map_err(|_| DaqParseError::MalformedChannelSample {
                        line,
                        field: fields[1].to_string(),
                    })?;
            if channel >= CHANNEL_COUNT {
                return Err(DaqParseError::ChannelOutOfRange { line, channel });
            }
            if pending.filled[channel] {
                return Err(DaqParseError::DuplicateChannel {
                    line,
                    channel,
                    event_index: events.len(),
                });
            }
            let low_gain: u32 =
                fields[2]
                    .parse()
                    .map_err(|_| DaqParseError::MalformedChannelSample {
                        line,
                        field: fields[2].to_string(),
                    })?;
            let high_gain: u32 =
                fields[3]
                    .parse()
                    .map_err(|_| DaqParseError::MalformedChannelSample {
                        line,
                        field: fields[3].to_string(),
                    })?;

            pending.lg[channel] = low_gain;
            pending.hg[channel] = high_gain;
            pending.filled[channel] = true;
            pending.count += 1;

            if pending.is_complete() {
                let mut equalized = [0.0; CHANNEL_COUNT];
                for (channel, value) in equalized.iter_mut().enumerate() {
                    *value = f64::from(pending.lg[channel]) * CHANNEL_EQUALIZATION[channel]
                        / equalization_mean;
                }
                events.push(EventRecord {
                    trig_id,
                    trig_time,
                    ch_lg: pending.lg,
                    ch_hg: pending.hg,
                    ch_lg_equalized: equalized,
                });
                pending = PendingEvent::default();
            }
        }
    }

    if pending.is_started() {
        return Err(DaqParseError::IncompleteEvent {
            event_index: events.len(),
            channels_seen: pending.count,
        });
    }

    Ok(events)
}
