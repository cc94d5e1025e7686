use std::io::BufRead;

use super::record::BeatmapRecord;
use crate::error::PrepError;

pub const HIT_OBJECTS_MARKER: &str = "[HitObjects]";
/// Playfield bounds in osu! pixels
pub const MAX_X: f64 = 640.0;
pub const MAX_Y: f64 = 480.0;

/// Parse the hit-object section of a beatmap.
///
/// Lines before the marker are ignored. After it, each non-empty line is
/// `x,y,time_ms,...`; blank lines and `//` comments are skipped and the next
/// `[Section]` header ends the scan.
pub fn parse_beatmap<R: BufRead>(name: &str, mut reader: R) -> Result<BeatmapRecord, PrepError> {
    let mut record = BeatmapRecord::empty(name);
    let mut in_hit_objects = false;

    let marker = HIT_OBJECTS_MARKER.as_bytes();
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| PrepError::malformed(line_no + 1, e.to_string()))?;
        if read == 0 {
            break;
        }
        line_no += 1;

        // Header sections may carry legacy non-UTF-8 metadata
        if !in_hit_objects {
            if buf.windows(marker.len()).any(|w| w == marker) {
                in_hit_objects = true;
            }
            continue;
        }

        let line = std::str::from_utf8(&buf)
            .map_err(|e| PrepError::malformed(line_no, e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        if trimmed.starts_with('[') {
            break;
        }

        let (x, y, time_ms) = parse_hit_object(trimmed, line_no)?;
        record.onsets.push(time_ms as f64 / 1000.0);
        record.xs.push(x as f64 / MAX_X);
        record.ys.push(y as f64 / MAX_Y);
    }

    if !in_hit_objects {
        log::warn!("Beatmap '{}' has no {} section", name, HIT_OBJECTS_MARKER);
    }

    Ok(record)
}

fn parse_hit_object(line: &str, line_no: usize) -> Result<(i64, i64, i64), PrepError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 3 {
        return Err(PrepError::malformed(
            line_no,
            format!("expected at least 3 fields, got {}", fields.len()),
        ));
    }

    let field = |i: usize, what: &str| -> Result<i64, PrepError> {
        fields[i].trim().parse::<i64>().map_err(|_| {
            PrepError::malformed(line_no, format!("{} '{}' is not an integer", what, fields[i]))
        })
    };

    Ok((field(0, "x")?, field(1, "y")?, field(2, "time")?))
}
