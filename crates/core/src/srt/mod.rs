//! This module is responsible for SRT parsing and serialization.
//! It turns SRT text into cues and back while preserving timing to the millisecond.

use crate::error::{Error, Result};
use crate::store::Cue;
use std::time::Duration;
use tracing::trace;

/// Parse SRT text into cues.
/// Blocks are read in file order; the first malformed block aborts the whole parse.
pub fn parse(input: &str) -> Result<Vec<Cue>> {
    trace!("parse bytes={}", input.len());
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut cues = Vec::new();
    let mut lines = input.lines().enumerate().map(|(n, l)| (n + 1, l));
    loop {
        let (line_no, index_line) = match lines.next() {
            Some((_, l)) if l.trim().is_empty() => continue,
            Some((n, l)) => (n, l.trim()),
            None => break,
        };
        let index: u32 = index_line.parse().map_err(|_| Error::Format {
            line: line_no,
            reason: format!("expected cue number, found {index_line:?}"),
        })?;
        let (time_no, time_line) = lines.next().ok_or_else(|| Error::Format {
            line: line_no + 1,
            reason: "missing time line".into(),
        })?;
        let (start, end) = parse_times(time_line).ok_or_else(|| Error::Format {
            line: time_no,
            reason: format!("expected `HH:MM:SS,mmm --> HH:MM:SS,mmm`, found {time_line:?}"),
        })?;
        let mut text = Vec::new();
        for (_, line) in lines.by_ref() {
            if line.trim().is_empty() {
                break;
            }
            text.push(line);
        }
        cues.push(Cue {
            index,
            text: text.join("\n"),
            start,
            end,
        });
    }
    Ok(cues)
}

/// Format cues back to SRT text.
/// Cues are numbered from 1 in the order given, whatever their stored index.
/// Text goes through [`block_text`], so the output always parses again.
pub fn serialize(cues: &[Cue]) -> String {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_time(cue.start),
            format_time(cue.end),
            block_text(&cue.text)
        ));
    }
    out
}

/// Cue text as it can be stored inside one SRT block.
/// A blank line ends a block, so empty and whitespace-only lines are dropped.
pub fn block_text(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a time range like `00:00:01,000 --> 00:00:02,000`.
fn parse_times(line: &str) -> Option<(Duration, Duration)> {
    let (start, end) = line.split_once("-->")?;
    Some((parse_time(start.trim())?, parse_time(end.trim())?))
}

/// Parse `HH:MM:SS,mmm`. A `.` separator is tolerated for the milliseconds.
fn parse_time(t: &str) -> Option<Duration> {
    let (hms, ms) = t.split_once([',', '.'])?;
    let parts: Vec<&str> = hms.split(':').collect();
    if parts.len() != 3 || ms.len() != 3 {
        return None;
    }
    let digits = |s: &str| -> Option<u64> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse().ok()
    };
    let h = digits(parts[0])?;
    let m = digits(parts[1])?;
    let s = digits(parts[2])?;
    let ms = digits(ms)?;
    if m >= 60 || s >= 60 {
        return None;
    }
    Some(Duration::from_millis(((h * 60 + m) * 60 + s) * 1000 + ms))
}

/// Format a duration as `HH:MM:SS,mmm`, truncating below the millisecond.
pub fn format_time(d: Duration) -> String {
    let total = d.as_secs();
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total / 3600,
        total / 60 % 60,
        total % 60,
        d.subsec_millis()
    )
}
