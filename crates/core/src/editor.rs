//! Edit operations the UI performs on the cue store.

use crate::error::{Error, Result};
use crate::store::{Cue, CueStore};
use std::time::Duration;
use tracing::{debug, trace};

/// Playback control the editor needs while text is being typed.
pub trait Transport {
    fn play(&mut self);
    fn pause(&mut self);
    fn is_playing(&self) -> bool;
}

/// Parse a user-entered `HH:MM:SS.mmm` field value.
pub fn parse_field_time(value: &str) -> Result<Duration> {
    let bad = || Error::InvalidTime(value.to_string());
    let (hms, ms) = value.split_once('.').ok_or_else(bad)?;
    let parts: Vec<&str> = hms.split(':').collect();
    if parts.len() != 3 || ms.len() != 3 || parts.iter().any(|p| p.len() != 2) {
        return Err(bad());
    }
    let mut fields = [0u64; 4];
    for (slot, raw) in fields.iter_mut().zip(parts.iter().copied().chain([ms])) {
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        *slot = raw.parse().map_err(|_| bad())?;
    }
    let [h, m, s, ms] = fields;
    if m >= 60 || s >= 60 {
        return Err(bad());
    }
    Ok(Duration::from_millis(((h * 60 + m) * 60 + s) * 1000 + ms))
}

/// Format a duration the way time fields and the control bar show it.
pub fn format_field_time(d: Duration) -> String {
    let ms = d.as_millis();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        ms / 3_600_000,
        (ms % 3_600_000) / 60_000,
        (ms % 60_000) / 1000,
        ms % 1000
    )
}

/// Owns the cue store and exposes the compound edits the editor page triggers.
#[derive(Debug, Default)]
pub struct TimelineEditor {
    store: CueStore,
}

impl TimelineEditor {
    pub fn new(store: CueStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CueStore {
        &self.store
    }

    pub fn load(&mut self, cues: Vec<Cue>) {
        self.store.load(cues);
    }

    /// Add an empty cue after `i`, pinned to `at`. Returns the new cue's position.
    pub fn split(&mut self, i: usize, at: Duration) -> Result<usize> {
        debug!("split after {i} at {}", format_field_time(at));
        self.store.insert_after(i, Cue::anchored(i as u32 + 2, at))?;
        Ok(i + 1)
    }

    pub fn delete(&mut self, i: usize) -> Result<Cue> {
        debug!("delete cue {i}");
        self.store.remove_at(i)
    }

    /// Set the start of cue `i` from a field value. On error the cue is untouched.
    pub fn retime_start(&mut self, i: usize, value: &str) -> Result<Duration> {
        trace!("retime_start i={i} value={value}");
        self.store.at(i)?;
        let t = parse_field_time(value)?;
        self.store.update_start(i, t)?;
        Ok(t)
    }

    /// Set the end of cue `i` from a field value. On error the cue is untouched.
    pub fn retime_end(&mut self, i: usize, value: &str) -> Result<Duration> {
        trace!("retime_end i={i} value={value}");
        self.store.at(i)?;
        let t = parse_field_time(value)?;
        self.store.update_end(i, t)?;
        Ok(t)
    }

    /// Replace the text of cue `i`. Playback is paused before the text changes.
    pub fn update_text<T: Transport + ?Sized>(
        &mut self,
        i: usize,
        text: impl Into<String>,
        transport: &mut T,
    ) -> Result<()> {
        self.store.at(i)?;
        transport.pause();
        self.store.update_text(i, text)
    }
}
