//! The in-memory cue model for one editing session.
//! Order is the editing order; nothing here sorts or clamps timings.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::trace;

/// One timed subtitle entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    /// Display order as read from a file. Recomputed on serialize.
    pub index: u32,
    pub text: String,
    pub start: Duration,
    pub end: Duration,
}

impl Cue {
    pub fn new(index: u32, start: Duration, end: Duration, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            start,
            end,
        }
    }

    /// Empty cue pinned to a single instant.
    pub fn anchored(index: u32, at: Duration) -> Self {
        Self::new(index, at, at, "")
    }

    /// A cue whose start lies after its end. Kept as-is, only flagged.
    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    /// Half-open containment: `start <= t < end`.
    pub fn contains(&self, t: Duration) -> bool {
        t >= self.start && t < self.end
    }
}

/// Something about the current cue set a user probably wants to fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CueIssue {
    /// Cue at this position ends before it starts.
    Inverted(usize),
    /// Neighbouring cues in store order share part of their range.
    Overlap(usize, usize),
    /// Cue starts before its predecessor in store order.
    OutOfOrder(usize),
}

/// Ordered collection of cues owned by a single editing session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueStore {
    cues: Vec<Cue>,
}

impl CueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole store, typically with freshly parsed cues.
    pub fn load(&mut self, cues: Vec<Cue>) {
        trace!("load cues={}", cues.len());
        self.cues = cues;
    }

    pub fn at(&self, i: usize) -> Result<&Cue> {
        self.cues.get(i).ok_or(Error::OutOfRange {
            index: i,
            len: self.cues.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cue> {
        self.cues.iter()
    }

    pub fn as_slice(&self) -> &[Cue] {
        &self.cues
    }

    /// Insert `cue` directly after position `i`.
    pub fn insert_after(&mut self, i: usize, cue: Cue) -> Result<()> {
        self.check(i)?;
        trace!("insert_after i={i}");
        self.cues.insert(i + 1, cue);
        Ok(())
    }

    /// Remove and return the cue at `i`. Removing the last cue leaves the store empty.
    pub fn remove_at(&mut self, i: usize) -> Result<Cue> {
        self.check(i)?;
        trace!("remove_at i={i}");
        Ok(self.cues.remove(i))
    }

    pub fn update_text(&mut self, i: usize, text: impl Into<String>) -> Result<()> {
        self.get_mut(i)?.text = text.into();
        Ok(())
    }

    pub fn update_start(&mut self, i: usize, t: Duration) -> Result<()> {
        self.get_mut(i)?.start = t;
        Ok(())
    }

    pub fn update_end(&mut self, i: usize, t: Duration) -> Result<()> {
        self.get_mut(i)?.end = t;
        Ok(())
    }

    /// First cue in store order containing `t`, together with its position.
    pub fn active_at(&self, t: Duration) -> Option<(usize, &Cue)> {
        self.cues.iter().enumerate().find(|(_, c)| c.contains(t))
    }

    /// Report inverted, overlapping and out-of-order cues without changing anything.
    pub fn issues(&self) -> Vec<CueIssue> {
        let mut issues = Vec::new();
        for (i, cue) in self.cues.iter().enumerate() {
            if cue.is_inverted() {
                issues.push(CueIssue::Inverted(i));
            }
            if i == 0 {
                continue;
            }
            let prev = &self.cues[i - 1];
            if cue.start < prev.start {
                issues.push(CueIssue::OutOfOrder(i));
            }
            let lo = cue.start.max(prev.start);
            let hi = cue.end.min(prev.end);
            if lo < hi {
                issues.push(CueIssue::Overlap(i - 1, i));
            }
        }
        issues
    }

    fn check(&self, i: usize) -> Result<()> {
        if i < self.cues.len() {
            Ok(())
        } else {
            Err(Error::OutOfRange {
                index: i,
                len: self.cues.len(),
            })
        }
    }

    fn get_mut(&mut self, i: usize) -> Result<&mut Cue> {
        let len = self.cues.len();
        self.cues
            .get_mut(i)
            .ok_or(Error::OutOfRange { index: i, len })
    }
}

impl From<Vec<Cue>> for CueStore {
    fn from(cues: Vec<Cue>) -> Self {
        Self { cues }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn sample() -> CueStore {
        CueStore::from(vec![
            Cue::new(1, secs(0), secs(5), "A"),
            Cue::new(2, secs(5), secs(10), "B"),
            Cue::new(3, secs(10), secs(12), "C"),
        ])
    }

    #[test]
    fn insert_then_remove_restores_sequence() {
        let original = sample();
        for i in 0..original.len() {
            let mut store = original.clone();
            store
                .insert_after(i, Cue::anchored(0, secs(7)))
                .unwrap();
            assert_eq!(store.len(), original.len() + 1);
            assert_eq!(store.at(i + 1).unwrap().start, secs(7));
            store.remove_at(i + 1).unwrap();
            assert_eq!(store, original);
        }
    }

    #[test]
    fn rejects_positions_outside_the_store() {
        let mut store = sample();
        let err = store.insert_after(3, Cue::anchored(0, secs(1))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(store.remove_at(9).is_err());
        assert!(store.update_text(3, "x").is_err());
        assert_eq!(store, sample());

        let mut empty = CueStore::new();
        assert!(empty.insert_after(0, Cue::anchored(0, secs(1))).is_err());
    }

    #[test]
    fn removing_every_cue_leaves_an_empty_store() {
        let mut store = sample();
        while !store.is_empty() {
            store.remove_at(0).unwrap();
        }
        assert_eq!(store.len(), 0);
        assert!(store.active_at(secs(1)).is_none());
    }

    #[test]
    fn inverted_timing_is_kept_and_flagged() {
        let mut store = sample();
        store.update_start(0, secs(8)).unwrap();
        assert_eq!(store.at(0).unwrap().start, secs(8));
        assert!(store.at(0).unwrap().is_inverted());
        assert!(store.issues().contains(&CueIssue::Inverted(0)));
    }

    #[test]
    fn reports_overlap_and_order() {
        let mut store = sample();
        store.update_end(0, secs(6)).unwrap();
        store.update_start(2, secs(1)).unwrap();
        let issues = store.issues();
        assert!(issues.contains(&CueIssue::Overlap(0, 1)));
        assert!(issues.contains(&CueIssue::OutOfOrder(2)));
        assert!(sample().issues().is_empty());
    }

    #[test]
    fn first_match_in_store_order_wins() {
        let store = CueStore::from(vec![
            Cue::new(1, secs(4), secs(9), "late"),
            Cue::new(2, secs(0), secs(6), "early"),
        ]);
        let (i, cue) = store.active_at(secs(5)).unwrap();
        assert_eq!(i, 0);
        assert_eq!(cue.text, "late");
        assert!(store.active_at(secs(9)).is_none());
    }
}
