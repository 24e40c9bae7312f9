//! Keeps the on-screen subtitle in step with the playback clock.
//!
//! The synchronizer is driven by clock ticks. Each tick first applies a pending
//! seek (requested by clicking a cue), then picks the first cue in store order
//! containing the current time, then hides the subtitle once the clock passes the
//! end of the cue that was last shown.

pub mod layout;

use crate::editor::Transport;
use crate::store::CueStore;
use std::time::Duration;
use tracing::{debug, trace};

/// Seconds skipped by the rewind and forward controls.
pub const NUDGE: Duration = Duration::from_secs(5);

/// What the render surface shows as the subtitle overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleDisplay {
    pub text: String,
    pub visible: bool,
    /// Once the clock passes this point the overlay is hidden.
    pub hide_at: Duration,
}

/// Change to the overlay produced by a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayChange {
    Show(String),
    Hide,
}

/// Result of one clock tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tick {
    /// Position the clock source must jump to.
    pub seek: Option<Duration>,
    pub display: Option<DisplayChange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeekRequest {
    Absolute(Duration),
    Forward(Duration),
    Backward(Duration),
}

/// Per-session playback state.
#[derive(Debug, Default)]
pub struct Synchronizer {
    current_time: Duration,
    total_time: Duration,
    active: Option<usize>,
    pending_seek: Option<SeekRequest>,
    playing: bool,
    display: SubtitleDisplay,
}

impl Synchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_time(&self) -> Duration {
        self.current_time
    }

    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    /// Position of the cue last matched by a tick, if it is still on screen.
    pub fn active(&self) -> Option<usize> {
        self.active.filter(|_| self.display.visible)
    }

    pub fn display(&self) -> &SubtitleDisplay {
        &self.display
    }

    pub fn pending_seek(&self) -> Option<Duration> {
        self.pending_seek.map(|req| self.resolve(req))
    }

    /// The clock source finished loading media of the given length.
    pub fn loaded(&mut self, total: Duration) {
        debug!("media loaded, duration {:?}", total);
        self.total_time = total;
        self.playing = true;
    }

    /// A cue's text was clicked: pause and seek to its start on the next tick.
    pub fn request_seek(&mut self, start: Duration) {
        debug!("seek requested to {:?}", start);
        self.pending_seek = Some(SeekRequest::Absolute(start));
        self.pause();
    }

    /// Skip forward by [`NUDGE`] on the next tick.
    pub fn forward(&mut self) {
        self.pending_seek = Some(SeekRequest::Forward(NUDGE));
    }

    /// Skip back by [`NUDGE`] on the next tick, never before zero.
    pub fn rewind(&mut self) {
        self.pending_seek = Some(SeekRequest::Backward(NUDGE));
    }

    pub fn toggle(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Convenience for clock sources reporting fractional seconds.
    pub fn tick_secs(&mut self, secs: f64, store: &CueStore) -> Tick {
        let t = if secs > 0.0 {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };
        self.tick(t, store)
    }

    /// Advance to `now` and decide what the overlay shows.
    pub fn tick(&mut self, now: Duration, store: &CueStore) -> Tick {
        let mut out = Tick::default();
        let mut now = now;
        if let Some(req) = self.pending_seek.take() {
            self.current_time = now;
            let target = self.resolve(req);
            trace!("applying seek to {:?}", target);
            out.seek = Some(target);
            now = target;
        }
        self.current_time = now;

        if let Some((i, cue)) = store.active_at(now) {
            self.active = Some(i);
            self.display.hide_at = cue.end;
            if !self.display.visible || self.display.text != cue.text {
                debug!("showing cue {i}: {}", cue.text);
                self.display.text = cue.text.clone();
                self.display.visible = true;
                out.display = Some(DisplayChange::Show(cue.text.clone()));
            }
            return out;
        }

        if now > self.display.hide_at && self.display.visible {
            debug!("hiding subtitle at {:?}", now);
            self.display.visible = false;
            out.display = Some(DisplayChange::Hide);
        }
        out
    }

    fn resolve(&self, req: SeekRequest) -> Duration {
        match req {
            SeekRequest::Absolute(t) => t,
            SeekRequest::Forward(d) => self.current_time.saturating_add(d),
            SeekRequest::Backward(d) => self.current_time.saturating_sub(d),
        }
    }
}

impl Transport for Synchronizer {
    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Cue;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn store() -> CueStore {
        CueStore::from(vec![
            Cue::new(1, secs(0), secs(5), "A"),
            Cue::new(2, secs(5), secs(10), "B"),
        ])
    }

    #[test]
    fn follows_the_clock() {
        let store = store();
        let mut sync = Synchronizer::new();

        let tick = sync.tick(secs(3), &store);
        assert_eq!(tick.display, Some(DisplayChange::Show("A".into())));
        assert_eq!(sync.active(), Some(0));

        let tick = sync.tick(secs(5), &store);
        assert_eq!(tick.display, Some(DisplayChange::Show("B".into())));
        assert_eq!(sync.display().hide_at, secs(10));

        let tick = sync.tick(secs(12), &store);
        assert_eq!(tick.display, Some(DisplayChange::Hide));
        assert!(!sync.display().visible);
        assert_eq!(sync.active(), None);

        for _ in 0..3 {
            assert_eq!(sync.tick(secs(12), &store), Tick::default());
        }
    }

    #[test]
    fn repeated_text_does_not_churn() {
        let store = CueStore::from(vec![
            Cue::new(1, secs(0), secs(5), "same"),
            Cue::new(2, secs(5), secs(10), "same"),
        ]);
        let mut sync = Synchronizer::new();
        assert!(sync.tick(secs(1), &store).display.is_some());
        assert_eq!(sync.tick(secs(6), &store).display, None);
        assert!(sync.display().visible);
        assert_eq!(sync.display().hide_at, secs(10));
        assert_eq!(sync.tick(secs(11), &store).display, Some(DisplayChange::Hide));
    }

    #[test]
    fn reshows_after_hide_with_same_text() {
        let store = store();
        let mut sync = Synchronizer::new();
        sync.tick(secs(1), &store);
        sync.tick(secs(12), &store);
        let tick = sync.tick(secs(2), &store);
        assert_eq!(tick.display, Some(DisplayChange::Show("A".into())));
    }

    #[test]
    fn click_seeks_exactly_once() {
        let store = store();
        let mut sync = Synchronizer::new();
        sync.loaded(secs(60));
        sync.tick(secs(1), &store);

        sync.request_seek(store.at(1).unwrap().start);
        assert!(!sync.is_playing());
        assert_eq!(sync.pending_seek(), Some(secs(5)));

        let tick = sync.tick(Duration::from_millis(1_250), &store);
        assert_eq!(tick.seek, Some(secs(5)));
        assert_eq!(tick.display, Some(DisplayChange::Show("B".into())));
        assert_eq!(sync.current_time(), secs(5));
        assert_eq!(sync.pending_seek(), None);

        assert_eq!(sync.tick(secs(5), &store).seek, None);
    }

    #[test]
    fn nudges_are_relative_and_clamped() {
        let store = store();
        let mut sync = Synchronizer::new();
        sync.tick(secs(3), &store);
        sync.rewind();
        assert_eq!(sync.tick(secs(3), &store).seek, Some(Duration::ZERO));
        sync.forward();
        assert_eq!(sync.tick(secs(1), &store).seek, Some(secs(6)));
    }

    #[test]
    fn tolerates_an_empty_or_shrinking_store() {
        let mut store = store();
        let mut sync = Synchronizer::new();
        sync.tick(secs(7), &store);
        store.remove_at(1).unwrap();
        store.remove_at(0).unwrap();
        assert_eq!(sync.tick(secs(8), &store), Tick::default());
        assert_eq!(sync.tick(secs(11), &store).display, Some(DisplayChange::Hide));
        assert_eq!(sync.tick_secs(f64::NAN, &store), Tick::default());
    }

    #[test]
    fn out_of_range_clock_readings_do_not_panic() {
        let store = store();
        let mut sync = Synchronizer::new();
        sync.tick(secs(2), &store);
        assert_eq!(sync.tick_secs(1e30, &store).display, Some(DisplayChange::Hide));
        sync.forward();
        assert_eq!(sync.tick_secs(f64::INFINITY, &store).seek, Some(Duration::MAX));
        assert_eq!(sync.tick_secs(-3.0, &store).display, Some(DisplayChange::Show("A".into())));
        assert_eq!(sync.tick_secs(2.5, &store), Tick::default());
    }

    #[test]
    fn toggle_switches_transport() {
        let mut sync = Synchronizer::new();
        assert!(!sync.is_playing());
        sync.toggle();
        assert!(sync.is_playing());
        sync.toggle();
        assert!(!sync.is_playing());
    }
}
