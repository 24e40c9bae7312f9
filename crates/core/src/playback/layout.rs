//! Subtitle overlay geometry derived from the window size.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

/// Bounds for the sampling period when no native resize notification exists.
pub const MIN_POLL: Duration = Duration::from_millis(10);
pub const MAX_POLL: Duration = Duration::from_millis(100);

/// Source of the current window size in pixels.
pub trait Viewport: Send + Sync + 'static {
    fn size(&self) -> (u32, u32);
}

impl<F> Viewport for F
where
    F: Fn() -> (u32, u32) + Send + Sync + 'static,
{
    fn size(&self) -> (u32, u32) {
        self()
    }
}

/// Pixel geometry for the player, the subtitle overlay and the editor column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Layout {
    pub video_width: u32,
    pub video_height: u32,
    pub subtitle_margin_top: u32,
    pub subtitle_margin_left: u32,
    pub subtitle_width: u32,
    pub editor_height: u32,
}

impl Layout {
    pub fn for_viewport(width: u32, height: u32) -> Self {
        let video_width = (width as f64 * 9.0 / 16.0 * 1.12) as u32;
        let video_height = (height as f64 * 9.0 / 16.0 * 1.12) as u32;
        Self {
            video_width,
            video_height,
            subtitle_margin_top: (video_height as f64 * 0.95) as u32,
            subtitle_margin_left: ((video_width / 2) as f64 * 0.3) as u32,
            subtitle_width: (video_width as f64 * 0.7) as u32,
            editor_height: (height as f64 * 0.85) as u32,
        }
    }
}

/// Sample `viewport` every `period` and publish a new layout whenever the size changes.
/// The task ends once every receiver has been dropped.
pub fn spawn_layout_poller<V: Viewport>(
    viewport: V,
    period: Duration,
) -> (watch::Receiver<Layout>, JoinHandle<()>) {
    let period = period.clamp(MIN_POLL, MAX_POLL);
    let mut last = viewport.size();
    let (tx, rx) = watch::channel(Layout::for_viewport(last.0, last.1));
    let handle = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        while !tx.is_closed() {
            ticker.tick().await;
            let size = viewport.size();
            if size == last {
                continue;
            }
            debug!("viewport {}x{} -> {}x{}", last.0, last.1, size.0, size.1);
            last = size;
            if tx.send(Layout::for_viewport(size.0, size.1)).is_err() {
                break;
            }
        }
    });
    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn scales_from_window_size() {
        let layout = Layout::for_viewport(1600, 900);
        assert_eq!(layout.video_width, 1008);
        assert_eq!(layout.video_height, 567);
        assert_eq!(layout.subtitle_margin_top, 538);
        assert_eq!(layout.subtitle_margin_left, 151);
        assert_eq!(layout.subtitle_width, 705);
        assert_eq!(layout.editor_height, 765);
    }

    #[tokio::test]
    async fn publishes_on_resize_and_stops_without_receivers() {
        let size = Arc::new(AtomicU64::new((800 << 32) | 600));
        let source = {
            let size = Arc::clone(&size);
            move || {
                let v = size.load(Ordering::SeqCst);
                ((v >> 32) as u32, v as u32)
            }
        };
        let (mut rx, handle) = spawn_layout_poller(source, Duration::from_millis(10));
        assert_eq!(*rx.borrow(), Layout::for_viewport(800, 600));

        size.store((1600 << 32) | 900, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*rx.borrow(), Layout::for_viewport(1600, 900));

        drop(rx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
