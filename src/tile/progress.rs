//! Progress reporting for long-running generation.
//!
//! Percentages are monotonic. A reporter never repeats a value and never
//! goes backwards, so callbacks can drive a progress bar directly.

use tracing::trace;

/// Source decoded.
pub const PROGRESS_DECODED: u8 = 5;

/// Affine resample finished.
pub const PROGRESS_RESAMPLED: u8 = 10;

/// Thumbnail saved.
pub const PROGRESS_THUMBNAIL: u8 = 15;

/// Medium preview saved.
pub const PROGRESS_MEDIUM: u8 = 25;

/// Raster flattened to raw pixels; tiling starts here.
pub const PROGRESS_TILES_START: u8 = 35;

/// Share of the bar covered by tile encoding.
pub const PROGRESS_TILES_SPAN: u8 = 60;

/// Metadata committed.
pub const PROGRESS_DONE: u8 = 100;

/// Callback receiving percentages in `0..=100`.
pub type ProgressCallback = Box<dyn FnMut(u8) + Send>;

/// Percentage after `done` of `total` tiles: `35 + floor(60 · done / total)`.
pub fn tile_progress(done: u64, total: u64) -> u8 {
    if total == 0 {
        return PROGRESS_TILES_START + PROGRESS_TILES_SPAN;
    }
    let share = u128::from(PROGRESS_TILES_SPAN) * u128::from(done.min(total)) / u128::from(total);
    PROGRESS_TILES_START + share as u8
}

/// Monotonic progress emitter wrapping an optional callback.
pub struct Progress {
    callback: Option<ProgressCallback>,
    last: Option<u8>,
}

impl Progress {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            last: None,
        }
    }

    /// A reporter that only tracks the last value.
    pub fn silent() -> Self {
        Self::new(None)
    }

    /// Emit `percent` (clamped to 100) unless it is not ahead of the last
    /// emitted value.
    pub fn report(&mut self, percent: u8) {
        let percent = percent.min(PROGRESS_DONE);
        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        trace!(percent, "progress");
        if let Some(callback) = self.callback.as_mut() {
            callback(percent);
        }
    }

    /// Emit the final 100.
    pub fn finish(&mut self) {
        self.report(PROGRESS_DONE);
    }

    /// Last emitted percentage.
    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("has_callback", &self.callback.is_some())
            .field("last", &self.last)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording() -> (Progress, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(Some(Box::new(move |p| sink.lock().unwrap().push(p))));
        (progress, seen)
    }

    #[test]
    fn test_tile_progress_formula() {
        assert_eq!(tile_progress(0, 10), 35);
        assert_eq!(tile_progress(1, 10), 41);
        assert_eq!(tile_progress(5, 10), 65);
        assert_eq!(tile_progress(10, 10), 95);
        assert_eq!(tile_progress(1, 3), 55);
        assert_eq!(tile_progress(0, 0), 95);
        assert_eq!(tile_progress(1 << 40, 1 << 41), 65);
    }

    #[test]
    fn test_report_is_monotonic_and_deduplicated() {
        let (mut progress, seen) = recording();
        for p in [5, 5, 3, 15, 25, 20, 35, 95] {
            progress.report(p);
        }
        progress.finish();
        progress.finish();

        assert_eq!(*seen.lock().unwrap(), vec![5, 15, 25, 35, 95, 100]);
        assert_eq!(progress.last(), Some(100));
    }

    #[test]
    fn test_report_clamps() {
        let (mut progress, seen) = recording();
        progress.report(250);
        assert_eq!(*seen.lock().unwrap(), vec![100]);
    }

    #[test]
    fn test_silent() {
        let mut progress = Progress::silent();
        progress.report(40);
        assert_eq!(progress.last(), Some(40));
    }
}
