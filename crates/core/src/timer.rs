//! Frame timing used for periodic frame-rate reporting.

use std::time::{Duration, Instant};

/// Counts frames and reports the average frame rate once per interval.
#[derive(Debug)]
pub struct FrameTimer {
    window_start: Instant,
    interval: Duration,
    frames: u32,
    total_frames: u64,
}

/// Summary produced when a reporting interval elapses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// Average frames per second over the interval.
    pub fps: f32,
    /// Average frame time in milliseconds over the interval.
    pub frame_ms: f32,
    /// Frames rendered since the timer was created.
    pub total_frames: u64,
}

impl FrameTimer {
    /// Create a timer that reports every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            window_start: Instant::now(),
            interval,
            frames: 0,
            total_frames: 0,
        }
    }

    /// Record one presented frame.
    ///
    /// Returns statistics when the interval has elapsed, then starts a new window.
    pub fn frame(&mut self) -> Option<FrameStats> {
        self.frame_at(Instant::now())
    }

    fn frame_at(&mut self, now: Instant) -> Option<FrameStats> {
        self.frames += 1;
        self.total_frames += 1;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }

        let secs = elapsed.as_secs_f32();
        let stats = FrameStats {
            fps: self.frames as f32 / secs,
            frame_ms: secs * 1000.0 / self.frames as f32,
            total_frames: self.total_frames,
        };
        self.window_start = now;
        self.frames = 0;
        Some(stats)
    }

    /// Frames recorded since creation.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
