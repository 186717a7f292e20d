pub mod loop_worker;
pub mod source;

pub use loop_worker::run_capture;
pub use source::PageSource;

use tokio::time::Duration;

/// Tunables for the capture loop.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Delay after each page advance, letting the reader finish
    /// rendering before the next capture.
    pub settle: Duration,

    /// Consecutive identical captures required before the loop treats
    /// the book as finished. 1 reproduces the classic single-comparison
    /// rule; higher values absorb transient render glitches.
    pub required_matches: u32,

    /// Optional hard cap on accepted frames. Identical-frame detection
    /// stays the primary stop signal; the cap only guards against a
    /// view that never stops changing (e.g. a loading spinner).
    pub max_frames: Option<u32>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(500),
            required_matches: 1,
            max_frames: None,
        }
    }
}
