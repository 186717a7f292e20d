use log::info;

/// Fire-and-forget notification for each accepted frame. No
/// backpressure; the loop never waits on the sink.
pub trait ProgressSink {
    fn frame_accepted(&self, index: u32);
}

/// Default sink: one log line per captured page.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn frame_accepted(&self, index: u32) {
        info!("Captured page {index}");
    }
}
