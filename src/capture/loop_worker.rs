use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureOptions, PageSource};
use crate::error::PipelineError;
use crate::progress::ProgressSink;
use crate::store::FrameStore;

/// Drive capture/advance until the view stops changing.
///
/// Each accepted frame is written to `store` at the next contiguous
/// index before the loop advances the reader; a capture that is
/// byte-identical to the last accepted frame is never persisted. All
/// loop state (previous buffer, index, match counter) lives in this
/// call, so independent runs cannot contaminate each other.
///
/// Returns the number of frames written. Cancellation is only observed
/// between iterations, which keeps the store a valid contiguous prefix.
pub async fn run_capture<S: PageSource>(
    source: &S,
    store: &FrameStore,
    options: &CaptureOptions,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<u32, PipelineError> {
    let mut previous: Option<Vec<u8>> = None;
    let mut accepted: u32 = 0;
    let mut matches: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            info!("Capture cancelled after {accepted} page(s)");
            break;
        }

        let index = accepted + 1;
        let current = source
            .capture()
            .await
            .map_err(|source| PipelineError::Capture { index, source })?;

        if previous.as_deref() == Some(current.as_slice()) {
            matches += 1;
            if matches >= options.required_matches {
                info!("Screenshot identical to previous one; ending capture at {accepted} page(s)");
                break;
            }
            // Below the match threshold: drop the duplicate, nudge the
            // reader again and retake.
            if !advance_and_settle(source, options, cancel, accepted).await? {
                break;
            }
            continue;
        }

        matches = 0;
        store
            .write_frame(index, &current)
            .map_err(|source| PipelineError::FrameWrite { index, source })?;
        progress.frame_accepted(index);
        previous = Some(current);
        accepted = index;

        if let Some(cap) = options.max_frames {
            if accepted >= cap {
                warn!("Frame cap of {cap} reached; the view may still be changing");
                break;
            }
        }

        if !advance_and_settle(source, options, cancel, accepted).await? {
            break;
        }
    }

    Ok(accepted)
}

/// Advance one page and wait out the settle interval. Returns false
/// when the run was cancelled mid-settle.
async fn advance_and_settle<S: PageSource>(
    source: &S,
    options: &CaptureOptions,
    cancel: &CancellationToken,
    index: u32,
) -> Result<bool, PipelineError> {
    source
        .advance()
        .await
        .map_err(|source| PipelineError::Advance { index, source })?;

    tokio::select! {
        _ = tokio::time::sleep(options.settle) => Ok(true),
        _ = cancel.cancelled() => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressSink;
    use anyhow::{anyhow, Result};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::time::Duration;

    struct ScriptedSource {
        frames: Mutex<VecDeque<Vec<u8>>>,
        advances: AtomicU32,
    }

    impl ScriptedSource {
        fn new(frames: &[&[u8]]) -> Self {
            Self {
                frames: Mutex::new(frames.iter().map(|f| f.to_vec()).collect()),
                advances: AtomicU32::new(0),
            }
        }

        fn advances(&self) -> u32 {
            self.advances.load(Ordering::SeqCst)
        }
    }

    impl PageSource for ScriptedSource {
        async fn capture(&self) -> Result<Vec<u8>> {
            self.frames
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow!("script exhausted"))
        }

        async fn advance(&self) -> Result<()> {
            self.advances.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<u32>>);

    impl ProgressSink for RecordingSink {
        fn frame_accepted(&self, index: u32) {
            self.0.lock().unwrap().push(index);
        }
    }

    fn fast_options() -> CaptureOptions {
        CaptureOptions {
            settle: Duration::ZERO,
            ..CaptureOptions::default()
        }
    }

    fn stored_frames(store: &FrameStore) -> Vec<String> {
        let mut names = store.list_frames().unwrap();
        names.sort_by_key(|n| FrameStore::frame_index(n).unwrap());
        names
    }

    #[tokio::test]
    async fn stops_on_first_identical_pair() {
        let tmp = TempDir::new().unwrap();
        let store = FrameStore::create(tmp.path(), "book").unwrap();
        let source = ScriptedSource::new(&[b"A", b"B", b"C", b"C"]);
        let sink = RecordingSink::default();
        let cancel = CancellationToken::new();

        let n = run_capture(&source, &store, &fast_options(), &sink, &cancel)
            .await
            .unwrap();

        assert_eq!(n, 3);
        assert_eq!(
            stored_frames(&store),
            vec!["page_1.png", "page_2.png", "page_3.png"]
        );
        assert_eq!(store.read_frame("page_1.png").unwrap(), b"A");
        assert_eq!(store.read_frame("page_3.png").unwrap(), b"C");
        assert_eq!(*sink.0.lock().unwrap(), vec![1, 2, 3]);
        // Advanced once per accepted frame, never after the terminal match.
        assert_eq!(source.advances(), 3);
    }

    #[tokio::test]
    async fn single_page_book_writes_one_frame() {
        let tmp = TempDir::new().unwrap();
        let store = FrameStore::create(tmp.path(), "book").unwrap();
        let source = ScriptedSource::new(&[b"A", b"A"]);
        let cancel = CancellationToken::new();

        let n = run_capture(&source, &store, &fast_options(), &RecordingSink::default(), &cancel)
            .await
            .unwrap();

        assert_eq!(n, 1);
        assert_eq!(stored_frames(&store), vec!["page_1.png"]);
    }

    #[tokio::test]
    async fn match_threshold_absorbs_a_transient_stall() {
        let tmp = TempDir::new().unwrap();
        let store = FrameStore::create(tmp.path(), "book").unwrap();
        // One stalled recapture of A, then a real page turn, then the end.
        let source = ScriptedSource::new(&[b"A", b"A", b"B", b"B", b"B"]);
        let options = CaptureOptions {
            required_matches: 2,
            ..fast_options()
        };
        let cancel = CancellationToken::new();

        let n = run_capture(&source, &store, &options, &RecordingSink::default(), &cancel)
            .await
            .unwrap();

        assert_eq!(n, 2);
        assert_eq!(stored_frames(&store), vec!["page_1.png", "page_2.png"]);
        assert_eq!(store.read_frame("page_2.png").unwrap(), b"B");
        // Duplicates still trigger an advance while below the threshold.
        assert_eq!(source.advances(), 4);
    }

    #[tokio::test]
    async fn capture_error_aborts_and_keeps_prefix() {
        struct FailingSource {
            inner: ScriptedSource,
        }

        impl PageSource for FailingSource {
            async fn capture(&self) -> Result<Vec<u8>> {
                if self.inner.frames.lock().unwrap().is_empty() {
                    return Err(anyhow!("remote view went away"));
                }
                self.inner.capture().await
            }

            async fn advance(&self) -> Result<()> {
                self.inner.advance().await
            }
        }

        let tmp = TempDir::new().unwrap();
        let store = FrameStore::create(tmp.path(), "book").unwrap();
        let source = FailingSource {
            inner: ScriptedSource::new(&[b"A", b"B"]),
        };
        let cancel = CancellationToken::new();

        let err = run_capture(&source, &store, &fast_options(), &RecordingSink::default(), &cancel)
            .await
            .unwrap_err();

        match err {
            PipelineError::Capture { index, .. } => assert_eq!(index, 3),
            other => panic!("unexpected error: {other}"),
        }
        // Frames written before the failure stay valid, ordered input.
        assert_eq!(stored_frames(&store), vec!["page_1.png", "page_2.png"]);
    }

    #[tokio::test]
    async fn write_error_aborts_with_failing_index() {
        use std::path::PathBuf;

        // Occupies the next frame's file name with a directory on the
        // first advance, so the write of page_2 fails while page_1 is
        // already on disk.
        struct CollidingSource {
            inner: ScriptedSource,
            dir: PathBuf,
        }

        impl PageSource for CollidingSource {
            async fn capture(&self) -> Result<Vec<u8>> {
                self.inner.capture().await
            }

            async fn advance(&self) -> Result<()> {
                std::fs::create_dir(self.dir.join(FrameStore::frame_name(2))).unwrap();
                self.inner.advance().await
            }
        }

        let tmp = TempDir::new().unwrap();
        let store = FrameStore::create(tmp.path(), "book").unwrap();
        let source = CollidingSource {
            inner: ScriptedSource::new(&[b"A", b"B"]),
            dir: store.dir().to_path_buf(),
        };
        let cancel = CancellationToken::new();

        let err = run_capture(&source, &store, &fast_options(), &RecordingSink::default(), &cancel)
            .await
            .unwrap_err();

        match err {
            PipelineError::FrameWrite { index, .. } => assert_eq!(index, 2),
            other => panic!("unexpected error: {other}"),
        }
        // The frame written before the failure is still a valid prefix.
        std::fs::remove_dir(store.dir().join(FrameStore::frame_name(2))).unwrap();
        assert_eq!(stored_frames(&store), vec!["page_1.png"]);
        assert_eq!(store.read_frame("page_1.png").unwrap(), b"A");
    }

    #[tokio::test]
    async fn frame_cap_stops_a_changing_view() {
        let tmp = TempDir::new().unwrap();
        let store = FrameStore::create(tmp.path(), "book").unwrap();
        let source = ScriptedSource::new(&[b"A", b"B", b"C", b"D", b"E"]);
        let options = CaptureOptions {
            max_frames: Some(2),
            ..fast_options()
        };
        let cancel = CancellationToken::new();

        let n = run_capture(&source, &store, &options, &RecordingSink::default(), &cancel)
            .await
            .unwrap();

        assert_eq!(n, 2);
        assert_eq!(stored_frames(&store), vec!["page_1.png", "page_2.png"]);
        // The cap fires before the next advance.
        assert_eq!(source.advances(), 1);
    }

    #[tokio::test]
    async fn cancelled_before_start_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = FrameStore::create(tmp.path(), "book").unwrap();
        let source = ScriptedSource::new(&[b"A", b"B"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let n = run_capture(&source, &store, &fast_options(), &RecordingSink::default(), &cancel)
            .await
            .unwrap();

        assert_eq!(n, 0);
        assert!(stored_frames(&store).is_empty());
    }
}
