use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the capture and assembly pipelines.
///
/// Neither pipeline retries internally; every variant is fatal to the
/// current run and carries the index or name needed to point at the
/// offending frame.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("capture failed at page {index}: {source}")]
    Capture {
        index: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("page advance failed after page {index}: {source}")]
    Advance {
        index: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to write frame {index}: {source}")]
    FrameWrite {
        index: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to list frames in {}: {source}", dir.display())]
    StoreList {
        dir: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to read frame '{name}': {source}")]
    FrameRead {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("frame '{name}' is not a valid image: {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("'{book}' is not a valid book name")]
    InvalidBook { book: String },

    #[error("no frames to assemble for '{book}'")]
    EmptyStore { book: String },

    #[error("no book directories found under {}", dir.display())]
    NoBooks { dir: PathBuf },

    #[error("failed to write PDF {}: {source}", path.display())]
    DocumentWrite {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}
