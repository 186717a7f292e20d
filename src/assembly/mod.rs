//! Turns one frame store into one PDF, page geometry matching each
//! source frame exactly.

pub mod pdf;

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info};

use crate::error::PipelineError;
use crate::store::FrameStore;
use pdf::PdfBuilder;

/// Assemble `<ebooks_dir>/<book>.pdf` from the frames captured for
/// `book`. Pages follow ascending frame index; any existing PDF at the
/// output path is overwritten. Fails without writing anything if the
/// store holds no conforming frames or any frame cannot be decoded.
pub fn assemble_book(
    screenshots_dir: &Path,
    ebooks_dir: &Path,
    book: &str,
) -> Result<PathBuf, PipelineError> {
    // Book names double as path segments under both base directories.
    if !crate::store::valid_book_name(book) {
        return Err(PipelineError::InvalidBook {
            book: book.to_string(),
        });
    }

    let store = FrameStore::open(screenshots_dir, book);
    let frames = ordered_frames(&store)?;
    if frames.is_empty() {
        return Err(PipelineError::EmptyStore {
            book: book.to_string(),
        });
    }

    let output = ebooks_dir.join(format!("{book}.pdf"));
    let mut builder = PdfBuilder::new();
    for (_, name) in &frames {
        let bytes = store.read_frame(name).map_err(|source| PipelineError::FrameRead {
            name: name.clone(),
            source,
        })?;
        let image =
            image::load_from_memory(&bytes).map_err(|source| PipelineError::Decode {
                name: name.clone(),
                source,
            })?;
        builder
            .add_page(&bytes, image.width(), image.height())
            .map_err(|source| PipelineError::DocumentWrite {
                path: output.clone(),
                source,
            })?;
        info!("Added {name} to PDF");
    }

    fs::create_dir_all(ebooks_dir).map_err(|source| PipelineError::DocumentWrite {
        path: output.clone(),
        source: source.into(),
    })?;
    let pages = builder.page_count();
    builder
        .save(&output)
        .map_err(|source| PipelineError::DocumentWrite {
            path: output.clone(),
            source,
        })?;
    info!("Assembled {pages} page(s) into {}", output.display());
    Ok(output)
}

/// Discover conforming frames and sort them by parsed index, ascending
/// and numeric (page_2 before page_10). Duplicate indices mean a
/// corrupted store; they are kept in stable order but reported.
fn ordered_frames(store: &FrameStore) -> Result<Vec<(u32, String)>, PipelineError> {
    let names = store
        .list_frames()
        .map_err(|source| PipelineError::StoreList {
            dir: store.dir().to_path_buf(),
            source,
        })?;

    let mut frames: Vec<(u32, String)> = names
        .into_iter()
        .filter_map(|name| FrameStore::frame_index(&name).map(|index| (index, name)))
        .collect();
    frames.sort_by_key(|(index, _)| *index);

    for pair in frames.windows(2) {
        if pair[0].0 == pair[1].0 {
            error!(
                "duplicate frame index {} ('{}' and '{}'); store looks corrupted",
                pair[0].0, pair[0].1, pair[1].1
            );
        }
    }
    Ok(frames)
}
