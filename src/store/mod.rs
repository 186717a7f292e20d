//! On-disk frame store: one directory per book under a common base,
//! frames named `page_<N>.png` with a 1-based, gap-free index.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;

pub const FRAME_PREFIX: &str = "page_";
pub const FRAME_EXT: &str = "png";

/// The set of captured frames for one book.
///
/// The capture loop is the only writer; assembly opens the same
/// directory read-only. Contiguity of indices is guaranteed by the
/// writer, not re-checked here.
pub struct FrameStore {
    dir: PathBuf,
}

impl FrameStore {
    /// Open (creating if needed) the store for `book` under `base`.
    pub fn create(base: &Path, book: &str) -> Result<Self> {
        let dir = base.join(book);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create frame directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing store without creating anything.
    pub fn open(base: &Path, book: &str) -> Self {
        Self {
            dir: base.join(book),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frame_name(index: u32) -> String {
        format!("{FRAME_PREFIX}{index}.{FRAME_EXT}")
    }

    /// Parse a file name against the `page_<N>.png` convention.
    /// Returns `None` for anything non-conforming, including index 0
    /// (indices are 1-based).
    pub fn frame_index(name: &str) -> Option<u32> {
        let stem = name
            .strip_prefix(FRAME_PREFIX)?
            .strip_suffix(&format!(".{FRAME_EXT}"))?;
        match stem.parse::<u32>() {
            Ok(0) | Err(_) => None,
            Ok(index) => Some(index),
        }
    }

    pub fn write_frame(&self, index: u32, bytes: &[u8]) -> io::Result<()> {
        fs::write(self.dir.join(Self::frame_name(index)), bytes)
    }

    pub fn read_frame(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.dir.join(name))
    }

    /// List conforming frame names in directory order (unsorted).
    /// Non-conforming entries are skipped; a missing directory is an
    /// empty store, not an error.
    pub fn list_frames(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to list frames in {}", self.dir.display()))
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to list frames in {}", self.dir.display()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if Self::frame_index(name).is_some() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

/// A book name must be usable as a single path segment under the store
/// base; the store namespaces nothing beyond that.
pub fn valid_book_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0')
}

/// List books that actually hold at least one conforming frame.
/// Directories without any `page_<N>.png` entry are not frame stores
/// and are skipped with a note.
pub fn list_books(base: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(base) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to list {}", base.display()))
        }
    };

    let mut books = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", base.display()))?;
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let store = FrameStore::open(base, &name);
        if store.list_frames()?.is_empty() {
            warn!("skipping '{name}': no page_<N>.{FRAME_EXT} frames inside");
            continue;
        }
        books.push(name);
    }
    books.sort();
    Ok(books)
}

/// Remove every book directory under `base`, keeping `base` itself.
pub fn clean(base: &Path) -> Result<()> {
    if !base.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(base).with_context(|| format!("failed to list {}", base.display()))? {
        let entry = entry.with_context(|| format!("failed to list {}", base.display()))?;
        let path = entry.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        } else {
            fs::remove_file(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn frame_names_round_trip() {
        assert_eq!(FrameStore::frame_name(1), "page_1.png");
        assert_eq!(FrameStore::frame_name(42), "page_42.png");
        assert_eq!(FrameStore::frame_index("page_1.png"), Some(1));
        assert_eq!(FrameStore::frame_index("page_10.png"), Some(10));
    }

    #[test]
    fn non_conforming_names_are_rejected() {
        for name in [
            "cover.png",
            "page_.png",
            "page_3.jpg",
            "page_0.png",
            "page_-1.png",
            "page_3.png.bak",
            "Page_3.png",
        ] {
            assert_eq!(FrameStore::frame_index(name), None, "{name}");
        }
    }

    #[test]
    fn listing_skips_foreign_entries() {
        let tmp = TempDir::new().unwrap();
        let store = FrameStore::create(tmp.path(), "mybook").unwrap();
        store.write_frame(1, b"a").unwrap();
        store.write_frame(2, b"b").unwrap();
        std::fs::write(store.dir().join("notes.txt"), b"x").unwrap();
        std::fs::write(store.dir().join("cover.png"), b"x").unwrap();

        let mut names = store.list_frames().unwrap();
        names.sort();
        assert_eq!(names, vec!["page_1.png", "page_2.png"]);
    }

    #[test]
    fn missing_store_lists_empty() {
        let tmp = TempDir::new().unwrap();
        let store = FrameStore::open(tmp.path(), "absent");
        assert!(store.list_frames().unwrap().is_empty());
    }

    #[test]
    fn list_books_requires_conforming_frames() {
        let tmp = TempDir::new().unwrap();
        let good = FrameStore::create(tmp.path(), "good").unwrap();
        good.write_frame(1, b"a").unwrap();
        // A directory with no frames is not a book.
        std::fs::create_dir(tmp.path().join("empty")).unwrap();
        // Loose files at the top level are ignored too.
        std::fs::write(tmp.path().join("stray.png"), b"x").unwrap();

        assert_eq!(list_books(tmp.path()).unwrap(), vec!["good"]);
    }

    #[test]
    fn clean_empties_the_base_directory() {
        let tmp = TempDir::new().unwrap();
        let store = FrameStore::create(tmp.path(), "book").unwrap();
        store.write_frame(1, b"a").unwrap();
        std::fs::write(tmp.path().join("stray"), b"x").unwrap();

        clean(tmp.path()).unwrap();
        assert!(tmp.path().exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn book_name_validation() {
        assert!(valid_book_name("my-book"));
        assert!(valid_book_name("Dune 2"));
        assert!(!valid_book_name(""));
        assert!(!valid_book_name("a/b"));
        assert!(!valid_book_name(".."));
    }
}
