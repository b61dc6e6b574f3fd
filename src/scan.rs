//! Directory scanning that turns a folder into an ordered [`Catalog`].

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Lowercase extensions (without dot) the slideshow will try to display.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];

/// Return `true` if `path` has an allowed image extension (case-insensitive).
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
}

/// Ordered image list for one source folder.
///
/// A catalog is never edited in place: every rescan builds a new one and
/// any index into the previous catalog becomes meaningless.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    items: Vec<PathBuf>,
}

impl Catalog {
    pub fn from_vec(items: Vec<PathBuf>) -> Self {
        Self { items }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&Path> {
        self.items.get(idx).map(PathBuf::as_path)
    }

    #[must_use]
    pub fn first(&self) -> Option<&Path> {
        self.get(0)
    }

    /// Borrow the internal list (read-only).
    #[must_use]
    pub fn as_slice(&self) -> &[PathBuf] {
        &self.items
    }

    /// Permute the catalog once; the order is then fixed for its lifetime.
    #[must_use]
    pub fn shuffled<R: Rng + ?Sized>(mut self, rng: &mut R) -> Self {
        self.items.shuffle(rng);
        self
    }
}

/// Scan `root` for supported images.
///
/// A missing root, or one that is not a directory, yields an empty catalog.
/// Within each directory files come first, sorted by name, followed by the
/// subdirectories in name order, so identical trees always produce the same
/// list. Without `recursive` only the direct children are considered.
pub fn scan(root: &Path, recursive: bool) -> Catalog {
    if !root.is_dir() {
        warn!(folder = %root.display(), "image folder does not exist");
        return Catalog::default();
    }

    let mut wd = WalkDir::new(root).follow_links(true).sort_by(files_first);
    if !recursive {
        wd = wd.max_depth(1);
    }

    let items = wd
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!("scan: skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(DirEntry::into_path)
        .filter(|path| is_supported_image(path))
        .collect();

    Catalog::from_vec(items)
}

fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}
