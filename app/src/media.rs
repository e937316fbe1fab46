//! Locating numbered media frames on disk.

use std::path::{Path, PathBuf};

/// Finds `<media_dir>/<n>.jpg`, trying the start directory and each of its
/// ancestors in turn.
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    media_dir: PathBuf,
    start: PathBuf,
}

impl MediaLibrary {
    /// Search for `media_dir` relative to `start` and its ancestors.
    /// An absolute `media_dir` is used as is.
    pub fn new(media_dir: impl Into<PathBuf>, start: impl Into<PathBuf>) -> Self {
        Self {
            media_dir: media_dir.into(),
            start: start.into(),
        }
    }

    /// Search from the current working directory.
    pub fn from_current_dir(media_dir: impl Into<PathBuf>) -> Self {
        let start = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(media_dir, start)
    }

    /// File name of the media for zero-based `frame`.
    pub fn file_name(frame: u64) -> String {
        format!("{}.jpg", frame + 1)
    }

    /// Path of the media for zero-based `frame`, if it exists anywhere on the
    /// search path.
    pub fn find(&self, frame: u64) -> Option<PathBuf> {
        let name = Self::file_name(frame);
        find_upwards(&self.start, &self.media_dir.join(name))
    }
}

fn find_upwards(start: &Path, relative: &Path) -> Option<PathBuf> {
    if relative.is_absolute() {
        return relative.is_file().then(|| relative.to_path_buf());
    }
    start
        .ancestors()
        .map(|dir| dir.join(relative))
        .find(|candidate| candidate.is_file())
}
