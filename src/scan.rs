//! Directory enumeration for uploads.
//!
//! [`DirectoryScanner`] walks a root directory and yields every file below it
//! as a [`FileEntry`]. Hidden entries (name starting with `.`) and
//! dependency-cache or build-output directories are pruned without descending
//! into them. Symlinks to files are yielded; symlinked directories are never
//! followed. Each call to [`DirectoryScanner::iter`] starts a fresh walk.

use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::error::ScanError;

/// Directory names that are never uploaded, at any depth below the root.
/// Hidden directories are pruned by name prefix as well.
pub const EXCLUDED_DIRS: &[&str] = &[".git", ".svn", ".hg", "node_modules", "dist", "target"];

/// A file found under the scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the root, `/`-separated on every platform.
    pub relative_path: String,
    pub absolute_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    root: PathBuf,
    excludes: Vec<Regex>,
}

impl DirectoryScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryScanner {
            root: root.into(),
            excludes: Vec::new(),
        }
    }

    /// Adds exclude patterns, matched as regular expressions against each
    /// file's relative path.
    pub fn with_excludes<I, S>(mut self, patterns: I) -> Result<Self, ScanError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let regex = Regex::new(pattern).map_err(|source| ScanError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
            self.excludes.push(regex);
        }
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Starts a lazy walk of the root. Fails up front if the root is missing,
    /// cannot be accessed, or is not a directory.
    pub fn iter(&self) -> Result<ScanIter<'_>, ScanError> {
        let metadata = std::fs::metadata(&self.root).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ScanError::NotFound {
                    path: self.root.clone(),
                }
            } else {
                ScanError::Inaccessible {
                    path: self.root.clone(),
                    source,
                }
            }
        })?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory {
                path: self.root.clone(),
            });
        }
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(is_walkable as fn(&DirEntry) -> bool);
        Ok(ScanIter {
            scanner: self,
            walker,
        })
    }

    /// Walks the whole tree. Any enumeration error aborts the scan.
    pub fn scan(&self) -> Result<Vec<FileEntry>, ScanError> {
        let files = self.iter()?.collect::<Result<Vec<_>, _>>()?;
        info!(root = %self.root.display(), count = files.len(), "Scanned directory");
        Ok(files)
    }

    fn is_excluded(&self, relative_path: &str) -> bool {
        self.excludes.iter().any(|re| re.is_match(relative_path))
    }
}

pub struct ScanIter<'a> {
    scanner: &'a DirectoryScanner,
    walker: walkdir::FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>,
}

impl Iterator for ScanIter<'_> {
    type Item = Result<FileEntry, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(source) => {
                    let path = source
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.scanner.root.clone());
                    return Some(Err(ScanError::Walk { path, source }));
                }
            };
            if !is_file_like(&entry) {
                continue;
            }
            let relative_path = relative_path(&self.scanner.root, entry.path());
            if self.scanner.is_excluded(&relative_path) {
                debug!(path = %relative_path, "Skipping excluded file");
                continue;
            }
            return Some(Ok(FileEntry {
                relative_path,
                absolute_path: entry.into_path(),
            }));
        }
    }
}

// The root itself is always walked, even if it is called e.g. `dist` or `.`.
fn is_walkable(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    if is_hidden(entry) {
        debug!(path = %entry.path().display(), "Skipping hidden entry");
        return false;
    }
    if !entry.file_type().is_dir() {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    let walkable = !EXCLUDED_DIRS.contains(&name.as_ref());
    if !walkable {
        debug!(path = %entry.path().display(), "Skipping directory");
    }
    walkable
}

/// `.env`, `.github/` and friends. These routinely hold secrets or tooling
/// config and are never uploaded.
fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Regular files, and symlinks that do not resolve to a directory. A dangling
/// link is kept so that reading it fails for that one file.
fn is_file_like(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_file() {
        return true;
    }
    if !file_type.is_symlink() {
        return false;
    }
    match std::fs::metadata(entry.path()) {
        Ok(target) if target.is_dir() => {
            debug!(path = %entry.path().display(), "Not following directory symlink");
            false
        }
        Ok(target) => target.is_file(),
        Err(e) => {
            debug!(path = %entry.path().display(), error = %e, "Keeping dangling symlink");
            true
        }
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
