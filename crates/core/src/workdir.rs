//! Working-directory lifecycle for the scan under iteration: one private
//! temp directory per step, removed when the step ends.

use crate::source::SourceError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use zip::ZipArchive;

/// The on-disk footprint of the current iteration step. The scan directory
/// lives inside a fresh unique temp root, so identically-labelled scans
/// cannot collide; dropping the value deletes everything.
#[derive(Debug)]
pub struct ScanWorkdir {
    root: TempDir,
    name: String,
    scan_dir: PathBuf,
    materialized: bool,
}

impl ScanWorkdir {
    /// `name` is the `{session_label}-{scan_id}` identifier of the scan.
    pub fn create(name: &str) -> io::Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("vertebra-annotator-")
            .tempdir()?;
        let scan_dir = root.path().join(name);
        fs::create_dir(&scan_dir)?;
        debug!(dir = %scan_dir.display(), "created scan working directory");
        Ok(Self {
            root,
            name: name.to_string(),
            scan_dir,
            materialized: false,
        })
    }

    pub fn scan_dir(&self) -> &Path {
        &self.scan_dir
    }

    /// Where the downloaded payload archive lands before extraction.
    pub fn archive_path(&self) -> PathBuf {
        self.root.path().join(format!("{}.zip", self.name))
    }

    /// Scratch location inside the workdir for a fetched annotation file.
    pub fn annotation_path(&self, filename: &str) -> PathBuf {
        self.root.path().join(filename)
    }

    pub fn is_materialized(&self) -> bool {
        self.materialized
    }

    pub fn mark_materialized(&mut self) {
        self.materialized = true;
    }
}

/// Extracts every file entry of `archive_file` directly into `dest`,
/// flattening internal archive paths to their basename so nested folder
/// structure never survives. Returns the number of files written; on
/// failure the partially extracted content is removed before the error
/// propagates.
pub fn extract_flat(archive_file: &Path, dest: &Path) -> Result<usize, SourceError> {
    match extract_flat_inner(archive_file, dest) {
        Ok(count) => Ok(count),
        Err(error) => {
            let _ = clear_dir(dest);
            Err(error)
        }
    }
}

fn extract_flat_inner(archive_file: &Path, dest: &Path) -> Result<usize, SourceError> {
    let file = fs::File::open(archive_file)?;
    let mut archive = ZipArchive::new(file)?;
    let mut count = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let Some(basename) = Path::new(entry.name())
            .file_name()
            .map(|n| n.to_os_string())
        else {
            continue;
        };
        let target = dest.join(basename);
        let mut out = fs::File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        count += 1;
    }
    debug!(files = count, dir = %dest.display(), "extracted scan payload");
    Ok(count)
}

fn clear_dir(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
