//! Scan source over files already resident on disk: a directory of image
//! volumes or a manifest listing them, each paired with a sibling
//! annotation file when one exists.

use crate::source::{
    select_next, Advance, Cursor, ScanDescriptor, ScanSource, SourceError,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// File suffix of a scan volume in a local cohort directory.
pub const SCAN_SUFFIX: &str = ".nii.gz";

#[derive(Debug, Deserialize)]
struct ManifestRow {
    path: String,
}

pub struct LocalScanSource {
    scans: Vec<PathBuf>,
    cursor: Cursor,
    current: Option<usize>,
    skip_annotated: bool,
}

impl LocalScanSource {
    /// Lists scan volumes directly inside `dir`, sorted for deterministic
    /// iteration order.
    pub fn from_directory(dir: &Path) -> Result<Self, SourceError> {
        let mut scans = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let is_scan = entry
                .file_name()
                .to_str()
                .map(|name| name.ends_with(SCAN_SUFFIX))
                .unwrap_or(false);
            if is_scan {
                scans.push(entry.into_path());
            }
        }
        scans.sort();
        info!(scans = scans.len(), dir = %dir.display(), "listed local cohort");
        Ok(Self::from_paths(scans))
    }

    /// Reads scan paths from a delimited manifest with a `path` column.
    pub fn from_manifest(manifest: &Path) -> Result<Self, SourceError> {
        let mut reader = csv::Reader::from_path(manifest)?;
        let scans = reader
            .deserialize::<ManifestRow>()
            .map(|row| row.map(|r| PathBuf::from(r.path)))
            .collect::<Result<Vec<_>, _>>()?;
        info!(scans = scans.len(), manifest = %manifest.display(), "loaded scan manifest");
        Ok(Self::from_paths(scans))
    }

    fn from_paths(scans: Vec<PathBuf>) -> Self {
        Self {
            scans,
            cursor: Cursor::NotStarted,
            current: None,
            skip_annotated: false,
        }
    }

    pub fn scans(&self) -> &[PathBuf] {
        &self.scans
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    fn current_scan(&self) -> Result<&Path, SourceError> {
        self.current
            .and_then(|index| self.scans.get(index))
            .map(PathBuf::as_path)
            .ok_or(SourceError::NoActiveScan)
    }
}

/// `scan.nii.gz` pairs with `scan.json` beside it.
fn annotation_path(scan: &Path) -> PathBuf {
    let name = scan.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let stem = name.strip_suffix(SCAN_SUFFIX).unwrap_or(name);
    scan.with_file_name(format!("{stem}.json"))
}

fn scan_label(scan: &Path) -> String {
    let name = scan.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.strip_suffix(SCAN_SUFFIX).unwrap_or(name).to_string()
}

impl ScanSource for LocalScanSource {
    fn begin(&mut self) {
        self.cursor = Cursor::NotStarted;
        self.current = None;
    }

    fn advance(&mut self) -> Result<Advance, SourceError> {
        self.current = None;
        let Some(start) = self.cursor.next_index() else {
            return Ok(Advance::EndOfCatalog);
        };
        let selected = select_next(&self.scans, start, |_| true, self.skip_annotated, |scan| {
            Ok(annotation_path(scan).is_file())
        })?;
        match selected {
            Some((index, has_annotation)) => {
                self.cursor = Cursor::Active(index);
                self.current = Some(index);
                let label = scan_label(&self.scans[index]);
                debug!(%label, has_annotation, "advanced to local scan");
                Ok(Advance::Item(ScanDescriptor {
                    label,
                    has_annotation,
                }))
            }
            None => {
                self.cursor = Cursor::Exhausted;
                Ok(Advance::EndOfCatalog)
            }
        }
    }

    fn materialize_local_copy(&mut self) -> Result<PathBuf, SourceError> {
        let scan = self.current_scan()?;
        let dir = scan
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(dir)
    }

    fn store_annotation(&mut self, artifact: &Path) -> Result<(), SourceError> {
        let scan = self.current_scan()?;
        let dest = annotation_path(scan);
        fs::copy(artifact, &dest)?;
        info!(dest = %dest.display(), "stored annotation beside scan");
        Ok(())
    }

    fn load_existing_annotation(&mut self) -> Result<Option<PathBuf>, SourceError> {
        let scan = self.current_scan()?;
        let path = annotation_path(scan);
        Ok(path.is_file().then_some(path))
    }

    fn set_skip_already_annotated(&mut self, skip: bool) {
        self.skip_annotated = skip;
    }

    fn teardown(&mut self) {
        // Nothing owned: the files were on disk before iteration started.
        self.current = None;
    }
}
