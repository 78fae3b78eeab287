//! Drives a scan source through the operator flows the CLI exposes.

use annotator_core::source::{Advance, ScanDescriptor, ScanSource, SourceError};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Walks the whole (possibly skip-filtered) catalog and collects every
/// surfaced descriptor.
pub fn collect_status(source: &mut impl ScanSource) -> Result<Vec<ScanDescriptor>, SourceError> {
    source.begin();
    let mut rows = Vec::new();
    loop {
        match source.advance()? {
            Advance::Item(descriptor) => rows.push(descriptor),
            Advance::EndOfCatalog => return Ok(rows),
        }
    }
}

/// Advances until the scan labelled `label` is the current one.
pub fn seek(
    source: &mut impl ScanSource,
    label: &str,
) -> Result<Option<ScanDescriptor>, SourceError> {
    source.begin();
    loop {
        match source.advance()? {
            Advance::Item(descriptor) if descriptor.label == label => {
                return Ok(Some(descriptor))
            }
            Advance::Item(_) => continue,
            Advance::EndOfCatalog => return Ok(None),
        }
    }
}

/// Materializes the scan labelled `label` and copies its files into `out`,
/// which survives the source's cleanup of the working directory.
pub fn pull(source: &mut impl ScanSource, label: &str, out: &Path) -> Result<usize> {
    if seek(source, label)?.is_none() {
        bail!("scan {label} not found in catalog");
    }
    let dir = source
        .materialize_local_copy()
        .context("materializing scan payload")?;
    fs::create_dir_all(out)?;
    let mut copied = 0;
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        fs::copy(&path, out.join(name))?;
        copied += 1;
    }
    info!(files = copied, out = %out.display(), "pulled scan payload");
    Ok(copied)
}

/// Stores `artifact` as the annotation of the scan labelled `label`.
pub fn push(source: &mut impl ScanSource, label: &str, artifact: &Path) -> Result<()> {
    if !artifact.is_file() {
        bail!("annotation artifact {} does not exist", artifact.display());
    }
    if seek(source, label)?.is_none() {
        bail!("scan {label} not found in catalog");
    }
    source
        .store_annotation(artifact)
        .context("storing annotation")?;
    Ok(())
}

/// Fetches the stored annotation of the scan labelled `label` into `dest`.
pub fn fetch(source: &mut impl ScanSource, label: &str, dest: &Path) -> Result<PathBuf> {
    let Some(descriptor) = seek(source, label)? else {
        bail!("scan {label} not found in catalog");
    };
    if !descriptor.has_annotation {
        bail!("scan {label} has no stored annotation");
    }
    let artifact = source
        .load_existing_annotation()?
        .context("annotation vanished between probe and fetch")?;
    fs::copy(&artifact, dest)?;
    Ok(dest.to_path_buf())
}
