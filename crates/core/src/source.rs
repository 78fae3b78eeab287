//! The scan-source contract: a single-pass, resource-owning iteration
//! protocol shared by the remote archive and local directory variants.

use crate::local::LocalScanSource;
use crate::remote::RemoteScanSource;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Archive(#[from] archive::ArchiveError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("catalog parse failed: {0}")]
    Catalog(#[from] csv::Error),
    #[error("payload extraction failed: {0}")]
    Extract(#[from] zip::result::ZipError),
    #[error("failed to build search document: {0}")]
    Query(#[from] quick_xml::Error),
    #[error("no scan is active; call advance() first")]
    NoActiveScan,
    #[error("unknown catalog field for filtering: {0}")]
    UnknownFilterField(String),
}

/// What one successful `advance` step hands the caller.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ScanDescriptor {
    pub label: String,
    pub has_annotation: bool,
}

/// Outcome of an `advance` step. Exhaustion is a value, not an error: a
/// drained catalog keeps answering `EndOfCatalog`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Item(ScanDescriptor),
    EndOfCatalog,
}

/// Iteration position. One context at most is alive while `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cursor {
    NotStarted,
    Active(usize),
    Exhausted,
}

impl Cursor {
    pub(crate) fn next_index(self) -> Option<usize> {
        match self {
            Cursor::NotStarted => Some(0),
            Cursor::Active(i) => Some(i + 1),
            Cursor::Exhausted => None,
        }
    }
}

/// A cohort of scans iterated one at a time. The source exclusively owns
/// the network session (remote) and the current working directory; the
/// caller borrows paths for the duration of one step.
pub trait ScanSource {
    /// Resets iteration to the first catalog entry without re-fetching
    /// the catalog.
    fn begin(&mut self);

    /// Releases the previous step's working directory, then surfaces the
    /// next catalog row passing the filter (and, when skipping is enabled,
    /// the annotation probe), or reports exhaustion.
    fn advance(&mut self) -> Result<Advance, SourceError>;

    /// Ensures the current scan's image payload resides under the working
    /// directory and returns that directory. Idempotent within a step.
    fn materialize_local_copy(&mut self) -> Result<PathBuf, SourceError>;

    /// Persists an annotation artifact under the identifier derived from
    /// the current scan.
    fn store_annotation(&mut self, artifact: &Path) -> Result<(), SourceError>;

    /// A local path to the previously stored annotation for the current
    /// scan, or `None` when it has none.
    fn load_existing_annotation(&mut self) -> Result<Option<PathBuf>, SourceError>;

    /// When set, `advance` silently passes over rows that already carry
    /// an annotation.
    fn set_skip_already_annotated(&mut self, skip: bool);

    /// Releases everything the source owns: working directory, network
    /// session, server-side token. Idempotent, safe after partial
    /// construction, and never fails.
    fn teardown(&mut self);
}

/// Walks `items` from `start` to the first entry passing `accept` and, when
/// `skip_annotated` is set, whose probe reports no annotation. An explicit
/// loop: long runs of annotated rows must not grow the stack.
pub(crate) fn select_next<T>(
    items: &[T],
    start: usize,
    accept: impl Fn(&T) -> bool,
    skip_annotated: bool,
    mut probe: impl FnMut(&T) -> Result<bool, SourceError>,
) -> Result<Option<(usize, bool)>, SourceError> {
    let mut index = start;
    while let Some(item) = items.get(index) {
        if !accept(item) {
            index += 1;
            continue;
        }
        let has_annotation = probe(item)?;
        if skip_annotated && has_annotation {
            index += 1;
            continue;
        }
        return Ok(Some((index, has_annotation)));
    }
    Ok(None)
}

/// Runs `f` against the source and tears the source down on every exit
/// path, early returns and errors included.
pub fn with_scan_source<S, T, E>(
    mut source: S,
    f: impl FnOnce(&mut S) -> Result<T, E>,
) -> Result<T, E>
where
    S: ScanSource,
{
    let result = f(&mut source);
    source.teardown();
    result
}

/// The closed set of source variants, dispatching statically.
pub enum Source {
    Remote(RemoteScanSource),
    Local(LocalScanSource),
}

impl ScanSource for Source {
    fn begin(&mut self) {
        match self {
            Source::Remote(s) => s.begin(),
            Source::Local(s) => s.begin(),
        }
    }

    fn advance(&mut self) -> Result<Advance, SourceError> {
        match self {
            Source::Remote(s) => s.advance(),
            Source::Local(s) => s.advance(),
        }
    }

    fn materialize_local_copy(&mut self) -> Result<PathBuf, SourceError> {
        match self {
            Source::Remote(s) => s.materialize_local_copy(),
            Source::Local(s) => s.materialize_local_copy(),
        }
    }

    fn store_annotation(&mut self, artifact: &Path) -> Result<(), SourceError> {
        match self {
            Source::Remote(s) => s.store_annotation(artifact),
            Source::Local(s) => s.store_annotation(artifact),
        }
    }

    fn load_existing_annotation(&mut self) -> Result<Option<PathBuf>, SourceError> {
        match self {
            Source::Remote(s) => s.load_existing_annotation(),
            Source::Local(s) => s.load_existing_annotation(),
        }
    }

    fn set_skip_already_annotated(&mut self, skip: bool) {
        match self {
            Source::Remote(s) => s.set_skip_already_annotated(skip),
            Source::Local(s) => s.set_skip_already_annotated(skip),
        }
    }

    fn teardown(&mut self) {
        match self {
            Source::Remote(s) => s.teardown(),
            Source::Local(s) => s.teardown(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_skips_rows_failing_the_filter() {
        let items = ["a", "b", "a", "c"];
        let found = select_next(&items, 0, |i| *i == "a", false, |_| Ok(false))
            .unwrap()
            .unwrap();
        assert_eq!(found, (0, false));
        let found = select_next(&items, 1, |i| *i == "a", false, |_| Ok(false))
            .unwrap()
            .unwrap();
        assert_eq!(found, (2, false));
    }

    #[test]
    fn selection_skips_annotated_rows_when_asked() {
        let items = [false, true, true, false];
        let probe = |annotated: &bool| Ok(*annotated);
        let found = select_next(&items, 1, |_| true, true, probe).unwrap();
        assert_eq!(found, Some((3, false)));
    }

    #[test]
    fn selection_reports_exhaustion_after_skipping_everything() {
        let items = [true, true];
        let found = select_next(&items, 0, |_| true, true, |a: &bool| Ok(*a)).unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn probe_failures_propagate() {
        let items = [()];
        let result = select_next(&items, 0, |_| true, true, |_| {
            Err(SourceError::NoActiveScan)
        });
        assert!(result.is_err());
    }
}
