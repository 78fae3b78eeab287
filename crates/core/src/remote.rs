//! Scan source backed by the remote imaging archive: one-shot catalog
//! fetch, per-step payload download into a private working directory, and
//! annotation upload keyed on the scan's identity tuple.

use crate::catalog::{ScanCatalog, ScanFilter, ScanRecord};
use crate::config::ArchiveConfig;
use crate::query;
use crate::source::{
    select_next, Advance, Cursor, ScanDescriptor, ScanSource, SourceError,
};
use crate::workdir::{extract_flat, ScanWorkdir};
use archive::{Credentials, ScanPath, XnatClient};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Query document looked for when the config names none.
const DEFAULT_QUERY_FILE: &str = "xnat_scan_query.xml";

fn scan_path(record: &ScanRecord) -> ScanPath<'_> {
    ScanPath {
        project: &record.project,
        subject: &record.subject_id,
        session: &record.session_id,
        scan: &record.scan_id,
    }
}

/// Transient state of the step under iteration. Dropping it removes the
/// working directory, which keeps the one-directory-on-disk invariant.
struct ActiveScan {
    workdir: ScanWorkdir,
    has_annotation: bool,
}

pub struct RemoteScanSource {
    client: XnatClient,
    catalog: ScanCatalog,
    filter: ScanFilter,
    skip_annotated: bool,
    cursor: Cursor,
    active: Option<ActiveScan>,
    torn_down: bool,
}

impl RemoteScanSource {
    /// Authenticates against the archive and fetches the scan catalog.
    /// The catalog never refreshes during this source's lifetime, so an
    /// iteration pass is deterministic.
    pub fn connect(cfg: &ArchiveConfig) -> Result<Self, SourceError> {
        let credentials = Credentials::resolve(
            &cfg.server,
            cfg.username.as_deref(),
            cfg.password.as_deref(),
        )?;
        let mut client = XnatClient::connect(cfg.server.clone(), credentials)?;
        let catalog = match Self::fetch_catalog(&client, cfg) {
            Ok(catalog) => catalog,
            Err(error) => {
                // Half-constructed source: release the server token now.
                client.close_session();
                return Err(error);
            }
        };
        info!(
            scans = catalog.len(),
            server = client.server(),
            "fetched scan catalog"
        );
        Ok(Self {
            client,
            catalog,
            filter: ScanFilter::new(),
            skip_annotated: false,
            cursor: Cursor::NotStarted,
            active: None,
            torn_down: false,
        })
    }

    fn fetch_catalog(client: &XnatClient, cfg: &ArchiveConfig) -> Result<ScanCatalog, SourceError> {
        // Configured query file, else one beside the working directory,
        // else the generated default document.
        let document = match cfg.query_file.as_deref() {
            Some(path) if !path.is_empty() => fs::read(path)?,
            _ => {
                let fallback = Path::new(DEFAULT_QUERY_FILE);
                if fallback.is_file() {
                    fs::read(fallback)?
                } else {
                    query::default_search_document()?
                }
            }
        };
        let listing = client.search_csv(document)?;
        ScanCatalog::from_csv(&listing)
    }

    /// Narrows iteration to rows matching `filter`. Row order and identity
    /// are untouched.
    pub fn with_filter(mut self, filter: ScanFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn catalog(&self) -> &ScanCatalog {
        &self.catalog
    }

    fn current_record(&self) -> Result<&ScanRecord, SourceError> {
        match (self.cursor, self.active.as_ref()) {
            (Cursor::Active(index), Some(_)) => {
                self.catalog.get(index).ok_or(SourceError::NoActiveScan)
            }
            _ => Err(SourceError::NoActiveScan),
        }
    }
}

impl ScanSource for RemoteScanSource {
    fn begin(&mut self) {
        self.active = None;
        self.cursor = Cursor::NotStarted;
    }

    fn advance(&mut self) -> Result<Advance, SourceError> {
        // Previous step's directory goes first, so at most one working
        // directory ever exists.
        self.active = None;
        let Some(start) = self.cursor.next_index() else {
            return Ok(Advance::EndOfCatalog);
        };

        let filter = &self.filter;
        let client = &self.client;
        let selected = select_next(
            self.catalog.records(),
            start,
            |record| filter.matches(record),
            self.skip_annotated,
            |record| {
                Ok(client
                    .annotation_exists(&scan_path(record), &record.annotation_filename())?)
            },
        )?;

        match selected {
            Some((index, has_annotation)) => {
                let (label, workdir_name) = {
                    let record = &self.catalog.records()[index];
                    (
                        record.session_label.clone(),
                        format!("{}-{}", record.session_label, record.scan_id),
                    )
                };
                let workdir = ScanWorkdir::create(&workdir_name)?;
                self.cursor = Cursor::Active(index);
                self.active = Some(ActiveScan {
                    workdir,
                    has_annotation,
                });
                info!(%label, has_annotation, "advanced to scan");
                Ok(Advance::Item(ScanDescriptor {
                    label,
                    has_annotation,
                }))
            }
            None => {
                self.cursor = Cursor::Exhausted;
                info!("scan catalog exhausted");
                Ok(Advance::EndOfCatalog)
            }
        }
    }

    fn materialize_local_copy(&mut self) -> Result<PathBuf, SourceError> {
        let record = self.current_record()?.clone();
        let active = self.active.as_mut().ok_or(SourceError::NoActiveScan)?;
        if active.workdir.is_materialized() {
            return Ok(active.workdir.scan_dir().to_path_buf());
        }

        let archive_file = active.workdir.archive_path();
        self.client
            .download_dicom_zip(&scan_path(&record), &archive_file)?;
        let extracted = extract_flat(&archive_file, active.workdir.scan_dir());
        // The downloaded archive never outlives the step, success or not.
        let _ = fs::remove_file(&archive_file);
        let files = extracted?;
        active.workdir.mark_materialized();
        info!(files, label = %record.session_label, "materialized scan payload");
        Ok(active.workdir.scan_dir().to_path_buf())
    }

    fn store_annotation(&mut self, artifact: &Path) -> Result<(), SourceError> {
        let record = self.current_record()?.clone();
        let path = scan_path(&record);
        let filename = record.annotation_filename();
        self.client.put_annotation_container(&path)?;
        self.client.upload_annotation(&path, &filename, artifact)?;
        if let Some(active) = self.active.as_mut() {
            active.has_annotation = true;
        }
        info!(file = %filename, "stored annotation on archive");
        Ok(())
    }

    fn load_existing_annotation(&mut self) -> Result<Option<PathBuf>, SourceError> {
        let record = self.current_record()?.clone();
        let active = self.active.as_ref().ok_or(SourceError::NoActiveScan)?;
        if !active.has_annotation {
            return Ok(None);
        }
        let filename = record.annotation_filename();
        let dest = active.workdir.annotation_path(&filename);
        self.client
            .fetch_annotation(&scan_path(&record), &filename, &dest)?;
        Ok(Some(dest))
    }

    fn set_skip_already_annotated(&mut self, skip: bool) {
        self.skip_annotated = skip;
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.active = None;
        self.client.close_session();
    }
}

impl Drop for RemoteScanSource {
    fn drop(&mut self) {
        self.teardown();
    }
}
