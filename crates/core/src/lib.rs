//! Core library: scan catalog, annotation records, and the scan-source
//! iteration protocol over the remote archive or a local cohort.

pub mod annotation;
pub mod catalog;
pub mod config;
pub mod local;
pub mod query;
pub mod remote;
pub mod source;
pub mod workdir;

pub use annotation::{AnnotationRecord, Coordinate, UnknownLabelError, VertebraLabel};
pub use catalog::{ScanCatalog, ScanFilter, ScanRecord};
pub use local::LocalScanSource;
pub use remote::RemoteScanSource;
pub use source::{with_scan_source, Advance, ScanDescriptor, ScanSource, Source, SourceError};
