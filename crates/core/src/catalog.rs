//! The scan catalog: rows fetched once per source lifetime, plus the
//! field-equality filter iteration respects.

use crate::source::SourceError;
use serde::{Deserialize, Serialize};

/// Column set of the archive's search response. Filters may only name
/// fields from this list.
pub const CATALOG_FIELDS: [&str; 12] = [
    "project",
    "subject_id",
    "session_id",
    "session_label",
    "id",
    "note",
    "parameters_orientation",
    "frames_bodypartexamined",
    "parameters_imagetype",
    "uid",
    "series_description",
    "quarantine_status",
];

/// One row of the scan catalog. The identity key for remote operations is
/// (project, subject_id, session_id, scan_id); the rest is descriptive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub project: String,
    pub subject_id: String,
    pub session_id: String,
    pub session_label: String,
    #[serde(rename = "id")]
    pub scan_id: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default, rename = "parameters_orientation")]
    pub orientation: Option<String>,
    #[serde(default, rename = "frames_bodypartexamined")]
    pub body_part: Option<String>,
    #[serde(default, rename = "parameters_imagetype")]
    pub image_type: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub series_description: Option<String>,
    #[serde(default)]
    pub quarantine_status: Option<String>,
}

impl ScanRecord {
    /// Session labels are `<patient>_<suffix>`; the host viewer loads
    /// volumes by the patient part.
    pub fn patient_name(&self) -> &str {
        self.session_label
            .split('_')
            .next()
            .unwrap_or(&self.session_label)
    }

    /// Artifact name annotations are stored under on the archive.
    pub fn annotation_filename(&self) -> String {
        format!("{}-{}.json", self.session_label, self.scan_id)
    }

    /// Looks a field up by its catalog column name.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "project" => Some(&self.project),
            "subject_id" => Some(&self.subject_id),
            "session_id" => Some(&self.session_id),
            "session_label" => Some(&self.session_label),
            "id" => Some(&self.scan_id),
            "note" => self.note.as_deref(),
            "parameters_orientation" => self.orientation.as_deref(),
            "frames_bodypartexamined" => self.body_part.as_deref(),
            "parameters_imagetype" => self.image_type.as_deref(),
            "uid" => self.uid.as_deref(),
            "series_description" => self.series_description.as_deref(),
            "quarantine_status" => self.quarantine_status.as_deref(),
            _ => None,
        }
    }
}

/// Conjunction of field = value clauses over [`CATALOG_FIELDS`]. Building a
/// clause on any other field fails at construction, never silently.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    clauses: Vec<(String, String)>,
}

impl ScanFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, value: &str) -> Result<Self, SourceError> {
        if !CATALOG_FIELDS.contains(&name) {
            return Err(SourceError::UnknownFilterField(name.to_string()));
        }
        self.clauses.push((name.to_string(), value.to_string()));
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, record: &ScanRecord) -> bool {
        self.clauses
            .iter()
            .all(|(name, value)| record.field(name) == Some(value.as_str()))
    }
}

/// Ordered scan listing, fetched once and immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct ScanCatalog {
    records: Vec<ScanRecord>,
}

impl ScanCatalog {
    pub fn from_records(records: Vec<ScanRecord>) -> Self {
        Self { records }
    }

    /// Parses the archive's CSV search response. Unknown columns are
    /// ignored; the documented optional columns may be absent entirely.
    pub fn from_csv(data: &str) -> Result<Self, SourceError> {
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let records = reader
            .deserialize()
            .collect::<Result<Vec<ScanRecord>, _>>()?;
        Ok(Self { records })
    }

    pub fn get(&self, index: usize) -> Option<&ScanRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[ScanRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
