//! Per-scan vertebra landmark records and their JSON artifact form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown vertebra label: {0}")]
pub struct UnknownLabelError(pub String);

/// The closed set of anatomical landmark labels. Variant order is
/// anatomical (cervical, thoracic, lumbar, sacral), so ordered maps keyed
/// on the label serialize in reading order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum VertebraLabel {
    C1, C2, C3, C4, C5, C6, C7,
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12,
    L1, L2, L3, L4, L5,
    S1, S2, S3,
}

impl VertebraLabel {
    pub const ALL: [VertebraLabel; 27] = {
        use VertebraLabel::*;
        [
            C1, C2, C3, C4, C5, C6, C7,
            T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12,
            L1, L2, L3, L4, L5,
            S1, S2, S3,
        ]
    };

    /// The three-per-region subset used by the simplified annotation form.
    pub const REDUCED: [VertebraLabel; 12] = {
        use VertebraLabel::*;
        [C1, C2, C3, T1, T2, T3, L1, L2, L3, S1, S2, S3]
    };

    pub fn as_str(&self) -> &'static str {
        use VertebraLabel::*;
        match self {
            C1 => "C1", C2 => "C2", C3 => "C3", C4 => "C4", C5 => "C5",
            C6 => "C6", C7 => "C7",
            T1 => "T1", T2 => "T2", T3 => "T3", T4 => "T4", T5 => "T5",
            T6 => "T6", T7 => "T7", T8 => "T8", T9 => "T9", T10 => "T10",
            T11 => "T11", T12 => "T12",
            L1 => "L1", L2 => "L2", L3 => "L3", L4 => "L4", L5 => "L5",
            S1 => "S1", S2 => "S2", S3 => "S3",
        }
    }
}

impl fmt::Display for VertebraLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VertebraLabel {
    type Err = UnknownLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| UnknownLabelError(s.to_string()))
    }
}

/// One landmark position in image space, serialized as an `[x, y, z]` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate(pub f64, pub f64, pub f64);

/// The annotations produced for one scan: every label of the record's
/// schema mapped to a coordinate or to null while still unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    project: String,
    subject: String,
    session: String,
    scan: String,
    annotations: BTreeMap<VertebraLabel, Option<Coordinate>>,
}

impl AnnotationRecord {
    /// A record over the full 27-label schema, all entries unset.
    pub fn new(project: &str, subject: &str, session: &str, scan: &str) -> Self {
        Self::with_labels(project, subject, session, scan, &VertebraLabel::ALL)
    }

    /// A record over the reduced 12-label schema.
    pub fn reduced(project: &str, subject: &str, session: &str, scan: &str) -> Self {
        Self::with_labels(project, subject, session, scan, &VertebraLabel::REDUCED)
    }

    fn with_labels(
        project: &str,
        subject: &str,
        session: &str,
        scan: &str,
        labels: &[VertebraLabel],
    ) -> Self {
        Self {
            project: project.to_string(),
            subject: subject.to_string(),
            session: session.to_string(),
            scan: scan.to_string(),
            annotations: labels.iter().map(|label| (*label, None)).collect(),
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = VertebraLabel> + '_ {
        self.annotations.keys().copied()
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn scan(&self) -> &str {
        &self.scan
    }

    /// Resolves a label string against this record's schema; a label that
    /// parses but is outside a reduced schema is just as unknown.
    fn key(&self, label: &str) -> Result<VertebraLabel, UnknownLabelError> {
        let key = VertebraLabel::from_str(label)?;
        if self.annotations.contains_key(&key) {
            Ok(key)
        } else {
            Err(UnknownLabelError(label.to_string()))
        }
    }

    pub fn set(&mut self, label: &str, x: f64, y: f64, z: f64) -> Result<(), UnknownLabelError> {
        let key = self.key(label)?;
        self.annotations.insert(key, Some(Coordinate(x, y, z)));
        Ok(())
    }

    pub fn get(&self, label: &str) -> Result<Option<Coordinate>, UnknownLabelError> {
        let key = self.key(label)?;
        Ok(self.annotations[&key])
    }

    pub fn clear(&mut self, label: &str) -> Result<(), UnknownLabelError> {
        let key = self.key(label)?;
        self.annotations.insert(key, None);
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Writes the record as the artifact file a scan source stores.
    pub fn write_artifact(&self, path: &Path) -> anyhow::Result<()> {
        let text = self.to_json()?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn read_artifact(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&text)?)
    }
}
