//! REST client for the XNAT archive endpoints used by scan iteration.

use crate::{ArchiveError, Credentials};
use reqwest::blocking::multipart::Form;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Identifier tuple addressing one scan on the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPath<'a> {
    pub project: &'a str,
    pub subject: &'a str,
    pub session: &'a str,
    pub scan: &'a str,
}

pub fn search_url(server: &str) -> String {
    format!("{server}/data/search?format=csv")
}

pub fn jsession_url(server: &str) -> String {
    format!("{server}/data/JSESSION")
}

fn scan_root(server: &str, path: &ScanPath<'_>) -> String {
    format!(
        "{server}/data/projects/{}/subjects/{}/experiments/{}/scans/{}",
        path.project, path.subject, path.session, path.scan
    )
}

pub fn dicom_zip_url(server: &str, path: &ScanPath<'_>) -> String {
    format!("{}/resources/DICOM/files?format=zip", scan_root(server, path))
}

pub fn annotation_resource_url(server: &str, path: &ScanPath<'_>) -> String {
    format!("{}/resources/ANNOTATIONS", scan_root(server, path))
}

pub fn annotation_file_url(server: &str, path: &ScanPath<'_>, filename: &str) -> String {
    format!("{}/files/{filename}", annotation_resource_url(server, path))
}

/// One authenticated session against a single XNAT server. The JSESSION
/// token the server issues lives as long as this client; `close_session`
/// invalidates it explicitly instead of waiting for the server timeout.
pub struct XnatClient {
    server: String,
    credentials: Credentials,
    http: Client,
    session_open: bool,
}

impl XnatClient {
    pub fn connect(server: String, credentials: Credentials) -> Result<Self, ArchiveError> {
        let http = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            server,
            credentials,
            http,
            session_open: true,
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.credentials.user, Some(&self.credentials.password))
    }

    fn expect_success(
        method: &'static str,
        url: &str,
        response: Response,
    ) -> Result<Response, ArchiveError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ArchiveError::Status {
                method,
                url: url.to_string(),
                status: response.status().as_u16(),
            })
        }
    }

    /// Posts an XML search document and returns the CSV listing.
    pub fn search_csv(&self, query: Vec<u8>) -> Result<String, ArchiveError> {
        let url = search_url(&self.server);
        debug!(%url, "posting scan search");
        let response = self.authed(self.http.post(&url)).body(query).send()?;
        Ok(Self::expect_success("POST", &url, response)?.text()?)
    }

    /// Downloads the scan's DICOM payload as a zip archive to `dest`.
    /// A partially written file is removed before the error propagates.
    pub fn download_dicom_zip(
        &self,
        path: &ScanPath<'_>,
        dest: &Path,
    ) -> Result<(), ArchiveError> {
        let url = dicom_zip_url(&self.server, path);
        debug!(%url, dest = %dest.display(), "downloading scan payload");
        let result: Result<(), ArchiveError> = (|| {
            let response = self.authed(self.http.get(&url)).send()?;
            let mut response = Self::expect_success("GET", &url, response)?;
            let mut file = fs::File::create(dest)?;
            response.copy_to(&mut file)?;
            Ok(())
        })();
        if result.is_err() {
            let _ = fs::remove_file(dest);
        }
        result
    }

    /// Creates the annotation resource container for a scan. The archive
    /// treats the PUT as idempotent, so re-creating is harmless.
    pub fn put_annotation_container(&self, path: &ScanPath<'_>) -> Result<(), ArchiveError> {
        let url = annotation_resource_url(&self.server, path);
        let response = self.authed(self.http.put(&url)).send()?;
        Self::expect_success("PUT", &url, response)?;
        Ok(())
    }

    /// Uploads an annotation artifact into the scan's resource container.
    pub fn upload_annotation(
        &self,
        path: &ScanPath<'_>,
        filename: &str,
        artifact: &Path,
    ) -> Result<(), ArchiveError> {
        let url = annotation_file_url(&self.server, path, filename);
        debug!(%url, "uploading annotation");
        let form = Form::new().file("file", artifact)?;
        let response = self.authed(self.http.put(&url)).multipart(form).send()?;
        Self::expect_success("PUT", &url, response)?;
        Ok(())
    }

    /// Probes whether an annotation artifact exists for the scan. A 404 is
    /// the expected "not annotated" answer; anything else non-2xx is a
    /// transport-level failure.
    pub fn annotation_exists(
        &self,
        path: &ScanPath<'_>,
        filename: &str,
    ) -> Result<bool, ArchiveError> {
        let url = annotation_file_url(&self.server, path, filename);
        let response = self.authed(self.http.head(&url)).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::expect_success("HEAD", &url, response)?;
        Ok(true)
    }

    /// Downloads a previously stored annotation artifact to `dest`.
    pub fn fetch_annotation(
        &self,
        path: &ScanPath<'_>,
        filename: &str,
        dest: &Path,
    ) -> Result<(), ArchiveError> {
        let url = annotation_file_url(&self.server, path, filename);
        let result: Result<(), ArchiveError> = (|| {
            let response = self.authed(self.http.get(&url)).send()?;
            let mut response = Self::expect_success("GET", &url, response)?;
            let mut file = fs::File::create(dest)?;
            response.copy_to(&mut file)?;
            Ok(())
        })();
        if result.is_err() {
            let _ = fs::remove_file(dest);
        }
        result
    }

    /// Invalidates the server-side JSESSION token. Idempotent and
    /// best-effort: a failure here only costs the server a timeout.
    pub fn close_session(&mut self) {
        if !self.session_open {
            return;
        }
        self.session_open = false;
        let url = jsession_url(&self.server);
        match self.authed(self.http.delete(&url)).send() {
            Ok(response) if response.status().is_success() => {
                debug!("archive session closed");
            }
            Ok(response) => {
                warn!(status = %response.status(), "JSESSION delete rejected");
            }
            Err(error) => {
                warn!(%error, "JSESSION delete failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER: &str = "https://xnat.example.org";

    fn scan() -> ScanPath<'static> {
        ScanPath {
            project: "P",
            subject: "S1",
            session: "SESS1",
            scan: "3",
        }
    }

    #[test]
    fn search_endpoint_requests_csv() {
        assert_eq!(
            search_url(SERVER),
            "https://xnat.example.org/data/search?format=csv"
        );
    }

    #[test]
    fn dicom_download_addresses_scan_identifiers() {
        assert_eq!(
            dicom_zip_url(SERVER, &scan()),
            "https://xnat.example.org/data/projects/P/subjects/S1/experiments/SESS1\
             /scans/3/resources/DICOM/files?format=zip"
        );
    }

    #[test]
    fn annotation_upload_path_ends_with_derived_filename() {
        let url = annotation_file_url(SERVER, &scan(), "SESS1-3.json");
        assert!(url.ends_with("/scans/3/resources/ANNOTATIONS/files/SESS1-3.json"));
    }

    #[test]
    fn jsession_teardown_endpoint() {
        assert_eq!(jsession_url(SERVER), "https://xnat.example.org/data/JSESSION");
    }
}
