//! Transport layer for the XNAT imaging archive.

use thiserror::Error;

pub mod credentials;
pub mod xnat;

pub use credentials::Credentials;
pub use xnat::{ScanPath, XnatClient};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("no credentials for {0}: pass a username and password or add a netrc entry")]
    Authentication(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{method} {url} returned {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
