//! Credential resolution: explicit values, else the user's netrc file.

use crate::ArchiveError;
use std::fs;
use std::path::PathBuf;

#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never echo the password into logs.
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    /// Explicit credentials win; otherwise the netrc entry for the server
    /// host is used. No resolvable pair is a hard construction error.
    pub fn resolve(
        server: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, ArchiveError> {
        if let (Some(user), Some(password)) = (user, password) {
            return Ok(Self {
                user: user.to_string(),
                password: password.to_string(),
            });
        }
        let host = host_of(server);
        let path = netrc_path()
            .ok_or_else(|| ArchiveError::Authentication(host.to_string()))?;
        let text = fs::read_to_string(&path)
            .map_err(|_| ArchiveError::Authentication(host.to_string()))?;
        parse_netrc(&text, host)
            .ok_or_else(|| ArchiveError::Authentication(host.to_string()))
    }
}

fn netrc_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    let unix = home.join(".netrc");
    if unix.is_file() {
        return Some(unix);
    }
    let windows = home.join("_netrc");
    windows.is_file().then_some(windows)
}

/// Strips the scheme, port and any path from a server URL, leaving the host
/// that a netrc `machine` entry is keyed on.
pub fn host_of(server: &str) -> &str {
    let rest = server
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(server);
    let rest = rest.split('/').next().unwrap_or(rest);
    rest.split(':').next().unwrap_or(rest)
}

/// Token-level netrc parse: `machine <host> login <user> password <pwd>`,
/// with `default` accepted as a catch-all entry. Comments run to end of line.
fn parse_netrc(text: &str, host: &str) -> Option<Credentials> {
    let tokens: Vec<&str> = text
        .lines()
        .map(|l| l.split('#').next().unwrap_or(""))
        .flat_map(str::split_whitespace)
        .collect();

    let mut login = None;
    let mut password = None;
    let mut in_entry = false;
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "machine" => {
                if in_entry {
                    break;
                }
                in_entry = tokens.get(i + 1) == Some(&host);
                i += 2;
            }
            "default" => {
                if in_entry {
                    break;
                }
                in_entry = true;
                i += 1;
            }
            "login" if in_entry => {
                login = tokens.get(i + 1).copied();
                i += 2;
            }
            "password" if in_entry => {
                password = tokens.get(i + 1).copied();
                i += 2;
            }
            _ => i += 1,
        }
    }

    Some(Credentials {
        user: login?.to_string(),
        password: password?.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_strips_scheme_port_and_path() {
        assert_eq!(host_of("https://xnat.example.org"), "xnat.example.org");
        assert_eq!(host_of("https://xnat.example.org:8443/data"), "xnat.example.org");
        assert_eq!(host_of("xnat.example.org"), "xnat.example.org");
    }

    #[test]
    fn netrc_entry_for_matching_machine() {
        let text = "machine other.org login a password b\n\
                    machine xnat.example.org login rad password secret\n";
        let creds = parse_netrc(text, "xnat.example.org").unwrap();
        assert_eq!(creds.user, "rad");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn netrc_default_entry_matches_any_host() {
        let text = "default login anon password letmein";
        let creds = parse_netrc(text, "xnat.example.org").unwrap();
        assert_eq!(creds.user, "anon");
    }

    #[test]
    fn netrc_without_entry_resolves_nothing() {
        let text = "machine other.org login a password b # unrelated";
        assert!(parse_netrc(text, "xnat.example.org").is_none());
    }
}
