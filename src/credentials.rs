use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::constants::CREDENTIALS_DIR;
use crate::error::{Result, SyncError};

/// Username/password pair, or a shared secret stored as the password
#[derive(Clone, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Looks up credentials by logical name
pub trait CredentialProvider {
    fn get_credential(&self, name: &str) -> Result<Credential>;
}

/// Credentials file structure
///
/// Format:
/// ```toml
/// [profiles."GetOrganized Login"]
/// username = "svc_robot"
/// password = "your_password_here"
///
/// [profiles."Miralix Shared Key"]
/// password = "shared_secret_here"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Credentials {
    #[serde(default)]
    pub profiles: HashMap<String, Credential>,
}

/// Credentials read from a TOML file
#[derive(Debug)]
pub struct FileCredentialProvider {
    path: PathBuf,
    credentials: Option<Credentials>,
}

/// Get the default credentials file path: ~/.config/recording_sync/credentials.toml
pub fn get_credentials_path() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| SyncError::Credential("HOME environment variable not set".to_string()))?;
    Ok(PathBuf::from(home)
        .join(CREDENTIALS_DIR)
        .join("credentials.toml"))
}

impl FileCredentialProvider {
    /// Load credentials from `path`; a missing file is reported on first lookup
    pub fn load(path: &Path) -> Result<Self> {
        let credentials = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let parsed: Credentials = toml::from_str(&content).map_err(|e| {
                SyncError::Credential(format!(
                    "Failed to parse credentials file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            Some(parsed)
        } else {
            None
        };
        Ok(Self {
            path: path.to_path_buf(),
            credentials,
        })
    }

    pub fn load_default() -> Result<Self> {
        Self::load(&get_credentials_path()?)
    }
}

impl CredentialProvider for FileCredentialProvider {
    fn get_credential(&self, name: &str) -> Result<Credential> {
        match &self.credentials {
            Some(creds) => creds.profiles.get(name).cloned().ok_or_else(|| {
                SyncError::Credential(format!(
                    "Credential profile '[profiles.\"{}\"]' not found in credentials file",
                    name
                ))
            }),
            None => Err(SyncError::Credential(format!(
                "Credentials file not found. Expected at: {}",
                self.path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_lookup_profiles() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[profiles."GetOrganized Login"]
username = "svc"
password = "pw"

[profiles."Miralix Shared Key"]
password = "secret"
"#
        )
        .unwrap();

        let provider = FileCredentialProvider::load(file.path()).unwrap();
        let login = provider.get_credential("GetOrganized Login").unwrap();
        assert_eq!(login.username, "svc");
        assert_eq!(login.password, "pw");

        let key = provider.get_credential("Miralix Shared Key").unwrap();
        assert_eq!(key.username, "");
        assert_eq!(key.password, "secret");

        let missing = provider.get_credential("Nope").unwrap_err();
        assert!(missing.is_fatal());
    }

    #[test]
    fn test_missing_file_fails_on_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileCredentialProvider::load(&dir.path().join("absent.toml")).unwrap();
        let err = provider.get_credential("GetOrganized Login").unwrap_err();
        assert!(err.to_string().contains("Credentials file not found"));
    }

    #[test]
    fn test_debug_hides_password() {
        let cred = Credential {
            username: "svc".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{:?}", cred).contains("hunter2"));
    }
}
