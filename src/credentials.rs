use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::Builder;

use crate::{AuthError, TokenInfo};

const CONFIG_DIR_NAME: &str = "polarsignals";
const CREDENTIAL_FILE: &str = "default_cred";

/// File-backed store for the single saved [`TokenInfo`].
///
/// Writes go through a temporary file in the same directory that is renamed
/// over the target, so a failed save leaves the previous credential intact.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<user config dir>/polarsignals/default_cred`.
    pub fn default_location() -> Result<Self, AuthError> {
        let config_dir = dirs::config_dir().ok_or_else(|| AuthError::CredentialPath {
            message: "user config directory is unavailable".to_string(),
        })?;
        Ok(Self::new(
            config_dir.join(CONFIG_DIR_NAME).join(CREDENTIAL_FILE),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `Ok(None)` when no credential has been saved yet.
    pub fn load(&self) -> Result<Option<TokenInfo>, AuthError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(AuthError::CredentialRead {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&data)
            .map(Some)
            .map_err(|source| AuthError::CredentialParse {
                path: self.path.clone(),
                source,
            })
    }

    pub fn save(&self, token: &TokenInfo) -> Result<(), AuthError> {
        let data = serde_json::to_vec_pretty(token).map_err(|source| AuthError::CredentialParse {
            path: self.path.clone(),
            source,
        })?;
        self.write_atomic(&data).map_err(|source| AuthError::CredentialWrite {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(path = %self.path.display(), "credentials saved");
        Ok(())
    }

    fn write_atomic(&self, contents: &[u8]) -> io::Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            Some(_) => Path::new("."),
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "credentials path must have a parent directory",
                ));
            }
        };
        create_private_dir(parent)?;

        let mut temp_file = Builder::new().prefix(".cred").tempfile_in(parent)?;
        temp_file.write_all(contents)?;
        temp_file.as_file_mut().sync_all()?;
        temp_file.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }
}

/// Creates missing directories as owner-only. Existing directories keep their mode.
fn create_private_dir(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}
