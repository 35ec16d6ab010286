use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";
const CONFIG_FILE_NAME: &str = ".twittaconfig";

/// The bearer token used to authenticate metadata requests.
#[derive(Clone, Debug)]
pub struct Credentials {
    bearer_token: SecretString,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        let token: String = token.into();
        Self {
            bearer_token: SecretString::new(token.into_boxed_str()),
        }
    }

    pub fn bearer_token(&self) -> &str {
        self.bearer_token.expose_secret()
    }
}

#[derive(Serialize, Deserialize)]
struct CredentialFile {
    #[serde(rename = "TWITTER_BEARER_TOKEN")]
    bearer_token: String,
}

/// Single-token credential file, created interactively on first run.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.twittaconfig`.
    pub fn at_default_location() -> Result<Self> {
        let home = dirs::home_dir().ok_or(Error::NoHomeDir)?;
        Ok(Self::new(home.join(CONFIG_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ensure_credentials(&self) -> Result<Credentials> {
        self.ensure_credentials_with(|| {
            info!("First time setup, please provide the following");
            rpassword::prompt_password("Twitter API bearer token: ")
        })
    }

    /// Load the stored token, or obtain one from `prompt` and persist it when
    /// no credential file exists yet.
    pub fn ensure_credentials_with<F>(&self, prompt: F) -> Result<Credentials>
    where
        F: FnOnce() -> io::Result<String>,
    {
        if self.path.exists() {
            return self.load();
        }

        let token = prompt()?;
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::MissingToken);
        }
        self.save(token)?;
        Ok(Credentials::new(token))
    }

    pub fn load(&self) -> Result<Credentials> {
        debug!("Reading credentials from {}", self.path.display());
        let corrupt = |reason: String| Error::ConfigCorrupt {
            path: self.path.clone(),
            reason,
        };
        let contents = fs::read_to_string(&self.path).map_err(|e| corrupt(e.to_string()))?;
        let file: CredentialFile =
            serde_json::from_str(&contents).map_err(|e| corrupt(e.to_string()))?;
        if file.bearer_token.is_empty() {
            return Err(corrupt("bearer token is empty".into()));
        }
        Ok(Credentials::new(file.bearer_token))
    }

    pub fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = CredentialFile {
            bearer_token: token.to_string(),
        };
        let contents = serde_json::to_string(&file)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, contents)?;
        info!("Saved credentials to {}", self.path.display());
        Ok(())
    }
}

/// Which flavour of the metadata API to talk to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V2,
}

impl FromStr for ApiVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "v1" | "1" | "1.1" => Ok(Self::V1),
            "v2" | "2" => Ok(Self::V2),
            _ => Err(Error::UnsupportedApiVersion(s.to_string())),
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => f.write_str("v1"),
            Self::V2 => f.write_str("v2"),
        }
    }
}

/// Settings for a single run, built once from the command line.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_version: ApiVersion,
    pub api_base: String,
    pub output_dir: PathBuf,
    pub overwrite: bool,
}
