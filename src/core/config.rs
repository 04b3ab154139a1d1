//! Publisher configuration loaded from the process environment
//!
//! The configuration is read exactly once at startup and passed explicitly
//! to everything that needs it.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use thiserror::Error;

/// Path to the service account credentials file
pub const CREDENTIALS_ENV: &str = "GOOGLE_PLAY_CREDENTIALS_PATH";

/// Package name of the target application
pub const PACKAGE_NAME_ENV: &str = "GOOGLE_PLAY_PACKAGE_NAME";

/// Path to the bundle to upload
pub const PACKAGE_PATH_ENV: &str = "GOOGLE_PLAY_PACKAGE_PATH";

/// Commit flag, only the literal `true` commits
pub const COMMIT_ENV: &str = "GOOGLE_PLAY_COMMIT";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingVariables(Vec<&'static str>),
}

impl ConfigError {
    /// Names of the missing variables, in lookup order
    pub fn missing(&self) -> &[&'static str] {
        match self {
            Self::MissingVariables(names) => names,
        }
    }
}

/// Validated publisher input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Service account credentials file
    pub credentials_path: PathBuf,

    /// Application package identifier (e.g. `com.example.app`)
    pub package_name: String,

    /// Bundle artifact to upload
    pub bundle_path: PathBuf,

    /// Commit the edit instead of deleting it
    pub commit: bool,
}

impl PublisherConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var_os(name))
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// A variable counts as present whenever the lookup returns a value,
    /// including the empty string and values that are not valid UTF-8.
    /// Every missing required variable is reported, not just the first one.
    ///
    /// # Examples
    ///
    /// ```
    /// use play_publisher::core::config::PublisherConfig;
    ///
    /// let result = PublisherConfig::from_lookup(|_| None);
    /// assert_eq!(result.unwrap_err().missing().len(), 3);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let mut missing = Vec::new();

        let credentials_path = lookup(CREDENTIALS_ENV);
        if credentials_path.is_none() {
            missing.push(CREDENTIALS_ENV);
        }

        let package_name = lookup(PACKAGE_NAME_ENV);
        if package_name.is_none() {
            missing.push(PACKAGE_NAME_ENV);
        }

        let bundle_path = lookup(PACKAGE_PATH_ENV);
        if bundle_path.is_none() {
            missing.push(PACKAGE_PATH_ENV);
        }

        match (credentials_path, package_name, bundle_path) {
            (Some(credentials_path), Some(package_name), Some(bundle_path)) => Ok(Self {
                credentials_path: PathBuf::from(credentials_path),
                package_name: package_name.to_string_lossy().into_owned(),
                bundle_path: PathBuf::from(bundle_path),
                commit: lookup(COMMIT_ENV).as_deref() == Some(OsStr::new("true")),
            }),
            _ => Err(ConfigError::MissingVariables(missing)),
        }
    }
}
