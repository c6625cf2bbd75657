//! Job configuration for a parameter-store wrapper.
//!
//! [`JobDefinition`] is the persisted form, plain strings exactly as a job
//! stores them. [`Configuration`] is the normalized form the wrapper runs on:
//! blank strings become `None`, everything else is trimmed, and the naming
//! strategy is parsed.
//!
//! ```json
//! {
//!   "regionName": "eu-west-1",
//!   "path": "/service/",
//!   "recursive": true,
//!   "naming": "relative",
//!   "namePrefixes": "/service/db=DB_"
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Trims `value` and maps a blank result to `None`.
///
/// Shared by the constructor and every setter of [`Configuration`] so the two
/// entry points cannot normalize differently.
pub fn optional_trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// How a parameter path becomes an environment variable name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Naming {
    /// Last path segment only.
    #[default]
    Basename,
    /// Path below the configured base path.
    Relative,
    /// Whole path minus the leading separator.
    Absolute,
}

impl Naming {
    pub fn as_str(&self) -> &'static str {
        match self {
            Naming::Basename => "basename",
            Naming::Relative => "relative",
            Naming::Absolute => "absolute",
        }
    }
}

impl FromStr for Naming {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "basename" => Ok(Naming::Basename),
            "relative" => Ok(Naming::Relative),
            "absolute" => Ok(Naming::Absolute),
            other => Err(Error::configuration(format!(
                "unknown naming strategy '{other}' (expected basename, relative or absolute)"
            ))),
        }
    }
}

impl fmt::Display for Naming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted job definition, as handed over by the host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobDefinition {
    pub credentials_id: Option<String>,
    pub region_name: Option<String>,
    pub path: Option<String>,
    pub recursive: bool,
    pub naming: Option<String>,
    pub name_prefixes: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl JobDefinition {
    /// Loads a job definition from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::configuration(format!("invalid job definition '{path}': {e}")))
    }
}

/// Normalized wrapper configuration.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    credentials_id: Option<String>,
    region_name: Option<String>,
    path: Option<String>,
    recursive: bool,
    naming: Naming,
    name_prefixes: Option<String>,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    session_token: Option<String>,
}

impl Configuration {
    /// Builds a configuration by running every field through its setter.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        credentials_id: Option<&str>,
        region_name: Option<&str>,
        path: Option<&str>,
        recursive: bool,
        naming: Option<&str>,
        name_prefixes: Option<&str>,
        access_key_id: Option<&str>,
        secret_access_key: Option<&str>,
        session_token: Option<&str>,
    ) -> Result<Self> {
        let mut config = Self::default();
        config.set_credentials_id(credentials_id);
        config.set_region_name(region_name);
        config.set_path(path)?;
        config.set_recursive(recursive);
        config.set_naming(naming)?;
        config.set_name_prefixes(name_prefixes);
        config.set_access_key_id(access_key_id);
        config.set_secret_access_key(secret_access_key);
        config.set_session_token(session_token);
        Ok(config)
    }

    pub fn credentials_id(&self) -> Option<&str> {
        self.credentials_id.as_deref()
    }

    pub fn region_name(&self) -> Option<&str> {
        self.region_name.as_deref()
    }

    /// Base path, or `None` for the root of the store.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    pub fn naming(&self) -> Naming {
        self.naming
    }

    pub fn name_prefixes(&self) -> Option<&str> {
        self.name_prefixes.as_deref()
    }

    pub fn access_key_id(&self) -> Option<&str> {
        self.access_key_id.as_deref()
    }

    pub fn secret_access_key(&self) -> Option<&str> {
        self.secret_access_key.as_deref()
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn set_credentials_id(&mut self, credentials_id: Option<&str>) {
        self.credentials_id = optional_trimmed(credentials_id);
    }

    pub fn set_region_name(&mut self, region_name: Option<&str>) {
        self.region_name = optional_trimmed(region_name);
    }

    /// Sets the base path. A non-blank path must be absolute.
    pub fn set_path(&mut self, path: Option<&str>) -> Result<()> {
        let path = optional_trimmed(path);
        if let Some(p) = &path {
            if !p.starts_with('/') {
                return Err(Error::configuration(format!(
                    "path '{p}' must start with '/'"
                )));
            }
        }
        self.path = path;
        Ok(())
    }

    pub fn set_recursive(&mut self, recursive: bool) {
        self.recursive = recursive;
    }

    /// Sets the naming strategy. Blank means [`Naming::Basename`].
    pub fn set_naming(&mut self, naming: Option<&str>) -> Result<()> {
        self.naming = match optional_trimmed(naming) {
            Some(n) => n.parse()?,
            None => Naming::default(),
        };
        Ok(())
    }

    pub fn set_name_prefixes(&mut self, name_prefixes: Option<&str>) {
        self.name_prefixes = optional_trimmed(name_prefixes);
    }

    pub fn set_access_key_id(&mut self, access_key_id: Option<&str>) {
        self.access_key_id = optional_trimmed(access_key_id);
    }

    pub fn set_secret_access_key(&mut self, secret_access_key: Option<&str>) {
        self.secret_access_key = optional_trimmed(secret_access_key);
    }

    pub fn set_session_token(&mut self, session_token: Option<&str>) {
        self.session_token = optional_trimmed(session_token);
    }
}

impl TryFrom<JobDefinition> for Configuration {
    type Error = Error;

    fn try_from(job: JobDefinition) -> Result<Self> {
        Configuration::new(
            job.credentials_id.as_deref(),
            job.region_name.as_deref(),
            job.path.as_deref(),
            job.recursive,
            job.naming.as_deref(),
            job.name_prefixes.as_deref(),
            job.access_key_id.as_deref(),
            job.secret_access_key.as_deref(),
            job.session_token.as_deref(),
        )
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hidden = |v: &Option<String>| v.as_ref().map(|_| "****");
        f.debug_struct("Configuration")
            .field("credentials_id", &self.credentials_id)
            .field("region_name", &self.region_name)
            .field("path", &self.path)
            .field("recursive", &self.recursive)
            .field("naming", &self.naming)
            .field("name_prefixes", &self.name_prefixes)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &hidden(&self.secret_access_key))
            .field("session_token", &hidden(&self.session_token))
            .finish()
    }
}
