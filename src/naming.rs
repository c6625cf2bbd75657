//! Parameter path to environment variable name mapping.

use crate::config::{Configuration, Naming};
use crate::error::{Error, Result};
use crate::path::{has_prefix, strip_base};

/// Replaces everything outside `[A-Za-z0-9_]` with `_` and upper-cases.
pub fn to_variable_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Path-prefix to variable-prefix table.
///
/// Written as comma-separated entries, each either `PATH_PREFIX=VAR_PREFIX`
/// or a bare `VAR_PREFIX` that applies to every path:
///
/// ```text
/// /service/db=DB_, /service/cache=CACHE_, APP_
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamePrefixes {
    entries: Vec<(String, String)>,
}

impl NamePrefixes {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (path_prefix, var_prefix) = match entry.split_once('=') {
                Some((p, v)) => (p.trim(), v.trim()),
                None => ("", entry),
            };
            if var_prefix.is_empty() {
                return Err(Error::configuration(format!(
                    "name prefix entry '{entry}' has no variable prefix"
                )));
            }
            if entry.contains('=') && !path_prefix.starts_with('/') {
                return Err(Error::configuration(format!(
                    "name prefix entry '{entry}' must map an absolute path prefix"
                )));
            }
            entries.push((path_prefix.to_string(), var_prefix.to_string()));
        }
        Ok(Self { entries })
    }

    /// Variable prefix of the longest path prefix matching `full_path`.
    ///
    /// Path prefixes match whole segments, the same way fetch scope does.
    pub fn lookup(&self, full_path: &str) -> Option<&str> {
        self.entries
            .iter()
            .filter(|(path_prefix, _)| has_prefix(full_path, path_prefix))
            .max_by_key(|(path_prefix, _)| path_prefix.len())
            .map(|(_, var_prefix)| var_prefix.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Derives environment variable names from parameter paths.
#[derive(Debug, Clone, Default)]
pub struct NameTransformer {
    naming: Naming,
    base_path: Option<String>,
    prefixes: NamePrefixes,
}

impl NameTransformer {
    pub fn new(naming: Naming, base_path: Option<&str>, prefixes: NamePrefixes) -> Self {
        Self {
            naming,
            base_path: base_path.map(str::to_string),
            prefixes,
        }
    }

    /// Builds a transformer from a job configuration, parsing its name prefixes.
    pub fn from_configuration(config: &Configuration) -> Result<Self> {
        let prefixes = match config.name_prefixes() {
            Some(raw) => NamePrefixes::parse(raw)?,
            None => NamePrefixes::default(),
        };
        Ok(Self::new(config.naming(), config.path(), prefixes))
    }

    pub fn transform(&self, full_path: &str) -> String {
        let absolute = full_path.trim_start_matches('/');
        let raw = match self.naming {
            Naming::Basename => full_path
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or(full_path),
            Naming::Relative => {
                strip_base(full_path, self.base_path.as_deref()).unwrap_or(absolute)
            }
            Naming::Absolute => absolute,
        };
        let name = to_variable_name(raw);
        match self.prefixes.lookup(full_path) {
            Some(prefix) => format!("{prefix}{name}"),
            None => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transformer(naming: Naming, base: Option<&str>) -> NameTransformer {
        NameTransformer::new(naming, base, NamePrefixes::default())
    }

    #[test]
    fn test_basename() {
        let t = transformer(Naming::Basename, Some("/service/"));
        assert_eq!(t.transform("/service/db/host"), "HOST");
        assert_eq!(t.transform("/service/db/read-only.url"), "READ_ONLY_URL");
    }

    #[test]
    fn test_relative() {
        let t = transformer(Naming::Relative, Some("/service/"));
        assert_eq!(t.transform("/service/db/host"), "DB_HOST");

        let root = transformer(Naming::Relative, None);
        assert_eq!(root.transform("/service/db/host"), "SERVICE_DB_HOST");
    }

    #[test]
    fn test_relative_outside_base_uses_absolute_form() {
        let t = transformer(Naming::Relative, Some("/service"));
        assert_eq!(t.transform("/other/key"), "OTHER_KEY");
    }

    #[test]
    fn test_absolute() {
        let t = transformer(Naming::Absolute, Some("/service/"));
        assert_eq!(t.transform("/service/db/host"), "SERVICE_DB_HOST");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let prefixes = NamePrefixes::parse("/service=SVC_, /service/db=DB_, APP_").unwrap();
        let t = NameTransformer::new(Naming::Basename, None, prefixes);
        assert_eq!(t.transform("/service/db/host"), "DB_HOST");
        assert_eq!(t.transform("/service/cache/host"), "SVC_HOST");
        assert_eq!(t.transform("/other/host"), "APP_HOST");
    }

    #[test]
    fn test_prefix_matches_whole_segments() {
        let prefixes = NamePrefixes::parse("/service=SVC_").unwrap();
        assert_eq!(prefixes.lookup("/service/host"), Some("SVC_"));
        assert_eq!(prefixes.lookup("/services/host"), None);

        let t = NameTransformer::new(Naming::Basename, None, prefixes);
        assert_eq!(t.transform("/services/host"), "HOST");
    }

    #[test]
    fn test_bare_prefix_applies_everywhere() {
        let prefixes = NamePrefixes::parse("name_prefix").unwrap();
        let t = NameTransformer::new(Naming::Basename, None, prefixes);
        assert_eq!(t.transform("/a/b"), "name_prefixB");
    }

    #[test]
    fn test_invalid_prefix_entries() {
        assert!(NamePrefixes::parse("/service=").is_err());
        assert!(NamePrefixes::parse("service=SVC_").is_err());
        assert!(NamePrefixes::parse(" , ").unwrap().is_empty());
    }
}
