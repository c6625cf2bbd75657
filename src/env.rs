//! Build environment injection.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::redact::Redactor;

/// Variable name to value, ordered by name.
pub type Environment = BTreeMap<String, String>;

/// One variable to inject.
#[derive(Clone, PartialEq, Eq)]
pub struct EnvironmentEntry {
    pub name: String,
    pub value: String,
    pub masked: bool,
}

impl std::fmt::Debug for EnvironmentEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = if self.masked { "****" } else { self.value.as_str() };
        f.debug_struct("EnvironmentEntry")
            .field("name", &self.name)
            .field("value", &value)
            .field("masked", &self.masked)
            .finish()
    }
}

/// Returns a copy of `base` with every entry set.
///
/// Masked values are registered with `redactor` before the new environment is
/// handed back, so anything logged with it afterwards is already covered.
/// `base` is left untouched for the caller to restore once the wrapped steps
/// finish.
pub fn inject(base: &Environment, entries: &[EnvironmentEntry], redactor: &Redactor) -> Environment {
    let mut environment = base.clone();
    let mut masked = 0usize;

    for entry in entries {
        if entry.masked {
            redactor.register(&entry.value);
            masked += 1;
        }
        if environment
            .insert(entry.name.clone(), entry.value.clone())
            .is_some()
        {
            debug!(name = %entry.name, "Overriding existing environment variable");
        }
    }

    info!(count = entries.len(), masked, "Injected parameters into environment");
    environment
}
