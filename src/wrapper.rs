//! The build wrapper's setup hook.
//!
//! [`BuildWrapper::set_up`] runs the whole pipeline for one build: validate
//! the naming configuration, fetch, order, rename, classify and inject. Any
//! failure returns before injection, so a build never sees a partially
//! populated environment.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::classify::classify;
use crate::config::Configuration;
use crate::env::{Environment, EnvironmentEntry, inject};
use crate::error::Result;
use crate::fetch::{ParameterFetcher, RetryPolicy};
use crate::naming::NameTransformer;
use crate::redact::Redactor;
use crate::store::{Parameter, ParameterStore};

/// Result of a successful setup.
#[derive(Debug, Clone)]
pub struct PreparedEnvironment {
    pub environment: Environment,
    pub entries: Vec<EnvironmentEntry>,
}

/// Turns fetched parameters into environment entries.
///
/// Parameters are ordered by full path first; when two map to the same name
/// the lexically greatest path wins.
pub fn to_entries(
    mut parameters: Vec<Parameter>,
    transformer: &NameTransformer,
) -> Vec<EnvironmentEntry> {
    parameters.sort_by(|a, b| a.full_path.cmp(&b.full_path));

    let mut entries: Vec<EnvironmentEntry> = Vec::with_capacity(parameters.len());
    for parameter in parameters {
        let name = transformer.transform(&parameter.full_path);
        let masked = classify(&parameter);
        let entry = EnvironmentEntry {
            name,
            value: parameter.value,
            masked,
        };
        match entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => {
                warn!(
                    name = %entry.name,
                    parameter = %parameter.full_path,
                    "Variable name collision, later path wins"
                );
                *existing = entry;
            }
            None => entries.push(entry),
        }
    }
    entries
}

pub struct BuildWrapper<S> {
    configuration: Configuration,
    fetcher: ParameterFetcher<S>,
}

impl<S: ParameterStore> BuildWrapper<S> {
    pub fn new(configuration: Configuration, store: S) -> Self {
        Self {
            configuration,
            fetcher: ParameterFetcher::new(store),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.fetcher = self.fetcher.with_retry_policy(retry);
        self
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Prepares the environment the wrapped build steps run in.
    ///
    /// `base` is not modified. Masked values are registered with `redactor`.
    #[tracing::instrument(skip_all, fields(naming = %self.configuration.naming()))]
    pub async fn set_up(
        &self,
        base: &Environment,
        redactor: &Redactor,
        cancel: &CancellationToken,
    ) -> Result<PreparedEnvironment> {
        let transformer = NameTransformer::from_configuration(&self.configuration)?;
        let parameters = self.fetcher.fetch(&self.configuration, cancel).await?;

        let entries = to_entries(parameters, &transformer);
        let environment = inject(base, &entries, redactor);

        info!(variables = entries.len(), "Parameter store environment ready");
        Ok(PreparedEnvironment {
            environment,
            entries,
        })
    }
}
