//! Parameter Store values as build environment variables.
//!
//! A [`BuildWrapper`] fetches every parameter under a configured path from a
//! [`ParameterStore`], names each one with a [`NameTransformer`], masks secure
//! values through a [`Redactor`] and returns a fresh environment for the
//! wrapped build steps.

pub mod classify;
pub mod config;
pub mod env;
pub mod error;
pub mod fetch;
pub mod naming;
pub mod path;
pub mod redact;
pub mod store;
pub mod wrapper;

pub use config::{Configuration, JobDefinition, Naming};
pub use env::{Environment, EnvironmentEntry};
pub use error::{Error, Result};
pub use fetch::{CredentialSource, ParameterFetcher, RetryPolicy};
pub use naming::{NamePrefixes, NameTransformer};
pub use redact::{RedactingMakeWriter, Redactor, copy_redacted};
pub use store::{ListRequest, Page, Parameter, ParameterStore, SsmParameterStore, StoreError};
pub use wrapper::{BuildWrapper, PreparedEnvironment};
