//! Parameter store access.
//!
//! [`ParameterStore`] is the async capability the fetcher pages through.
//! [`SsmParameterStore`] implements it on AWS Systems Manager; tests plug in
//! their own implementations.

mod ssm;

pub use ssm::SsmParameterStore;

/// A single store entry.
#[derive(Clone, PartialEq, Eq)]
pub struct Parameter {
    pub full_path: String,
    pub value: String,
    pub is_secure: bool,
    pub version: i64,
}

impl Parameter {
    pub fn new(full_path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            full_path: full_path.into(),
            value: value.into(),
            is_secure: false,
            version: 1,
        }
    }

    pub fn secure(full_path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            is_secure: true,
            ..Self::new(full_path, value)
        }
    }
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = if self.is_secure { "****" } else { self.value.as_str() };
        f.debug_struct("Parameter")
            .field("full_path", &self.full_path)
            .field("value", &value)
            .field("is_secure", &self.is_secure)
            .field("version", &self.version)
            .finish()
    }
}

/// One list call under a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub path: String,
    pub recursive: bool,
    pub with_decryption: bool,
    pub next_token: Option<String>,
}

/// A page of results plus the token for the next one.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub parameters: Vec<Parameter>,
    pub next_token: Option<String>,
}

/// Failure reported by a store call, before the fetcher attaches context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("throttled: {0}")]
    Throttled(String),

    #[error("region unavailable: {0}")]
    Region(String),

    #[error("parameter not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

/// Read-only view of a hierarchical parameter store.
#[async_trait::async_trait]
pub trait ParameterStore: Send + Sync {
    /// Lists one page of parameters under `request.path`.
    async fn list_page(&self, request: &ListRequest) -> Result<Page, StoreError>;

    /// Reads a single parameter by its full path.
    async fn get_parameter(
        &self,
        name: &str,
        with_decryption: bool,
    ) -> Result<Parameter, StoreError>;
}

#[async_trait::async_trait]
impl<S: ParameterStore + ?Sized> ParameterStore for std::sync::Arc<S> {
    async fn list_page(&self, request: &ListRequest) -> Result<Page, StoreError> {
        (**self).list_page(request).await
    }

    async fn get_parameter(
        &self,
        name: &str,
        with_decryption: bool,
    ) -> Result<Parameter, StoreError> {
        (**self).get_parameter(name, with_decryption).await
    }
}
