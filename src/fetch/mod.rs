//! Paginated retrieval of parameters under a path.
//!
//! [`ParameterFetcher`] drives a [`ParameterStore`] page by page, retries
//! throttled calls with [`RetryPolicy`], falls back to per-parameter reads
//! when a page cannot be decrypted, and stops as soon as the build's
//! cancellation token fires. A fetch either returns every in-scope parameter
//! or an error; nothing partial leaks out.

mod credentials;
mod retry;

pub use credentials::CredentialSource;
pub use retry::RetryPolicy;

use std::collections::HashSet;
use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::path::in_scope;
use crate::store::{ListRequest, Page, Parameter, ParameterStore, StoreError};

/// Attaches the failing path to a store error.
fn store_error(err: StoreError, path: &str) -> Error {
    let path = path.to_string();
    match err {
        StoreError::AccessDenied(message) => Error::Access { path, message },
        StoreError::Region(message) => Error::Region { path, message },
        StoreError::Throttled(message) => Error::Throttling {
            path,
            attempts: 1,
            message,
        },
        StoreError::NotFound(message) => Error::Store {
            path,
            message: format!("not found: {message}"),
        },
        StoreError::Other(message) => Error::Store { path, message },
    }
}

pub struct ParameterFetcher<S> {
    store: S,
    retry: RetryPolicy,
}

impl<S: ParameterStore> ParameterFetcher<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetches every parameter in scope of `config`'s path.
    ///
    /// Entries the store returns outside the configured scope are dropped, as
    /// are repeats of a path already seen in this pass.
    #[tracing::instrument(
        skip_all,
        fields(path = config.path().unwrap_or("/"), recursive = config.recursive())
    )]
    pub async fn fetch(
        &self,
        config: &Configuration,
        cancel: &CancellationToken,
    ) -> Result<Vec<Parameter>> {
        let base = config.path().unwrap_or("/");
        let mut seen = HashSet::new();
        let mut parameters = Vec::new();
        let mut next_token = None;
        let mut page_number = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled {
                    path: base.to_string(),
                });
            }
            page_number += 1;

            let request = ListRequest {
                path: base.to_string(),
                recursive: config.recursive(),
                with_decryption: true,
                next_token: next_token.take(),
            };

            let (page, decrypted) = match self.list(&request, cancel).await {
                Ok(page) => (page, true),
                Err(Error::Access { message, .. }) => {
                    warn!(
                        page = page_number,
                        error = %message,
                        "Page could not be decrypted, reading secure parameters one by one"
                    );
                    let plain = ListRequest {
                        with_decryption: false,
                        ..request.clone()
                    };
                    (self.list(&plain, cancel).await?, false)
                }
                Err(e) => return Err(e),
            };

            debug!(
                page = page_number,
                count = page.parameters.len(),
                "Received parameter page"
            );

            for mut parameter in page.parameters {
                if !in_scope(&parameter.full_path, config.path(), config.recursive()) {
                    debug!(parameter = %parameter.full_path, "Out of scope, skipping");
                    continue;
                }
                if !seen.insert(parameter.full_path.clone()) {
                    debug!(parameter = %parameter.full_path, "Already fetched, skipping");
                    continue;
                }
                if !decrypted && parameter.is_secure {
                    self.decrypt(&mut parameter, cancel).await?;
                }
                parameters.push(parameter);
            }

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        info!(
            pages = page_number,
            count = parameters.len(),
            "Fetched parameters"
        );
        Ok(parameters)
    }

    async fn list(&self, request: &ListRequest, cancel: &CancellationToken) -> Result<Page> {
        let store = &self.store;
        self.with_retry(&request.path, cancel, move || store.list_page(request))
            .await
    }

    /// Replaces a secure value listed without decryption by its own
    /// decrypting get-call.
    async fn decrypt(&self, parameter: &mut Parameter, cancel: &CancellationToken) -> Result<()> {
        let store = &self.store;
        let name = parameter.full_path.as_str();
        let decrypted = self
            .with_retry(name, cancel, move || store.get_parameter(name, true))
            .await?;
        parameter.value = decrypted.value;
        parameter.version = decrypted.version;
        Ok(())
    }

    /// Runs `call`, retrying throttled attempts with backoff.
    ///
    /// Both the call and the backoff sleep race the cancellation token.
    async fn with_retry<T, F, Fut>(
        &self,
        path: &str,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, StoreError>>,
    {
        let cancelled = || Error::Cancelled {
            path: path.to_string(),
        };
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled()),
                outcome = call() => outcome,
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(StoreError::Throttled(message)) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Throttled by parameter store, backing off"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(cancelled()),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(StoreError::Throttled(message)) => {
                    return Err(Error::Throttling {
                        path: path.to_string(),
                        attempts: attempt,
                        message,
                    });
                }
                Err(e) => return Err(store_error(e, path)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Serves a fixed list of pages; throttles the first `throttle` calls.
    struct PagedStore {
        pages: Vec<Vec<Parameter>>,
        throttle: u32,
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl ParameterStore for PagedStore {
        async fn list_page(&self, request: &ListRequest) -> std::result::Result<Page, StoreError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.throttle {
                return Err(StoreError::Throttled("Rate exceeded".to_string()));
            }
            let index: usize = request
                .next_token
                .as_deref()
                .map(|t| t.parse().unwrap())
                .unwrap_or(0);
            let next_token = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
            Ok(Page {
                parameters: self.pages[index].clone(),
                next_token,
            })
        }

        async fn get_parameter(
            &self,
            name: &str,
            _with_decryption: bool,
        ) -> std::result::Result<Parameter, StoreError> {
            Err(StoreError::NotFound(name.to_string()))
        }
    }

    fn config(path: Option<&str>, recursive: bool) -> Configuration {
        Configuration::new(None, None, path, recursive, None, None, None, None, None).unwrap()
    }

    #[tokio::test]
    async fn test_filters_out_of_scope_and_duplicates() {
        let store = PagedStore {
            pages: vec![
                vec![
                    Parameter::new("/service/db", "a"),
                    Parameter::new("/service/db/host", "b"),
                ],
                vec![Parameter::new("/service/db", "a"), Parameter::new("/service/api", "c")],
            ],
            throttle: 0,
            calls: AtomicU32::new(0),
        };
        let fetcher = ParameterFetcher::new(store);
        let params = fetcher
            .fetch(&config(Some("/service/"), false), &CancellationToken::new())
            .await
            .unwrap();
        let paths: Vec<_> = params.iter().map(|p| p.full_path.as_str()).collect();
        assert_eq!(paths, vec!["/service/db", "/service/api"]);
    }

    #[tokio::test]
    async fn test_throttle_exhaustion_reports_attempts() {
        let store = Arc::new(PagedStore {
            pages: vec![vec![Parameter::new("/a", "1")]],
            throttle: 10,
            calls: AtomicU32::new(0),
        });
        let fetcher =
            ParameterFetcher::new(store.clone()).with_retry_policy(RetryPolicy::immediate(3));
        let err = fetcher
            .fetch(&config(None, false), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Throttling { attempts: 3, .. }));
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_page() {
        let store = Arc::new(PagedStore {
            pages: vec![vec![Parameter::new("/a", "1")]],
            throttle: 0,
            calls: AtomicU32::new(0),
        });
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = ParameterFetcher::new(store.clone())
            .fetch(&config(None, false), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "Cancelled");
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    /// Refuses decrypting lists; answers get-calls only for `readable`.
    struct UndecryptableStore {
        page: Vec<Parameter>,
        readable: Vec<&'static str>,
        gets: parking_lot::Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ParameterStore for UndecryptableStore {
        async fn list_page(&self, request: &ListRequest) -> std::result::Result<Page, StoreError> {
            if request.with_decryption {
                return Err(StoreError::AccessDenied("kms:Decrypt".to_string()));
            }
            Ok(Page {
                parameters: self.page.clone(),
                next_token: None,
            })
        }

        async fn get_parameter(
            &self,
            name: &str,
            _with_decryption: bool,
        ) -> std::result::Result<Parameter, StoreError> {
            self.gets.lock().push(name.to_string());
            if self.readable.iter().any(|r| *r == name) {
                Ok(Parameter::secure(name, format!("plain:{name}")))
            } else {
                Err(StoreError::AccessDenied(name.to_string()))
            }
        }
    }

    #[tokio::test]
    async fn test_fallback_only_decrypts_kept_parameters() {
        let store = UndecryptableStore {
            page: vec![
                Parameter::secure("/service/token", "ciphertext"),
                Parameter::secure("/service/nested/key", "ciphertext"),
                Parameter::secure("/service/token", "ciphertext"),
                Parameter::new("/service/user", "admin"),
            ],
            readable: vec!["/service/token"],
            gets: parking_lot::Mutex::new(Vec::new()),
        };
        let fetcher = ParameterFetcher::new(store);
        let params = fetcher
            .fetch(&config(Some("/service"), false), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*fetcher.store.gets.lock(), vec!["/service/token".to_string()]);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].value, "plain:/service/token");
        assert_eq!(params[1].value, "admin");
    }

    #[test]
    fn test_store_error_mapping() {
        let err = store_error(StoreError::AccessDenied("no".to_string()), "/x");
        assert!(matches!(err, Error::Access { ref path, .. } if path == "/x"));
        let err = store_error(StoreError::Region("dns".to_string()), "/x");
        assert_eq!(err.kind(), "RegionError");
        let err = store_error(StoreError::Other("boom".to_string()), "/x");
        assert_eq!(err.kind(), "StoreError");
    }
}
