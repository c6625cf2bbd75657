//! Scripted parameter store shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parameter_store_env::{ListRequest, Page, Parameter, ParameterStore, StoreError};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Ciphertext handed back for secure values listed without decryption.
pub const CIPHERTEXT: &str = "AQICAHhENCRYPTED==";

/// Serves fixed pages, with per-page scripted failures.
#[derive(Default)]
pub struct ScriptedStore {
    pub pages: Vec<Vec<Parameter>>,
    /// Failures returned, front first, before a page is served.
    pub page_errors: Mutex<HashMap<usize, VecDeque<StoreError>>>,
    /// Page that cannot be listed with decryption.
    pub deny_decrypt_on: Option<usize>,
    /// Every get-call fails with access denied.
    pub deny_get: bool,
    /// Cancel this token once the given page has been served.
    pub cancel_after: Option<(usize, CancellationToken)>,
    pub list_calls: AtomicUsize,
    pub get_calls: Mutex<Vec<String>>,
}

impl ScriptedStore {
    pub fn new(pages: Vec<Vec<Parameter>>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn fail_page(self, index: usize, errors: Vec<StoreError>) -> Self {
        self.page_errors.lock().insert(index, errors.into());
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait::async_trait]
impl ParameterStore for ScriptedStore {
    async fn list_page(&self, request: &ListRequest) -> Result<Page, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let index: usize = match request.next_token.as_deref() {
            Some(token) => token
                .parse()
                .map_err(|_| StoreError::Other(format!("bad token {token}")))?,
            None => 0,
        };

        if request.with_decryption && self.deny_decrypt_on == Some(index) {
            return Err(StoreError::AccessDenied(
                "not authorized to perform kms:Decrypt".to_string(),
            ));
        }
        if let Some(err) = self
            .page_errors
            .lock()
            .get_mut(&index)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }

        let parameters = self.pages[index]
            .iter()
            .cloned()
            .map(|mut p| {
                if p.is_secure && !request.with_decryption {
                    p.value = CIPHERTEXT.to_string();
                }
                p
            })
            .collect();
        let next_token = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());

        if let Some((after, token)) = &self.cancel_after {
            if *after == index {
                token.cancel();
            }
        }

        Ok(Page {
            parameters,
            next_token,
        })
    }

    async fn get_parameter(&self, name: &str, with_decryption: bool) -> Result<Parameter, StoreError> {
        self.get_calls.lock().push(name.to_string());
        if self.deny_get {
            return Err(StoreError::AccessDenied(format!("not authorized to read {name}")));
        }
        let parameter = self
            .pages
            .iter()
            .flatten()
            .find(|p| p.full_path == name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        if parameter.is_secure && !with_decryption {
            return Ok(Parameter {
                value: CIPHERTEXT.to_string(),
                ..parameter
            });
        }
        Ok(parameter)
    }
}
