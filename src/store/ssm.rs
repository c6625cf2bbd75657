use aws_config::BehaviorVersion;
use aws_sdk_ssm::config::{Credentials, Region};
use aws_sdk_ssm::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ssm::types::ParameterType;
use tracing::debug;

use super::{ListRequest, Page, Parameter, ParameterStore, StoreError};
use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::fetch::CredentialSource;

/// Page size for `GetParametersByPath`; the service maximum.
const PAGE_SIZE: i32 = 10;

/// Reads parameters from AWS SSM Parameter Store.
///
/// List calls ask for decryption when the fetcher does, so `SecureString`
/// values need both `ssm:GetParametersByPath` and `kms:Decrypt` on the key.
pub struct SsmParameterStore {
    client: aws_sdk_ssm::Client,
}

impl SsmParameterStore {
    /// Creates a store from an already loaded SDK configuration.
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ssm::Client::new(config),
        }
    }

    /// Builds a client for the credentials and region a job asks for.
    pub async fn connect(config: &Configuration) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = config.region_name() {
            loader = loader.region(Region::new(region.to_string()));
        }

        loader = match CredentialSource::resolve(config) {
            CredentialSource::Static {
                access_key_id,
                secret_access_key,
                session_token,
            } => loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                session_token,
                None,
                "JobConfiguration",
            )),
            CredentialSource::Profile(name) => loader.profile_name(name),
            CredentialSource::Ambient => loader,
        };

        let sdk_config = loader.load().await;
        if sdk_config.region().is_none() {
            return Err(Error::Region {
                path: config.path().unwrap_or("/").to_string(),
                message: "no region configured and none found in the environment".to_string(),
            });
        }

        debug!(region = ?sdk_config.region(), "SSM client configured");
        Ok(Self::new(&sdk_config))
    }
}

fn classify<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if matches!(err, SdkError::DispatchFailure(_) | SdkError::TimeoutError(_)) {
        return StoreError::Region(DisplayErrorContext(&err).to_string());
    }

    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    match err.code() {
        Some("ThrottlingException" | "TooManyRequestsException" | "RequestLimitExceeded") => {
            StoreError::Throttled(message)
        }
        Some(
            "AccessDeniedException"
            | "UnrecognizedClientException"
            | "InvalidClientTokenId"
            | "InvalidSignatureException"
            | "ExpiredTokenException"
            | "InvalidKeyId",
        ) => StoreError::AccessDenied(message),
        Some("ParameterNotFound") => StoreError::NotFound(message),
        _ => StoreError::Other(message),
    }
}

fn convert(p: aws_sdk_ssm::types::Parameter) -> Option<Parameter> {
    Some(Parameter {
        is_secure: matches!(p.r#type, Some(ParameterType::SecureString)),
        version: p.version,
        full_path: p.name?,
        value: p.value.unwrap_or_default(),
    })
}

#[async_trait::async_trait]
impl ParameterStore for SsmParameterStore {
    async fn list_page(&self, request: &ListRequest) -> std::result::Result<Page, StoreError> {
        let resp = self
            .client
            .get_parameters_by_path()
            .path(&request.path)
            .recursive(request.recursive)
            .with_decryption(request.with_decryption)
            .max_results(PAGE_SIZE)
            .set_next_token(request.next_token.clone())
            .send()
            .await
            .map_err(classify)?;

        Ok(Page {
            parameters: resp
                .parameters
                .unwrap_or_default()
                .into_iter()
                .filter_map(convert)
                .collect(),
            next_token: resp.next_token.filter(|t| !t.is_empty()),
        })
    }

    async fn get_parameter(
        &self,
        name: &str,
        with_decryption: bool,
    ) -> std::result::Result<Parameter, StoreError> {
        let resp = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(with_decryption)
            .send()
            .await
            .map_err(classify)?;

        resp.parameter
            .and_then(convert)
            .ok_or_else(|| StoreError::NotFound(format!("'{name}' returned no parameter")))
    }
}
