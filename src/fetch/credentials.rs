use tracing::warn;

use crate::config::Configuration;

/// Where the store client gets its credentials from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Keys written into the job configuration.
    Static {
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    },
    /// A named credential reference, resolved as a shared-config profile.
    Profile(String),
    /// The default provider chain (env vars, profile, instance role, ...).
    Ambient,
}

impl CredentialSource {
    /// Picks explicit keys, then the credentials id, then the ambient chain.
    ///
    /// Explicit keys count only when both the access key id and the secret
    /// are set; the session token is optional.
    pub fn resolve(config: &Configuration) -> Self {
        match (config.access_key_id(), config.secret_access_key()) {
            (Some(access_key_id), Some(secret_access_key)) => {
                return CredentialSource::Static {
                    access_key_id: access_key_id.to_string(),
                    secret_access_key: secret_access_key.to_string(),
                    session_token: config.session_token().map(str::to_string),
                };
            }
            (Some(_), None) | (None, Some(_)) => {
                warn!("Incomplete access key pair in job configuration, ignoring it");
            }
            (None, None) => {}
        }

        match config.credentials_id() {
            Some(id) => CredentialSource::Profile(id.to_string()),
            None => CredentialSource::Ambient,
        }
    }
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::Static {
                access_key_id,
                session_token,
                ..
            } => f
                .debug_struct("Static")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"****")
                .field("session_token", &session_token.as_ref().map(|_| "****"))
                .finish(),
            CredentialSource::Profile(name) => f.debug_tuple("Profile").field(name).finish(),
            CredentialSource::Ambient => f.write_str("Ambient"),
        }
    }
}
