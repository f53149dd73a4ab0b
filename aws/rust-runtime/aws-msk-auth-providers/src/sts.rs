/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Token exchange with AWS STS
//!
//! Role assumption is modeled as the [`TokenExchange`] capability so that sources which exchange
//! credentials (assume role, web identity, role profiles) do not depend on a concrete client.
//! [`StsTokenExchange`] is the production implementation built on `aws-sdk-sts`.

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_msk_credential_types::error::BoxError;
use aws_sdk_sts::config::Region;
use aws_smithy_async::future::BoxFuture;
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::OnceCell;

/// Role session duration requested when none is configured.
pub const DEFAULT_SESSION_DURATION: Duration = Duration::from_secs(3600);

/// Region used for STS when none is configured; resolves to the global STS endpoint.
pub const DEFAULT_STS_REGION: &str = "aws-global";

#[derive(Debug, Clone, Copy)]
pub struct AssumeRoleRequest<'a> {
    pub role_arn: &'a str,
    pub session_name: &'a str,
    pub duration: Duration,
    /// Credentials used to sign the request. When `None`, the backend uses its own ambient
    /// credentials.
    pub base_credentials: Option<&'a Credentials>,
}

#[derive(Debug, Clone, Copy)]
pub struct WebIdentityRequest<'a> {
    pub role_arn: &'a str,
    pub session_name: &'a str,
    pub web_identity_token: &'a str,
}

/// Exchange of a role identifier for temporary credentials
pub trait TokenExchange: Send + Sync + Debug {
    fn assume_role<'a>(
        &'a self,
        request: AssumeRoleRequest<'a>,
    ) -> BoxFuture<'a, Credentials, BoxError>;

    fn assume_role_with_web_identity<'a>(
        &'a self,
        request: WebIdentityRequest<'a>,
    ) -> BoxFuture<'a, Credentials, BoxError>;

    /// Region the exchange is scoped to
    fn region(&self) -> &str;
}

/// The token exchange service rejected a role or could not be reached
///
/// Carried as the source of a
/// [`CredentialsError::ProviderError`](aws_credential_types::provider::error::CredentialsError::ProviderError).
#[derive(Debug)]
pub struct AssumeRoleError {
    role_arn: String,
    source: BoxError,
}

impl AssumeRoleError {
    pub fn new(role_arn: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            role_arn: role_arn.into(),
            source: source.into(),
        }
    }

    pub fn role_arn(&self) -> &str {
        &self.role_arn
    }
}

impl Display for AssumeRoleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "failed to assume role `{}`", self.role_arn)
    }
}

impl Error for AssumeRoleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref() as _)
    }
}

/// [`TokenExchange`] backed by the STS service in a single region
///
/// Clients are created on first use: role assumption signs with the SDK's default credential
/// chain (or the request's base credentials), web identity exchange is unsigned.
#[derive(Debug)]
pub struct StsTokenExchange {
    region: String,
    signed: OnceCell<aws_sdk_sts::Client>,
    unsigned: OnceLock<aws_sdk_sts::Client>,
}

impl StsTokenExchange {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            signed: OnceCell::new(),
            unsigned: OnceLock::new(),
        }
    }

    async fn signed_client(&self) -> &aws_sdk_sts::Client {
        self.signed
            .get_or_init(|| async {
                let config = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(self.region.clone()))
                    .load()
                    .await;
                aws_sdk_sts::Client::new(&config)
            })
            .await
    }

    fn unsigned_client(&self) -> &aws_sdk_sts::Client {
        self.unsigned.get_or_init(|| {
            let config = aws_sdk_sts::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .region(Region::new(self.region.clone()))
                .build();
            aws_sdk_sts::Client::from_conf(config)
        })
    }

    async fn exchange(&self, request: AssumeRoleRequest<'_>) -> Result<Credentials, BoxError> {
        let pinned;
        let client = match request.base_credentials {
            Some(base) => {
                pinned = pinned_client(&self.region, base.clone());
                &pinned
            }
            None => self.signed_client().await,
        };
        let duration_seconds = i32::try_from(request.duration.as_secs()).unwrap_or(i32::MAX);
        let resp = client
            .assume_role()
            .role_arn(request.role_arn)
            .role_session_name(request.session_name)
            .duration_seconds(duration_seconds)
            .send()
            .await?;
        into_credentials(resp.credentials(), "AssumeRoleProvider")
    }

    async fn exchange_web_identity(
        &self,
        request: WebIdentityRequest<'_>,
    ) -> Result<Credentials, BoxError> {
        let resp = self
            .unsigned_client()
            .assume_role_with_web_identity()
            .role_arn(request.role_arn)
            .role_session_name(request.session_name)
            .web_identity_token(request.web_identity_token)
            .send()
            .await?;
        into_credentials(resp.credentials(), "WebIdentityToken")
    }
}

impl TokenExchange for StsTokenExchange {
    fn assume_role<'a>(
        &'a self,
        request: AssumeRoleRequest<'a>,
    ) -> BoxFuture<'a, Credentials, BoxError> {
        Box::pin(self.exchange(request))
    }

    fn assume_role_with_web_identity<'a>(
        &'a self,
        request: WebIdentityRequest<'a>,
    ) -> BoxFuture<'a, Credentials, BoxError> {
        Box::pin(self.exchange_web_identity(request))
    }

    fn region(&self) -> &str {
        &self.region
    }
}

/// An STS client whose only credentials are `credentials`
///
/// [`Credentials`] is itself a non-refreshing provider, so the client signs every request with
/// exactly these keys and never falls back to another source.
pub(crate) fn pinned_client(region: &str, credentials: Credentials) -> aws_sdk_sts::Client {
    let config = aws_sdk_sts::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .credentials_provider(credentials)
        .build();
    aws_sdk_sts::Client::from_conf(config)
}

/// Convert STS credentials into [`Credentials`]
pub(crate) fn into_credentials(
    sts_credentials: Option<&aws_sdk_sts::types::Credentials>,
    provider_name: &'static str,
) -> Result<Credentials, BoxError> {
    let sts_credentials =
        sts_credentials.ok_or("STS returned no credentials for the role session")?;
    let expiration = SystemTime::try_from(*sts_credentials.expiration())
        .map_err(|_| "credential expiration was not representable as a system time")?;
    Ok(Credentials::new(
        sts_credentials.access_key_id(),
        sts_credentials.secret_access_key(),
        Some(sts_credentials.session_token().to_string()),
        Some(expiration),
        provider_name,
    ))
}

/// Create a default STS session name
///
/// STS Assume Role providers MUST assign a name to their generated session. When a user does not
/// provide a name for the session, the provider will choose a name composed of a base + a
/// timestamp, e.g. `aws-msk-iam-auth-1629147173000`.
pub(crate) fn default_session_name(base: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}-{}", base, now.as_millis())
}
