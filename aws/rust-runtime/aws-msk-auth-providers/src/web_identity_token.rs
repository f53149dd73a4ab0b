/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Web Identity Token Credential Provider

use crate::cache::{ExpiringCache, DEFAULT_EXPIRY_BUFFER};
use crate::sts::{self, AssumeRoleError, StsTokenExchange, TokenExchange, WebIdentityRequest};
use aws_credential_types::provider::{self, error::CredentialsError, future, ProvideCredentials};
use aws_msk_credential_types::provider::CredentialSource;
use aws_smithy_async::time::SharedTimeSource;
use aws_types::os_shim_internal::{Env, Fs};
use std::sync::Arc;

const ENV_VAR_TOKEN_FILE: &str = "AWS_WEB_IDENTITY_TOKEN_FILE";
const ENV_VAR_ROLE_ARN: &str = "AWS_ROLE_ARN";
const ENV_VAR_SESSION_NAME: &str = "AWS_ROLE_SESSION_NAME";
const ENV_VAR_REGION: &str = "AWS_REGION";
const ENV_VAR_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";

/// Exchange an OIDC token (eg. from an EKS service account) for role credentials
///
/// The token file, role and optional session name come from `AWS_WEB_IDENTITY_TOKEN_FILE`,
/// `AWS_ROLE_ARN` and `AWS_ROLE_SESSION_NAME`. The token file is re-read for every exchange since
/// it is rotated by the platform.
#[derive(Debug)]
pub struct WebIdentityTokenCredentialProvider {
    env: Env,
    fs: Fs,
    exchange: Arc<dyn TokenExchange>,
    cache: ExpiringCache,
}

impl ProvideCredentials for WebIdentityTokenCredentialProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.cached_credentials())
    }
}

impl CredentialSource for WebIdentityTokenCredentialProvider {
    fn refresh(&self) {
        self.cache.invalidate();
    }
}

impl WebIdentityTokenCredentialProvider {
    pub fn builder() -> Builder {
        Builder::default()
    }

    async fn cached_credentials(&self) -> provider::Result {
        self.cache.get_or_load(|| self.credentials()).await
    }

    async fn credentials(&self) -> provider::Result {
        let token_file = self.env.get(ENV_VAR_TOKEN_FILE).map_err(|_| {
            CredentialsError::not_loaded("AWS_WEB_IDENTITY_TOKEN_FILE was not set")
        })?;
        let role_arn = self.env.get(ENV_VAR_ROLE_ARN).map_err(|_| {
            CredentialsError::invalid_configuration(
                "AWS_ROLE_ARN environment variable must be set",
            )
        })?;
        let token = self
            .fs
            .read_to_end(&token_file)
            .await
            .map_err(CredentialsError::provider_error)?;
        let token = String::from_utf8(token).map_err(|_utf_8_error| {
            CredentialsError::provider_error("WebIdentityToken was not valid UTF-8")
        })?;
        let session_name = self
            .env
            .get(ENV_VAR_SESSION_NAME)
            .unwrap_or_else(|_| sts::default_session_name("aws-msk-iam-auth"));
        tracing::debug!(role_arn = %role_arn, session_name = %session_name, "exchanging web identity token");
        let result = self
            .exchange
            .assume_role_with_web_identity(WebIdentityRequest {
                role_arn: &role_arn,
                session_name: &session_name,
                web_identity_token: token.trim(),
            })
            .await;
        result.map_err(|err| {
            CredentialsError::provider_error(AssumeRoleError::new(role_arn.clone(), err))
        })
    }
}

#[derive(Debug, Default)]
pub struct Builder {
    env: Env,
    fs: Fs,
    exchange: Option<Arc<dyn TokenExchange>>,
    region: Option<String>,
    time_source: SharedTimeSource,
}

impl Builder {
    pub fn fs(mut self, fs: Fs) -> Self {
        self.fs = fs;
        self
    }

    pub fn set_fs(&mut self, fs: Fs) -> &mut Self {
        self.fs = fs;
        self
    }

    pub fn env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    pub fn set_env(&mut self, env: Env) -> &mut Self {
        self.env = env;
        self
    }

    /// Override the backend used to exchange the token
    pub fn exchange(mut self, exchange: Arc<dyn TokenExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    pub fn set_exchange(&mut self, exchange: Option<Arc<dyn TokenExchange>>) -> &mut Self {
        self.exchange = exchange;
        self
    }

    /// Region of the STS endpoint
    ///
    /// When unset, `AWS_REGION` (then `AWS_DEFAULT_REGION`) is used, falling back to the global
    /// endpoint.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn set_region(&mut self, region: Option<String>) -> &mut Self {
        self.region = region;
        self
    }

    pub fn time_source(mut self, time_source: SharedTimeSource) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn set_time_source(&mut self, time_source: SharedTimeSource) -> &mut Self {
        self.time_source = time_source;
        self
    }

    pub fn build(self) -> WebIdentityTokenCredentialProvider {
        let exchange = match self.exchange {
            Some(exchange) => exchange,
            None => {
                let region = self
                    .region
                    .or_else(|| self.env.get(ENV_VAR_REGION).ok())
                    .or_else(|| self.env.get(ENV_VAR_DEFAULT_REGION).ok())
                    .unwrap_or_else(|| sts::DEFAULT_STS_REGION.to_string());
                Arc::new(StsTokenExchange::new(region))
            }
        };
        WebIdentityTokenCredentialProvider {
            env: self.env,
            fs: self.fs,
            exchange,
            cache: ExpiringCache::new(DEFAULT_EXPIRY_BUFFER, self.time_source),
        }
    }
}
