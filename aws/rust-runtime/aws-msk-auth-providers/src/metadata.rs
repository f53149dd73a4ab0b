/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Container and EC2 instance metadata credential providers
//!
//! [`Ec2ContainerCredentialsProvider`] loads credentials from the ECS container endpoint when the
//! container environment variables are set, and from the EC2 instance metadata service (IMDS)
//! otherwise. The choice is made once, when the provider is built.
//!
//! The container authorization token is only ever sent over https, or over plain http to a
//! loopback address or one of the link-local container metadata hosts.

use crate::cache::{ExpiringCache, DEFAULT_EXPIRY_BUFFER};
use aws_credential_types::provider::{self, error::CredentialsError, future, ProvideCredentials};
use aws_credential_types::Credentials;
use aws_msk_credential_types::error::BoxError;
use aws_msk_credential_types::provider::CredentialSource;
use aws_smithy_async::future::BoxFuture;
use aws_smithy_async::time::SharedTimeSource;
use aws_types::os_shim_internal::Env;
use serde::Deserialize;
use std::fmt::Debug;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

const ENV_VAR_RELATIVE_URI: &str = "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI";
const ENV_VAR_FULL_URI: &str = "AWS_CONTAINER_CREDENTIALS_FULL_URI";
const ENV_VAR_AUTHORIZATION_TOKEN: &str = "AWS_CONTAINER_AUTHORIZATION_TOKEN";
const CONTAINER_ENDPOINT: &str = "http://169.254.170.2";
const ECS_CONTAINER_HOST: IpAddr = IpAddr::V4(Ipv4Addr::new(169, 254, 170, 2));
const EKS_CONTAINER_HOST_V4: IpAddr = IpAddr::V4(Ipv4Addr::new(169, 254, 170, 23));
const EKS_CONTAINER_HOST_V6: IpAddr =
    IpAddr::V6(Ipv6Addr::new(0xfd00, 0x0ec2, 0, 0, 0, 0, 0, 0x23));

const ENV_VAR_IMDS_DISABLED: &str = "AWS_EC2_METADATA_DISABLED";
const ENV_VAR_IMDS_ENDPOINT: &str = "AWS_EC2_METADATA_SERVICE_ENDPOINT";
const IMDS_ENDPOINT: &str = "http://169.254.169.254";
const IMDS_TOKEN_PATH: &str = "/latest/api/token";
const IMDS_CREDENTIALS_PATH: &str = "/latest/meta-data/iam/security-credentials/";
const IMDS_TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
const IMDS_TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";
const IMDS_TOKEN_TTL: &str = "21600";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
}

#[derive(Debug, Clone)]
pub struct MetadataRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
}

impl MetadataRequest {
    fn get(url: impl Into<String>) -> Self {
        MetadataRequest {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    fn put(url: impl Into<String>) -> Self {
        MetadataRequest {
            method: Method::Put,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct MetadataResponse {
    pub status: u16,
    pub body: String,
}

impl MetadataResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP transport to the local metadata endpoints
pub trait MetadataTransport: Send + Sync + Debug {
    fn send<'a>(&'a self, request: MetadataRequest) -> BoxFuture<'a, MetadataResponse, BoxError>;
}

/// [`MetadataTransport`] backed by `reqwest`
#[derive(Debug)]
pub struct ReqwestTransport {
    client: Result<reqwest::Client, String>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }

    pub fn with_timeouts(connect_timeout: Duration, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|err| err.to_string());
        ReqwestTransport { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataTransport for ReqwestTransport {
    fn send<'a>(&'a self, request: MetadataRequest) -> BoxFuture<'a, MetadataResponse, BoxError> {
        Box::pin(async move {
            let client = self
                .client
                .as_ref()
                .map_err(|err| BoxError::from(format!("invalid HTTP client: {}", err)))?;
            let mut builder = match request.method {
                Method::Get => client.get(&request.url),
                Method::Put => client.put(&request.url),
            };
            for (name, value) in &request.headers {
                builder = builder.header(*name, value.as_str());
            }
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok(MetadataResponse { status, body })
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JsonCredentials {
    code: Option<String>,
    message: Option<String>,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    token: Option<String>,
    expiration: Option<String>,
}

fn parse_json_credentials(
    provider_name: &'static str,
    body: &str,
) -> Result<Credentials, CredentialsError> {
    let json: JsonCredentials = serde_json::from_str(body).map_err(|err| {
        CredentialsError::provider_error(format!("invalid JSON credentials document: {}", err))
    })?;
    if let Some(code) = json.code.as_deref().filter(|code| *code != "Success") {
        return Err(CredentialsError::provider_error(format!(
            "failed to load credentials [{}]: {}",
            code,
            json.message.as_deref().unwrap_or("no message")
        )));
    }
    let (access_key_id, secret_access_key) = match (json.access_key_id, json.secret_access_key) {
        (Some(access_key_id), Some(secret_access_key)) => (access_key_id, secret_access_key),
        _ => {
            return Err(CredentialsError::provider_error(
                "credentials document is missing AccessKeyId or SecretAccessKey",
            ))
        }
    };
    let expiration = json
        .expiration
        .as_deref()
        .map(parse_expiration)
        .transpose()?;
    Ok(Credentials::new(
        access_key_id,
        secret_access_key,
        json.token,
        expiration,
        provider_name,
    ))
}

fn parse_expiration(expiration: &str) -> Result<SystemTime, CredentialsError> {
    OffsetDateTime::parse(expiration, &Rfc3339)
        .map(SystemTime::from)
        .map_err(|err| {
            CredentialsError::provider_error(format!(
                "invalid Expiration `{}`: {}",
                expiration, err
            ))
        })
}

fn non_empty(env: &Env, key: &str) -> Option<String> {
    env.get(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug)]
struct ContainerCredentialsProvider {
    url: String,
    authorization: Option<String>,
    transport: Arc<dyn MetadataTransport>,
}

impl ContainerCredentialsProvider {
    /// `None` when neither container variable is set, `Some(Err(_))` for an unacceptable full URI
    fn from_env(
        env: &Env,
        transport: Arc<dyn MetadataTransport>,
    ) -> Option<Result<Self, String>> {
        if let Some(relative_uri) = non_empty(env, ENV_VAR_RELATIVE_URI) {
            return Some(Ok(ContainerCredentialsProvider {
                url: format!("{}{}", CONTAINER_ENDPOINT, relative_uri),
                authorization: None,
                transport,
            }));
        }
        let url = non_empty(env, ENV_VAR_FULL_URI)?;
        Some(validate_full_uri(&url).map(|()| ContainerCredentialsProvider {
            url,
            authorization: non_empty(env, ENV_VAR_AUTHORIZATION_TOKEN),
            transport,
        }))
    }

    async fn credentials(&self) -> provider::Result {
        let mut request = MetadataRequest::get(&self.url).header("Accept", "application/json");
        if let Some(authorization) = &self.authorization {
            request = request.header("Authorization", authorization.clone());
        }
        let response = self
            .transport
            .send(request)
            .await
            .map_err(CredentialsError::provider_error)?;
        if !response.is_success() {
            return Err(CredentialsError::provider_error(format!(
                "non-success status from container credentials endpoint: {}",
                response.status
            )));
        }
        parse_json_credentials("ContainerCredentials", &response.body)
    }
}

/// The full URI must be https, or http to a host that cannot leave the machine or task
fn validate_full_uri(uri: &str) -> Result<(), String> {
    let url = reqwest::Url::parse(uri)
        .map_err(|err| format!("{} `{}` is not a valid URI: {}", ENV_VAR_FULL_URI, uri, err))?;
    match url.scheme() {
        "https" => Ok(()),
        "http" if url.host_str().map(is_allowed_http_host).unwrap_or(false) => Ok(()),
        "http" => Err(format!(
            "{} `{}` must use https unless the host is a loopback address or a container \
             metadata endpoint",
            ENV_VAR_FULL_URI, uri
        )),
        scheme => Err(format!(
            "{} `{}` has unsupported scheme `{}`",
            ENV_VAR_FULL_URI, uri, scheme
        )),
    }
}

fn is_allowed_http_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    match host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
    {
        Ok(ip) => {
            ip.is_loopback()
                || ip == ECS_CONTAINER_HOST
                || ip == EKS_CONTAINER_HOST_V4
                || ip == EKS_CONTAINER_HOST_V6
        }
        Err(_) => false,
    }
}

#[derive(Debug)]
struct InstanceMetadataCredentialsProvider {
    endpoint: Option<String>,
    transport: Arc<dyn MetadataTransport>,
}

impl InstanceMetadataCredentialsProvider {
    fn from_env(env: &Env, transport: Arc<dyn MetadataTransport>) -> Self {
        let disabled = env
            .get(ENV_VAR_IMDS_DISABLED)
            .map(|value| value.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let endpoint = if disabled {
            None
        } else {
            let endpoint = non_empty(env, ENV_VAR_IMDS_ENDPOINT)
                .unwrap_or_else(|| IMDS_ENDPOINT.to_string());
            Some(endpoint.trim_end_matches('/').to_string())
        };
        InstanceMetadataCredentialsProvider {
            endpoint,
            transport,
        }
    }

    /// IMDSv2 session token, or `None` to fall back to IMDSv1
    async fn session_token(&self, endpoint: &str) -> Option<String> {
        let request = MetadataRequest::put(format!("{}{}", endpoint, IMDS_TOKEN_PATH))
            .header(IMDS_TOKEN_TTL_HEADER, IMDS_TOKEN_TTL);
        match self.transport.send(request).await {
            Ok(response) if response.is_success() => Some(response.body.trim().to_string()),
            Ok(response) => {
                tracing::debug!(status = response.status, "IMDSv2 token request rejected, falling back to IMDSv1");
                None
            }
            Err(err) => {
                tracing::debug!(error = %err, "IMDSv2 token request failed, falling back to IMDSv1");
                None
            }
        }
    }

    async fn get(&self, url: String, token: Option<&str>) -> Result<MetadataResponse, CredentialsError> {
        let mut request = MetadataRequest::get(url);
        if let Some(token) = token {
            request = request.header(IMDS_TOKEN_HEADER, token);
        }
        self.transport
            .send(request)
            .await
            .map_err(CredentialsError::provider_error)
    }

    async fn credentials(&self) -> provider::Result {
        let endpoint = match &self.endpoint {
            Some(endpoint) => endpoint,
            None => {
                return Err(CredentialsError::not_loaded(
                    "instance metadata is disabled by AWS_EC2_METADATA_DISABLED",
                ))
            }
        };
        let token = self.session_token(endpoint).await;
        let base = format!("{}{}", endpoint, IMDS_CREDENTIALS_PATH);
        let response = self.get(base.clone(), token.as_deref()).await?;
        if response.status == 404 {
            return Err(CredentialsError::not_loaded(
                "no IAM role is attached to this instance",
            ));
        }
        if !response.is_success() {
            return Err(CredentialsError::provider_error(format!(
                "non-success status listing instance profile roles: {}",
                response.status
            )));
        }
        let role = match response.body.lines().map(str::trim).find(|line| !line.is_empty()) {
            Some(role) => role.to_string(),
            None => {
                return Err(CredentialsError::not_loaded(
                    "no IAM role is attached to this instance",
                ))
            }
        };
        let response = self
            .get(format!("{}{}", base, role), token.as_deref())
            .await?;
        if !response.is_success() {
            return Err(CredentialsError::provider_error(format!(
                "non-success status loading credentials for role `{}`: {}",
                role, response.status
            )));
        }
        parse_json_credentials("InstanceMetadata", &response.body)
    }
}

#[derive(Debug)]
enum Endpoint {
    Container(ContainerCredentialsProvider),
    /// The container variables were set but the full URI was rejected; nothing is ever sent
    InvalidContainerUri(String),
    InstanceMetadata(InstanceMetadataCredentialsProvider),
}

/// Credentials from the container endpoint, or from instance metadata outside a container
///
/// Every request has a 1 second connect timeout and a 5 second overall timeout. Outside EC2,
/// nothing listens on the instance metadata address, so resolving through a chain that reaches
/// this provider costs up to two connect timeouts (the IMDSv2 token request, then the IMDSv1
/// fallback) before the chain gives up.
///
/// `AWS_CONTAINER_CREDENTIALS_FULL_URI` must be https, or plain http to `localhost`, a loopback
/// address, `169.254.170.2`, `169.254.170.23` or `fd00:ec2::23`. Any other full URI fails with
/// [`CredentialsError::InvalidConfiguration`] without sending the authorization token anywhere.
#[derive(Debug)]
pub struct Ec2ContainerCredentialsProvider {
    endpoint: Endpoint,
    cache: ExpiringCache,
}

impl Ec2ContainerCredentialsProvider {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// `true` when the container variables were set, even if the full URI was rejected
    pub fn uses_container_endpoint(&self) -> bool {
        matches!(
            self.endpoint,
            Endpoint::Container(_) | Endpoint::InvalidContainerUri(_)
        )
    }

    async fn load(&self) -> provider::Result {
        match &self.endpoint {
            Endpoint::Container(provider) => provider.credentials().await,
            Endpoint::InvalidContainerUri(message) => {
                Err(CredentialsError::invalid_configuration(message.clone()))
            }
            Endpoint::InstanceMetadata(provider) => provider.credentials().await,
        }
    }

    async fn credentials(&self) -> provider::Result {
        self.cache.get_or_load(|| self.load()).await
    }
}

impl ProvideCredentials for Ec2ContainerCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials())
    }
}

impl CredentialSource for Ec2ContainerCredentialsProvider {
    fn refresh(&self) {
        self.cache.invalidate();
    }
}

#[derive(Debug, Default)]
pub struct Builder {
    env: Env,
    transport: Option<Arc<dyn MetadataTransport>>,
    time_source: SharedTimeSource,
}

impl Builder {
    pub fn env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    pub fn set_env(&mut self, env: Env) -> &mut Self {
        self.env = env;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn MetadataTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn set_transport(&mut self, transport: Option<Arc<dyn MetadataTransport>>) -> &mut Self {
        self.transport = transport;
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

    pub fn build(self) -> Ec2ContainerCredentialsProvider {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        let endpoint = match ContainerCredentialsProvider::from_env(&self.env, transport.clone()) {
            Some(Ok(container)) => Endpoint::Container(container),
            Some(Err(message)) => {
                tracing::warn!(%message, "refusing container credentials endpoint");
                Endpoint::InvalidContainerUri(message)
            }
            None => Endpoint::InstanceMetadata(InstanceMetadataCredentialsProvider::from_env(
                &self.env, transport,
            )),
        };
        Ec2ContainerCredentialsProvider {
            endpoint,
            cache: ExpiringCache::new(DEFAULT_EXPIRY_BUFFER, self.time_source),
        }
    }
}
