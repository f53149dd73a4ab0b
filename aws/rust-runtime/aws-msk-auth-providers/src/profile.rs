/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Profile File Based Providers
//!
//! Credentials are resolved from a named profile in the shared `config` and `credentials` files.
//! Compared to a plain profile reader, resolution here is strict: a profile either yields a
//! complete access key/secret pair (plus a non-empty session token when one is declared) or the
//! provider fails with a message naming the profile. It never falls through to some other source
//! with an ambiguous, partially populated result.
//!
//! Two profile shapes are supported:
//! - static keys: `aws_access_key_id`, `aws_secret_access_key`, optionally `aws_session_token`
//! - role profiles: `role_arn` with a `source_profile` holding static keys, exchanged through
//!   STS (optionally with `role_session_name` and `duration_seconds`)

use crate::cache::{ExpiringCache, DEFAULT_EXPIRY_BUFFER};
use crate::sts::{self, AssumeRoleError, AssumeRoleRequest, StsTokenExchange, TokenExchange};
use aws_credential_types::provider::{self, error::CredentialsError, future, ProvideCredentials};
use aws_credential_types::Credentials;
use aws_msk_credential_types::error::{ProviderClosed, ReleaseError};
use aws_msk_credential_types::provider::{CredentialSource, ReleaseResources};
use aws_smithy_async::time::SharedTimeSource;
use aws_types::os_shim_internal::{Env, Fs};
use parser::{Profile, ProfileSet};
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

mod parser;

const ENV_VAR_PROFILE: &str = "AWS_PROFILE";
const DEFAULT_PROFILE: &str = "default";

const ACCESS_KEY_ID: &str = "aws_access_key_id";
const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
const SESSION_TOKEN: &str = "aws_session_token";
const ROLE_ARN: &str = "role_arn";
const SOURCE_PROFILE: &str = "source_profile";
const ROLE_SESSION_NAME: &str = "role_session_name";
const DURATION_SECONDS: &str = "duration_seconds";

#[derive(Debug)]
#[non_exhaustive]
pub enum ProfileFileError {
    CouldNotReadProfileFile {
        path: PathBuf,
        message: String,
    },
    CouldNotParseProfile {
        path: PathBuf,
        message: String,
    },
    CredentialLoop {
        profiles: Vec<String>,
        next: String,
    },
    MissingCredentialSource {
        profile: String,
        message: Cow<'static, str>,
    },
    InvalidCredentialSource {
        profile: String,
        message: Cow<'static, str>,
    },
    MissingProfile {
        profile: String,
        message: Cow<'static, str>,
    },
}

impl Display for ProfileFileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProfileFileError::CouldNotReadProfileFile { path, message } => {
                write!(f, "could not read profile file `{}`: {}", path.display(), message)
            }
            ProfileFileError::CouldNotParseProfile { path, message } => {
                write!(f, "could not parse profile file `{}`: {}", path.display(), message)
            }
            ProfileFileError::CredentialLoop { profiles, next } => write!(
                f,
                "profile formed an infinite loop. first we loaded {:?}, then attempted to reload {}",
                profiles, next
            ),
            ProfileFileError::MissingCredentialSource { profile, message } => {
                write!(f, "missing credential source in `{}`: {}", profile, message)
            }
            ProfileFileError::InvalidCredentialSource { profile, message } => {
                write!(f, "invalid credential source in `{}`: {}", profile, message)
            }
            ProfileFileError::MissingProfile { profile, message } => {
                write!(f, "profile `{}` was not defined: {}", profile, message)
            }
        }
    }
}

impl Error for ProfileFileError {}

/// Profile problems are configuration errors: retrying without editing the files cannot help.
impl From<ProfileFileError> for CredentialsError {
    fn from(err: ProfileFileError) -> Self {
        CredentialsError::invalid_configuration(err)
    }
}

/// Load credentials from a named profile
///
/// The profile name is, in order: the name given to the builder, `AWS_PROFILE`, `default`.
///
/// Resolved credentials are cached: static keys until [`refresh`](CredentialSource::refresh),
/// role credentials until shortly before they expire. Profile problems surface as
/// [`CredentialsError::InvalidConfiguration`] carrying a [`ProfileFileError`].
#[derive(Debug)]
pub struct ProfileCredentialsProvider {
    profile_override: Option<String>,
    env: Env,
    fs: Fs,
    exchange: Mutex<Option<Arc<dyn TokenExchange>>>,
    cache: ExpiringCache,
}

impl ProfileCredentialsProvider {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Name of the profile this provider reads
    pub fn profile_name(&self) -> Cow<'_, str> {
        match &self.profile_override {
            Some(profile) => Cow::Borrowed(profile.as_str()),
            None => self
                .env
                .get(ENV_VAR_PROFILE)
                .ok()
                .filter(|profile| !profile.is_empty())
                .map(Cow::Owned)
                .unwrap_or(Cow::Borrowed(DEFAULT_PROFILE)),
        }
    }

    fn exchange(&self) -> Result<Arc<dyn TokenExchange>, CredentialsError> {
        self.exchange
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ProviderClosed::new("ProfileCredentialsProvider").into())
    }

    async fn credentials(&self) -> provider::Result {
        let exchange = self.exchange()?;
        self.cache
            .get_or_load(|| async move { self.resolve(&self.profile_name(), exchange).await })
            .await
    }

    async fn resolve(
        &self,
        profile_name: &str,
        exchange: Arc<dyn TokenExchange>,
    ) -> provider::Result {
        let profiles = ProfileSet::load(&self.env, &self.fs).await?;
        let profile = profiles.get(profile_name).ok_or_else(|| ProfileFileError::MissingProfile {
            profile: profile_name.to_string(),
            message: "no such profile in the shared config or credentials file".into(),
        })?;
        if let Some(credentials) = static_credentials(profile_name, profile)? {
            tracing::debug!(profile = %profile_name, "loaded static credentials from profile");
            return Ok(credentials);
        }
        let role_arn = match non_empty(profile, ROLE_ARN) {
            Some(role_arn) => role_arn,
            None => {
                return Err(ProfileFileError::MissingCredentialSource {
                    profile: profile_name.to_string(),
                    message: "profile contains neither static credentials nor a role_arn".into(),
                }
                .into())
            }
        };
        let source_name = non_empty(profile, SOURCE_PROFILE).ok_or_else(|| {
            ProfileFileError::MissingCredentialSource {
                profile: profile_name.to_string(),
                message: "role_arn requires a source_profile".into(),
            }
        })?;
        if source_name == profile_name {
            return Err(ProfileFileError::CredentialLoop {
                profiles: vec![profile_name.to_string()],
                next: source_name.to_string(),
            }
            .into());
        }
        let source = profiles
            .get(source_name)
            .ok_or_else(|| ProfileFileError::MissingProfile {
                profile: source_name.to_string(),
                message: format!("referenced as source_profile by `{}`", profile_name).into(),
            })?;
        let base = match static_credentials(source_name, source)? {
            Some(base) => base,
            None if non_empty(source, ROLE_ARN).is_some() => {
                return Err(ProfileFileError::InvalidCredentialSource {
                    profile: source_name.to_string(),
                    message: "role chaining through more than one source_profile is not supported"
                        .into(),
                }
                .into())
            }
            None => {
                return Err(ProfileFileError::MissingCredentialSource {
                    profile: source_name.to_string(),
                    message: "source profile contains no static credentials".into(),
                }
                .into())
            }
        };
        let session_name = non_empty(profile, ROLE_SESSION_NAME)
            .map(str::to_string)
            .unwrap_or_else(|| sts::default_session_name("aws-msk-iam-auth"));
        let duration = match non_empty(profile, DURATION_SECONDS) {
            Some(seconds) => seconds.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                ProfileFileError::InvalidCredentialSource {
                    profile: profile_name.to_string(),
                    message: format!("invalid duration_seconds `{}`", seconds).into(),
                }
            })?,
            None => sts::DEFAULT_SESSION_DURATION,
        };
        tracing::debug!(profile = %profile_name, role_arn = %role_arn, "assuming role from profile");
        exchange
            .assume_role(AssumeRoleRequest {
                role_arn,
                session_name: &session_name,
                duration,
                base_credentials: Some(&base),
            })
            .await
            .map_err(|err| CredentialsError::provider_error(AssumeRoleError::new(role_arn, err)))
    }
}

fn non_empty<'a>(profile: &'a Profile, key: &str) -> Option<&'a str> {
    profile
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// Static keys from a single profile
///
/// `Ok(None)` means the profile declares no keys at all. Any partially declared key set is an
/// error.
fn static_credentials(
    profile_name: &str,
    profile: &Profile,
) -> Result<Option<Credentials>, ProfileFileError> {
    let invalid = |message: &'static str| ProfileFileError::InvalidCredentialSource {
        profile: profile_name.to_string(),
        message: message.into(),
    };
    let access_key = non_empty(profile, ACCESS_KEY_ID);
    let secret_key = non_empty(profile, SECRET_ACCESS_KEY);
    let (access_key, secret_key) = match (access_key, secret_key) {
        (Some(access_key), Some(secret_key)) => (access_key, secret_key),
        (None, None) if profile.contains_key(SESSION_TOKEN) => {
            return Err(invalid(
                "aws_session_token is set but aws_access_key_id and aws_secret_access_key are not",
            ))
        }
        (None, None) => return Ok(None),
        (Some(_), None) => {
            return Err(invalid(
                "aws_access_key_id is set but aws_secret_access_key is missing or empty",
            ))
        }
        (None, Some(_)) => {
            return Err(invalid(
                "aws_secret_access_key is set but aws_access_key_id is missing or empty",
            ))
        }
    };
    let session_token = match profile.get(SESSION_TOKEN) {
        None => None,
        Some(token) if token.trim().is_empty() => {
            return Err(invalid("aws_session_token is declared but empty"))
        }
        Some(token) => Some(token.trim().to_string()),
    };
    Ok(Some(Credentials::new(
        access_key,
        secret_key,
        session_token,
        None,
        "ProfileFile",
    )))
}

impl ProvideCredentials for ProfileCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials())
    }
}

impl CredentialSource for ProfileCredentialsProvider {
    fn refresh(&self) {
        self.cache.invalidate();
    }
}

impl ReleaseResources for ProfileCredentialsProvider {
    fn release(&self) -> Result<(), ReleaseError> {
        let released = self
            .exchange
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_some() {
            tracing::debug!(profile = %self.profile_name(), "releasing profile provider");
            self.cache.invalidate();
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Builder {
    profile_name: Option<String>,
    env: Env,
    fs: Fs,
    exchange: Option<Arc<dyn TokenExchange>>,
    region: Option<String>,
    time_source: SharedTimeSource,
}

impl Builder {
    /// Read this profile instead of `AWS_PROFILE` / `default`
    pub fn profile_name(mut self, profile_name: impl Into<String>) -> Self {
        self.profile_name = Some(profile_name.into());
        self
    }

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

    /// Backend used for role profiles
    pub fn exchange(mut self, exchange: Arc<dyn TokenExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    pub fn set_exchange(&mut self, exchange: Option<Arc<dyn TokenExchange>>) -> &mut Self {
        self.exchange = exchange;
        self
    }

    /// STS region used for role profiles, `aws-global` by default
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

    pub fn build(self) -> ProfileCredentialsProvider {
        let region = self.region;
        let exchange = self.exchange.unwrap_or_else(|| {
            Arc::new(StsTokenExchange::new(
                region.unwrap_or_else(|| sts::DEFAULT_STS_REGION.to_string()),
            ))
        });
        ProfileCredentialsProvider {
            profile_override: self.profile_name,
            env: self.env,
            fs: self.fs,
            exchange: Mutex::new(Some(exchange)),
            cache: ExpiringCache::new(DEFAULT_EXPIRY_BUFFER, self.time_source),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::profile::{Builder, ProfileCredentialsProvider, ProfileFileError};
    use crate::sts::AssumeRoleError;
    use crate::test_util::{error_source, sts_credentials, FakeTokenExchange};
    use aws_credential_types::provider::error::CredentialsError;
    use aws_credential_types::provider::ProvideCredentials;
    use aws_msk_credential_types::error::ProviderClosed;
    use aws_msk_credential_types::provider::ReleaseResources;
    use aws_types::os_shim_internal::{Env, Fs};
    use std::sync::Arc;
    use std::time::Duration;

    fn provider(credentials_file: &str) -> Builder {
        ProfileCredentialsProvider::builder()
            .env(Env::from_slice(&[("HOME", "/home/me")]))
            .fs(Fs::from_slice(&[("/home/me/.aws/credentials", credentials_file)]))
            .exchange(Arc::new(FakeTokenExchange::rejecting("unused")))
    }

    async fn profile_failure(provider: ProfileCredentialsProvider) -> CredentialsError {
        let err = provider.provide_credentials().await.expect_err("profile failure");
        assert!(
            matches!(err, CredentialsError::InvalidConfiguration(_)),
            "{:?}",
            err
        );
        err
    }

    #[tokio::test]
    async fn static_keys_from_named_profile() {
        let creds = provider(
            "[default]\naws_access_key_id = wrong\naws_secret_access_key = wrong\n\n\
             [analytics]\naws_access_key_id = correct_key\naws_secret_access_key = correct_secret\naws_session_token = correct_token\n",
        )
        .profile_name("analytics")
        .build()
        .provide_credentials()
        .await
        .expect("valid creds");
        assert_eq!(creds.access_key_id(), "correct_key");
        assert_eq!(creds.secret_access_key(), "correct_secret");
        assert_eq!(creds.session_token(), Some("correct_token"));
    }

    #[tokio::test]
    async fn default_profile_honors_aws_profile() {
        let provider = ProfileCredentialsProvider::builder()
            .env(Env::from_slice(&[("HOME", "/home/me"), ("AWS_PROFILE", "ci")]))
            .fs(Fs::from_slice(&[(
                "/home/me/.aws/config",
                "[profile ci]\naws_access_key_id = ci_key\naws_secret_access_key = ci_secret\n",
            )]))
            .build();
        assert_eq!(provider.profile_name(), "ci");
        let creds = provider.provide_credentials().await.expect("valid creds");
        assert_eq!(creds.access_key_id(), "ci_key");
        assert_eq!(creds.session_token(), None);
    }

    #[tokio::test]
    async fn missing_profile() {
        let err =
            profile_failure(provider("[default]\naws_access_key_id = a\n").profile_name("nope").build())
                .await;
        match error_source::<ProfileFileError>(&err) {
            Some(ProfileFileError::MissingProfile { profile, .. }) => assert_eq!(profile, "nope"),
            other => panic!("incorrect result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn access_key_without_secret_is_rejected() {
        let err = profile_failure(provider("[default]\naws_access_key_id = a\n").build()).await;
        match error_source::<ProfileFileError>(&err) {
            Some(ProfileFileError::InvalidCredentialSource { profile, message }) => {
                assert_eq!(profile, "default");
                assert!(message.contains("aws_secret_access_key is missing"));
            }
            other => panic!("incorrect result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn declared_but_empty_session_token_is_rejected() {
        let err = profile_failure(
            provider(
                "[default]\naws_access_key_id = a\naws_secret_access_key = b\naws_session_token =\n",
            )
            .build(),
        )
        .await;
        let failure = error_source::<ProfileFileError>(&err).expect("profile error");
        assert!(failure
            .to_string()
            .contains("aws_session_token is declared but empty"));
    }

    #[tokio::test]
    async fn role_profile_uses_source_profile_keys() {
        let exchange = Arc::new(FakeTokenExchange::returning(sts_credentials(
            "ASIAROLE",
            Duration::from_secs(3600),
        )));
        let provider = provider(
            "[base]\naws_access_key_id = base_key\naws_secret_access_key = base_secret\n\n\
             [writer]\nrole_arn = arn:aws:iam::123456789012:role/writer\nsource_profile = base\nrole_session_name = writer-session\n",
        )
        .profile_name("writer")
        .exchange(exchange.clone())
        .build();
        let creds = provider.provide_credentials().await.expect("role creds");
        assert_eq!(creds.access_key_id(), "ASIAROLE");
        let requests = exchange.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].role_arn, "arn:aws:iam::123456789012:role/writer");
        assert_eq!(requests[0].session_name, "writer-session");
        assert_eq!(requests[0].base_access_key_id.as_deref(), Some("base_key"));
    }

    #[tokio::test]
    async fn self_referencing_source_profile_is_a_loop() {
        let err = profile_failure(
            provider("[loop]\nrole_arn = arn:aws:iam::123456789012:role/x\nsource_profile = loop\n")
                .profile_name("loop")
                .build(),
        )
        .await;
        assert!(matches!(
            error_source::<ProfileFileError>(&err),
            Some(ProfileFileError::CredentialLoop { .. })
        ));
    }

    #[tokio::test]
    async fn rejected_role_profile_names_the_role() {
        let provider = provider(
            "[base]\naws_access_key_id = k\naws_secret_access_key = s\n\n\
             [writer]\nrole_arn = arn:aws:iam::123456789012:role/writer\nsource_profile = base\n",
        )
        .profile_name("writer")
        .exchange(Arc::new(FakeTokenExchange::rejecting("AccessDenied")))
        .build();
        let err = provider.provide_credentials().await.expect_err("rejected");
        assert!(matches!(err, CredentialsError::ProviderError(_)), "{:?}", err);
        let failure = error_source::<AssumeRoleError>(&err).expect("role failure");
        assert_eq!(failure.role_arn(), "arn:aws:iam::123456789012:role/writer");
    }

    #[tokio::test]
    async fn release_drops_the_exchange() {
        let exchange = Arc::new(FakeTokenExchange::rejecting("unused"));
        let provider = provider("[default]\naws_access_key_id = a\naws_secret_access_key = b\n")
            .exchange(exchange.clone())
            .build();
        provider.provide_credentials().await.expect("valid creds");
        assert_eq!(Arc::strong_count(&exchange), 2);
        provider.release().expect("released");
        assert_eq!(Arc::strong_count(&exchange), 1);
        let err = provider.provide_credentials().await.expect_err("closed");
        assert!(error_source::<ProviderClosed>(&err).is_some(), "{:?}", err);
    }
}
