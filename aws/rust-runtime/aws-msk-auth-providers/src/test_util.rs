/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Scripted stand-ins for credential sources and network backends.

use crate::debug::{CallerIdentity, VerifyIdentity, VerifyIdentityError};
use crate::metadata::{MetadataRequest, MetadataResponse, MetadataTransport, Method};
use crate::sts::{AssumeRoleRequest, TokenExchange, WebIdentityRequest};
use aws_credential_types::provider::{error::CredentialsError, future, ProvideCredentials};
use aws_credential_types::Credentials;
use aws_msk_credential_types::error::{BoxError, ReleaseError};
use aws_msk_credential_types::provider::{CredentialSource, ReleaseResources};
use aws_smithy_async::future::BoxFuture;
use std::collections::HashMap;
use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The typed error carried behind a [`CredentialsError`]
pub(crate) fn error_source<E: Error + 'static>(err: &CredentialsError) -> Option<&E> {
    err.source().and_then(|source| source.downcast_ref::<E>())
}

#[derive(Debug, Clone)]
enum Outcome {
    Ok(Credentials),
    NotLoaded,
    Fail(&'static str),
}

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicUsize,
    refreshes: AtomicUsize,
    releases: AtomicUsize,
}

/// Provider with a fixed outcome that counts how often it is used
///
/// Clones share their counters, so a test can hand one clone to the code under test and keep
/// another to inspect.
#[derive(Debug, Clone)]
pub(crate) struct CountingProvider {
    outcome: Outcome,
    counters: Arc<Counters>,
    fail_release: bool,
}

impl CountingProvider {
    fn with(outcome: Outcome) -> Self {
        Self {
            outcome,
            counters: Default::default(),
            fail_release: false,
        }
    }

    pub(crate) fn ok(credentials: Credentials) -> Self {
        Self::with(Outcome::Ok(credentials))
    }

    pub(crate) fn not_loaded() -> Self {
        Self::with(Outcome::NotLoaded)
    }

    pub(crate) fn failing(message: &'static str) -> Self {
        Self::with(Outcome::Fail(message))
    }

    pub(crate) fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn refreshes(&self) -> usize {
        self.counters.refreshes.load(Ordering::SeqCst)
    }

    pub(crate) fn releases(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }
}

impl ProvideCredentials for CountingProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        future::ProvideCredentials::ready(match &self.outcome {
            Outcome::Ok(credentials) => Ok(credentials.clone()),
            Outcome::NotLoaded => Err(CredentialsError::not_loaded("not configured")),
            Outcome::Fail(message) => Err(CredentialsError::provider_error(*message)),
        })
    }
}

impl CredentialSource for CountingProvider {
    fn refresh(&self) {
        self.counters.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

impl ReleaseResources for CountingProvider {
    fn release(&self) -> Result<(), ReleaseError> {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
        if self.fail_release {
            Err(ReleaseError::new("CountingProvider", "socket already closed"))
        } else {
            Ok(())
        }
    }
}

pub(crate) fn sts_credentials(access_key_id: &str, expires_in: Duration) -> Credentials {
    Credentials::new(
        access_key_id,
        "SECRETKEYTEST",
        Some("SESSIONTOKEN_TEST".to_string()),
        Some(SystemTime::now() + expires_in),
        "FakeSts",
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedExchange {
    pub(crate) role_arn: String,
    pub(crate) session_name: String,
    pub(crate) web_identity_token: Option<String>,
    pub(crate) base_access_key_id: Option<String>,
}

/// Token exchange that answers every request with the same credentials (or error)
#[derive(Debug)]
pub(crate) struct FakeTokenExchange {
    region: String,
    response: Result<Credentials, &'static str>,
    delay: Option<Duration>,
    requests: Mutex<Vec<RecordedExchange>>,
}

impl FakeTokenExchange {
    fn with(response: Result<Credentials, &'static str>) -> Self {
        Self {
            region: "aws-global".into(),
            response,
            delay: None,
            requests: Mutex::new(vec![]),
        }
    }

    pub(crate) fn returning(credentials: Credentials) -> Self {
        Self::with(Ok(credentials))
    }

    pub(crate) fn rejecting(message: &'static str) -> Self {
        Self::with(Err(message))
    }

    /// Every exchange takes `delay` to answer, after the request has been recorded
    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn requests(&self) -> Vec<RecordedExchange> {
        self.requests.lock().unwrap().clone()
    }

    fn respond<'a>(&'a self, recorded: RecordedExchange) -> BoxFuture<'a, Credentials, BoxError> {
        self.requests.lock().unwrap().push(recorded);
        let result = self.response.clone().map_err(BoxError::from);
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }
}

impl TokenExchange for FakeTokenExchange {
    fn assume_role<'a>(
        &'a self,
        request: AssumeRoleRequest<'a>,
    ) -> BoxFuture<'a, Credentials, BoxError> {
        self.respond(RecordedExchange {
            role_arn: request.role_arn.to_string(),
            session_name: request.session_name.to_string(),
            web_identity_token: None,
            base_access_key_id: request
                .base_credentials
                .map(|creds| creds.access_key_id().to_string()),
        })
    }

    fn assume_role_with_web_identity<'a>(
        &'a self,
        request: WebIdentityRequest<'a>,
    ) -> BoxFuture<'a, Credentials, BoxError> {
        self.respond(RecordedExchange {
            role_arn: request.role_arn.to_string(),
            session_name: request.session_name.to_string(),
            web_identity_token: Some(request.web_identity_token.to_string()),
            base_access_key_id: None,
        })
    }

    fn region(&self) -> &str {
        &self.region
    }
}

/// Identity backend that records the region and access key of every call.
#[derive(Debug)]
pub(crate) struct FakeVerifier {
    fail: bool,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeVerifier {
    pub(crate) fn new() -> Self {
        Self {
            fail: false,
            calls: Mutex::new(vec![]),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(vec![]),
        }
    }

    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl VerifyIdentity for FakeVerifier {
    fn caller_identity<'a>(
        &'a self,
        region: &'a str,
        credentials: Credentials,
    ) -> BoxFuture<'a, CallerIdentity, VerifyIdentityError> {
        self.calls
            .lock()
            .unwrap()
            .push((region.to_string(), credentials.access_key_id().to_string()));
        let result = if self.fail {
            Err(VerifyIdentityError::new("ExpiredToken"))
        } else {
            Ok(CallerIdentity {
                user_id: Some("AIDATEST".into()),
                account: Some("123456789012".into()),
                arn: Some("arn:aws:iam::123456789012:user/msk-client".into()),
            })
        };
        Box::pin(async move { result })
    }
}

/// Metadata endpoint that serves canned responses keyed by method and URL.
#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    responses: HashMap<(Method, String), (u16, String)>,
    requests: Mutex<Vec<MetadataRequest>>,
}

impl FakeTransport {
    pub(crate) fn respond(
        mut self,
        method: Method,
        url: &str,
        status: u16,
        body: &str,
    ) -> Self {
        self.responses
            .insert((method, url.to_string()), (status, body.to_string()));
        self
    }

    pub(crate) fn requests(&self) -> Vec<MetadataRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl MetadataTransport for FakeTransport {
    fn send<'a>(&'a self, request: MetadataRequest) -> BoxFuture<'a, MetadataResponse, BoxError> {
        let key = (request.method, request.url.clone());
        self.requests.lock().unwrap().push(request);
        let result = match self.responses.get(&key) {
            Some((status, body)) => Ok(MetadataResponse {
                status: *status,
                body: body.clone(),
            }),
            None => Err(BoxError::from("connection refused")),
        };
        Box::pin(async move { result })
    }
}

/// Release capability that counts calls and optionally fails.
#[derive(Debug, Default)]
pub(crate) struct FakeResource {
    fail: AtomicBool,
    releases: AtomicUsize,
}

impl FakeResource {
    pub(crate) fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
            releases: AtomicUsize::new(0),
        }
    }

    pub(crate) fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl ReleaseResources for FakeResource {
    fn release(&self) -> Result<(), ReleaseError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            Err(ReleaseError::new("FakeResource", "connection reset"))
        } else {
            Ok(())
        }
    }
}

pub(crate) const FIXED_EXPIRATION: &str = "2021-08-16T20:52:53Z";

pub(crate) fn fixed_expiration() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1629147173)
}
