//! Authenticated HTTP client for the camera.
//!
//! This module provides the `HttpClient` struct which answers Digest (or
//! Basic) challenges, streams GET bodies, and looks up remote sizes via HEAD.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, HeaderMap, WWW_AUTHENTICATE};
use reqwest::{Client, Method, Response, StatusCode};
use tracing::{debug, instrument};
use url::{Position, Url};

use super::constants::USER_AGENT;
use super::error::DownloadError;
use super::skip::RemoteSizeLookup;
use super::transport::{RemoteBody, Transport};
use crate::auth::{Challenge, Credentials, DigestChallenge, generate_cnonce, select_challenge};

/// HTTP client with challenge/response authentication.
///
/// Clones share the connection pool and the cached challenge, so a nonce
/// obtained while fetching the listing is reused for the archive downloads.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use timelapse_dl_core::auth::Credentials;
/// use timelapse_dl_core::download::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new(Duration::from_secs(60))?
///     .with_credentials(Credentials::new("admin", "secret"));
/// let response = client.get("http://192.168.0.90/local/timelapseme/archives").await?;
/// println!("status: {}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    credentials: Option<Credentials>,
    auth: Arc<Mutex<AuthState>>,
}

/// Last challenge the server issued.
#[derive(Debug, Default)]
enum AuthState {
    #[default]
    Unknown,
    Basic,
    Digest {
        challenge: DigestChallenge,
        nonce_count: u32,
    },
}

/// Credentials to attach to one request.
#[derive(Debug)]
enum Authorization {
    None,
    Basic,
    Header(String),
}

impl HttpClient {
    /// Creates a client whose connect and per-read timeouts are `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            credentials: None,
            auth: Arc::new(Mutex::new(AuthState::Unknown)),
        })
    }

    /// Sets the credentials used to answer authentication challenges.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sends an authenticated request and returns the response whatever its
    /// status.
    ///
    /// A cached challenge is answered pre-emptively. On a `401` carrying a
    /// usable challenge the request is re-sent once with a fresh answer.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] for unparseable URLs and
    /// [`DownloadError::Network`]/[`DownloadError::Timeout`] for transport
    /// failures.
    #[instrument(skip(self), fields(method = %method))]
    pub async fn send(&self, method: Method, url: &str) -> Result<Response, DownloadError> {
        let target = request_target(url)?;
        let Some(credentials) = &self.credentials else {
            return self.execute(method, url, Authorization::None).await;
        };

        let preemptive = self.authorization(credentials, &method, &target);
        let was_preemptive = !matches!(preemptive, Authorization::None);
        let response = self.execute(method.clone(), url, preemptive).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(challenge) = challenge_from(response.headers()) else {
            debug!("401 without a usable challenge");
            return Ok(response);
        };
        if was_preemptive {
            let stale = matches!(&challenge, Challenge::Digest(d) if d.stale);
            debug!(stale, "cached credentials rejected, answering fresh challenge");
        }
        self.remember(challenge);

        let answer = self.authorization(credentials, &method, &target);
        self.execute(method, url, answer).await
    }

    /// Sends an authenticated GET and fails on any non-2xx status.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send), plus [`DownloadError::HttpStatus`] /
    /// [`DownloadError::AuthRequired`] for unsuccessful statuses.
    pub async fn get(&self, url: &str) -> Result<Response, DownloadError> {
        let response = self.send(Method::GET, url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }

    /// Returns the `Content-Length` of a HEAD response, or `None` on any
    /// failure.
    #[instrument(skip(self))]
    pub async fn head_content_length(&self, url: &str) -> Option<u64> {
        match self.send(Method::HEAD, url).await {
            Ok(response) if response.status().is_success() => content_length(response.headers()),
            Ok(response) => {
                debug!(status = response.status().as_u16(), "HEAD rejected");
                None
            }
            Err(e) => {
                debug!(error = %e, "HEAD failed");
                None
            }
        }
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        authorization: Authorization,
    ) -> Result<Response, DownloadError> {
        let mut request = self.client.request(method, url);
        match (authorization, &self.credentials) {
            (Authorization::Header(value), _) => request = request.header(AUTHORIZATION, value),
            (Authorization::Basic, Some(credentials)) => {
                request = request.basic_auth(credentials.username(), Some(credentials.password()));
            }
            (Authorization::Basic | Authorization::None, _) => {}
        }
        request
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))
    }

    fn authorization(&self, credentials: &Credentials, method: &Method, target: &str) -> Authorization {
        let mut state = self.auth.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *state {
            AuthState::Unknown => Authorization::None,
            AuthState::Basic => Authorization::Basic,
            AuthState::Digest {
                challenge,
                nonce_count,
            } => {
                *nonce_count += 1;
                Authorization::Header(challenge.authorization(
                    credentials,
                    method.as_str(),
                    target,
                    *nonce_count,
                    &generate_cnonce(),
                ))
            }
        }
    }

    fn remember(&self, challenge: Challenge) {
        let mut state = self.auth.lock().unwrap_or_else(PoisonError::into_inner);
        *state = match challenge {
            Challenge::Basic => AuthState::Basic,
            Challenge::Digest(challenge) => AuthState::Digest {
                challenge,
                nonce_count: 0,
            },
        };
    }
}

#[async_trait]
impl RemoteSizeLookup for HttpClient {
    async fn remote_size(&self, url: &str) -> Option<u64> {
        self.head_content_length(url).await
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn get(&self, url: &str) -> Result<RemoteBody, DownloadError> {
        let response = HttpClient::get(self, url).await?;
        let content_length = content_length(response.headers());
        let owned_url = url.to_string();
        let chunks = response
            .bytes_stream()
            .map_err(move |e| DownloadError::network(owned_url.clone(), e))
            .boxed();
        Ok(RemoteBody {
            content_length,
            chunks,
        })
    }
}

/// Path and query of `url`, as used in the digest `uri` parameter.
fn request_target(url: &str) -> Result<String, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(DownloadError::invalid_url(url));
    }
    Ok(parsed[Position::BeforePath..Position::AfterQuery].to_string())
}

fn challenge_from(headers: &HeaderMap) -> Option<Challenge> {
    select_challenge(
        headers
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok()),
    )
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}
