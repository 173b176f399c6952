//! UAA token endpoint client.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};
use url::Url;

use crate::director::{http_client, parse_url, ClientError};

/// Tokens are renewed this long before UAA considers them expired, capped at
/// half of the token lifetime.
const EXPIRY_SKEW: Duration = Duration::from_secs(30);

/// OAuth access token issued by UAA.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub token_type: String,
    pub refresh_token: Option<String>,
    /// Instant after which the token is renewed. `None` never expires.
    pub renew_at: Option<Instant>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("renew_at", &self.renew_at)
            .finish()
    }
}

impl AccessToken {
    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.value)
    }

    pub fn is_valid(&self) -> bool {
        match self.renew_at {
            Some(renew_at) => Instant::now() < renew_at,
            None => true,
        }
    }
}

fn renew_at(issued: Instant, lifetime: Duration) -> Instant {
    issued + lifetime - EXPIRY_SKEW.min(lifetime / 2)
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl From<TokenResponse> for AccessToken {
    fn from(r: TokenResponse) -> Self {
        Self {
            value: r.access_token,
            token_type: r.token_type,
            refresh_token: r.refresh_token,
            renew_at: r
                .expires_in
                .map(|s| renew_at(Instant::now(), Duration::from_secs(s))),
        }
    }
}

/// OAuth grants the exporter uses against UAA.
#[async_trait]
pub trait Uaa: Send + Sync {
    async fn client_credentials_grant(&self) -> Result<AccessToken, ClientError>;

    async fn password_grant(&self, username: &str, password: &str)
        -> Result<AccessToken, ClientError>;

    async fn refresh_token_grant(&self, refresh_token: &str) -> Result<AccessToken, ClientError>;
}

/// UAA client posting to `<url>/oauth/token` with client basic auth.
pub struct HttpUaa {
    token_url: Url,
    http: reqwest::Client,
    client: String,
    client_secret: String,
}

impl HttpUaa {
    pub fn new(
        url: &str,
        client: &str,
        client_secret: &str,
        ca_cert: &str,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let mut base = parse_url(url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let token_url = base.join("oauth/token").map_err(|source| ClientError::Url {
            url: url.to_string(),
            source,
        })?;
        Ok(Self {
            token_url,
            http: http_client(ca_cert, timeout)?,
            client: client.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<AccessToken, ClientError> {
        let url = self.token_url.to_string();
        let response = self
            .http
            .post(self.token_url.clone())
            .basic_auth(&self.client, Some(&self.client_secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                url,
                status: status.as_u16(),
                body: body.chars().take(512).collect(),
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| ClientError::Decode {
            url,
            message: e.to_string(),
        })?;
        Ok(token.into())
    }
}

#[async_trait]
impl Uaa for HttpUaa {
    #[instrument(skip(self), fields(client = %self.client))]
    async fn client_credentials_grant(&self) -> Result<AccessToken, ClientError> {
        debug!("Requesting UAA client credentials token");
        self.request_token(&[("grant_type", "client_credentials")])
            .await
    }

    #[instrument(skip(self, password), fields(client = %self.client))]
    async fn password_grant(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AccessToken, ClientError> {
        debug!("Requesting UAA password grant token");
        self.request_token(&[
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
        ])
        .await
    }

    #[instrument(skip(self, refresh_token), fields(client = %self.client))]
    async fn refresh_token_grant(&self, refresh_token: &str) -> Result<AccessToken, ClientError> {
        debug!("Refreshing UAA access token");
        self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }
}
