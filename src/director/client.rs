//! HTTP implementation of the `Director` trait.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, LOCATION};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, trace, warn};
use url::Url;

use super::models::{DeploymentSummary, DirectorInfo, InstanceInfo, Task};
use super::{http_client, parse_url, ClientError, Director};
use crate::auth::Credentials;

/// Interval between two polls of a running director task.
const TASK_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Director client over HTTPS.
pub struct HttpDirector {
    base: Url,
    http: reqwest::Client,
    credentials: Credentials,
    task_timeout: Duration,
}

impl std::fmt::Debug for HttpDirector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDirector")
            .field("base", &self.base.as_str())
            .field("credentials", &self.credentials.kind())
            .finish()
    }
}

impl HttpDirector {
    pub fn new(
        url: &str,
        ca_cert: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            base: parse_url(url)?,
            http: http_client(ca_cert, timeout)?,
            credentials,
            task_timeout: timeout,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base.join(path).map_err(|source| ClientError::Url {
            url: format!("{}{}", self.base, path),
            source,
        })
    }

    /// Sends an authenticated GET. A 401 on a token session invalidates the
    /// token and retries once with a renewed one.
    async fn get(&self, url: &Url) -> Result<Response, ClientError> {
        let mut retried = false;
        loop {
            let mut request = self.http.get(url.clone());
            let mut sent_token = None;

            match &self.credentials {
                Credentials::Anonymous => {}
                Credentials::Basic { client, secret } => {
                    request = request.basic_auth(client, Some(secret));
                }
                Credentials::Token(source) => {
                    let token = source.token().await?;
                    request = request.header(AUTHORIZATION, token.authorization());
                    sent_token = Some(token);
                }
            }

            trace!("GET {}", url);
            let response = request.send().await.map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;

            if response.status() == StatusCode::UNAUTHORIZED && !retried {
                if let (Credentials::Token(source), Some(token)) = (&self.credentials, sent_token)
                {
                    warn!("Director rejected access token for {}, renewing", url);
                    source.invalidate(&token);
                    retried = true;
                    continue;
                }
            }

            return Ok(response);
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path)?;
        let response = ensure_success(&url, self.get(&url).await?).await?;
        response.json::<T>().await.map_err(|e| ClientError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Resolves the task a long running request was redirected to.
    async fn start_task(&self, path: &str) -> Result<u64, ClientError> {
        let url = self.url(path)?;
        let response = self.get(&url).await?;

        if response.status().is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            return task_id_from_location(&location).ok_or_else(|| ClientError::Decode {
                url: url.to_string(),
                message: format!("unexpected task location `{}`", location),
            });
        }

        let response = ensure_success(&url, response).await?;
        let task: Task = response.json().await.map_err(|e| ClientError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(task.id)
    }

    async fn wait_for_task(&self, id: u64) -> Result<(), ClientError> {
        let deadline = Instant::now() + self.task_timeout;
        loop {
            let task: Task = self.get_json(&format!("/tasks/{}", id)).await?;
            if task.is_finished() {
                if task.is_successful() {
                    return Ok(());
                }
                return Err(ClientError::Task {
                    id,
                    state: task.state,
                });
            }
            if Instant::now() >= deadline {
                return Err(ClientError::TaskTimeout {
                    id,
                    timeout: self.task_timeout,
                });
            }
            tokio::time::sleep(TASK_POLL_INTERVAL).await;
        }
    }

    async fn task_result(&self, id: u64) -> Result<String, ClientError> {
        let url = self.url(&format!("/tasks/{}/output?type=result", id))?;
        let response = ensure_success(&url, self.get(&url).await?).await?;
        response.text().await.map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl Director for HttpDirector {
    #[instrument(skip(self))]
    async fn info(&self) -> Result<DirectorInfo, ClientError> {
        self.get_json("/info").await
    }

    #[instrument(skip(self))]
    async fn deployments(&self) -> Result<Vec<DeploymentSummary>, ClientError> {
        self.get_json("/deployments").await
    }

    #[instrument(skip(self))]
    async fn instance_infos(&self, deployment: &str) -> Result<Vec<InstanceInfo>, ClientError> {
        let id = self
            .start_task(&format!("/deployments/{}/instances?format=full", deployment))
            .await?;
        debug!("Waiting for director task {} ({})", id, deployment);
        self.wait_for_task(id).await?;
        let output = self.task_result(id).await?;
        parse_instance_lines(&output).map_err(|message| ClientError::Decode {
            url: format!("/tasks/{}/output", id),
            message,
        })
    }
}

async fn ensure_success(url: &Url, response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        body: body.chars().take(512).collect(),
    })
}

fn task_id_from_location(location: &str) -> Option<u64> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|id| id.parse().ok())
}

/// Task results are newline delimited JSON, one instance per line.
fn parse_instance_lines(output: &str) -> Result<Vec<InstanceInfo>, String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| serde_json::from_str::<InstanceInfo>(l).map_err(|e| e.to_string()))
        .collect()
}
