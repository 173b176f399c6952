//! Director session establishment.
//!
//! The director is queried anonymously first. Depending on the advertised
//! authentication type the session uses static basic credentials, a UAA
//! client-credentials grant, or a UAA password grant whose refresh token
//! keeps the session alive.

pub mod token;
pub mod uaa;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::director::{ClientError, Director, DirectorInfo, HttpDirector};
use crate::error::Error;
pub use token::{TokenSession, TokenSource};
pub use uaa::{AccessToken, HttpUaa, Uaa};

/// Default public UAA client used for the password grant.
pub const DEFAULT_UAA_CLIENT: &str = "bosh_cli";

/// Credentials attached to director requests.
#[derive(Clone)]
pub enum Credentials {
    Anonymous,
    Basic { client: String, secret: String },
    Token(Arc<dyn TokenSource>),
}

impl Credentials {
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::Anonymous => "anonymous",
            Credentials::Basic { .. } => "basic",
            Credentials::Token(source) => source.grant(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { client, .. } => f
                .debug_struct("Basic")
                .field("client", client)
                .finish_non_exhaustive(),
            other => f.write_str(other.kind()),
        }
    }
}

/// How the session authenticates against the director.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Director is not UAA backed: static username/password.
    Basic,
    /// UAA client id and secret.
    ClientCredentials,
    /// UAA resource-owner password grant with the default public client.
    PasswordGrant,
}

/// Inputs of the credential exchange.
#[derive(Clone)]
pub struct AuthSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    pub uaa_client_id: String,
    pub uaa_client_secret: String,
    /// Client id used for the password grant when no UAA client is configured.
    pub default_uaa_client: String,
    /// PEM encoded CA bundle for both director and UAA.
    pub ca_cert: String,
    pub timeout: Duration,
}

impl AuthSettings {
    fn has_uaa_client(&self) -> bool {
        !self.uaa_client_id.is_empty() && !self.uaa_client_secret.is_empty()
    }
}

/// Builds director and UAA clients. Tests substitute in-memory clients.
pub trait ClientFactory: Send + Sync {
    fn director(&self, credentials: Credentials) -> Result<Arc<dyn Director>, ClientError>;

    fn uaa(&self, url: &str, client: &str, secret: &str) -> Result<Arc<dyn Uaa>, ClientError>;
}

/// Factory for the HTTP clients, sharing URL, CA bundle and timeout.
pub struct HttpClientFactory {
    url: String,
    ca_cert: String,
    timeout: Duration,
}

impl HttpClientFactory {
    pub fn new(settings: &AuthSettings) -> Self {
        Self {
            url: settings.url.clone(),
            ca_cert: settings.ca_cert.clone(),
            timeout: settings.timeout,
        }
    }
}

impl ClientFactory for HttpClientFactory {
    fn director(&self, credentials: Credentials) -> Result<Arc<dyn Director>, ClientError> {
        Ok(Arc::new(HttpDirector::new(
            &self.url,
            &self.ca_cert,
            credentials,
            self.timeout,
        )?))
    }

    fn uaa(&self, url: &str, client: &str, secret: &str) -> Result<Arc<dyn Uaa>, ClientError> {
        Ok(Arc::new(HttpUaa::new(
            url,
            client,
            secret,
            &self.ca_cert,
            self.timeout,
        )?))
    }
}

/// Authenticated director handle, created once at startup.
#[derive(Clone)]
pub struct Session {
    director: Arc<dyn Director>,
    info: DirectorInfo,
    mode: AuthMode,
}

impl Session {
    pub fn new(director: Arc<dyn Director>, info: DirectorInfo, mode: AuthMode) -> Self {
        Self {
            director,
            info,
            mode,
        }
    }

    pub fn director(&self) -> Arc<dyn Director> {
        Arc::clone(&self.director)
    }

    /// Director info as seen by the authenticated session.
    pub fn info(&self) -> &DirectorInfo {
        &self.info
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }
}

/// Negotiates credentials with the director and returns the session.
#[instrument(skip_all, fields(url = %settings.url))]
pub async fn resolve(settings: &AuthSettings, factory: &dyn ClientFactory) -> Result<Session, Error> {
    let anonymous = factory
        .director(Credentials::Anonymous)
        .map_err(|e| Error::auth("building anonymous director client", e))?;
    let advertised = anonymous
        .info()
        .await
        .map_err(|e| Error::auth("reading director info", e))?;

    let (credentials, mode) = if !advertised.auth.is_uaa() {
        debug!(
            "Director `{}` uses `{}` authentication, using static credentials",
            advertised.name, advertised.auth.kind
        );
        (
            Credentials::Basic {
                client: settings.username.clone(),
                secret: settings.password.clone(),
            },
            AuthMode::Basic,
        )
    } else {
        let uaa_url = match advertised.auth.options.get("url") {
            Some(serde_json::Value::String(url)) => url.clone(),
            other => {
                return Err(Error::Config(format!(
                    "expected UAA URL `{}` to be a string",
                    other.map(|v| v.to_string()).unwrap_or_else(|| "null".into())
                )))
            }
        };
        uaa_credentials(settings, factory, &uaa_url).await?
    };

    info!("Authenticating to director using {:?} mode", mode);
    let director = factory
        .director(credentials)
        .map_err(|e| Error::auth("building authenticated director client", e))?;
    let info = director
        .info()
        .await
        .map_err(|e| Error::auth("reading authenticated director info", e))?;

    Ok(Session::new(director, info, mode))
}

async fn uaa_credentials(
    settings: &AuthSettings,
    factory: &dyn ClientFactory,
    uaa_url: &str,
) -> Result<(Credentials, AuthMode), Error> {
    if settings.has_uaa_client() {
        debug!("Using UAA client credentials grant with client `{}`", settings.uaa_client_id);
        let uaa = factory
            .uaa(uaa_url, &settings.uaa_client_id, &settings.uaa_client_secret)
            .map_err(|e| Error::auth("building UAA client", e))?;
        let session = Arc::new(TokenSession::client_credentials(uaa));
        // Fail at startup rather than on the first scrape.
        session
            .token()
            .await
            .map_err(|e| Error::auth("requesting UAA client credentials token", e))?;
        return Ok((Credentials::Token(session), AuthMode::ClientCredentials));
    }

    let client = if settings.default_uaa_client.is_empty() {
        DEFAULT_UAA_CLIENT
    } else {
        settings.default_uaa_client.as_str()
    };
    debug!("Using UAA password grant with public client `{}`", client);
    let uaa = factory
        .uaa(uaa_url, client, "")
        .map_err(|e| Error::auth("building UAA client", e))?;
    let token = uaa
        .password_grant(&settings.username, &settings.password)
        .await
        .map_err(|e| Error::auth("requesting UAA password grant token", e))?;
    let refresh_token = token.refresh_token.clone().ok_or_else(|| {
        Error::Config(format!(
            "UAA client `{}` did not issue a refresh token for the password grant",
            client
        ))
    })?;
    let session = TokenSession::refresh_token(uaa, refresh_token, Some(token));
    Ok((Credentials::Token(Arc::new(session)), AuthMode::PasswordGrant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::director::{DeploymentSummary, InstanceInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StaticDirector {
        info: DirectorInfo,
        unreachable: bool,
    }

    fn refused(url: &str) -> ClientError {
        ClientError::Status {
            url: url.into(),
            status: 503,
            body: "service unavailable".into(),
        }
    }

    #[async_trait]
    impl Director for StaticDirector {
        async fn info(&self) -> Result<DirectorInfo, ClientError> {
            if self.unreachable {
                return Err(refused("https://director:25555/info"));
            }
            Ok(self.info.clone())
        }
        async fn deployments(&self) -> Result<Vec<DeploymentSummary>, ClientError> {
            Ok(vec![])
        }
        async fn instance_infos(&self, _: &str) -> Result<Vec<InstanceInfo>, ClientError> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct GrantLog {
        client_credentials: AtomicUsize,
        password: AtomicUsize,
    }

    struct LoggingUaa {
        log: Arc<GrantLog>,
        refresh_token: Option<String>,
        rejecting: bool,
    }

    #[async_trait]
    impl Uaa for LoggingUaa {
        async fn client_credentials_grant(&self) -> Result<AccessToken, ClientError> {
            self.log.client_credentials.fetch_add(1, Ordering::SeqCst);
            if self.rejecting {
                return Err(refused("https://uaa:8443/oauth/token"));
            }
            Ok(token("cc", None))
        }
        async fn password_grant(&self, _: &str, _: &str) -> Result<AccessToken, ClientError> {
            self.log.password.fetch_add(1, Ordering::SeqCst);
            if self.rejecting {
                return Err(refused("https://uaa:8443/oauth/token"));
            }
            Ok(token("pw", self.refresh_token.clone()))
        }
        async fn refresh_token_grant(&self, _: &str) -> Result<AccessToken, ClientError> {
            Ok(token("refreshed", None))
        }
    }

    fn token(value: &str, refresh: Option<String>) -> AccessToken {
        AccessToken {
            value: value.into(),
            token_type: "bearer".into(),
            refresh_token: refresh,
            renew_at: None,
        }
    }

    struct FakeFactory {
        info: DirectorInfo,
        director_unreachable: bool,
        uaa_rejecting: bool,
        grants: Arc<GrantLog>,
        uaa_clients: Mutex<Vec<(String, String, String)>>,
        credentials: Mutex<Vec<String>>,
    }

    impl FakeFactory {
        fn new(info: DirectorInfo) -> Self {
            Self {
                info,
                director_unreachable: false,
                uaa_rejecting: false,
                grants: Arc::new(GrantLog::default()),
                uaa_clients: Mutex::new(vec![]),
                credentials: Mutex::new(vec![]),
            }
        }
    }

    impl ClientFactory for FakeFactory {
        fn director(&self, credentials: Credentials) -> Result<Arc<dyn Director>, ClientError> {
            self.credentials.lock().unwrap().push(credentials.kind().to_string());
            Ok(Arc::new(StaticDirector {
                info: self.info.clone(),
                unreachable: self.director_unreachable,
            }))
        }

        fn uaa(&self, url: &str, client: &str, secret: &str) -> Result<Arc<dyn Uaa>, ClientError> {
            self.uaa_clients
                .lock()
                .unwrap()
                .push((url.into(), client.into(), secret.into()));
            Ok(Arc::new(LoggingUaa {
                log: Arc::clone(&self.grants),
                refresh_token: Some("refresh".into()),
                rejecting: self.uaa_rejecting,
            }))
        }
    }

    fn info(kind: &str, options: serde_json::Value) -> DirectorInfo {
        serde_json::from_value(serde_json::json!({
            "name": "bosh", "uuid": "uuid-1",
            "user_authentication": {"type": kind, "options": options}
        }))
        .unwrap()
    }

    fn settings(client_id: &str, client_secret: &str) -> AuthSettings {
        AuthSettings {
            url: "https://director:25555".into(),
            username: "admin".into(),
            password: "admin-password".into(),
            uaa_client_id: client_id.into(),
            uaa_client_secret: client_secret.into(),
            default_uaa_client: DEFAULT_UAA_CLIENT.into(),
            ca_cert: String::new(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_basic_mode_never_contacts_uaa() {
        let factory = FakeFactory::new(info("basic", serde_json::json!({})));
        let session = resolve(&settings("client", "secret"), &factory).await.unwrap();

        assert_eq!(session.mode(), AuthMode::Basic);
        assert!(factory.uaa_clients.lock().unwrap().is_empty());
        assert_eq!(
            *factory.credentials.lock().unwrap(),
            vec!["anonymous".to_string(), "basic".to_string()]
        );
    }

    #[tokio::test]
    async fn test_uaa_with_client_uses_client_credentials_only() {
        let factory = FakeFactory::new(info("uaa", serde_json::json!({"url": "https://uaa:8443"})));
        let session = resolve(&settings("exporter", "s3cret"), &factory).await.unwrap();

        assert_eq!(session.mode(), AuthMode::ClientCredentials);
        assert_eq!(factory.grants.client_credentials.load(Ordering::SeqCst), 1);
        assert_eq!(factory.grants.password.load(Ordering::SeqCst), 0);
        assert_eq!(
            factory.uaa_clients.lock().unwrap()[0],
            ("https://uaa:8443".into(), "exporter".into(), "s3cret".into())
        );
    }

    #[tokio::test]
    async fn test_uaa_without_client_uses_password_grant_with_default_client() {
        let factory = FakeFactory::new(info("uaa", serde_json::json!({"url": "https://uaa:8443"})));
        let session = resolve(&settings("", ""), &factory).await.unwrap();

        assert_eq!(session.mode(), AuthMode::PasswordGrant);
        assert_eq!(factory.grants.password.load(Ordering::SeqCst), 1);
        assert_eq!(factory.grants.client_credentials.load(Ordering::SeqCst), 0);
        let clients = factory.uaa_clients.lock().unwrap();
        assert_eq!(clients[0].1, "bosh_cli");
        assert_eq!(clients[0].2, "");
    }

    #[tokio::test]
    async fn test_client_id_without_secret_falls_back_to_password_grant() {
        let factory = FakeFactory::new(info("uaa", serde_json::json!({"url": "https://uaa:8443"})));
        let session = resolve(&settings("exporter", ""), &factory).await.unwrap();
        assert_eq!(session.mode(), AuthMode::PasswordGrant);
    }

    #[tokio::test]
    async fn test_configured_default_client_is_used() {
        let factory = FakeFactory::new(info("uaa", serde_json::json!({"url": "https://uaa:8443"})));
        let mut settings = settings("", "");
        settings.default_uaa_client = "my_cli".into();
        resolve(&settings, &factory).await.unwrap();
        assert_eq!(factory.uaa_clients.lock().unwrap()[0].1, "my_cli");
    }

    #[tokio::test]
    async fn test_non_string_uaa_url_is_config_error() {
        let factory = FakeFactory::new(info("uaa", serde_json::json!({"url": 42})));
        let err = resolve(&settings("", ""), &factory).await.err().unwrap();
        assert!(matches!(err, Error::Config(_)));

        let factory = FakeFactory::new(info("uaa", serde_json::json!({})));
        let err = resolve(&settings("", ""), &factory).await.err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_unreachable_director_is_auth_error() {
        let mut factory = FakeFactory::new(info("basic", serde_json::json!({})));
        factory.director_unreachable = true;
        let err = resolve(&settings("", ""), &factory).await.err().unwrap();

        assert!(matches!(err, Error::Auth { .. }), "{}", err);
        assert!(factory.uaa_clients.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_password_grant_is_auth_error() {
        let mut factory =
            FakeFactory::new(info("uaa", serde_json::json!({"url": "https://uaa:8443"})));
        factory.uaa_rejecting = true;
        let err = resolve(&settings("", ""), &factory).await.err().unwrap();

        assert!(matches!(err, Error::Auth { .. }), "{}", err);
        assert_eq!(factory.grants.password.load(Ordering::SeqCst), 1);
        // No authenticated director client is built.
        assert_eq!(*factory.credentials.lock().unwrap(), vec!["anonymous".to_string()]);
    }

    #[tokio::test]
    async fn test_rejected_client_credentials_is_auth_error() {
        let mut factory =
            FakeFactory::new(info("uaa", serde_json::json!({"url": "https://uaa:8443"})));
        factory.uaa_rejecting = true;
        let err = resolve(&settings("exporter", "s3cret"), &factory)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::Auth { .. }), "{}", err);
        assert_eq!(factory.grants.client_credentials.load(Ordering::SeqCst), 1);
        assert_eq!(factory.grants.password.load(Ordering::SeqCst), 0);
    }
}
