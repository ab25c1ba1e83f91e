//! Pool-managed client wrapper: lifecycle flags around an [`NntpClient`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::client::NntpClient;
use crate::config::ServerConfig;
use crate::error::NntpError;
use crate::response::{MultiLineResponse, Response};

/// Seam between the pool and the network, so tests can hand out scripted
/// in-memory clients.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ServerConfig) -> Result<NntpClient, NntpError>;
}

/// The real thing: TCP (optionally TLS) per the server config.
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, config: &ServerConfig) -> Result<NntpClient, NntpError> {
        NntpClient::connect(config).await
    }
}

/// A client decorated with the bookkeeping the pool needs: connection and
/// authentication state, a sticky error flag, and an idle clock.
///
/// The error flag is one-way. Any failure inside a delegated protocol call
/// sets it, because after an I/O or framing error the half-duplex stream
/// position can no longer be trusted; the pool disposes flagged wrappers
/// instead of re-queueing them.
pub struct PooledClient {
    id: u64,
    config: Arc<ServerConfig>,
    client: Option<NntpClient>,
    authenticated: bool,
    errored: bool,
    disposed: bool,
    last_activity: Instant,
}

impl PooledClient {
    pub fn new(id: u64, config: Arc<ServerConfig>) -> Self {
        Self {
            id,
            config,
            client: None,
            authenticated: false,
            errored: false,
            disposed: false,
            last_activity: Instant::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn is_errored(&self) -> bool {
        self.errored
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Reset the idle clock, e.g. when the pool takes the wrapper back.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Ensure the wrapper is connected and, when credentials are
    /// configured, authenticated. Idempotent; called by the pool before
    /// handing out a lease.
    ///
    /// Connect failures do not set the error flag: nothing was ever
    /// established, so the wrapper stays reusable for a later attempt.
    pub async fn prepare(&mut self, connector: &dyn Connector) -> Result<(), NntpError> {
        if self.disposed {
            return Err(NntpError::ClientDisposed);
        }
        if self.client.is_none() {
            let client = connector.connect(&self.config).await?;
            self.client = Some(client);
            self.last_activity = Instant::now();
        }
        if self.config.username.is_some() && !self.authenticated {
            if !self.authenticate().await? {
                return Err(NntpError::AuthFailed(
                    "server requires a password but none is configured".into(),
                ));
            }
        }
        Ok(())
    }

    /// Run the AUTHINFO exchange with the configured credentials.
    ///
    /// 281 after USER short-circuits; 381 asks for the password, which is
    /// sent only if configured (`Ok(false)` otherwise). I/O failures here
    /// poison the wrapper like any other delegated call.
    pub async fn authenticate(&mut self) -> Result<bool, NntpError> {
        let username = self
            .config
            .username
            .clone()
            .ok_or_else(|| NntpError::AuthFailed("no username configured".into()))?;
        let password = self.config.password.clone();

        let result = self.client_mut()?.authinfo_user(&username).await;
        let first = self.after_call(result)?;
        match first.code {
            281 => {
                self.authenticated = true;
                return Ok(true);
            }
            381 => {}
            code => return Err(NntpError::AuthFailed(format!("{code} {}", first.message))),
        }

        let Some(password) = password else {
            return Ok(false);
        };
        let result = self.client_mut()?.authinfo_pass(&password).await;
        let second = self.after_call(result)?;
        if second.success {
            self.authenticated = true;
            Ok(true)
        } else {
            Err(NntpError::AuthFailed(format!(
                "{} {}",
                second.code, second.message
            )))
        }
    }

    pub async fn group(&mut self, name: &str) -> Result<Response, NntpError> {
        let result = match self.client_mut() {
            Ok(c) => c.group(name).await,
            Err(e) => return Err(e),
        };
        self.after_call(result)
    }

    pub async fn stat(&mut self, message_id: &str) -> Result<Response, NntpError> {
        let result = match self.client_mut() {
            Ok(c) => c.stat(message_id).await,
            Err(e) => return Err(e),
        };
        self.after_call(result)
    }

    pub async fn head(&mut self, message_id: &str) -> Result<MultiLineResponse, NntpError> {
        let result = match self.client_mut() {
            Ok(c) => c.head(message_id).await,
            Err(e) => return Err(e),
        };
        self.after_call(result)
    }

    pub async fn body(&mut self, message_id: &str) -> Result<MultiLineResponse, NntpError> {
        let result = match self.client_mut() {
            Ok(c) => c.body(message_id).await,
            Err(e) => return Err(e),
        };
        self.after_call(result)
    }

    pub async fn article(&mut self, message_id: &str) -> Result<MultiLineResponse, NntpError> {
        let result = match self.client_mut() {
            Ok(c) => c.article(message_id).await,
            Err(e) => return Err(e),
        };
        self.after_call(result)
    }

    pub async fn date(&mut self) -> Result<Response, NntpError> {
        let result = match self.client_mut() {
            Ok(c) => c.date().await,
            Err(e) => return Err(e),
        };
        self.after_call(result)
    }

    pub async fn list(&mut self) -> Result<MultiLineResponse, NntpError> {
        let result = match self.client_mut() {
            Ok(c) => c.list().await,
            Err(e) => return Err(e),
        };
        self.after_call(result)
    }

    pub async fn post(&mut self, lines: &[&str]) -> Result<Response, NntpError> {
        let result = match self.client_mut() {
            Ok(c) => c.post(lines).await,
            Err(e) => return Err(e),
        };
        self.after_call(result)
    }

    /// Tear the connection down. Idempotent. A healthy session gets a
    /// best-effort QUIT; an errored one is dropped cold since its stream
    /// position is unknown.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.authenticated = false;
        if let Some(client) = self.client.take() {
            if self.errored {
                client.close().await;
            } else if let Err(e) = client.quit().await {
                debug!(id = self.id, error = %e, "QUIT during dispose failed");
            }
        }
    }

    fn client_mut(&mut self) -> Result<&mut NntpClient, NntpError> {
        if self.disposed {
            return Err(NntpError::ClientDisposed);
        }
        self.client.as_mut().ok_or(NntpError::NotConnected)
    }

    fn after_call<T>(&mut self, result: Result<T, NntpError>) -> Result<T, NntpError> {
        match result {
            Ok(value) => {
                self.last_activity = Instant::now();
                Ok(value)
            }
            Err(e) => {
                self.errored = true;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingConnector, ScriptConnector};

    fn anon_config() -> Arc<ServerConfig> {
        Arc::new(ServerConfig::new("news.example", 119, false))
    }

    fn auth_config(password: Option<&str>) -> Arc<ServerConfig> {
        Arc::new(
            ServerConfig::new("news.example", 119, false)
                .with_credentials("alice", password.map(str::to_string)),
        )
    }

    #[tokio::test]
    async fn prepare_connects_once() {
        let connector = ScriptConnector::new(vec![vec![("DATE", "111 20260825\r\n")]]);
        let mut pooled = PooledClient::new(1, anon_config());
        assert!(!pooled.is_connected());
        pooled.prepare(&connector).await.unwrap();
        assert!(pooled.is_connected());
        // second prepare must not ask the connector for another client
        pooled.prepare(&connector).await.unwrap();
        assert!(pooled.date().await.unwrap().success);
    }

    #[tokio::test]
    async fn connect_failure_does_not_poison() {
        let mut pooled = PooledClient::new(1, anon_config());
        let err = pooled.prepare(&FailingConnector).await.unwrap_err();
        assert!(matches!(err, NntpError::Io(_)));
        assert!(!pooled.is_errored());
        assert!(!pooled.is_connected());
    }

    #[tokio::test]
    async fn auth_281_after_user_short_circuits() {
        let connector = ScriptConnector::new(vec![vec![(
            "AUTHINFO USER alice",
            "281 welcome\r\n",
        )]]);
        let mut pooled = PooledClient::new(1, auth_config(Some("hunter2")));
        pooled.prepare(&connector).await.unwrap();
        assert!(pooled.is_authenticated());
    }

    #[tokio::test]
    async fn auth_381_sends_password() {
        let connector = ScriptConnector::new(vec![vec![
            ("AUTHINFO USER alice", "381 password required\r\n"),
            ("AUTHINFO PASS hunter2", "281 welcome\r\n"),
        ]]);
        let mut pooled = PooledClient::new(1, auth_config(Some("hunter2")));
        pooled.prepare(&connector).await.unwrap();
        assert!(pooled.is_authenticated());
    }

    #[tokio::test]
    async fn auth_381_without_password_fails_cleanly() {
        let connector = ScriptConnector::new(vec![vec![(
            "AUTHINFO USER alice",
            "381 password required\r\n",
        )]]);
        let mut pooled = PooledClient::new(1, auth_config(None));
        let err = pooled.prepare(&connector).await.unwrap_err();
        assert!(matches!(err, NntpError::AuthFailed(_)));
        assert!(!pooled.is_authenticated());
        assert!(!pooled.is_errored());
    }

    #[tokio::test]
    async fn rejected_credentials_fail() {
        let connector = ScriptConnector::new(vec![vec![
            ("AUTHINFO USER alice", "381 password required\r\n"),
            ("AUTHINFO PASS wrong", "481 authentication rejected\r\n"),
        ]]);
        let mut pooled = PooledClient::new(1, auth_config(Some("wrong")));
        let err = pooled.prepare(&connector).await.unwrap_err();
        assert!(matches!(err, NntpError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn delegated_failure_sets_sticky_flag() {
        // server hangs up after the greeting, so the first command dies
        let connector = ScriptConnector::new(vec![vec![]]);
        let mut pooled = PooledClient::new(1, anon_config());
        pooled.prepare(&connector).await.unwrap();
        assert!(pooled.date().await.is_err());
        assert!(pooled.is_errored());
    }

    #[tokio::test]
    async fn protocol_failure_codes_do_not_poison() {
        let connector = ScriptConnector::new(vec![vec![(
            "BODY <gone@example>",
            "430 no such article\r\n",
        )]]);
        let mut pooled = PooledClient::new(1, anon_config());
        pooled.prepare(&connector).await.unwrap();
        let reply = pooled.body("<gone@example>").await.unwrap();
        assert!(!reply.response.success);
        assert!(!pooled.is_errored());
    }

    #[tokio::test]
    async fn dispose_quits_and_is_idempotent() {
        let connector = ScriptConnector::new(vec![vec![("QUIT", "205 bye\r\n")]]);
        let mut pooled = PooledClient::new(1, anon_config());
        pooled.prepare(&connector).await.unwrap();
        pooled.dispose().await;
        assert!(pooled.is_disposed());
        pooled.dispose().await;
        assert!(matches!(
            pooled.date().await.unwrap_err(),
            NntpError::ClientDisposed
        ));
    }

    #[tokio::test]
    async fn unconnected_calls_report_not_connected() {
        let mut pooled = PooledClient::new(1, anon_config());
        assert!(matches!(
            pooled.date().await.unwrap_err(),
            NntpError::NotConnected
        ));
        assert!(!pooled.is_errored());
    }
}
