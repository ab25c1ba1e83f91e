//! Scripted in-memory peers for exercising the engine without a network.
//!
//! A script pairs each expected command with the raw reply bytes to send
//! back. The peers live on the far end of a `tokio::io::duplex` pipe, so
//! every layer from the framer to the pool runs its real code path.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::client::NntpClient;
use crate::config::ServerConfig;
use crate::error::NntpError;
use crate::pooled::Connector;
use crate::session::NntpSession;

pub type Script = Vec<(&'static str, &'static str)>;

/// Spawn a peer that greets with 200, then answers each scripted command
/// in order. Commands past the end of the script observe EOF.
///
/// # Panics
///
/// Panics when the peer receives a command that differs from the script.
pub async fn scripted_client(script: Script) -> NntpClient {
    let (client, server) = tokio::io::duplex(64 * 1024);
    tokio::spawn(async move {
        let mut server = BufReader::new(server);
        server
            .get_mut()
            .write_all(b"200 news.test ready\r\n")
            .await
            .unwrap();
        for (expected, reply) in script {
            let mut line = String::new();
            if server.read_line(&mut line).await.unwrap() == 0 {
                return;
            }
            assert_eq!(line.trim_end_matches(['\r', '\n']), expected);
            server
                .get_mut()
                .write_all(reply.as_bytes())
                .await
                .unwrap();
        }
    });
    let session = NntpSession::handshake(Box::new(client)).await.unwrap();
    NntpClient::from_session(session)
}

/// Hands out one scripted client per `connect` call, in order.
pub struct ScriptConnector {
    scripts: Mutex<VecDeque<Script>>,
}

impl ScriptConnector {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
        }
    }

    pub fn boxed(scripts: Vec<Script>) -> Box<Self> {
        Box::new(Self::new(scripts))
    }
}

#[async_trait]
impl Connector for ScriptConnector {
    async fn connect(&self, _config: &ServerConfig) -> Result<NntpClient, NntpError> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("connector exhausted");
        Ok(scripted_client(script).await)
    }
}

/// Refuses every connection attempt.
pub struct FailingConnector;

#[async_trait]
impl Connector for FailingConnector {
    async fn connect(&self, _config: &ServerConfig) -> Result<NntpClient, NntpError> {
        Err(NntpError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )))
    }
}
