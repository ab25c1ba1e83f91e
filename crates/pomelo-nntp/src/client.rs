//! Command verbs over a session.
//!
//! Each verb pairs its wire form with its success-code table and calls one
//! of the three session primitives. Failure codes come back as unsuccessful
//! [`Response`]s; callers decide what is fatal.

use crate::config::ServerConfig;
use crate::error::NntpError;
use crate::response::{MultiLineResponse, Response, ResponseClassifier};
use crate::session::NntpSession;

const GROUP: ResponseClassifier = ResponseClassifier::new(&[211]);
const STAT: ResponseClassifier = ResponseClassifier::new(&[223]);
const HEAD: ResponseClassifier = ResponseClassifier::new(&[221]);
const BODY: ResponseClassifier = ResponseClassifier::new(&[222]);
const ARTICLE: ResponseClassifier = ResponseClassifier::new(&[220]);
const DATE: ResponseClassifier = ResponseClassifier::new(&[111]);
const HELP: ResponseClassifier = ResponseClassifier::new(&[100]);
const LIST: ResponseClassifier = ResponseClassifier::new(&[215]);
const POST_INITIAL: ResponseClassifier = ResponseClassifier::new(&[340]);
const POST_FINAL: ResponseClassifier = ResponseClassifier::new(&[240]);
const AUTH_USER: ResponseClassifier = ResponseClassifier::new(&[281, 381]);
const AUTH_PASS: ResponseClassifier = ResponseClassifier::new(&[281]);
const QUIT: ResponseClassifier = ResponseClassifier::new(&[205]);

pub struct NntpClient {
    session: NntpSession,
}

impl NntpClient {
    pub async fn connect(config: &ServerConfig) -> Result<Self, NntpError> {
        Ok(Self {
            session: NntpSession::connect(config).await?,
        })
    }

    pub fn from_session(session: NntpSession) -> Self {
        Self { session }
    }

    pub fn posting_allowed(&self) -> bool {
        self.session.posting_allowed()
    }

    pub fn bytes_read(&self) -> u64 {
        self.session.bytes_read()
    }

    pub fn bytes_written(&self) -> u64 {
        self.session.bytes_written()
    }

    /// Select a newsgroup. 211 carries `count low high group`.
    pub async fn group(&mut self, name: &str) -> Result<Response, NntpError> {
        self.session
            .send_command(&format!("GROUP {name}"), &GROUP)
            .await
    }

    /// Check that an article exists without transferring it.
    pub async fn stat(&mut self, message_id: &str) -> Result<Response, NntpError> {
        self.session
            .send_command(&format!("STAT {}", bracketed(message_id)), &STAT)
            .await
    }

    pub async fn head(&mut self, message_id: &str) -> Result<MultiLineResponse, NntpError> {
        self.session
            .send_multiline_command(&format!("HEAD {}", bracketed(message_id)), &HEAD)
            .await
    }

    pub async fn body(&mut self, message_id: &str) -> Result<MultiLineResponse, NntpError> {
        self.session
            .send_multiline_command(&format!("BODY {}", bracketed(message_id)), &BODY)
            .await
    }

    pub async fn article(&mut self, message_id: &str) -> Result<MultiLineResponse, NntpError> {
        self.session
            .send_multiline_command(&format!("ARTICLE {}", bracketed(message_id)), &ARTICLE)
            .await
    }

    /// Server clock, as `111 yyyymmddhhmmss`.
    pub async fn date(&mut self) -> Result<Response, NntpError> {
        self.session.send_command("DATE", &DATE).await
    }

    pub async fn help(&mut self) -> Result<MultiLineResponse, NntpError> {
        self.session.send_multiline_command("HELP", &HELP).await
    }

    /// Newsgroup list, one `group high low status` line per group.
    pub async fn list(&mut self) -> Result<MultiLineResponse, NntpError> {
        self.session.send_multiline_command("LIST", &LIST).await
    }

    /// Post an article.
    ///
    /// The two-step exchange: POST is answered with 340 (or a refusal,
    /// returned as-is); the article lines are then streamed dot-stuffed and
    /// the terminating dot is answered with 240.
    pub async fn post(&mut self, lines: &[&str]) -> Result<Response, NntpError> {
        let invite = self.session.send_command("POST", &POST_INITIAL).await?;
        if !invite.success {
            return Ok(invite);
        }
        for line in lines {
            if line.starts_with('.') {
                self.session.write_line(&format!(".{line}")).await?;
            } else {
                self.session.write_line(line).await?;
            }
        }
        self.session.send_command(".", &POST_FINAL).await
    }

    /// First half of the AUTHINFO exchange. 281 means done, 381 means a
    /// password is required.
    pub async fn authinfo_user(&mut self, username: &str) -> Result<Response, NntpError> {
        self.session
            .send_command(&format!("AUTHINFO USER {username}"), &AUTH_USER)
            .await
    }

    /// Second half; only valid after a 381.
    pub async fn authinfo_pass(&mut self, password: &str) -> Result<Response, NntpError> {
        self.session
            .send_command(&format!("AUTHINFO PASS {password}"), &AUTH_PASS)
            .await
    }

    /// Say goodbye and tear the session down.
    pub async fn quit(mut self) -> Result<Response, NntpError> {
        let response = self.session.send_command("QUIT", &QUIT).await;
        self.session.close().await;
        response
    }

    /// Tear the session down without the QUIT exchange.
    pub async fn close(self) {
        self.session.close().await;
    }
}

/// Message-ids go on the wire wrapped in angle brackets; accept either form.
fn bracketed(message_id: &str) -> String {
    if message_id.starts_with('<') {
        message_id.to_string()
    } else {
        format!("<{message_id}>")
    }
}
