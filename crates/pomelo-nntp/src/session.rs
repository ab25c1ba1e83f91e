//! The protocol session: one transport, strict half-duplex command/response.

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::NntpError;
use crate::framer::LineFramer;
use crate::response::{MultiLineResponse, Response, ResponseClassifier, parse_status_line};
use crate::transport::{self, NntpIo};

const GREETING_CODES: [u16; 2] = [200, 201];

/// A connected NNTP session.
///
/// Construction performs the greeting exchange, so a value of this type is
/// always connected; `close` consumes it. Exactly one command is in flight
/// at a time and its response is read before the next command is written,
/// so the n-th response always belongs to the n-th command.
pub struct NntpSession {
    framer: LineFramer<Box<dyn NntpIo>>,
    greeting: Response,
    bytes_written: u64,
}

impl std::fmt::Debug for NntpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NntpSession")
            .field("greeting", &self.greeting)
            .field("bytes_written", &self.bytes_written)
            .finish_non_exhaustive()
    }
}

impl NntpSession {
    /// Connect to the configured server and read the greeting.
    pub async fn connect(config: &ServerConfig) -> Result<Self, NntpError> {
        let stream = transport::open(config).await?;
        let session = Self::handshake(stream).await?;
        debug!(
            host = %config.host,
            port = config.port,
            tls = config.use_tls,
            greeting = session.greeting.code,
            "session established"
        );
        Ok(session)
    }

    /// Perform the greeting exchange over an already-open transport.
    ///
    /// 200 (posting allowed) and 201 (posting prohibited) are the only
    /// acceptable greetings.
    pub async fn handshake(stream: Box<dyn NntpIo>) -> Result<Self, NntpError> {
        let mut framer = LineFramer::new(stream);
        let line = match framer.read_line().await? {
            Some(line) => line,
            None => {
                return Err(NntpError::FramingViolation(
                    "connection closed before greeting".into(),
                ));
            }
        };
        let (code, message) = parse_status_line(&line)?;
        if !GREETING_CODES.contains(&code) {
            return Err(NntpError::UnexpectedResponse(code, message));
        }
        Ok(Self {
            framer,
            greeting: Response {
                code,
                message,
                success: true,
            },
            bytes_written: 0,
        })
    }

    pub fn greeting(&self) -> &Response {
        &self.greeting
    }

    /// Whether the server's greeting advertised posting (code 200).
    pub fn posting_allowed(&self) -> bool {
        self.greeting.code == 200
    }

    pub fn bytes_read(&self) -> u64 {
        self.framer.bytes_read()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Send one command and classify its single status line.
    pub async fn send_command(
        &mut self,
        command: &str,
        classifier: &ResponseClassifier,
    ) -> Result<Response, NntpError> {
        self.write_line(command).await?;
        let (code, message) = self.read_status().await?;
        Ok(classifier.classify(code, message))
    }

    /// Send one command whose success responses carry a data block.
    ///
    /// On a success code the block is read to its terminator before this
    /// returns, so the transport is always positioned at a command boundary
    /// afterwards. Failure codes carry no block; an empty one is
    /// synthesized.
    pub async fn send_multiline_command(
        &mut self,
        command: &str,
        classifier: &ResponseClassifier,
    ) -> Result<MultiLineResponse, NntpError> {
        self.write_line(command).await?;
        let (code, message) = self.read_status().await?;
        let response = classifier.classify(code, message);
        let lines = if response.success {
            self.framer.read_block().await?
        } else {
            Vec::new()
        };
        Ok(MultiLineResponse { response, lines })
    }

    /// Write one raw line (CRLF appended) and flush.
    ///
    /// Also used for streaming a POST body between the 340 and 240
    /// exchanges.
    pub async fn write_line(&mut self, line: &str) -> Result<(), NntpError> {
        if line.starts_with("AUTHINFO") {
            debug!("-> AUTHINFO ***");
        } else {
            debug!("-> {line}");
        }
        let stream = self.framer.inner_mut();
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
        self.bytes_written += line.len() as u64 + 2;
        Ok(())
    }

    /// Close the session, shutting the transport down. Best effort.
    pub async fn close(mut self) {
        let _ = self.framer.inner_mut().shutdown().await;
    }

    async fn read_status(&mut self) -> Result<(u16, String), NntpError> {
        let line = match self.framer.read_line().await? {
            Some(line) => line,
            None => {
                return Err(NntpError::FramingViolation(
                    "connection closed awaiting a status line".into(),
                ));
            }
        };
        debug!("<- {line}");
        parse_status_line(&line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    /// Spawn a scripted peer: it sends `greeting`, then for each
    /// `(expected, reply)` pair reads one command line, asserts it, and
    /// writes the reply bytes verbatim.
    async fn scripted_session(
        greeting: &str,
        script: Vec<(&'static str, &'static str)>,
    ) -> NntpSession {
        let (client, server) = tokio::io::duplex(16 * 1024);
        let greeting = greeting.to_string();
        tokio::spawn(async move {
            let mut server = BufReader::new(server);
            server
                .get_mut()
                .write_all(greeting.as_bytes())
                .await
                .unwrap();
            for (expected, reply) in script {
                let mut line = String::new();
                server.read_line(&mut line).await.unwrap();
                assert_eq!(line.trim_end_matches(['\r', '\n']), expected);
                server
                    .get_mut()
                    .write_all(reply.as_bytes())
                    .await
                    .unwrap();
            }
        });
        NntpSession::handshake(Box::new(client)).await.unwrap()
    }

    #[tokio::test]
    async fn handshake_accepts_200_and_201() {
        let session = scripted_session("200 news.example ready\r\n", vec![]).await;
        assert!(session.posting_allowed());
        assert_eq!(session.greeting().code, 200);

        let session = scripted_session("201 read-only\r\n", vec![]).await;
        assert!(!session.posting_allowed());
    }

    #[tokio::test]
    async fn handshake_rejects_other_codes() {
        let (client, mut server) = tokio::io::duplex(1024);
        tokio::spawn(async move {
            server.write_all(b"502 go away\r\n").await.unwrap();
        });
        let err = NntpSession::handshake(Box::new(client))
            .await
            .expect_err("400/500 greeting must fail");
        assert!(matches!(err, NntpError::UnexpectedResponse(502, _)));
    }

    #[tokio::test]
    async fn handshake_rejects_immediate_eof() {
        let (client, server) = tokio::io::duplex(1024);
        drop(server);
        let err = NntpSession::handshake(Box::new(client)).await.unwrap_err();
        assert!(matches!(err, NntpError::FramingViolation(_)));
    }

    #[tokio::test]
    async fn send_command_classifies_reply() {
        let mut session = scripted_session(
            "200 ready\r\n",
            vec![("DATE", "111 20260825093000\r\n")],
        )
        .await;
        let classifier = ResponseClassifier::new(&[111]);
        let response = session.send_command("DATE", &classifier).await.unwrap();
        assert!(response.success);
        assert_eq!(response.code, 111);
        assert_eq!(response.message, "20260825093000");
    }

    #[tokio::test]
    async fn multiline_success_drains_full_block() {
        let mut session = scripted_session(
            "200 ready\r\n",
            vec![(
                "BODY <a@example>",
                "222 0 <a@example>\r\nfirst\r\n..dotted\r\n.\r\n",
            )],
        )
        .await;
        let classifier = ResponseClassifier::new(&[222]);
        let reply = session
            .send_multiline_command("BODY <a@example>", &classifier)
            .await
            .unwrap();
        assert!(reply.response.success);
        assert_eq!(reply.lines, vec![b"first".to_vec(), b".dotted".to_vec()]);
    }

    #[tokio::test]
    async fn multiline_failure_carries_empty_block() {
        let mut session = scripted_session(
            "200 ready\r\n",
            vec![("BODY <gone@example>", "430 no such article\r\n")],
        )
        .await;
        let classifier = ResponseClassifier::new(&[222]);
        let reply = session
            .send_multiline_command("BODY <gone@example>", &classifier)
            .await
            .unwrap();
        assert!(!reply.response.success);
        assert_eq!(reply.response.code, 430);
        assert!(reply.lines.is_empty());
    }

    #[tokio::test]
    async fn failed_multiline_does_not_shift_later_responses() {
        // A 430 carries no block; the next command must see its own status
        // line, not stale bytes.
        let mut session = scripted_session(
            "200 ready\r\n",
            vec![
                ("BODY <gone@example>", "430 no such article\r\n"),
                (
                    "ARTICLE <b@example>",
                    "220 0 <b@example>\r\nSubject: hi\r\n\r\nbody\r\n.\r\n",
                ),
            ],
        )
        .await;
        let body = ResponseClassifier::new(&[222]);
        let article = ResponseClassifier::new(&[220]);

        let miss = session
            .send_multiline_command("BODY <gone@example>", &body)
            .await
            .unwrap();
        assert_eq!(miss.response.code, 430);

        let hit = session
            .send_multiline_command("ARTICLE <b@example>", &article)
            .await
            .unwrap();
        assert_eq!(hit.response.code, 220);
        assert_eq!(hit.lines.len(), 3);
        assert_eq!(hit.lines[0], b"Subject: hi");
    }

    #[tokio::test]
    async fn byte_counters_track_both_directions() {
        let mut session =
            scripted_session("200 ready\r\n", vec![("DATE", "111 20260825\r\n")]).await;
        let greeting_len = "200 ready\r\n".len() as u64;
        assert_eq!(session.bytes_read(), greeting_len);
        assert_eq!(session.bytes_written(), 0);

        let classifier = ResponseClassifier::new(&[111]);
        session.send_command("DATE", &classifier).await.unwrap();
        assert_eq!(session.bytes_written(), "DATE\r\n".len() as u64);
        assert_eq!(
            session.bytes_read(),
            greeting_len + "111 20260825\r\n".len() as u64
        );
    }
}
