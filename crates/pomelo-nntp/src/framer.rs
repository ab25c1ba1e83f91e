//! Line framing for the NNTP wire format.
//!
//! Single response lines are CRLF-terminated; multi-line data blocks end with
//! a line holding a single dot, and data lines that start with a dot arrive
//! dot-stuffed ([RFC 3977 §3.1.1](https://datatracker.ietf.org/doc/html/rfc3977#section-3.1.1)).

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::error::NntpError;

const BLOCK_TERMINATOR: &[u8] = b".";

/// Framing decorator over any readable transport.
///
/// Composes with plain TCP, TLS, or an in-memory pipe through the same code
/// path; the framer never cares what it is wrapping.
pub struct LineFramer<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    bytes_read: u64,
}

impl<R: AsyncRead + Unpin> LineFramer<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::with_capacity(1024),
            bytes_read: 0,
        }
    }

    /// Cumulative bytes consumed from the transport, CR/LF included.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Access to the wrapped transport, for writing requests.
    pub fn inner_mut(&mut self) -> &mut R {
        self.reader.get_mut()
    }

    /// Read one response line with the trailing CR/LF stripped.
    /// Returns `None` at end of stream.
    pub async fn read_line(&mut self) -> Result<Option<String>, NntpError> {
        let n = self.fill_line().await?;
        if n == 0 {
            return Ok(None);
        }
        let trimmed = trim_crlf(&self.buf);
        Ok(Some(String::from_utf8_lossy(trimmed).into_owned()))
    }

    /// Read one line of a multi-line data block.
    ///
    /// A line consisting of a single dot terminates the block (`None`); a
    /// leading doubled dot is collapsed to one; everything else passes
    /// through unchanged. End of stream before the terminator is a framing
    /// violation, never a silent end-of-block.
    pub async fn read_block_line(&mut self) -> Result<Option<Vec<u8>>, NntpError> {
        let n = self.fill_line().await?;
        if n == 0 {
            return Err(NntpError::FramingViolation(
                "stream ended inside a data block".into(),
            ));
        }
        let trimmed = trim_crlf(&self.buf);
        if trimmed == BLOCK_TERMINATOR {
            return Ok(None);
        }
        if trimmed.starts_with(b"..") {
            Ok(Some(trimmed[1..].to_vec()))
        } else {
            Ok(Some(trimmed.to_vec()))
        }
    }

    /// Consume a full data block, eagerly, through the terminator.
    pub async fn read_block(&mut self) -> Result<Vec<Vec<u8>>, NntpError> {
        let mut lines = Vec::new();
        while let Some(line) = self.read_block_line().await? {
            lines.push(line);
        }
        Ok(lines)
    }

    async fn fill_line(&mut self) -> Result<usize, NntpError> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf).await?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

fn trim_crlf(buf: &[u8]) -> &[u8] {
    let mut end = buf.len();
    if end > 0 && buf[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && buf[end - 1] == b'\r' {
        end -= 1;
    }
    &buf[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn framer_for(data: &[u8]) -> LineFramer<tokio::io::DuplexStream> {
        let (client, mut server) = tokio::io::duplex(4096);
        let data = data.to_vec();
        tokio::spawn(async move {
            server.write_all(&data).await.unwrap();
        });
        LineFramer::new(client)
    }

    #[tokio::test]
    async fn read_line_strips_crlf() {
        let mut framer = framer_for(b"200 Welcome\r\n").await;
        assert_eq!(
            framer.read_line().await.unwrap(),
            Some("200 Welcome".to_string())
        );
    }

    #[tokio::test]
    async fn read_line_returns_none_at_eof() {
        let mut framer = framer_for(b"").await;
        assert_eq!(framer.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn block_terminator_ends_block() {
        let mut framer = framer_for(b"line1\r\n.\r\n").await;
        assert_eq!(
            framer.read_block_line().await.unwrap(),
            Some(b"line1".to_vec())
        );
        assert_eq!(framer.read_block_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn block_line_unstuffs_leading_dot() {
        let mut framer = framer_for(b"..stuffed\r\n...double\r\n..\r\nplain.dot\r\n.\r\n").await;
        assert_eq!(
            framer.read_block_line().await.unwrap(),
            Some(b".stuffed".to_vec())
        );
        assert_eq!(
            framer.read_block_line().await.unwrap(),
            Some(b"..double".to_vec())
        );
        assert_eq!(framer.read_block_line().await.unwrap(), Some(b".".to_vec()));
        assert_eq!(
            framer.read_block_line().await.unwrap(),
            Some(b"plain.dot".to_vec())
        );
        assert_eq!(framer.read_block_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn unescaped_lines_pass_through_unchanged() {
        let mut framer = framer_for(b"hello.world\r\n   \r\n\r\n.\r\n").await;
        let block = framer.read_block().await.unwrap();
        assert_eq!(
            block,
            vec![b"hello.world".to_vec(), b"   ".to_vec(), Vec::new()]
        );
    }

    #[tokio::test]
    async fn eof_mid_block_is_a_framing_violation() {
        let mut framer = framer_for(b"partial\r\n").await;
        assert_eq!(
            framer.read_block_line().await.unwrap(),
            Some(b"partial".to_vec())
        );
        let err = framer.read_block_line().await.expect_err("eof should fail");
        assert!(matches!(err, NntpError::FramingViolation(_)));
    }

    #[tokio::test]
    async fn bytes_read_counts_wire_bytes() {
        let mut framer = framer_for(b"200 ok\r\n").await;
        framer.read_line().await.unwrap();
        assert_eq!(framer.bytes_read(), 8);
    }

    #[test]
    fn trim_crlf_variants() {
        assert_eq!(trim_crlf(b"hello\r\n"), b"hello");
        assert_eq!(trim_crlf(b"hello\n"), b"hello");
        assert_eq!(trim_crlf(b"hello"), b"hello");
        assert_eq!(trim_crlf(b""), b"");
    }
}
