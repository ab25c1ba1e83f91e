//! An NNTP ([RFC 3977](https://datatracker.ietf.org/doc/html/rfc3977))
//! client engine.
//!
//! Layered bottom-up: [`framer`] frames CRLF lines and dot-stuffed data
//! blocks over any transport; [`response`] classifies status codes per
//! command; [`session`] runs the strict half-duplex exchange; [`client`]
//! maps protocol verbs onto it; [`pooled`] and [`pool`] manage a bounded
//! set of reusable authenticated connections handed out as one-shot leases.
//!
//! ```no_run
//! use pomelo_nntp::{PoolConfig, ServerConfig, SessionPool};
//!
//! # async fn demo() -> Result<(), pomelo_nntp::NntpError> {
//! let server = ServerConfig::new("news.example.com", 563, true)
//!     .with_credentials("user", Some("pass".into()));
//! let pool = SessionPool::new(server, PoolConfig::default())?;
//!
//! let mut lease = pool.get_lease().await?;
//! let article = lease.body("part1of2.abc@example.com").await?;
//! lease.release().await?;
//! pool.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod framer;
pub mod pool;
pub mod pooled;
pub mod response;
pub mod session;
pub mod testing;
pub mod transport;

pub use client::NntpClient;
pub use config::{PoolConfig, ServerConfig};
pub use error::NntpError;
pub use framer::LineFramer;
pub use pool::{Lease, SessionPool};
pub use pooled::{Connector, PooledClient, TcpConnector};
pub use response::{MultiLineResponse, Response, ResponseClassifier};
pub use session::NntpSession;
pub use transport::NntpIo;
