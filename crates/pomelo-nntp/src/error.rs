use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NntpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("framing violation: {0}")]
    FramingViolation(String),

    #[error("unexpected response {0}: {1}")]
    UnexpectedResponse(u16, String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("session is not connected")]
    NotConnected,

    #[error("client has been disposed")]
    ClientDisposed,

    #[error("no client became available within {0:?}")]
    NoClientAvailable(Duration),

    #[error("pool has been shut down")]
    PoolDisposed,

    #[error("pool size must be greater than zero")]
    InvalidPoolSize,

    #[error("pool capacity violated: {live} live clients with max size {max_size}")]
    CapacityViolated { live: usize, max_size: usize },

    #[error("released client #{0} is not tracked as in use by this pool")]
    ForeignRelease(u64),

    #[error(
        "failed to prepare client for {host}:{port} \
         (tls: {tls}, connected: {connected}, authenticated: {authenticated}): {source}"
    )]
    LeaseSetupFailed {
        host: String,
        port: u16,
        tls: bool,
        connected: bool,
        authenticated: bool,
        #[source]
        source: Box<NntpError>,
    },
}
