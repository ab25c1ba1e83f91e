use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::NntpError;

/// Target news server for a session or pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub cert_verification: bool,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16, use_tls: bool) -> Self {
        Self {
            host: host.into(),
            port,
            use_tls,
            username: None,
            password: None,
            cert_verification: true,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: Option<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }
}

/// Pool sizing and timing knobs. All fields are fixed once the pool is
/// constructed; they are not per-call parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Upper bound on concurrently live clients.
    pub max_size: usize,
    /// Interval between idle-eviction sweeps.
    pub monitor_interval: Duration,
    /// An available client untouched for this long is disposed on the next sweep.
    pub idle_timeout: Duration,
    /// Bounded wait for a free slot in `get_lease`.
    pub wait_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 4,
            monitor_interval: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(300),
            wait_timeout: Duration::from_secs(10),
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), NntpError> {
        if self.max_size == 0 {
            return Err(NntpError::InvalidPoolSize);
        }
        Ok(())
    }
}
