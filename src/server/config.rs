use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Server-side knobs of the gateway.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Address to bind the HTTP endpoint to; port `0` picks a free port.
    pub bind: SocketAddr,
    /// Upper bound on HTTP request head size. Payloads beyond it are still
    /// accepted as body.
    pub max_header_bytes: usize,
    /// Live-connection capacity of the session store.
    pub connection_capacity: usize,
    /// Idle expiry of connections and statements.
    #[serde(with = "seconds")]
    pub idle_ttl: Duration,
    /// Per-connection statement capacity.
    pub statement_capacity: usize,
    /// Interval of the idle-eviction sweep.
    #[serde(with = "seconds")]
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8765".parse().unwrap(/* literal */),
            max_header_bytes: Self::DEFAULT_MAX_HEADER_BYTES,
            connection_capacity: Self::DEFAULT_CONNECTION_CAPACITY,
            idle_ttl: Self::DEFAULT_IDLE_TTL,
            statement_capacity: Self::DEFAULT_STATEMENT_CAPACITY,
            sweep_interval: Self::DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl ServerConfig {
    /// Default upper bound on the HTTP request head.
    pub const DEFAULT_MAX_HEADER_BYTES: usize = 64 * 1_024;

    /// Default number of live connections held by the session store.
    ///
    /// The least-recently-used connection is evicted beyond this bound.
    pub const DEFAULT_CONNECTION_CAPACITY: usize = 100;

    /// Default idle expiry of connections and statements.
    pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(600);

    /// Default per-connection statement capacity.
    pub const DEFAULT_STATEMENT_CAPACITY: usize = 1_000;

    /// Default interval of the idle-eviction sweep.
    pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

    /// Builder-method for setting the bind address.
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Builder-method for setting the request-head cap.
    #[must_use]
    pub fn with_max_header_bytes(mut self, max_header_bytes: usize) -> Self {
        self.max_header_bytes = max_header_bytes;
        self
    }

    /// Builder-method for setting the connection capacity.
    #[must_use]
    pub fn with_connection_capacity(mut self, connection_capacity: usize) -> Self {
        self.connection_capacity = connection_capacity;
        self
    }

    /// Builder-method for setting the idle expiry.
    #[must_use]
    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    /// Builder-method for setting the per-connection statement capacity.
    #[must_use]
    pub fn with_statement_capacity(mut self, statement_capacity: usize) -> Self {
        self.statement_capacity = statement_capacity;
        self
    }

    /// Builder-method for setting the sweep interval.
    #[must_use]
    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    pub(crate) fn session_limits(&self) -> crate::session::SessionLimits {
        crate::session::SessionLimits {
            connection_capacity: self.connection_capacity,
            idle_ttl: self.idle_ttl,
            statement_capacity: self.statement_capacity,
        }
    }
}

mod seconds {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
