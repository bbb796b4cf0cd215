//! Configuration surface (spec §6 "Configuration surface"): plain structs
//! with `Default` impls and builder-style setters, matching the teacher's
//! settings structs rather than a CLI/env parser (out of scope per spec §1).

use std::time::Duration;

use crate::h2::flow_control::DEFAULT_INITIAL_WINDOW_SIZE;
use crate::h2::frame::DEFAULT_MAX_FRAME_SIZE;
use crate::h2::stream::DEFAULT_STREAM_BUFFER_CAP;
use crate::hpack::DEFAULT_TABLE_SIZE;

/// Per-connection HTTP/2 configuration (spec §6 "Per-connection (HTTP/2)").
#[derive(Debug, Clone)]
pub struct Http2Config {
    pub max_stream_buffer: usize,
    pub max_connection_buffer: u64,
    pub max_priority_updates_per_sec: u32,
    pub priority_rate_window: Duration,
    pub stream_idle_timeout: Duration,
    pub connection_idle_timeout: Duration,
    pub ping_timeout: Duration,
    pub enable_backpressure: bool,
    pub backpressure_threshold: usize,
    pub initial_window_size: i32,
    pub max_frame_size: u32,
    pub header_table_size: usize,
}

impl Default for Http2Config {
    fn default() -> Self {
        Http2Config {
            max_stream_buffer: DEFAULT_STREAM_BUFFER_CAP,
            max_connection_buffer: 10 * 1024 * 1024,
            max_priority_updates_per_sec: 100,
            priority_rate_window: Duration::from_secs(1),
            stream_idle_timeout: Duration::from_secs(300),
            connection_idle_timeout: Duration::from_secs(600),
            ping_timeout: Duration::from_secs(20),
            enable_backpressure: true,
            backpressure_threshold: 8 * 1024 * 1024,
            initial_window_size: DEFAULT_INITIAL_WINDOW_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            header_table_size: DEFAULT_TABLE_SIZE,
        }
    }
}

impl Http2Config {
    pub fn with_max_stream_buffer(mut self, max: usize) -> Self {
        self.max_stream_buffer = max;
        self
    }

    pub fn with_max_connection_buffer(mut self, max: u64) -> Self {
        self.max_connection_buffer = max;
        self
    }

    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    pub fn with_connection_idle_timeout(mut self, timeout: Duration) -> Self {
        self.connection_idle_timeout = timeout;
        self
    }

    pub fn with_priority_rate_limit(mut self, per_window: u32, window: Duration) -> Self {
        self.max_priority_updates_per_sec = per_window;
        self.priority_rate_window = window;
        self
    }
}

/// HTTP/1.1 connection pool configuration (spec §4.10).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_conns_per_host: usize,
    pub max_idle_conns_per_host: usize,
    pub max_idle_time: Duration,
    pub dial_timeout: Duration,
    pub idle_check_interval: Duration,
    pub health_check_interval: Duration,
    pub health_check_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_conns_per_host: 32,
            max_idle_conns_per_host: 8,
            max_idle_time: Duration::from_secs(90),
            dial_timeout: Duration::from_secs(10),
            idle_check_interval: Duration::from_secs(30),
            health_check_interval: Duration::from_secs(30),
            health_check_timeout: Duration::from_secs(2),
        }
    }
}

impl PoolConfig {
    pub fn with_max_conns_per_host(mut self, n: usize) -> Self {
        self.max_conns_per_host = n;
        self
    }

    pub fn with_max_idle_conns_per_host(mut self, n: usize) -> Self {
        self.max_idle_conns_per_host = n;
        self
    }

    pub fn with_max_idle_time(mut self, d: Duration) -> Self {
        self.max_idle_time = d;
        self
    }
}

/// Per-client HTTP/1.1 configuration (spec §6 "Per-client (HTTP/1.1)").
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub pool: PoolConfig,
    pub dial_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            pool: PoolConfig::default(),
            dial_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: "corehttp/0.1".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn with_request_timeout(mut self, d: Duration) -> Self {
        self.request_timeout = d;
        self
    }
}
