use shared::{DEFAULT_PORT, TIMEOUT_DURATION_MS};
use std::time::Duration;

/// Runtime settings of the server, filled in from the command line by the binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tick_duration: Duration,
    /// Sessions silent for longer than this are logged out.
    pub session_timeout: Duration,
    pub max_entities: usize,
    /// Upper bound on datagrams handled per tick, so a flood cannot starve the tick.
    pub recv_budget: usize,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_duration = Duration::from_secs_f64(1.0 / f64::from(hz.max(1)));
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            tick_duration: Duration::from_secs_f64(1.0 / 30.0),
            session_timeout: Duration::from_millis(TIMEOUT_DURATION_MS),
            max_entities: 100_000,
            recv_budget: 512,
        }
    }
}
