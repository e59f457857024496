use std::time::Duration;

/// Default bound on a single round-trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    /// Lets `Value::Nil` through the encoder. Off by default: `<nil/>` is
    /// an extension not every server understands.
    pub allow_none: bool,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig {
            timeout: DEFAULT_TIMEOUT,
            allow_none: false,
            user_agent: format!("async-xmlrpc/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    pub fn timeout(mut self, timeout: Duration) -> ClientConfig {
        self.timeout = timeout;
        self
    }

    pub fn allow_none(mut self, allow_none: bool) -> ClientConfig {
        self.allow_none = allow_none;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> ClientConfig {
        self.user_agent = user_agent.into();
        self
    }
}
