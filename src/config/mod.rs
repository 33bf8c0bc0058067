//! Configuration module for the moderator backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Maximum number of sub-requests Graph accepts in one `$batch` call.
pub const MAX_BATCH_SIZE: usize = 20;

/// Delay growth between team-creation status reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every read.
    Fixed,
    /// Delay doubles after each read, capped at eight times the base interval.
    Exponential,
}

impl Backoff {
    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "exponential" | "exp" => Backoff::Exponential,
            _ => Backoff::Fixed,
        }
    }
}

/// Bounded retry policy for the team-creation status poll.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl PollPolicy {
    /// Delay before the given (zero-based) status read.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential => {
                let factor = 1u32 << attempt.min(3);
                self.interval.saturating_mul(factor)
            }
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 60,
            backoff: Backoff::Fixed,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key guarding the API (optional in development)
    pub api_psk: Option<String>,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graph v1.0 base URL
    pub graph_url: String,
    /// Graph beta base URL (teams, channel messages, operations)
    pub graph_beta_url: String,
    /// Name of the open extension holding breakout state on calendar events
    pub extension_name: String,
    /// Team-creation poll policy
    pub poll: PollPolicy,
    /// Sub-requests per `$batch` round-trip
    pub batch_size: usize,
    /// Treat any failed member/meeting/message sub-request as a provisioning failure
    pub fail_on_partial: bool,
    /// Timeout for a single Graph HTTP call
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("MODERATOR_API_PSK").ok().filter(|s| !s.is_empty());

        let bind_addr = env::var("MODERATOR_BIND_ADDR")
            .ok()
            .and_then(|s| match s.parse() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    eprintln!("Invalid MODERATOR_BIND_ADDR {s:?}, using default");
                    None
                }
            })
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)));

        let log_level = env::var("MODERATOR_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let graph_url = env::var("MODERATOR_GRAPH_URL")
            .unwrap_or_else(|_| "https://graph.microsoft.com/v1.0".to_string());
        let graph_beta_url = env::var("MODERATOR_GRAPH_BETA_URL")
            .unwrap_or_else(|_| "https://graph.microsoft.com/beta".to_string());

        let extension_name =
            env::var("MODERATOR_EXTENSION_NAME").unwrap_or_else(|_| "com.moderatorTest".to_string());

        let defaults = PollPolicy::default();
        let poll = PollPolicy {
            interval: parse_var("MODERATOR_POLL_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            max_attempts: parse_var("MODERATOR_POLL_MAX_ATTEMPTS")
                .unwrap_or(defaults.max_attempts)
                .max(1),
            backoff: env::var("MODERATOR_POLL_BACKOFF")
                .map(|s| Backoff::parse(&s))
                .unwrap_or(defaults.backoff),
        };

        let batch_size = parse_var("MODERATOR_BATCH_SIZE")
            .unwrap_or(MAX_BATCH_SIZE)
            .clamp(1, MAX_BATCH_SIZE);

        let fail_on_partial = parse_var("MODERATOR_FAIL_ON_PARTIAL").unwrap_or(false);

        let http_timeout = Duration::from_secs(parse_var("MODERATOR_HTTP_TIMEOUT_SECS").unwrap_or(30));

        Self {
            api_psk,
            bind_addr,
            log_level,
            graph_url,
            graph_beta_url,
            extension_name,
            poll,
            batch_size,
            fail_on_partial,
            http_timeout,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        for var in [
            "MODERATOR_API_PSK",
            "MODERATOR_BIND_ADDR",
            "MODERATOR_LOG_LEVEL",
            "MODERATOR_GRAPH_URL",
            "MODERATOR_GRAPH_BETA_URL",
            "MODERATOR_EXTENSION_NAME",
            "MODERATOR_POLL_INTERVAL_SECS",
            "MODERATOR_POLL_MAX_ATTEMPTS",
            "MODERATOR_POLL_BACKOFF",
            "MODERATOR_BATCH_SIZE",
            "MODERATOR_FAIL_ON_PARTIAL",
            "MODERATOR_HTTP_TIMEOUT_SECS",
        ] {
            env::remove_var(var);
        }

        let config = Config::from_env();

        assert!(config.api_psk.is_none());
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.graph_beta_url, "https://graph.microsoft.com/beta");
        assert_eq!(config.extension_name, "com.moderatorTest");
        assert_eq!(config.poll.interval, Duration::from_secs(10));
        assert_eq!(config.poll.backoff, Backoff::Fixed);
        assert_eq!(config.batch_size, 20);
        assert!(!config.fail_on_partial);
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = PollPolicy {
            interval: Duration::from_secs(1),
            max_attempts: 10,
            backoff: Backoff::Exponential,
        };

        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(9), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_parse() {
        assert_eq!(Backoff::parse("Exponential"), Backoff::Exponential);
        assert_eq!(Backoff::parse("whatever"), Backoff::Fixed);
    }
}
