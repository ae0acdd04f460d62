use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Shared secret accepted when `QUIZ_SECRET` is not set.
pub const DEFAULT_SECRET: &str = "change_me_to_your_secret";

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub secret: String,
    /// Upper bound on concurrently running browser sessions.
    pub max_browser_sessions: usize,
    /// Hard limit for one solve, from admission to submission.
    pub job_deadline: Duration,
    pub navigation_timeout: Duration,
    pub settle_delay: Duration,
    pub submit_timeout: Duration,
    pub job_ttl: Duration,
    pub chrome_executable: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
            secret: DEFAULT_SECRET.to_string(),
            max_browser_sessions: 4,
            job_deadline: Duration::from_secs(170),
            navigation_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_millis(1000),
            submit_timeout: Duration::from_secs(60),
            job_ttl: Duration::from_secs(60 * 60),
            chrome_executable: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        let defaults = Config::default();

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        let port = port
            .parse::<u16>()
            .map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host)
            .map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        let secret = env::var("QUIZ_SECRET").unwrap_or(defaults.secret);

        let max_browser_sessions =
            parse_var("MAX_BROWSER_SESSIONS")?.unwrap_or(defaults.max_browser_sessions);
        if max_browser_sessions == 0 {
            return Err(AppError::ConfigError(
                "MAX_BROWSER_SESSIONS must be at least 1".to_string(),
            ));
        }

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            secret,
            max_browser_sessions,
            job_deadline: parse_var("JOB_DEADLINE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_deadline),
            navigation_timeout: parse_var("NAVIGATION_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.navigation_timeout),
            settle_delay: parse_var("SETTLE_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.settle_delay),
            submit_timeout: parse_var("SUBMIT_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.submit_timeout),
            job_ttl: parse_var("JOB_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_ttl),
            chrome_executable: env::var("CHROME_EXECUTABLE")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        })
    }
}

/// Reads an optional numeric variable; present but unparsable is an error.
fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", name, e))),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_stay_under_the_three_minute_limit() {
        let config = Config::default();
        assert_eq!(config.secret, DEFAULT_SECRET);
        assert!(config.job_deadline < Duration::from_secs(180));
        assert!(config.navigation_timeout < config.job_deadline);
        assert!(config.max_browser_sessions >= 1);
    }

    #[test]
    fn missing_variable_is_not_an_error() {
        let value: Option<u64> = parse_var("QUIZ_RUNNER_TEST_UNSET_VARIABLE").unwrap();
        assert_eq!(value, None);
    }
}
