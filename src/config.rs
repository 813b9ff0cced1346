//! Application configuration
//!
//! Built from environment variables (a `.env` file is loaded by `main`).
//! Unset variables fall back to defaults; set but invalid values are
//! reported as `Error::Config`.

use crate::alert_buffer::DEFAULT_ALERT_CAPACITY;
use crate::analysis_client::AnalysisEndpoints;
use crate::coordinator::{CoordinatorConfig, PipelinePolicy};
use crate::error::{Error, Result};
use crate::polling_supervisor::{
    BackoffPolicy, DEFAULT_MAX_DELAY, DEFAULT_MAX_EXPONENT, DEFAULT_POLL_INTERVAL,
};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// `DATABASE_URL` value selecting the in-memory store
pub const MEMORY_DATABASE: &str = "memory";

/// Where verdicts come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Remote cobot / machine / ppe services
    Http,
    /// In-process random verdicts
    Simulated,
}

impl FromStr for AnalysisMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(AnalysisMode::Http),
            "simulated" | "sim" => Ok(AnalysisMode::Simulated),
            other => Err(Error::Config(format!("unknown ANALYSIS_MODE: {}", other))),
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisMode::Http => f.write_str("http"),
            AnalysisMode::Simulated => f.write_str("simulated"),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// sqlite URL, or `memory`
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub endpoints: AnalysisEndpoints,
    pub analysis_mode: AnalysisMode,
    pub analysis_timeout: Duration,
    /// Transient failure probability of the simulated analyzer
    pub simulated_failure_rate: f64,
    pub poll_interval: Duration,
    pub backoff_max_exponent: u32,
    pub backoff_max_delay: Duration,
    pub alert_capacity: usize,
    pub log_safe_verdicts: bool,
    /// Start polling every active camera at startup
    pub autostart_polling: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://safety_monitor.db".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            endpoints: AnalysisEndpoints::default(),
            analysis_mode: AnalysisMode::Http,
            analysis_timeout: Duration::from_secs(10),
            simulated_failure_rate: 0.0,
            poll_interval: DEFAULT_POLL_INTERVAL,
            backoff_max_exponent: DEFAULT_MAX_EXPONENT,
            backoff_max_delay: DEFAULT_MAX_DELAY,
            alert_capacity: DEFAULT_ALERT_CAPACITY,
            log_safe_verdicts: true,
            autostart_polling: false,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let poll_secs: u64 =
            parse_or(&var, "POLL_INTERVAL_SECS", defaults.poll_interval.as_secs())?;
        if poll_secs == 0 {
            return Err(Error::Config("POLL_INTERVAL_SECS must be at least 1".to_string()));
        }

        let max_delay_secs: u64 = parse_or(
            &var,
            "BACKOFF_MAX_DELAY_SECS",
            defaults.backoff_max_delay.as_secs(),
        )?;

        let alert_capacity: usize = parse_or(&var, "ALERT_CAPACITY", defaults.alert_capacity)?;
        if alert_capacity == 0 {
            return Err(Error::Config("ALERT_CAPACITY must be at least 1".to_string()));
        }

        let failure_rate: f64 =
            parse_or(&var, "SIMULATED_FAILURE_RATE", defaults.simulated_failure_rate)?;
        if !(0.0..=1.0).contains(&failure_rate) {
            return Err(Error::Config(
                "SIMULATED_FAILURE_RATE must be within [0, 1]".to_string(),
            ));
        }

        let timeout_ms: u64 = parse_or(
            &var,
            "ANALYSIS_TIMEOUT_MS",
            defaults.analysis_timeout.as_millis() as u64,
        )?;

        Ok(Self {
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_or(&var, "PORT", defaults.port)?,
            endpoints: AnalysisEndpoints {
                cobot: var("COBOT_SERVICE_URL").unwrap_or(defaults.endpoints.cobot),
                machine: var("MACHINE_SERVICE_URL").unwrap_or(defaults.endpoints.machine),
                ppe: var("PPE_SERVICE_URL").unwrap_or(defaults.endpoints.ppe),
            },
            analysis_mode: match var("ANALYSIS_MODE") {
                Some(mode) => mode.parse()?,
                None => defaults.analysis_mode,
            },
            analysis_timeout: Duration::from_millis(timeout_ms.max(1)),
            simulated_failure_rate: failure_rate,
            poll_interval: Duration::from_secs(poll_secs),
            backoff_max_exponent: parse_or(
                &var,
                "BACKOFF_MAX_EXPONENT",
                defaults.backoff_max_exponent,
            )?,
            backoff_max_delay: Duration::from_secs(max_delay_secs),
            alert_capacity,
            log_safe_verdicts: parse_bool_or(
                &var,
                "LOG_SAFE_VERDICTS",
                defaults.log_safe_verdicts,
            )?,
            autostart_polling: parse_bool_or(
                &var,
                "AUTOSTART_POLLING",
                defaults.autostart_polling,
            )?,
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.poll_interval,
            self.backoff_max_exponent,
            self.backoff_max_delay,
        )
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            alert_capacity: self.alert_capacity,
            backoff: self.backoff_policy(),
            pipeline: PipelinePolicy {
                log_safe_verdicts: self.log_safe_verdicts,
            },
        }
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid {}={}: {}", key, raw, e))),
        None => Ok(default),
    }
}

fn parse_bool_or<F>(var: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::Config(format!("invalid {}={}: expected a boolean", key, raw))),
        },
        None => Ok(default),
    }
}
