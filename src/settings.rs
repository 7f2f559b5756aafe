// src/settings.rs

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::core::client::RetryPolicy;
use crate::core::scanner::phase::PollPolicy;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid { name: &'static str, value: String, reason: String },
}

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub engine_url: Url,
    pub api_key: String,
    pub bind_addr: SocketAddr,
    pub retry: RetryPolicy,
    pub poll: PollPolicy,
    pub request_timeout: Duration,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup("ZAP_API_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(SettingsError::Missing("ZAP_API_URL"))?;
        let engine_url = Url::parse(raw_url.trim()).map_err(|e| SettingsError::Invalid {
            name: "ZAP_API_URL",
            value: raw_url.clone(),
            reason: e.to_string(),
        })?;

        let retry = RetryPolicy {
            attempts: at_least_one(&lookup, "VANGUARD_RETRY_ATTEMPTS", 3)?,
            delay: Duration::from_millis(parse_or(&lookup, "VANGUARD_RETRY_DELAY_MS", 1000)?),
        };
        let poll = PollPolicy {
            interval: Duration::from_millis(parse_or(&lookup, "VANGUARD_POLL_INTERVAL_MS", 1000)?),
            max_polls: at_least_one(&lookup, "VANGUARD_MAX_POLLS", 3600)?,
            deadline: Duration::from_secs(parse_or(&lookup, "VANGUARD_PHASE_TIMEOUT_SECS", 3600)?),
        };

        Ok(Self {
            engine_url,
            api_key: lookup("ZAP_API_KEY").unwrap_or_default(),
            bind_addr: parse_or(&lookup, "VANGUARD_BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            retry,
            poll,
            request_timeout: Duration::from_secs(parse_or(&lookup, "VANGUARD_REQUEST_TIMEOUT_SECS", 30)?),
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, SettingsError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|e: T::Err| SettingsError::Invalid {
                name,
                value: value.clone(),
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}

fn at_least_one<F>(lookup: &F, name: &'static str, default: u32) -> Result<u32, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, name, default)?;
    if value == 0 {
        return Err(SettingsError::Invalid {
            name,
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}
