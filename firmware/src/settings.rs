//! Deployment settings baked in at build time.
//!
//! Credentials and the report endpoint come from environment variables read by
//! `option_env!` when the firmware is compiled. Unset variables fall back to
//! placeholders so a bare `cargo build` still produces an image.

use sentinel_core::config::{AgentConfig, DEFAULT_DEVICE_NAME, Identity};

/// Wi-Fi and endpoint parameters handed to the network co-processor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NetworkSettings {
    pub ssid: &'static str,
    pub password: &'static str,
    pub hostname: &'static str,
    pub api_url: &'static str,
    pub api_key: &'static str,
}

/// Header carrying the API key on every report.
pub const API_KEY_HEADER: &str = "X-DARAK-API-Key";

pub const NETWORK: NetworkSettings = NetworkSettings {
    ssid: env_or(option_env!("SENTINEL_WIFI_SSID"), "sentinel-ap"),
    password: env_or(option_env!("SENTINEL_WIFI_PASSWORD"), ""),
    hostname: env_or(option_env!("SENTINEL_HOSTNAME"), "pc-sentinel"),
    api_url: env_or(
        option_env!("SENTINEL_API_URL"),
        "https://example.invalid/api/pc/report",
    ),
    api_key: env_or(option_env!("SENTINEL_API_KEY"), "unset"),
};

const PC_NAME: &str = env_or(option_env!("SENTINEL_PC_NAME"), DEFAULT_DEVICE_NAME);
const DEVICE_ID: Option<&str> = option_env!("SENTINEL_DEVICE_ID");

/// Agent configuration for this build.
pub const fn agent_config() -> AgentConfig {
    let identity = match DEVICE_ID {
        Some(id) => Identity::named(PC_NAME).with_id(id),
        None => Identity::named(PC_NAME),
    };
    AgentConfig::new().with_identity(identity)
}

const fn env_or(value: Option<&'static str>, fallback: &'static str) -> &'static str {
    match value {
        Some(value) => value,
        None => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::config::{REPORT_INTERVAL, TICK_PERIOD};

    #[test]
    fn missing_variables_use_fallback() {
        assert_eq!(env_or(None, "fallback"), "fallback");
        assert_eq!(env_or(Some("lab"), "fallback"), "lab");
    }

    #[test]
    fn build_config_keeps_deployed_cadence() {
        let config = agent_config();
        assert_eq!(config.tick_period, TICK_PERIOD);
        assert_eq!(config.report_interval, REPORT_INTERVAL);
        assert!(!config.identity.name.is_empty());
    }
}
