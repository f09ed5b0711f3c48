//! Layered, typed configuration.
//!
//! Mirrors the original `dao.common.config` three-tier precedence (system,
//! user, working directory) using the idiomatic `config` crate instead of
//! a hand-rolled `ConfigParser` wrapper, plus an environment-variable
//! override layer (`DAORPC__SECTION__KEY`) that the original did not have
//! but which is standard practice for this crate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `rpc.*` options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    pub ip: String,
    pub url_pattern: String,
    pub rcv_timeout: u64,
    pub send_timeout: u64,
    pub driver: String,
    pub pool_capacity: usize,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            url_pattern: "tcp://{ip}:{port}".to_string(),
            rcv_timeout: 20,
            send_timeout: 20,
            driver: "direct".to_string(),
            pool_capacity: 10_000,
        }
    }
}

/// `rabbit.*` options, consulted only by the BROKERED backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RabbitSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub keep_alive: u16,
    pub reconnect_on: u64,
}

impl Default for RabbitSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5672,
            user: "guest".to_string(),
            password: "guest".to_string(),
            keep_alive: 60,
            reconnect_on: 2,
        }
    }
}

/// `common.*` options: ambient logging knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonSettings {
    pub debug: bool,
    pub log_config: Option<String>,
}

impl Default for CommonSettings {
    fn default() -> Self {
        Self {
            debug: false,
            log_config: None,
        }
    }
}

/// The fully merged, typed configuration consumed read-only after
/// startup.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub rpc: RpcSettings,
    pub rabbit: RabbitSettings,
    pub common: CommonSettings,
}

/// Load settings for `application`, layering (lowest to highest
/// precedence): built-in defaults, `/etc/dao-rpc/<app>.toml`,
/// `${HOME}/.dao-rpc/<app>.toml`, `./etc/<app>.toml`, and environment
/// variables prefixed `DAORPC__` (double-underscore separated, e.g.
/// `DAORPC__RABBIT__HOST`).
///
/// Every layer is optional; a missing file is skipped rather than
/// erroring; only a malformed *present* file or an un-coercible
/// environment override is an error.
pub fn load(application: &str) -> Result<Settings, config::ConfigError> {
    let system_path = PathBuf::from("/etc/dao-rpc").join(format!("{application}.toml"));
    let user_path = dirs_home().join(".dao-rpc").join(format!("{application}.toml"));
    let local_path = PathBuf::from("./etc").join(format!("{application}.toml"));

    let builder = config::Config::builder()
        .add_source(config::File::from(system_path).required(false))
        .add_source(config::File::from(user_path).required(false))
        .add_source(config::File::from(local_path).required(false))
        .add_source(
            config::Environment::with_prefix("DAORPC")
                .separator("__")
                .try_parsing(true),
        );

    let merged = builder.build()?;
    merged.try_deserialize()
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.rpc.url_pattern, "tcp://{ip}:{port}");
        assert_eq!(s.rpc.rcv_timeout, 20);
        assert_eq!(s.rpc.send_timeout, 20);
        assert_eq!(s.rpc.driver, "direct");
        assert_eq!(s.rpc.pool_capacity, 10_000);
        assert_eq!(s.rabbit.port, 5672);
        assert_eq!(s.rabbit.reconnect_on, 2);
        assert!(!s.common.debug);
    }

    #[test]
    fn load_with_no_files_present_returns_defaults() {
        // Point HOME somewhere with no ~/.dao-rpc, and rely on nothing at
        // /etc/dao-rpc or ./etc/<app>.toml existing in the test sandbox.
        let settings = load("nonexistent-test-app-xyz").expect("load should not fail on missing files");
        assert_eq!(settings.rpc.driver, "direct");
    }
}
