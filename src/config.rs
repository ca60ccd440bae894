use anyhow::{anyhow, Result};
use clap::Args;
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

use crate::scanner::BrokerConfig;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_BROKER_URL: &str = "wss://mqtt.eclipseprojects.io:443/mqtt";
pub const DEFAULT_TOPIC: &str = "warehouse/qr";
pub const RECONNECT_PERIOD: Duration = Duration::from_secs(1);
pub const KEEP_ALIVE: Duration = Duration::from_secs(60);

const SESSION_FILE: &str = "session.json";
const LOG_FILE: &str = "smartchain.log";

/// Global options shared by every subcommand. Flags win over `SMARTCHAIN_*`
/// environment variables (a `.env` file is loaded first).
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Backend API URL
    #[arg(long, env = "SMARTCHAIN_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// MQTT broker URL (wss://, ws://, mqtt:// or tcp://)
    #[arg(long, env = "SMARTCHAIN_BROKER_URL", default_value = DEFAULT_BROKER_URL, global = true)]
    pub broker_url: String,

    /// Topic scanners publish to
    #[arg(long, env = "SMARTCHAIN_TOPIC", default_value = DEFAULT_TOPIC, global = true)]
    pub topic: String,

    /// Stock/category polling interval in seconds
    #[arg(long, env = "SMARTCHAIN_POLL_INTERVAL", default_value = "5", global = true)]
    pub poll_interval: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "SMARTCHAIN_TIMEOUT", default_value = "10", global = true)]
    pub timeout: u64,

    /// Where tokens and the selected role are kept
    #[arg(long, env = "SMARTCHAIN_SESSION_FILE", global = true)]
    pub session_file: Option<PathBuf>,

    /// Log file used while the dashboard owns the terminal
    #[arg(long, env = "SMARTCHAIN_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval.max(1))
    }

    pub fn broker(&self) -> BrokerConfig {
        BrokerConfig {
            url: self.broker_url.clone(),
            topic: self.topic.clone(),
            keep_alive: KEEP_ALIVE,
            reconnect_period: RECONNECT_PERIOD,
        }
    }

    pub fn session_path(&self) -> Result<PathBuf> {
        match &self.session_file {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join(SESSION_FILE)),
        }
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        match &self.log_file {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join(LOG_FILE)),
        }
    }
}

fn data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "smartchain", "smartchain")
        .ok_or_else(|| anyhow!("Unable to determine data directory"))?;
    Ok(dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        settings: Settings,
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "smartchain",
            "--api-url",
            "https://erp.example",
            "--poll-interval",
            "0",
            "--session-file",
            "/tmp/s.json",
        ]);
        let settings = cli.settings;

        assert_eq!(settings.api_url, "https://erp.example");
        assert_eq!(settings.poll_interval(), Duration::from_secs(1));
        assert_eq!(settings.session_path().unwrap(), PathBuf::from("/tmp/s.json"));

        let broker = settings.broker();
        assert_eq!(broker.topic, DEFAULT_TOPIC);
        assert_eq!(broker.reconnect_period, RECONNECT_PERIOD);
    }
}
