use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitoring::ProbeMode;
use crate::monitoring::checker::DEFAULT_PING_PROGRAM;
use crate::monitoring::classifier::DEFAULT_CONNECTIVITY_HOST;
use crate::monitoring::scheduler::DEFAULT_INTERVAL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to parse {}: {source}", .path.display())]
    ParseFailed { path: path::PathBuf, source: toml::de::Error },
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config directory available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorSettings,
    pub email: EmailSettings,
    pub sms: SmsSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub hosts: Vec<String>,
    pub interval_seconds: u64,
    pub mode: ProbeMode,
    pub local_host: String,
    pub connectivity_host: String,
    pub disambiguate: bool,
    pub cache_connectivity: bool,
    /// Echo utility run for local and basic mode probes
    pub ping_program: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    /// Sender address, the SMTP username when empty
    pub from: String,
    /// Recipient used when `--email` is given without a value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsSettings {
    pub api_base: String,
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
    /// Recipient used when `--sms` is given without a value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            hosts: vec![
                "http://localhost:8080".into(),
                "http://localhost:8081".into(),
                "http://localhost:8083".into(),
            ],
            interval_seconds: DEFAULT_INTERVAL.as_secs(),
            mode: ProbeMode::default(),
            local_host: "localhost".into(),
            connectivity_host: DEFAULT_CONNECTIVITY_HOST.into(),
            disambiguate: true,
            cache_connectivity: false,
            ping_program: DEFAULT_PING_PROGRAM.into(),
        }
    }
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".into(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            from: String::new(),
            to: None,
        }
    }
}

impl Default for SmsSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.twilio.com/2010-04-01".into(),
            account_sid: String::new(),
            auth_token: String::new(),
            from: String::new(),
            to: None,
        }
    }
}

/// Environment variables that override secrets from the file
const ENV_OVERRIDES: &[&str] = &[
    "PING_MONITOR_SMTP_USERNAME",
    "PING_MONITOR_SMTP_PASSWORD",
    "PING_MONITOR_TWILIO_ACCOUNT_SID",
    "PING_MONITOR_TWILIO_AUTH_TOKEN",
];

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/ping-monitor/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("ping-monitor/config.toml"))
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "<set>" }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let monitor = &self.monitor;

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Monitor")?;
        write_1(f, "Hosts", &monitor.hosts.join(", "))?;
        write_1(f, "Interval (s)", &monitor.interval_seconds)?;
        write_1(f, "Mode", &format!("{:?}", monitor.mode))?;
        write_1(f, "Local Host", &monitor.local_host)?;
        write_1(f, "Connectivity Host", &monitor.connectivity_host)?;
        write_1(f, "Disambiguate", &monitor.disambiguate)?;
        write_1(f, "Cache Connectivity", &monitor.cache_connectivity)?;
        write_1(f, "Ping Program", &monitor.ping_program)?;
        write_title_1(f, "Email")?;
        write_1(f, "Relay", &format!("{}:{}", self.email.smtp_host, self.email.smtp_port))?;
        write_1(f, "Username", &self.email.username)?;
        write_1(f, "Password", &mask(&self.email.password))?;
        write_title_1(f, "SMS")?;
        write_1(f, "API", &self.sms.api_base)?;
        write_1(f, "Account SID", &self.sms.account_sid)?;
        write_1(f, "Auth Token", &mask(&self.sms.auth_token))?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/ping-monitor/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str())
                .map_err(|source| ConfigError::ParseFailed { path: config_path, source })
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Apply credential overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for name in ENV_OVERRIDES {
            let Some(value) = lookup(name) else { continue };
            match *name {
                "PING_MONITOR_SMTP_USERNAME" => self.email.username = value,
                "PING_MONITOR_SMTP_PASSWORD" => self.email.password = value,
                "PING_MONITOR_TWILIO_ACCOUNT_SID" => self.sms.account_sid = value,
                "PING_MONITOR_TWILIO_AUTH_TOKEN" => self.sms.auth_token = value,
                _ => {}
            }
        }
    }
}
