use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::Level as TracingLevel;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("couldn't parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("couldn't serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid log level: {0}")]
    InvalidLevel(String),
    #[error("invalid ip address: {0}")]
    InvalidIp(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Level(pub TracingLevel);

impl Level {
    pub const TRACE: Self = Self(tracing::Level::TRACE);
    pub const DEBUG: Self = Self(tracing::Level::DEBUG);
    pub const INFO: Self = Self(tracing::Level::INFO);
    pub const WARN: Self = Self(tracing::Level::WARN);
    pub const ERROR: Self = Self(tracing::Level::ERROR);
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub site: SiteConfig,
    pub backend: BackendConfig,
    pub mail: MailConfig,
    pub membership: MembershipConfig,
    pub tls: TlsConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SiteConfig {
    pub root: Option<PathBuf>,
    /// Public base URL, used for auth redirects and approval links.
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackendConfig {
    /// Base URL of the hosted backend. `SUPABASE_URL` takes precedence.
    pub url: Option<String>,
    pub storage_bucket: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MailConfig {
    pub admin_recipients: Vec<String>,
    pub sender_name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MembershipConfig {
    pub submissions_open: bool,
    pub fee_cents: i64,
    pub currency: String,
    pub duration_days: i64,
    pub max_receipt_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TlsConfig {
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub enable: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NetworkConfig {
    pub ip: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::TRACE => write!(f, "TRACE"),
            Self::DEBUG => write!(f, "DEBUG"),
            Self::INFO => write!(f, "INFO"),
            Self::WARN => write!(f, "WARN"),
            Self::ERROR => write!(f, "ERROR"),
        }
    }
}

impl TryFrom<&str> for Level {
    type Error = ConfigError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Self::TRACE),
            "DEBUG" => Ok(Self::DEBUG),
            "INFO" => Ok(Self::INFO),
            "WARN" => Ok(Self::WARN),
            "ERROR" => Ok(Self::ERROR),
            _ => Err(ConfigError::InvalidLevel(s.to_string())),
        }
    }
}

impl From<Level> for tracing::Level {
    fn from(level: Level) -> Self {
        level.0
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: SiteConfig {
                root: Some(PathBuf::from("static")),
                url: String::from("http://localhost:8080"),
            },
            backend: BackendConfig {
                url: None,
                storage_bucket: String::from("membership-documents"),
                timeout_secs: 15,
            },
            mail: MailConfig {
                admin_recipients: Vec::new(),
                sender_name: String::from("CHAM"),
            },
            membership: MembershipConfig {
                submissions_open: true,
                fee_cents: 5000,
                currency: String::from("EUR"),
                duration_days: 365,
                max_receipt_bytes: 5 * 1024 * 1024,
            },
            tls: TlsConfig {
                cert: None,
                key: None,
                enable: false,
            },
            network: NetworkConfig {
                ip: "0.0.0.0".to_string(),
                port: 8080,
            },
            logging: LoggingConfig {
                level: "INFO".to_string(),
            },
        }
    }
}

impl Config {
    /// Reads the config at `path`, writing the defaults there first if the
    /// file doesn't exist yet.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = match fs::read_to_string(path) {
            Ok(config) => config,
            Err(e) => {
                if e.kind() == std::io::ErrorKind::NotFound {
                    let config = Config::default();
                    config.write(path)?;
                    return Ok(config);
                }
                return Err(e.into());
            }
        };

        Ok(toml::from_str(&config)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        let config = toml::to_string_pretty(self)?;
        fs::write(path, config)?;
        Ok(())
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    pub fn tls(&self) -> &TlsConfig {
        &self.tls
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    /// `/auth/callback` under the public site URL.
    pub fn auth_redirect(&self) -> String {
        format!("{}/auth/callback", self.site.url.trim_end_matches('/'))
    }
}

pub fn string_to_ip(ip: &str) -> Result<[u8; 4], ConfigError> {
    let mut ip_bytes = [0; 4];
    let parts = ip.split('.').collect::<Vec<&str>>();
    if parts.len() != 4 {
        return Err(ConfigError::InvalidIp(ip.to_string()));
    }
    for (slot, part) in ip_bytes.iter_mut().zip(parts) {
        *slot = part
            .parse::<u8>()
            .map_err(|_| ConfigError::InvalidIp(ip.to_string()))?;
    }
    Ok(ip_bytes)
}
