use super::config::{Config, ConfigError};
use clap::Parser;

use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[clap(
    author = "CHAM",
    version,
    about = "Website, membership and donation backend for the CHAM association",
    help_template = r#"
{name} v{version} by {author}
{about}

{usage-heading} {usage}

{all-args}
"#
)]
pub struct Cli {
    #[clap(short, long, default_value = "cham.toml")]
    pub config: PathBuf,
    #[clap(short, long, help = "Toggle TLS")]
    pub tls: bool,
    #[clap(short, long, help = "Port to listen on")]
    pub port: Option<u16>,
    #[clap(short, long, help = "IP to listen on")]
    pub ip: Option<String>,
}

impl Cli {
    /// Loads the config file and lays the command line overrides on top.
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let mut config = Config::load_from_file(&self.config)?;

        if self.tls {
            config.tls.enable = true;
            info!("tls: enabled from command line");
        }

        if let Some(port) = self.port {
            config.network.port = port;
            info!("port: {}", config.network.port);
        }

        if let Some(ip) = self.ip {
            config.network.ip = ip;
            info!("ip: {}", config.network.ip);
        }

        Ok(config)
    }
}

pub fn init() -> Result<Config, ConfigError> {
    Cli::parse().into_config()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_overrides_file_values() {
        let path = std::env::temp_dir().join(format!("cham-cli-{}.toml", uuid::Uuid::new_v4()));
        let cli = Cli::parse_from([
            "cham",
            "--config",
            path.to_str().unwrap(),
            "--tls",
            "--port",
            "9443",
            "--ip",
            "127.0.0.1",
        ]);

        let config = cli.into_config().unwrap();
        assert!(config.tls.enable);
        assert_eq!(config.network.port, 9443);
        assert_eq!(config.network.ip, "127.0.0.1");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn defaults_to_cham_toml() {
        let cli = Cli::parse_from(["cham"]);
        assert_eq!(cli.config, PathBuf::from("cham.toml"));
        assert!(!cli.tls);
        assert!(cli.port.is_none());
    }
}
