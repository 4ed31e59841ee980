use super::{
    ChamResult,
    backend::{Backend, MemoryBackend, SupabaseBackend, supabase::SupabaseCredentials},
    config::{Config, MembershipConfig},
    mailer::Mailer,
};
use dotenvy::dotenv;
use reqwest::Url;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

/// Values that only ever come from the environment (or `.env`).
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
    pub service_role_key: Option<String>,
    pub admin_approval_token: Option<String>,
    pub mail_webhook_url: Option<String>,
    pub site_url: Option<String>,
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Secrets {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            backend_url: non_empty_var("SUPABASE_URL"),
            anon_key: non_empty_var("SUPABASE_ANON_KEY"),
            service_role_key: non_empty_var("SUPABASE_SERVICE_ROLE_KEY"),
            admin_approval_token: non_empty_var("ADMIN_APPROVAL_TOKEN"),
            mail_webhook_url: non_empty_var("MAIL_WEBHOOK_URL"),
            site_url: non_empty_var("SITE_URL"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub site_url: String,
    pub auth_redirect: String,
    pub admin_token: Option<String>,
    pub admin_recipients: Vec<String>,
    pub sender_name: String,
    pub backend_configured: bool,
    pub secure_cookies: bool,
    pub membership: MembershipConfig,
}

impl Settings {
    pub fn new(config: &Config, secrets: &Secrets, backend_configured: bool) -> Self {
        let mut config = config.clone();
        if let Some(site_url) = &secrets.site_url {
            config.site.url = site_url.clone();
        }

        Self {
            site_url: config.site.url.trim_end_matches('/').to_string(),
            auth_redirect: config.auth_redirect(),
            admin_token: secrets.admin_approval_token.clone(),
            admin_recipients: config.mail.admin_recipients.clone(),
            sender_name: config.mail.sender_name.clone(),
            backend_configured,
            secure_cookies: config.tls.enable,
            membership: config.membership,
        }
    }

    /// Constant-shape comparison so a missing token never authorizes.
    pub fn admin_token_matches(&self, candidate: Option<&str>) -> bool {
        match (self.admin_token.as_deref(), candidate) {
            (Some(expected), Some(candidate)) => {
                expected.len() == candidate.len()
                    && expected
                        .bytes()
                        .zip(candidate.bytes())
                        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                        == 0
            }
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub mailer: Arc<Mailer>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(config: &Config) -> ChamResult<Self> {
        let secrets = Secrets::from_env();

        let backend_url = secrets
            .backend_url
            .clone()
            .or_else(|| config.backend.url.clone());

        let (backend, configured): (Arc<dyn Backend>, bool) =
            match (backend_url, secrets.anon_key.clone()) {
                (Some(url), Some(anon_key)) => {
                    info!("using hosted backend at {url}");
                    let backend = SupabaseBackend::new(
                        SupabaseCredentials {
                            url,
                            anon_key,
                            service_role_key: secrets.service_role_key.clone(),
                        },
                        &config.backend.storage_bucket,
                        Duration::from_secs(config.backend.timeout_secs),
                    )?;
                    (Arc::new(backend), true)
                }
                _ => {
                    warn!(
                        "SUPABASE_URL or SUPABASE_ANON_KEY missing, keeping data in memory for this run"
                    );
                    (Arc::new(MemoryBackend::new()), false)
                }
            };

        if secrets.admin_approval_token.is_none() {
            warn!("ADMIN_APPROVAL_TOKEN not set, payment approvals are disabled");
        }

        let webhook = secrets
            .mail_webhook_url
            .as_deref()
            .map(Url::parse)
            .transpose()?;
        let mailer = Mailer::new(webhook)?;
        if !mailer.is_configured() {
            warn!("MAIL_WEBHOOK_URL not set, outgoing mail will only be logged");
        }

        Ok(Self {
            backend,
            mailer: Arc::new(mailer),
            settings: Arc::new(Settings::new(config, &secrets, configured)),
        })
    }

    pub fn with_backend(backend: Arc<dyn Backend>, mailer: Mailer, settings: Settings) -> Self {
        Self {
            backend,
            mailer: Arc::new(mailer),
            settings: Arc::new(settings),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub const ADMIN_TOKEN: &str = "approve-me";

    pub fn settings() -> Settings {
        let secrets = Secrets {
            admin_approval_token: Some(ADMIN_TOKEN.to_string()),
            site_url: Some("https://cham.test".to_string()),
            ..Secrets::default()
        };
        let mut config = Config::default();
        config.mail.admin_recipients = vec!["board@cham.test".to_string()];
        Settings::new(&config, &secrets, true)
    }

    pub fn state_with(backend: Arc<MemoryBackend>, settings: Settings) -> AppState {
        AppState::with_backend(backend, Mailer::new(None).unwrap(), settings)
    }

    pub fn state(backend: Arc<MemoryBackend>) -> AppState {
        state_with(backend, settings())
    }

    /// Default settings, mail delivered to `webhook`.
    pub fn state_with_webhook(backend: Arc<MemoryBackend>, webhook: Url) -> AppState {
        AppState::with_backend(backend, Mailer::new(Some(webhook)).unwrap(), settings())
    }
}

#[cfg(test)]
mod tests {
    use super::{test_support::*, *};

    #[test]
    fn site_url_from_environment_wins() {
        let settings = settings();
        assert_eq!(settings.site_url, "https://cham.test");
        assert_eq!(settings.auth_redirect, "https://cham.test/auth/callback");
        assert_eq!(settings.admin_recipients, vec!["board@cham.test"]);
    }

    #[test]
    fn admin_token_must_match_exactly() {
        let settings = settings();
        assert!(settings.admin_token_matches(Some(ADMIN_TOKEN)));
        assert!(!settings.admin_token_matches(Some("approve-mE")));
        assert!(!settings.admin_token_matches(Some("approve")));
        assert!(!settings.admin_token_matches(None));
    }

    #[test]
    fn unset_admin_token_never_matches() {
        let settings = Settings::new(&Config::default(), &Secrets::default(), false);
        assert!(!settings.admin_token_matches(Some("")));
        assert!(!settings.admin_token_matches(None));
    }
}
