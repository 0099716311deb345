use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::crypt::Encrypter;
use crate::settings;
use crate::store::GrcStore;
use crate::types::GrcError;

/// Azure tenant used when none is configured
const DEFAULT_AZURE_TENANT: &str = "common";

/// Where the process is running; providers are only configured for the web
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunContext {
    Web,
    Console,
}

/// Supported single sign-on providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Okta,
    Google,
    Azure,
}

impl OAuthProvider {
    pub const ALL: [OAuthProvider; 3] = [
        OAuthProvider::Okta,
        OAuthProvider::Google,
        OAuthProvider::Azure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Okta => "okta",
            OAuthProvider::Google => "google",
            OAuthProvider::Azure => "azure",
        }
    }

    fn setting_key(&self, field: &str) -> String {
        format!("auth.{}.{}", self.as_str(), field)
    }
}

/// Client configuration for one provider
#[derive(Clone, Serialize, PartialEq, Eq)]
pub struct ProviderConfig {
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    pub redirect: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("base_url", &self.base_url)
            .field("tenant", &self.tenant)
            .field("redirect", &self.redirect)
            .finish()
    }
}

/// Process-wide provider configuration
#[derive(Default)]
pub struct ProviderRegistry {
    services: RwLock<BTreeMap<OAuthProvider, ProviderConfig>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, provider: OAuthProvider) -> Option<ProviderConfig> {
        self.services.read().await.get(&provider).cloned()
    }

    pub async fn configured(&self) -> Vec<(OAuthProvider, ProviderConfig)> {
        self.services
            .read()
            .await
            .iter()
            .map(|(p, c)| (*p, c.clone()))
            .collect()
    }

    /// Swap in a complete provider set under a single write lock
    async fn replace(&self, services: BTreeMap<OAuthProvider, ProviderConfig>) {
        *self.services.write().await = services;
    }
}

/// Populate the registry from `auth.<provider>.*` settings.
///
/// Does nothing outside the web context or before any settings exist. For
/// each enabled provider the stored client secret is decrypted; a decryption
/// failure aborts with the error and leaves the registry untouched. Returns
/// the providers that were configured.
pub async fn configure_providers(
    context: RunContext,
    store: &GrcStore,
    encrypter: &Encrypter,
    base_url: &str,
    registry: &ProviderRegistry,
) -> Result<Vec<OAuthProvider>, GrcError> {
    if context != RunContext::Web {
        debug!("Not a web context, skipping OAuth provider configuration");
        return Ok(Vec::new());
    }
    if !store.settings_available().await? {
        debug!("No settings stored, skipping OAuth provider configuration");
        return Ok(Vec::new());
    }

    let base_url = base_url.trim_end_matches('/');
    let mut services = BTreeMap::new();

    for provider in OAuthProvider::ALL {
        if !settings::flag(store, &provider.setting_key("enabled")).await? {
            continue;
        }

        let client_secret = match settings::text(store, &provider.setting_key("client_secret")).await? {
            Some(sealed) => Some(encrypter.decrypt_string(&sealed)?),
            None => None,
        };

        let base = match provider {
            OAuthProvider::Okta => settings::text(store, &provider.setting_key("base_url")).await?,
            _ => None,
        };
        let tenant = match provider {
            OAuthProvider::Azure => Some(
                settings::text(store, &provider.setting_key("tenant"))
                    .await?
                    .unwrap_or_else(|| DEFAULT_AZURE_TENANT.to_string()),
            ),
            _ => None,
        };

        let config = ProviderConfig {
            client_id: settings::text(store, &provider.setting_key("client_id")).await?,
            client_secret,
            base_url: base,
            tenant,
            redirect: format!("{}/auth/{}/callback", base_url, provider.as_str()),
        };

        services.insert(provider, config);
    }

    let configured: Vec<OAuthProvider> = services.keys().copied().collect();
    registry.replace(services).await;

    info!(
        "OAuth providers configured: {:?}",
        configured.iter().map(|p| p.as_str()).collect::<Vec<_>>()
    );
    Ok(configured)
}
