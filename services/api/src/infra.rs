use async_trait::async_trait;
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use realty_credits::config::ProviderConfig;
use realty_credits::credits::{
    AiProvider, AiTool, HttpProvider, OfflineProvider, ProviderError, UserId, Wallet,
};
use serde_json::Value;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Provider chosen at startup from `AI_PROVIDER_URL`.
pub(crate) enum ConfiguredProvider {
    Offline(OfflineProvider),
    Http(HttpProvider),
}

impl ConfiguredProvider {
    pub(crate) fn from_config(config: Option<&ProviderConfig>) -> Result<Self, ProviderError> {
        match config {
            Some(config) => Ok(Self::Http(HttpProvider::new(config.http_config())?)),
            None => Ok(Self::Offline(OfflineProvider)),
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Offline(_) => "offline",
            Self::Http(_) => "http",
        }
    }
}

#[async_trait]
impl AiProvider for ConfiguredProvider {
    async fn generate(&self, tool: AiTool, input: &Value) -> Result<Value, ProviderError> {
        match self {
            Self::Offline(provider) => provider.generate(tool, input).await,
            Self::Http(provider) => provider.generate(tool, input).await,
        }
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Parses `user=credits`, as accepted by `--seed-wallet`.
pub(crate) fn parse_wallet_seed(raw: &str) -> Result<Wallet, String> {
    let (user, credits) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected USER=CREDITS, got '{raw}'"))?;
    let user = user.trim();
    if user.is_empty() {
        return Err(format!("missing user id in '{raw}'"));
    }
    let balance = credits
        .trim()
        .parse::<u64>()
        .map_err(|err| format!("invalid credit amount in '{raw}' ({err})"))?;

    Ok(Wallet {
        user_id: UserId(user.to_string()),
        balance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_seed_parses_user_and_balance() {
        let wallet = parse_wallet_seed(" agent-4 = 120 ").expect("seed parses");
        assert_eq!(wallet.user_id, UserId("agent-4".to_string()));
        assert_eq!(wallet.balance, 120);
    }

    #[test]
    fn wallet_seed_rejects_malformed_values() {
        assert!(parse_wallet_seed("agent-4").is_err());
        assert!(parse_wallet_seed("=10").is_err());
        assert!(parse_wallet_seed("agent-4=-3").is_err());
    }

    #[test]
    fn provider_defaults_to_offline() {
        let provider = ConfiguredProvider::from_config(None).expect("offline provider");
        assert_eq!(provider.label(), "offline");
    }
}
