use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};

use crate::credits::analytics::UsageFilter;
use crate::credits::domain::{
    AdminAlert, AiTool, AiToolFlag, AiToolTransaction, AlertId, CreditLimit, DailySnapshot,
    SnapshotId, TransactionId, TransactionStatus, UserId, Wallet,
};
use crate::credits::memory::InMemoryCreditRepository;
use crate::credits::provider::{AiProvider, OfflineProvider, ProviderError};
use crate::credits::repository::{CreditRepository, RepositoryError};
use crate::credits::service::{CreditService, CreditServiceSettings};

pub(super) fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).expect("valid date")
}

pub(super) fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn user(name: &str) -> UserId {
    UserId(name.to_string())
}

pub(super) fn wallet(name: &str, balance: u64) -> Wallet {
    Wallet {
        user_id: user(name),
        balance,
    }
}

pub(super) fn row(
    name: &str,
    tool: AiTool,
    credits: u64,
    status: TransactionStatus,
    created_at: DateTime<Utc>,
) -> AiToolTransaction {
    AiToolTransaction {
        id: TransactionId(String::new()),
        user_id: user(name),
        tool_name: tool,
        credits_used: credits,
        created_at,
        status,
    }
}

/// Input the offline provider accepts for each tool.
pub(super) fn input_for(tool: AiTool) -> Value {
    match tool {
        AiTool::ResumeBuilder => json!({ "name": "Dana Whitfield", "years_experience": 8 }),
        AiTool::ListingEnhancer => json!({ "description": "Sunny ranch near the park" }),
        AiTool::AgentMatcher => json!({
            "city": "Ames",
            "agents": [{ "name": "Pat Lund", "city": "Ames", "closed_deals": 14 }],
        }),
        AiTool::SeoSchema => json!({ "address": "44 Elm St", "price": 310000 }),
        AiTool::BrochureWriter => json!({ "description": "Four-square with a wraparound porch" }),
    }
}

pub(super) type OfflineService = CreditService<InMemoryCreditRepository, OfflineProvider>;

pub(super) fn build_service(
    wallets: Vec<Wallet>,
) -> (Arc<OfflineService>, Arc<InMemoryCreditRepository>) {
    build_service_with(wallets, CreditServiceSettings::default())
}

pub(super) fn build_service_with(
    wallets: Vec<Wallet>,
    settings: CreditServiceSettings,
) -> (Arc<OfflineService>, Arc<InMemoryCreditRepository>) {
    let repository = Arc::new(InMemoryCreditRepository::with_wallets(wallets));
    let service = Arc::new(CreditService::new(
        repository.clone(),
        Arc::new(OfflineProvider),
        settings,
    ));
    (service, repository)
}

#[derive(Debug, Default)]
pub(super) struct FailingProvider;

#[async_trait]
impl AiProvider for FailingProvider {
    async fn generate(&self, _tool: AiTool, _input: &Value) -> Result<Value, ProviderError> {
        Err(ProviderError::Upstream {
            status: 503,
            body: "model overloaded".to_string(),
        })
    }
}

/// Offline output, but hands control back to the runtime first so two
/// runs joined on one task interleave between gate and settlement.
#[derive(Debug, Default)]
pub(super) struct YieldingProvider;

#[async_trait]
impl AiProvider for YieldingProvider {
    async fn generate(&self, tool: AiTool, input: &Value) -> Result<Value, ProviderError> {
        tokio::task::yield_now().await;
        OfflineProvider.generate(tool, input).await
    }
}

pub(super) fn build_yielding_service(
    wallets: Vec<Wallet>,
) -> (
    Arc<CreditService<InMemoryCreditRepository, YieldingProvider>>,
    Arc<InMemoryCreditRepository>,
) {
    let repository = Arc::new(InMemoryCreditRepository::with_wallets(wallets));
    let service = Arc::new(CreditService::new(
        repository.clone(),
        Arc::new(YieldingProvider),
        CreditServiceSettings::default(),
    ));
    (service, repository)
}

#[derive(Debug, Default)]
pub(super) struct UnavailableRepository;

fn unavailable<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("ledger offline".to_string()))
}

impl CreditRepository for UnavailableRepository {
    fn wallet(&self, _user_id: &UserId) -> Result<Option<Wallet>, RepositoryError> {
        unavailable()
    }

    fn grant(&self, _user_id: &UserId, _credits: u64) -> Result<Wallet, RepositoryError> {
        unavailable()
    }

    fn spend(
        &self,
        _user_id: &UserId,
        _tool: AiTool,
        _credits: u64,
        _daily_limit: Option<CreditLimit>,
        _at: DateTime<Utc>,
    ) -> Result<(Wallet, AiToolTransaction), RepositoryError> {
        unavailable()
    }

    fn record_transaction(
        &self,
        _transaction: AiToolTransaction,
    ) -> Result<AiToolTransaction, RepositoryError> {
        unavailable()
    }

    fn transactions(
        &self,
        _filter: &UsageFilter,
        _limit: usize,
    ) -> Result<Vec<AiToolTransaction>, RepositoryError> {
        unavailable()
    }

    fn tool_flag(&self, _tool: AiTool) -> Result<Option<AiToolFlag>, RepositoryError> {
        unavailable()
    }

    fn set_tool_flag(&self, _flag: AiToolFlag) -> Result<AiToolFlag, RepositoryError> {
        unavailable()
    }

    fn tool_flags(&self) -> Result<Vec<AiToolFlag>, RepositoryError> {
        unavailable()
    }

    fn credit_limit(&self, _tool: AiTool) -> Result<Option<CreditLimit>, RepositoryError> {
        unavailable()
    }

    fn upsert_credit_limit(&self, _limit: CreditLimit) -> Result<CreditLimit, RepositoryError> {
        unavailable()
    }

    fn insert_admin_alert(&self, _alert: AdminAlert) -> Result<AlertId, RepositoryError> {
        unavailable()
    }

    fn upsert_daily_snapshot(
        &self,
        _snapshot: DailySnapshot,
    ) -> Result<SnapshotId, RepositoryError> {
        unavailable()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}
