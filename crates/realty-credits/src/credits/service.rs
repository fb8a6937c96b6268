use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use super::analytics::{self, UsageFilter, UsageSummary, UserUsage};
use super::counters;
use super::domain::{
    AdminAlert, AiTool, AiToolFlag, AiToolTransaction, AlertId, CreditLimit, DailySnapshot,
    SnapshotId, ToolRequest, ToolResponse, TransactionId, TransactionStatus, UserId, Wallet,
};
use super::export::{self, ExportError};
use super::gate::{CreditGate, DenialReason, GateDecision, GateInputs};
use super::provider::{AiProvider, ProviderError};
use super::repository::{CreditRepository, RepositoryError};
use super::usage_log::{UsageEvent, UsageLogEntry, UsageLogger, DEFAULT_USAGE_LOG_CAPACITY};

pub const DEFAULT_ADMIN_FETCH_LIMIT: usize = 5000;

/// Credits charged per successful run of each tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditPricing {
    costs: BTreeMap<AiTool, u64>,
}

impl Default for CreditPricing {
    fn default() -> Self {
        let costs = BTreeMap::from([
            (AiTool::ResumeBuilder, 5),
            (AiTool::ListingEnhancer, 3),
            (AiTool::AgentMatcher, 2),
            (AiTool::SeoSchema, 1),
            (AiTool::BrochureWriter, 4),
        ]);
        Self { costs }
    }
}

impl CreditPricing {
    pub fn cost(&self, tool: AiTool) -> u64 {
        self.costs.get(&tool).copied().unwrap_or(0)
    }

    pub fn with_cost(mut self, tool: AiTool, credits: u64) -> Self {
        self.costs.insert(tool, credits);
        self
    }
}

#[derive(Debug, Clone)]
pub struct CreditServiceSettings {
    pub pricing: CreditPricing,
    pub default_tool_enabled: bool,
    pub usage_log_capacity: usize,
    pub admin_fetch_limit: usize,
}

impl Default for CreditServiceSettings {
    fn default() -> Self {
        Self {
            pricing: CreditPricing::default(),
            default_tool_enabled: true,
            usage_log_capacity: DEFAULT_USAGE_LOG_CAPACITY,
            admin_fetch_limit: DEFAULT_ADMIN_FETCH_LIMIT,
        }
    }
}

/// Service composing the credit gate, ledger repository, AI provider, and usage log.
pub struct CreditService<R, P> {
    gate: CreditGate,
    pricing: CreditPricing,
    admin_fetch_limit: usize,
    repository: Arc<R>,
    provider: Arc<P>,
    usage_log: UsageLogger,
}

impl<R, P> CreditService<R, P>
where
    R: CreditRepository + 'static,
    P: AiProvider + 'static,
{
    pub fn new(repository: Arc<R>, provider: Arc<P>, settings: CreditServiceSettings) -> Self {
        Self {
            gate: CreditGate::new(settings.default_tool_enabled),
            pricing: settings.pricing,
            admin_fetch_limit: settings.admin_fetch_limit.max(1),
            repository,
            provider,
            usage_log: UsageLogger::with_capacity(settings.usage_log_capacity),
        }
    }

    pub fn pricing(&self) -> &CreditPricing {
        &self.pricing
    }

    pub fn usage_log(&self) -> &UsageLogger {
        &self.usage_log
    }

    pub fn balance(&self, user_id: &UserId) -> Result<Wallet, CreditServiceError> {
        let wallet = self
            .repository
            .wallet(user_id)?
            .unwrap_or_else(|| Wallet::empty(user_id.clone()));
        Ok(wallet)
    }

    /// Preflight check with no side effects.
    pub fn check(
        &self,
        user_id: &UserId,
        tool: AiTool,
    ) -> Result<GateDecision, CreditServiceError> {
        self.check_at(user_id, tool, Utc::now())
    }

    pub fn check_at(
        &self,
        user_id: &UserId,
        tool: AiTool,
        now: DateTime<Utc>,
    ) -> Result<GateDecision, CreditServiceError> {
        let wallet = self.repository.wallet(user_id)?;
        let flag = self.repository.tool_flag(tool)?;
        let limit = self.repository.credit_limit(tool)?;
        let spent_today = match limit {
            Some(limit) if limit.enforced => self.spent_on(user_id, tool, now.date_naive())?,
            _ => 0,
        };

        Ok(self.gate.check(GateInputs {
            wallet: wallet.as_ref(),
            flag: flag.as_ref(),
            limit: limit.as_ref(),
            spent_today,
            cost: self.pricing.cost(tool),
        }))
    }

    fn spent_on(
        &self,
        user_id: &UserId,
        tool: AiTool,
        day: NaiveDate,
    ) -> Result<u64, CreditServiceError> {
        let filter = UsageFilter {
            user_id: Some(user_id.clone()),
            tool: Some(tool),
            from: Some(day),
            to: Some(day),
            status: Some(TransactionStatus::Succeeded),
        };
        let rows = self.repository.transactions(&filter, self.admin_fetch_limit)?;
        Ok(analytics::spent_today(&rows, user_id, tool, day))
    }

    pub async fn invoke(&self, request: ToolRequest) -> Result<ToolResponse, CreditServiceError> {
        self.invoke_at(request, Utc::now()).await
    }

    /// Gate, run the provider, then settle credits and ledger in one repository call.
    pub async fn invoke_at(
        &self,
        request: ToolRequest,
        now: DateTime<Utc>,
    ) -> Result<ToolResponse, CreditServiceError> {
        let ToolRequest {
            user_id,
            tool,
            input,
        } = request;
        let cost = self.pricing.cost(tool);

        if let GateDecision::Deny(reason) = self.check_at(&user_id, tool, now)? {
            debug!(user = %user_id, %tool, reason = reason.code(), "tool run denied");
            counters::record_denial(tool, &reason);
            let detail = Some(reason.to_string());
            self.log_usage(now, &user_id, tool, UsageEvent::Denied, 0, detail);
            return Err(CreditServiceError::Denied(reason));
        }

        self.log_usage(now, &user_id, tool, UsageEvent::Attempted, cost, None);

        let output = match self.provider.generate(tool, &input).await {
            Ok(output) => output,
            Err(err) => {
                warn!(user = %user_id, %tool, error = %err, "tool provider failed");
                self.record_failure(now, &user_id, tool, err.to_string())?;
                return Err(CreditServiceError::Provider(err));
            }
        };

        let daily_limit = self.repository.credit_limit(tool)?;
        let settled = self
            .repository
            .spend(&user_id, tool, cost, daily_limit, now);
        let (wallet, transaction) = match settled {
            Ok(settled) => settled,
            Err(RepositoryError::InsufficientBalance { balance, required }) => {
                warn!(user = %user_id, %tool, "balance drained by a concurrent run");
                let reason = DenialReason::InsufficientBalance { balance, required };
                return Err(self.lost_race(now, &user_id, tool, reason)?);
            }
            Err(RepositoryError::DailyLimitExceeded { limit, spent_today }) => {
                warn!(user = %user_id, %tool, "daily limit reached by a concurrent run");
                let reason = DenialReason::DailyLimitExceeded { limit, spent_today };
                return Err(self.lost_race(now, &user_id, tool, reason)?);
            }
            Err(err) => return Err(err.into()),
        };

        counters::record_spend(tool, cost);
        self.log_usage(now, &user_id, tool, UsageEvent::Succeeded, cost, None);
        info!(
            user = %user_id,
            %tool,
            credits = cost,
            balance = wallet.balance,
            transaction = %transaction.id.0,
            "tool run settled"
        );

        Ok(ToolResponse {
            tool,
            output,
            credits_used: cost,
            balance: wallet.balance,
            transaction_id: transaction.id,
        })
    }

    /// Settles a run whose gate passed but whose spend was refused at commit.
    fn lost_race(
        &self,
        now: DateTime<Utc>,
        user_id: &UserId,
        tool: AiTool,
        reason: DenialReason,
    ) -> Result<CreditServiceError, CreditServiceError> {
        self.record_failure(now, user_id, tool, reason.to_string())?;
        counters::record_denial(tool, &reason);
        Ok(CreditServiceError::Denied(reason))
    }

    fn record_failure(
        &self,
        now: DateTime<Utc>,
        user_id: &UserId,
        tool: AiTool,
        detail: String,
    ) -> Result<AiToolTransaction, CreditServiceError> {
        counters::record_failure(tool);
        self.log_usage(now, user_id, tool, UsageEvent::Failed, 0, Some(detail));
        let row = self.repository.record_transaction(AiToolTransaction {
            id: TransactionId(String::new()),
            user_id: user_id.clone(),
            tool_name: tool,
            credits_used: 0,
            created_at: now,
            status: TransactionStatus::Failed,
        })?;
        Ok(row)
    }

    fn log_usage(
        &self,
        now: DateTime<Utc>,
        user_id: &UserId,
        tool: AiTool,
        event: UsageEvent,
        credits: u64,
        detail: Option<String>,
    ) {
        self.usage_log.record(UsageLogEntry {
            recorded_at: now,
            user_id: user_id.clone(),
            tool,
            event,
            credits,
            detail,
        });
    }

    pub fn grant(&self, user_id: &UserId, credits: u64) -> Result<Wallet, CreditServiceError> {
        if credits == 0 {
            return Err(CreditServiceError::Invalid(
                "grant must add at least one credit".to_string(),
            ));
        }
        let wallet = self.repository.grant(user_id, credits)?;
        info!(user = %user_id, credits, balance = wallet.balance, "credits granted");
        Ok(wallet)
    }

    pub fn set_tool_enabled(
        &self,
        tool: AiTool,
        is_enabled: bool,
    ) -> Result<AiToolFlag, CreditServiceError> {
        let flag = self.repository.set_tool_flag(AiToolFlag {
            tool_name: tool,
            is_enabled,
        })?;
        info!(%tool, is_enabled, "tool flag updated");
        Ok(flag)
    }

    /// Every known tool, falling back to the configured default where no flag row exists.
    pub fn tool_flags(&self) -> Result<Vec<AiToolFlag>, CreditServiceError> {
        let stored = self.repository.tool_flags()?;
        Ok(AiTool::ordered()
            .into_iter()
            .map(|tool| {
                stored
                    .iter()
                    .find(|flag| flag.tool_name == tool)
                    .copied()
                    .unwrap_or(AiToolFlag {
                        tool_name: tool,
                        is_enabled: self.gate.default_tool_enabled(),
                    })
            })
            .collect())
    }

    pub fn upsert_credit_limit(
        &self,
        limit: CreditLimit,
    ) -> Result<CreditLimit, CreditServiceError> {
        if limit.enforced && limit.max_daily_credits == 0 {
            return Err(CreditServiceError::Invalid(
                "an enforced limit needs max_daily_credits above zero; disable the tool instead"
                    .to_string(),
            ));
        }
        let stored = self.repository.upsert_credit_limit(limit)?;
        info!(
            tool = %stored.tool_name,
            max_daily_credits = stored.max_daily_credits,
            enforced = stored.enforced,
            "credit limit updated"
        );
        Ok(stored)
    }

    pub fn record_alert(&self, alert: AdminAlert) -> Result<AlertId, CreditServiceError> {
        if alert.title.trim().is_empty() {
            return Err(CreditServiceError::Invalid("alert title is required".to_string()));
        }
        let id = self.repository.insert_admin_alert(alert)?;
        Ok(id)
    }

    /// Rolls the ledger for `day` into a snapshot and stores it. Reads the
    /// whole day; the admin fetch limit does not apply here.
    pub fn record_snapshot(
        &self,
        day: NaiveDate,
    ) -> Result<(SnapshotId, DailySnapshot), CreditServiceError> {
        let filter = UsageFilter {
            from: Some(day),
            to: Some(day),
            ..UsageFilter::default()
        };
        let rows = self.repository.transactions(&filter, usize::MAX)?;
        let snapshot = analytics::daily_snapshot(&rows, day);
        let id = self.repository.upsert_daily_snapshot(snapshot.clone())?;
        Ok((id, snapshot))
    }

    pub fn transactions(
        &self,
        filter: &UsageFilter,
        limit: Option<usize>,
    ) -> Result<Vec<AiToolTransaction>, CreditServiceError> {
        let limit = limit
            .unwrap_or(self.admin_fetch_limit)
            .min(self.admin_fetch_limit);
        Ok(self.repository.transactions(filter, limit)?)
    }

    pub fn usage_summary(&self, filter: &UsageFilter) -> Result<UsageSummary, CreditServiceError> {
        let rows = self.repository.transactions(filter, self.admin_fetch_limit)?;
        Ok(analytics::summarize(&rows, filter))
    }

    pub fn top_users(
        &self,
        filter: &UsageFilter,
        limit: usize,
    ) -> Result<Vec<UserUsage>, CreditServiceError> {
        let rows = self.repository.transactions(filter, self.admin_fetch_limit)?;
        Ok(analytics::top_users(&rows, limit))
    }

    pub fn export_csv(&self, filter: &UsageFilter) -> Result<String, CreditServiceError> {
        let rows = self.repository.transactions(filter, self.admin_fetch_limit)?;
        Ok(export::transactions_to_csv(&rows)?)
    }

    pub fn recent_usage(&self, limit: usize) -> Vec<UsageLogEntry> {
        self.usage_log.recent(limit)
    }
}

/// Error raised by the credit service.
#[derive(Debug, thiserror::Error)]
pub enum CreditServiceError {
    #[error(transparent)]
    Denied(DenialReason),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("invalid request: {0}")]
    Invalid(String),
}
