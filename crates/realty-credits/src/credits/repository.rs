use chrono::{DateTime, Utc};

use super::analytics::UsageFilter;
use super::domain::{
    AdminAlert, AiTool, AiToolFlag, AiToolTransaction, AlertId, CreditLimit, DailySnapshot,
    SnapshotId, UserId, Wallet,
};

/// Storage abstraction over the wallet, flag, limit, and ledger tables.
///
/// `spend` must decrement the wallet and append the ledger row as one unit so
/// two concurrent tool runs cannot both pass a balance check and overdraw.
pub trait CreditRepository: Send + Sync {
    fn wallet(&self, user_id: &UserId) -> Result<Option<Wallet>, RepositoryError>;

    /// Adds credits, creating the wallet on first grant.
    fn grant(&self, user_id: &UserId, credits: u64) -> Result<Wallet, RepositoryError>;

    /// Atomically checks the balance and, when `daily_limit` is enforced, the
    /// user's `succeeded` spend on `tool` for the UTC day of `at`; then
    /// decrements the wallet and appends a `succeeded` row.
    fn spend(
        &self,
        user_id: &UserId,
        tool: AiTool,
        credits: u64,
        daily_limit: Option<CreditLimit>,
        at: DateTime<Utc>,
    ) -> Result<(Wallet, AiToolTransaction), RepositoryError>;

    /// Appends a ledger row that moves no credits (failed attempts).
    fn record_transaction(
        &self,
        transaction: AiToolTransaction,
    ) -> Result<AiToolTransaction, RepositoryError>;

    /// Newest rows first, at most `limit`.
    fn transactions(
        &self,
        filter: &UsageFilter,
        limit: usize,
    ) -> Result<Vec<AiToolTransaction>, RepositoryError>;

    fn tool_flag(&self, tool: AiTool) -> Result<Option<AiToolFlag>, RepositoryError>;
    fn set_tool_flag(&self, flag: AiToolFlag) -> Result<AiToolFlag, RepositoryError>;
    fn tool_flags(&self) -> Result<Vec<AiToolFlag>, RepositoryError>;

    fn credit_limit(&self, tool: AiTool) -> Result<Option<CreditLimit>, RepositoryError>;
    fn upsert_credit_limit(&self, limit: CreditLimit) -> Result<CreditLimit, RepositoryError>;

    fn insert_admin_alert(&self, alert: AdminAlert) -> Result<AlertId, RepositoryError>;
    /// Replaces any snapshot already stored for the same day.
    fn upsert_daily_snapshot(&self, snapshot: DailySnapshot)
        -> Result<SnapshotId, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("insufficient balance: {balance} available, {required} required")]
    InsufficientBalance { balance: u64, required: u64 },
    #[error("daily limit of {limit} credits reached ({spent_today} spent today)")]
    DailyLimitExceeded { limit: u64, spent_today: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
