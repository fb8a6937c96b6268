use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};

use super::analytics::{self, UsageFilter};
use super::domain::{
    AdminAlert, AiTool, AiToolFlag, AiToolTransaction, AlertId, CreditLimit, DailySnapshot,
    SnapshotId, TransactionId, TransactionStatus, UserId, Wallet,
};
use super::repository::{CreditRepository, RepositoryError};

#[derive(Debug, Default)]
struct Tables {
    wallets: HashMap<UserId, Wallet>,
    flags: BTreeMap<AiTool, AiToolFlag>,
    limits: BTreeMap<AiTool, CreditLimit>,
    ledger: Vec<AiToolTransaction>,
    alerts: Vec<(AlertId, AdminAlert)>,
    snapshots: BTreeMap<NaiveDate, (SnapshotId, DailySnapshot)>,
    sequence: u64,
}

impl Tables {
    fn next_id(&mut self, prefix: &str) -> String {
        self.sequence += 1;
        format!("{prefix}-{:06}", self.sequence)
    }
}

/// Process-local repository. One lock guards every table, which is what makes
/// `spend` a single atomic balance check, decrement, and ledger append.
#[derive(Debug, Default)]
pub struct InMemoryCreditRepository {
    tables: Mutex<Tables>,
}

impl InMemoryCreditRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds wallets, used by the demo and fixtures.
    pub fn with_wallets<I>(wallets: I) -> Self
    where
        I: IntoIterator<Item = Wallet>,
    {
        let repository = Self::default();
        {
            let mut tables = repository.tables.lock().expect("repository mutex poisoned");
            for wallet in wallets {
                tables.wallets.insert(wallet.user_id.clone(), wallet);
            }
        }
        repository
    }

    pub fn alerts(&self) -> Vec<(AlertId, AdminAlert)> {
        self.tables
            .lock()
            .expect("repository mutex poisoned")
            .alerts
            .clone()
    }

    pub fn snapshots(&self) -> Vec<DailySnapshot> {
        self.tables
            .lock()
            .expect("repository mutex poisoned")
            .snapshots
            .values()
            .map(|(_, snapshot)| snapshot.clone())
            .collect()
    }
}

impl CreditRepository for InMemoryCreditRepository {
    fn wallet(&self, user_id: &UserId) -> Result<Option<Wallet>, RepositoryError> {
        let tables = self.tables.lock().expect("repository mutex poisoned");
        Ok(tables.wallets.get(user_id).cloned())
    }

    fn grant(&self, user_id: &UserId, credits: u64) -> Result<Wallet, RepositoryError> {
        let mut tables = self.tables.lock().expect("repository mutex poisoned");
        let wallet = tables
            .wallets
            .entry(user_id.clone())
            .or_insert_with(|| Wallet::empty(user_id.clone()));
        wallet.balance = wallet.balance.saturating_add(credits);
        Ok(wallet.clone())
    }

    fn spend(
        &self,
        user_id: &UserId,
        tool: AiTool,
        credits: u64,
        daily_limit: Option<CreditLimit>,
        at: DateTime<Utc>,
    ) -> Result<(Wallet, AiToolTransaction), RepositoryError> {
        let mut tables = self.tables.lock().expect("repository mutex poisoned");
        let balance = tables
            .wallets
            .get(user_id)
            .map(|wallet| wallet.balance)
            .unwrap_or(0);
        if balance < credits {
            return Err(RepositoryError::InsufficientBalance {
                balance,
                required: credits,
            });
        }

        if let Some(limit) = daily_limit.filter(|limit| limit.enforced) {
            let spent_today =
                analytics::spent_today(&tables.ledger, user_id, tool, at.date_naive());
            if spent_today.saturating_add(credits) > limit.max_daily_credits {
                return Err(RepositoryError::DailyLimitExceeded {
                    limit: limit.max_daily_credits,
                    spent_today,
                });
            }
        }

        let id = TransactionId(tables.next_id("txn"));
        let wallet = tables
            .wallets
            .entry(user_id.clone())
            .or_insert_with(|| Wallet::empty(user_id.clone()));
        wallet.balance -= credits;
        let wallet = wallet.clone();

        let transaction = AiToolTransaction {
            id,
            user_id: user_id.clone(),
            tool_name: tool,
            credits_used: credits,
            created_at: at,
            status: TransactionStatus::Succeeded,
        };
        tables.ledger.push(transaction.clone());

        Ok((wallet, transaction))
    }

    fn record_transaction(
        &self,
        mut transaction: AiToolTransaction,
    ) -> Result<AiToolTransaction, RepositoryError> {
        let mut tables = self.tables.lock().expect("repository mutex poisoned");
        if transaction.id.0.is_empty() {
            transaction.id = TransactionId(tables.next_id("txn"));
        } else if tables.ledger.iter().any(|row| row.id == transaction.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.ledger.push(transaction.clone());
        Ok(transaction)
    }

    fn transactions(
        &self,
        filter: &UsageFilter,
        limit: usize,
    ) -> Result<Vec<AiToolTransaction>, RepositoryError> {
        let tables = self.tables.lock().expect("repository mutex poisoned");
        Ok(tables
            .ledger
            .iter()
            .rev()
            .filter(|row| filter.matches(row))
            .take(limit)
            .cloned()
            .collect())
    }

    fn tool_flag(&self, tool: AiTool) -> Result<Option<AiToolFlag>, RepositoryError> {
        let tables = self.tables.lock().expect("repository mutex poisoned");
        Ok(tables.flags.get(&tool).copied())
    }

    fn set_tool_flag(&self, flag: AiToolFlag) -> Result<AiToolFlag, RepositoryError> {
        let mut tables = self.tables.lock().expect("repository mutex poisoned");
        tables.flags.insert(flag.tool_name, flag);
        Ok(flag)
    }

    fn tool_flags(&self) -> Result<Vec<AiToolFlag>, RepositoryError> {
        let tables = self.tables.lock().expect("repository mutex poisoned");
        Ok(tables.flags.values().copied().collect())
    }

    fn credit_limit(&self, tool: AiTool) -> Result<Option<CreditLimit>, RepositoryError> {
        let tables = self.tables.lock().expect("repository mutex poisoned");
        Ok(tables.limits.get(&tool).copied())
    }

    fn upsert_credit_limit(&self, limit: CreditLimit) -> Result<CreditLimit, RepositoryError> {
        let mut tables = self.tables.lock().expect("repository mutex poisoned");
        tables.limits.insert(limit.tool_name, limit);
        Ok(limit)
    }

    fn insert_admin_alert(&self, alert: AdminAlert) -> Result<AlertId, RepositoryError> {
        let mut tables = self.tables.lock().expect("repository mutex poisoned");
        let id = AlertId(tables.next_id("alert"));
        tables.alerts.push((id.clone(), alert));
        Ok(id)
    }

    fn upsert_daily_snapshot(
        &self,
        snapshot: DailySnapshot,
    ) -> Result<SnapshotId, RepositoryError> {
        let mut tables = self.tables.lock().expect("repository mutex poisoned");
        let existing = tables
            .snapshots
            .get(&snapshot.day)
            .map(|(id, _)| id.clone());
        let id = match existing {
            Some(id) => id,
            None => SnapshotId(tables.next_id("snapshot")),
        };
        tables
            .snapshots
            .insert(snapshot.day, (id.clone(), snapshot));
        Ok(id)
    }
}
