//! Read-and-reduce views over ledger rows for the admin dashboard.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{AiTool, AiToolTransaction, DailySnapshot, TransactionStatus, UserId};

/// Row filter applied before any aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageFilter {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub tool: Option<AiTool>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<TransactionStatus>,
}

impl UsageFilter {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    /// Inclusive on both date bounds.
    pub fn matches(&self, row: &AiToolTransaction) -> bool {
        if let Some(user_id) = &self.user_id {
            if &row.user_id != user_id {
                return false;
            }
        }
        if let Some(tool) = self.tool {
            if row.tool_name != tool {
                return false;
            }
        }
        if let Some(status) = self.status {
            if row.status != status {
                return false;
            }
        }
        let day = row.day();
        if self.from.is_some_and(|from| day < from) {
            return false;
        }
        if self.to.is_some_and(|to| day > to) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolUsage {
    pub tool: AiTool,
    pub tool_label: &'static str,
    pub credits: u64,
    pub calls: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyUsage {
    pub day: NaiveDate,
    pub credits: u64,
    pub calls: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: TransactionStatus,
    pub calls: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserUsage {
    pub user_id: UserId,
    pub credits: u64,
    pub calls: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub total_credits: u64,
    pub call_count: usize,
    pub by_tool: Vec<ToolUsage>,
    pub by_day: Vec<DailyUsage>,
    pub by_status: Vec<StatusCount>,
}

#[derive(Default)]
struct Tally {
    credits: u64,
    calls: usize,
}

impl Tally {
    fn add(&mut self, credits: u64) {
        self.credits = self.credits.saturating_add(credits);
        self.calls += 1;
    }
}

/// Sums credits and counts calls across the filtered rows.
pub fn summarize<'a, I>(rows: I, filter: &UsageFilter) -> UsageSummary
where
    I: IntoIterator<Item = &'a AiToolTransaction>,
{
    let mut total = Tally::default();
    let mut by_tool: HashMap<AiTool, Tally> = HashMap::new();
    let mut by_day: BTreeMap<NaiveDate, Tally> = BTreeMap::new();
    let mut by_status: BTreeMap<TransactionStatus, usize> = BTreeMap::new();

    for row in rows.into_iter().filter(|row| filter.matches(row)) {
        total.add(row.credits_used);
        by_tool.entry(row.tool_name).or_default().add(row.credits_used);
        by_day.entry(row.day()).or_default().add(row.credits_used);
        *by_status.entry(row.status).or_default() += 1;
    }

    let by_tool = AiTool::ordered()
        .into_iter()
        .filter_map(|tool| {
            by_tool.get(&tool).map(|tally| ToolUsage {
                tool,
                tool_label: tool.label(),
                credits: tally.credits,
                calls: tally.calls,
            })
        })
        .collect();

    let by_day = by_day
        .into_iter()
        .map(|(day, tally)| DailyUsage {
            day,
            credits: tally.credits,
            calls: tally.calls,
        })
        .collect();

    let by_status = by_status
        .into_iter()
        .map(|(status, calls)| StatusCount { status, calls })
        .collect();

    UsageSummary {
        total_credits: total.credits,
        call_count: total.calls,
        by_tool,
        by_day,
        by_status,
    }
}

/// Credits a user has already spent on `tool` during `day`.
pub fn spent_today<'a, I>(rows: I, user_id: &UserId, tool: AiTool, day: NaiveDate) -> u64
where
    I: IntoIterator<Item = &'a AiToolTransaction>,
{
    rows.into_iter()
        .filter(|row| {
            row.status == TransactionStatus::Succeeded
                && row.tool_name == tool
                && &row.user_id == user_id
                && row.day() == day
        })
        .fold(0u64, |acc, row| acc.saturating_add(row.credits_used))
}

/// Heaviest spenders first; ties broken by user id for stable output.
pub fn top_users<'a, I>(rows: I, limit: usize) -> Vec<UserUsage>
where
    I: IntoIterator<Item = &'a AiToolTransaction>,
{
    let mut totals: HashMap<&UserId, Tally> = HashMap::new();
    for row in rows {
        totals.entry(&row.user_id).or_default().add(row.credits_used);
    }

    let mut users: Vec<UserUsage> = totals
        .into_iter()
        .map(|(user_id, tally)| UserUsage {
            user_id: user_id.clone(),
            credits: tally.credits,
            calls: tally.calls,
        })
        .collect();
    users.sort_by(|a, b| {
        b.credits
            .cmp(&a.credits)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    users.truncate(limit);
    users
}

/// Rolls one day of ledger rows into the shape stored by the snapshot handler.
pub fn daily_snapshot<'a, I>(rows: I, day: NaiveDate) -> DailySnapshot
where
    I: IntoIterator<Item = &'a AiToolTransaction>,
{
    let mut snapshot = DailySnapshot {
        day,
        credits_used: 0,
        successful_calls: 0,
        failed_calls: 0,
        active_users: 0,
    };
    let mut users = HashSet::new();

    for row in rows.into_iter().filter(|row| row.day() == day) {
        users.insert(&row.user_id);
        snapshot.credits_used = snapshot.credits_used.saturating_add(row.credits_used);
        match row.status {
            TransactionStatus::Succeeded => snapshot.successful_calls += 1,
            TransactionStatus::Failed => snapshot.failed_calls += 1,
        }
    }

    snapshot.active_users = users.len();
    snapshot
}
