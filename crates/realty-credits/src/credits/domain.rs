use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for marketplace accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for ledger rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

/// Identifier wrapper for stored admin alerts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertId(pub String);

/// Identifier wrapper for stored daily usage snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub String);

/// AI-assisted features offered on the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiTool {
    ResumeBuilder,
    ListingEnhancer,
    AgentMatcher,
    SeoSchema,
    BrochureWriter,
}

impl AiTool {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::ResumeBuilder,
            Self::ListingEnhancer,
            Self::AgentMatcher,
            Self::SeoSchema,
            Self::BrochureWriter,
        ]
    }

    /// Stable table name used in flag, limit, and ledger rows.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ResumeBuilder => "resume_builder",
            Self::ListingEnhancer => "listing_enhancer",
            Self::AgentMatcher => "agent_matcher",
            Self::SeoSchema => "seo_schema",
            Self::BrochureWriter => "brochure_writer",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::ResumeBuilder => "Agent Resume Builder",
            Self::ListingEnhancer => "Listing Enhancer",
            Self::AgentMatcher => "Agent Matcher",
            Self::SeoSchema => "SEO Schema Generator",
            Self::BrochureWriter => "Brochure Writer",
        }
    }
}

impl fmt::Display for AiTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown AI tool '{0}'")]
pub struct UnknownTool(pub String);

impl FromStr for AiTool {
    type Err = UnknownTool;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ordered()
            .into_iter()
            .find(|tool| tool.name() == normalized)
            .ok_or_else(|| UnknownTool(value.to_string()))
    }
}

/// Per-user balance record of remaining credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub balance: u64,
}

impl Wallet {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            balance: 0,
        }
    }
}

/// Admin-controlled switch enabling or disabling a tool platform-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiToolFlag {
    pub tool_name: AiTool,
    pub is_enabled: bool,
}

/// Optional per-tool daily cap applied to each user's spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLimit {
    pub tool_name: AiTool,
    pub max_daily_credits: u64,
    pub enforced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Succeeded,
    Failed,
}

impl TransactionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown transaction status '{other}'")),
        }
    }
}

/// Append-only ledger row; one per tool run that reached the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiToolTransaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub tool_name: AiTool,
    pub credits_used: u64,
    pub created_at: DateTime<Utc>,
    pub status: TransactionStatus,
}

impl AiToolTransaction {
    pub fn day(&self) -> NaiveDate {
        self.created_at.date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// Operational alert raised from the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAlert {
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub tool_name: Option<AiTool>,
}

/// Per-day rollup persisted for the admin dashboard trend charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub day: NaiveDate,
    pub credits_used: u64,
    pub successful_calls: usize,
    pub failed_calls: usize,
    pub active_users: usize,
}

/// Caller-facing request to run an AI tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub user_id: UserId,
    pub tool: AiTool,
    #[serde(default)]
    pub input: serde_json::Value,
}

/// Result returned once the tool has run and credits were settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub tool: AiTool,
    pub output: serde_json::Value,
    pub credits_used: u64,
    pub balance: u64,
    pub transaction_id: TransactionId,
}
