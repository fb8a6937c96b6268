use serde::{Deserialize, Serialize};

use super::domain::{AiToolFlag, CreditLimit, Wallet};

/// Outcome of a preflight check before an AI tool runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum GateDecision {
    Allow,
    Deny(DenialReason),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenialReason {
    #[error("tool is disabled")]
    ToolDisabled,
    #[error("insufficient balance: {balance} credits available, {required} required")]
    InsufficientBalance { balance: u64, required: u64 },
    #[error("daily limit of {limit} credits reached ({spent_today} spent today)")]
    DailyLimitExceeded { limit: u64, spent_today: u64 },
}

impl DenialReason {
    /// Short label used for metrics and usage log entries.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ToolDisabled => "tool_disabled",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::DailyLimitExceeded { .. } => "daily_limit_exceeded",
        }
    }
}

/// Inputs gathered from storage for one gate evaluation.
#[derive(Debug, Clone, Copy)]
pub struct GateInputs<'a> {
    pub wallet: Option<&'a Wallet>,
    pub flag: Option<&'a AiToolFlag>,
    pub limit: Option<&'a CreditLimit>,
    pub spent_today: u64,
    pub cost: u64,
}

/// Stateless rule set; the first failing rule decides.
#[derive(Debug, Clone, Copy)]
pub struct CreditGate {
    default_tool_enabled: bool,
}

impl Default for CreditGate {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CreditGate {
    pub fn new(default_tool_enabled: bool) -> Self {
        Self {
            default_tool_enabled,
        }
    }

    pub fn default_tool_enabled(&self) -> bool {
        self.default_tool_enabled
    }

    pub fn check(&self, inputs: GateInputs<'_>) -> GateDecision {
        let enabled = inputs
            .flag
            .map(|flag| flag.is_enabled)
            .unwrap_or(self.default_tool_enabled);
        if !enabled {
            return GateDecision::Deny(DenialReason::ToolDisabled);
        }

        let balance = inputs.wallet.map(|wallet| wallet.balance).unwrap_or(0);
        if balance < inputs.cost {
            return GateDecision::Deny(DenialReason::InsufficientBalance {
                balance,
                required: inputs.cost,
            });
        }

        if let Some(limit) = inputs.limit.filter(|limit| limit.enforced) {
            if inputs.spent_today.saturating_add(inputs.cost) > limit.max_daily_credits {
                return GateDecision::Deny(DenialReason::DailyLimitExceeded {
                    limit: limit.max_daily_credits,
                    spent_today: inputs.spent_today,
                });
            }
        }

        GateDecision::Allow
    }
}
