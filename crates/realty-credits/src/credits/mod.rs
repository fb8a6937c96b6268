//! AI tool credit gating, usage ledger, and admin usage views.
//!
//! A tool run passes the [`CreditGate`] (flag, balance, daily limit), calls the
//! [`AiProvider`], and is then settled through [`CreditRepository::spend`], which
//! debits the wallet and appends the ledger row together.

pub mod analytics;
mod counters;
pub mod domain;
pub mod export;
pub mod gate;
pub mod memory;
pub mod provider;
pub mod repository;
pub mod router;
pub mod service;
pub mod usage_log;

#[cfg(test)]
mod tests;

pub use analytics::{summarize, UsageFilter, UsageSummary};
pub use domain::{
    AdminAlert, AiTool, AiToolFlag, AiToolTransaction, AlertId, AlertSeverity, CreditLimit,
    DailySnapshot, SnapshotId, ToolRequest, ToolResponse, TransactionId, TransactionStatus,
    UserId, Wallet,
};
pub use export::ExportError;
pub use gate::{CreditGate, DenialReason, GateDecision};
pub use memory::InMemoryCreditRepository;
pub use provider::{AiProvider, HttpProvider, HttpProviderConfig, OfflineProvider, ProviderError};
pub use repository::{CreditRepository, RepositoryError};
pub use router::credit_router;
pub use service::{CreditPricing, CreditService, CreditServiceError, CreditServiceSettings};
pub use usage_log::{UsageEvent, UsageLogEntry, UsageLogger};
