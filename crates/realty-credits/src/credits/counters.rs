//! Prometheus counters for credit flow, exported by the API's recorder.

use super::domain::AiTool;
use super::gate::DenialReason;

pub(crate) fn record_spend(tool: AiTool, credits: u64) {
    metrics::counter!("realty_credits_spent_total", "tool" => tool.name()).increment(credits);
}

pub(crate) fn record_denial(tool: AiTool, reason: &DenialReason) {
    metrics::counter!(
        "realty_tool_denials_total",
        "tool" => tool.name(),
        "reason" => reason.code()
    )
    .increment(1);
}

pub(crate) fn record_failure(tool: AiTool) {
    metrics::counter!("realty_tool_failures_total", "tool" => tool.name()).increment(1);
}
