use super::common::*;
use crate::credits::analytics::{daily_snapshot, spent_today, summarize, top_users, UsageFilter};
use crate::credits::domain::{AiTool, AiToolTransaction, TransactionStatus};
use chrono::{Duration, NaiveDate};

#[test]
fn summary_adds_credits_and_counts_calls() {
    let rows = vec![
        row("agent-1", AiTool::ResumeBuilder, 5, TransactionStatus::Succeeded, at(9)),
        row("agent-2", AiTool::ResumeBuilder, 3, TransactionStatus::Succeeded, at(11)),
    ];

    let summary = summarize(&rows, &UsageFilter::default());

    assert_eq!(summary.total_credits, 8);
    assert_eq!(summary.call_count, 2);
    assert_eq!(summary.by_tool.len(), 1);
    assert_eq!(summary.by_tool[0].tool, AiTool::ResumeBuilder);
    assert_eq!(summary.by_tool[0].credits, 8);
    assert_eq!(summary.by_tool[0].calls, 2);
    assert_eq!(summary.by_day.len(), 1);
    assert_eq!(summary.by_day[0].day, day());
}

#[test]
fn empty_ledger_summarizes_to_zero() {
    let rows: Vec<AiToolTransaction> = Vec::new();
    let summary = summarize(&rows, &UsageFilter::default());
    assert_eq!(summary.total_credits, 0);
    assert_eq!(summary.call_count, 0);
    assert!(summary.by_tool.is_empty());
}

#[test]
fn filter_date_bounds_are_inclusive() {
    let earlier = at(9) - Duration::days(1);
    let later = at(9) + Duration::days(1);
    let rows = vec![
        row("agent-1", AiTool::SeoSchema, 1, TransactionStatus::Succeeded, earlier),
        row("agent-1", AiTool::SeoSchema, 1, TransactionStatus::Succeeded, at(9)),
        row("agent-1", AiTool::SeoSchema, 1, TransactionStatus::Succeeded, later),
    ];
    let filter = UsageFilter {
        from: Some(day()),
        to: Some(day() + Duration::days(1)),
        ..UsageFilter::default()
    };

    let summary = summarize(&rows, &filter);

    assert_eq!(summary.call_count, 2);
    let days: Vec<NaiveDate> = summary.by_day.iter().map(|usage| usage.day).collect();
    assert_eq!(days, vec![day(), day() + Duration::days(1)]);
}

#[test]
fn summary_groups_tools_in_catalog_order() {
    let rows = vec![
        row("agent-1", AiTool::BrochureWriter, 4, TransactionStatus::Succeeded, at(9)),
        row("agent-1", AiTool::ResumeBuilder, 5, TransactionStatus::Succeeded, at(10)),
        row("agent-1", AiTool::ResumeBuilder, 0, TransactionStatus::Failed, at(11)),
    ];

    let summary = summarize(&rows, &UsageFilter::default());

    let tools: Vec<AiTool> = summary.by_tool.iter().map(|usage| usage.tool).collect();
    assert_eq!(tools, vec![AiTool::ResumeBuilder, AiTool::BrochureWriter]);
    assert_eq!(summary.total_credits, 9);
    assert_eq!(summary.by_status.len(), 2);
}

#[test]
fn spent_today_ignores_failures_and_other_days() {
    let agent = user("agent-5");
    let rows = vec![
        row("agent-5", AiTool::ListingEnhancer, 3, TransactionStatus::Succeeded, at(8)),
        row("agent-5", AiTool::ListingEnhancer, 0, TransactionStatus::Failed, at(9)),
        row(
            "agent-5",
            AiTool::ListingEnhancer,
            3,
            TransactionStatus::Succeeded,
            at(8) - Duration::days(1),
        ),
        row("agent-6", AiTool::ListingEnhancer, 3, TransactionStatus::Succeeded, at(8)),
        row("agent-5", AiTool::SeoSchema, 1, TransactionStatus::Succeeded, at(8)),
    ];

    assert_eq!(spent_today(&rows, &agent, AiTool::ListingEnhancer, day()), 3);
}

#[test]
fn top_users_orders_by_credits_then_id() {
    let rows = vec![
        row("bravo", AiTool::ResumeBuilder, 5, TransactionStatus::Succeeded, at(9)),
        row("alpha", AiTool::ResumeBuilder, 5, TransactionStatus::Succeeded, at(9)),
        row("charlie", AiTool::SeoSchema, 1, TransactionStatus::Succeeded, at(9)),
        row("charlie", AiTool::BrochureWriter, 4, TransactionStatus::Succeeded, at(10)),
        row("charlie", AiTool::SeoSchema, 1, TransactionStatus::Succeeded, at(11)),
    ];

    let users = top_users(&rows, 2);

    assert_eq!(users.len(), 2);
    assert_eq!(users[0].user_id, user("charlie"));
    assert_eq!(users[0].credits, 6);
    assert_eq!(users[0].calls, 3);
    assert_eq!(users[1].user_id, user("alpha"));
}

#[test]
fn daily_snapshot_counts_outcomes_and_users() {
    let rows = vec![
        row("agent-1", AiTool::ResumeBuilder, 5, TransactionStatus::Succeeded, at(9)),
        row("agent-1", AiTool::SeoSchema, 0, TransactionStatus::Failed, at(10)),
        row("agent-2", AiTool::SeoSchema, 1, TransactionStatus::Succeeded, at(11)),
        row(
            "agent-3",
            AiTool::SeoSchema,
            1,
            TransactionStatus::Succeeded,
            at(11) + Duration::days(1),
        ),
    ];

    let snapshot = daily_snapshot(&rows, day());

    assert_eq!(snapshot.credits_used, 6);
    assert_eq!(snapshot.successful_calls, 2);
    assert_eq!(snapshot.failed_calls, 1);
    assert_eq!(snapshot.active_users, 2);
}
