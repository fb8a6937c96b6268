use super::common::*;
use crate::credits::analytics::{self, UsageFilter};
use crate::credits::domain::{
    AdminAlert, AiTool, AlertSeverity, CreditLimit, ToolRequest, TransactionStatus,
};
use crate::credits::gate::{DenialReason, GateDecision};
use crate::credits::memory::InMemoryCreditRepository;
use crate::credits::provider::ProviderError;
use crate::credits::repository::{CreditRepository, RepositoryError};
use crate::credits::service::{CreditService, CreditServiceError, CreditServiceSettings};
use crate::credits::usage_log::UsageEvent;
use std::sync::Arc;

fn request(name: &str, tool: AiTool) -> ToolRequest {
    ToolRequest {
        user_id: user(name),
        tool,
        input: input_for(tool),
    }
}

#[tokio::test]
async fn invoke_debits_wallet_and_appends_ledger_row() {
    let (service, repository) = build_service(vec![wallet("agent-1", 10)]);

    let response = service
        .invoke_at(request("agent-1", AiTool::ResumeBuilder), at(9))
        .await
        .expect("tool run succeeds");

    assert_eq!(response.credits_used, 5);
    assert_eq!(response.balance, 5);
    assert!(response.output["headline"].is_string());

    let rows = repository
        .transactions(&UsageFilter::default(), 10)
        .expect("ledger readable");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, response.transaction_id);
    assert_eq!(rows[0].status, TransactionStatus::Succeeded);
    assert_eq!(rows[0].credits_used, 5);
    assert_eq!(rows[0].created_at, at(9));

    let events: Vec<UsageEvent> = service
        .recent_usage(10)
        .iter()
        .map(|entry| entry.event)
        .collect();
    assert_eq!(events, vec![UsageEvent::Succeeded, UsageEvent::Attempted]);
}

#[tokio::test]
async fn disabled_tool_is_denied_without_ledger_row() {
    let (service, repository) = build_service(vec![wallet("agent-1", 500)]);
    service
        .set_tool_enabled(AiTool::BrochureWriter, false)
        .expect("flag stored");

    match service
        .invoke_at(request("agent-1", AiTool::BrochureWriter), at(9))
        .await
    {
        Err(CreditServiceError::Denied(DenialReason::ToolDisabled)) => {}
        other => panic!("expected tool disabled denial, got {other:?}"),
    }

    assert_eq!(service.balance(&user("agent-1")).unwrap().balance, 500);
    assert!(repository
        .transactions(&UsageFilter::default(), 10)
        .unwrap()
        .is_empty());
    assert_eq!(service.recent_usage(1)[0].event, UsageEvent::Denied);
}

#[tokio::test]
async fn insufficient_balance_is_denied_before_provider_runs() {
    let (service, repository) = build_service(vec![wallet("agent-1", 4)]);

    match service
        .invoke_at(request("agent-1", AiTool::ResumeBuilder), at(9))
        .await
    {
        Err(CreditServiceError::Denied(DenialReason::InsufficientBalance {
            balance,
            required,
        })) => assert_eq!((balance, required), (4, 5)),
        other => panic!("expected insufficient balance, got {other:?}"),
    }

    assert!(repository
        .transactions(&UsageFilter::default(), 10)
        .unwrap()
        .is_empty());
    let logged = service.recent_usage(10);
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].event, UsageEvent::Denied);
}

#[tokio::test]
async fn enforced_daily_limit_blocks_second_run() {
    let (service, _) = build_service(vec![wallet("agent-1", 50)]);
    service
        .upsert_credit_limit(CreditLimit {
            tool_name: AiTool::ResumeBuilder,
            max_daily_credits: 8,
            enforced: true,
        })
        .expect("limit stored");

    service
        .invoke_at(request("agent-1", AiTool::ResumeBuilder), at(9))
        .await
        .expect("first run fits under the limit");

    match service
        .invoke_at(request("agent-1", AiTool::ResumeBuilder), at(10))
        .await
    {
        Err(CreditServiceError::Denied(DenialReason::DailyLimitExceeded {
            limit,
            spent_today,
        })) => assert_eq!((limit, spent_today), (8, 5)),
        other => panic!("expected daily limit denial, got {other:?}"),
    }

    // A new UTC day starts a fresh allowance.
    let tomorrow = at(10) + chrono::Duration::days(1);
    service
        .invoke_at(request("agent-1", AiTool::ResumeBuilder), tomorrow)
        .await
        .expect("limit resets the next day");
    assert_eq!(service.balance(&user("agent-1")).unwrap().balance, 40);
}

#[tokio::test]
async fn daily_limit_is_tracked_per_user() {
    let (service, _) = build_service(vec![wallet("agent-1", 50), wallet("agent-2", 50)]);
    service
        .upsert_credit_limit(CreditLimit {
            tool_name: AiTool::SeoSchema,
            max_daily_credits: 1,
            enforced: true,
        })
        .unwrap();

    service
        .invoke_at(request("agent-1", AiTool::SeoSchema), at(9))
        .await
        .expect("agent-1 first run");
    service
        .invoke_at(request("agent-2", AiTool::SeoSchema), at(9))
        .await
        .expect("agent-2 has its own allowance");

    let decision = service
        .check_at(&user("agent-1"), AiTool::SeoSchema, at(12))
        .unwrap();
    assert!(!decision.is_allowed());
}

#[tokio::test]
async fn provider_failure_records_failed_row_and_keeps_credits() {
    let repository = Arc::new(InMemoryCreditRepository::with_wallets([wallet(
        "agent-1", 10,
    )]));
    let service = CreditService::new(
        repository.clone(),
        Arc::new(FailingProvider),
        CreditServiceSettings::default(),
    );

    match service
        .invoke_at(request("agent-1", AiTool::ListingEnhancer), at(9))
        .await
    {
        Err(CreditServiceError::Provider(ProviderError::Upstream { status, .. })) => {
            assert_eq!(status, 503)
        }
        other => panic!("expected provider failure, got {other:?}"),
    }

    assert_eq!(service.balance(&user("agent-1")).unwrap().balance, 10);
    let rows = repository
        .transactions(&UsageFilter::default(), 10)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, TransactionStatus::Failed);
    assert_eq!(rows[0].credits_used, 0);
    assert_eq!(service.recent_usage(1)[0].event, UsageEvent::Failed);
}

#[tokio::test]
async fn invalid_input_is_a_provider_error() {
    let (service, _) = build_service(vec![wallet("agent-1", 10)]);
    let request = ToolRequest {
        user_id: user("agent-1"),
        tool: AiTool::SeoSchema,
        input: serde_json::json!({ "price": 100 }),
    };

    match service.invoke_at(request, at(9)).await {
        Err(CreditServiceError::Provider(ProviderError::InvalidInput(message))) => {
            assert!(message.contains("address"))
        }
        other => panic!("expected invalid input, got {other:?}"),
    }
}

#[test]
fn check_has_no_side_effects() {
    let (service, repository) = build_service(vec![wallet("agent-1", 3)]);

    let decision = service
        .check_at(&user("agent-1"), AiTool::ListingEnhancer, at(9))
        .expect("check runs");

    assert_eq!(decision, GateDecision::Allow);
    assert_eq!(service.balance(&user("agent-1")).unwrap().balance, 3);
    assert!(repository
        .transactions(&UsageFilter::default(), 10)
        .unwrap()
        .is_empty());
    assert!(service.usage_log().is_empty());
}

#[test]
fn balance_of_unknown_user_is_zero() {
    let (service, _) = build_service(Vec::new());
    let wallet = service.balance(&user("newcomer")).expect("balance");
    assert_eq!(wallet.balance, 0);
    assert_eq!(wallet.user_id, user("newcomer"));
}

#[test]
fn grant_creates_wallet_and_rejects_zero() {
    let (service, repository) = build_service(Vec::new());

    let wallet = service.grant(&user("agent-7"), 25).expect("grant applied");
    assert_eq!(wallet.balance, 25);
    let wallet = service.grant(&user("agent-7"), 5).expect("grant applied");
    assert_eq!(wallet.balance, 30);

    assert!(matches!(
        service.grant(&user("agent-7"), 0),
        Err(CreditServiceError::Invalid(_))
    ));
    assert!(repository
        .transactions(&UsageFilter::default(), 10)
        .unwrap()
        .is_empty());
}

#[test]
fn tool_flags_cover_every_tool() {
    let settings = CreditServiceSettings {
        default_tool_enabled: false,
        ..CreditServiceSettings::default()
    };
    let (service, _) = build_service_with(Vec::new(), settings);
    service.set_tool_enabled(AiTool::SeoSchema, true).unwrap();

    let flags = service.tool_flags().expect("flags listed");

    assert_eq!(flags.len(), AiTool::ordered().len());
    for flag in flags {
        assert_eq!(flag.is_enabled, flag.tool_name == AiTool::SeoSchema);
    }
}

#[test]
fn enforced_zero_limit_is_rejected() {
    let (service, _) = build_service(Vec::new());
    let result = service.upsert_credit_limit(CreditLimit {
        tool_name: AiTool::AgentMatcher,
        max_daily_credits: 0,
        enforced: true,
    });
    assert!(matches!(result, Err(CreditServiceError::Invalid(_))));
}

#[test]
fn alerts_require_a_title() {
    let (service, repository) = build_service(Vec::new());

    let blank = AdminAlert {
        severity: AlertSeverity::Warning,
        title: "  ".to_string(),
        message: "spend spike".to_string(),
        tool_name: None,
    };
    assert!(matches!(
        service.record_alert(blank),
        Err(CreditServiceError::Invalid(_))
    ));

    let id = service
        .record_alert(AdminAlert {
            severity: AlertSeverity::Critical,
            title: "Resume builder spend spike".to_string(),
            message: "3x the weekly average".to_string(),
            tool_name: Some(AiTool::ResumeBuilder),
        })
        .expect("alert stored");
    assert_eq!(repository.alerts().len(), 1);
    assert_eq!(repository.alerts()[0].0, id);
}

#[tokio::test]
async fn snapshot_rolls_up_the_day() {
    let (service, repository) = build_service(vec![wallet("agent-1", 20), wallet("agent-2", 20)]);
    service
        .invoke_at(request("agent-1", AiTool::ResumeBuilder), at(9))
        .await
        .unwrap();
    service
        .invoke_at(request("agent-2", AiTool::SeoSchema), at(10))
        .await
        .unwrap();

    let (first_id, snapshot) = service.record_snapshot(day()).expect("snapshot stored");
    assert_eq!(snapshot.credits_used, 6);
    assert_eq!(snapshot.successful_calls, 2);
    assert_eq!(snapshot.active_users, 2);

    let (second_id, _) = service.record_snapshot(day()).expect("snapshot replaced");
    assert_eq!(first_id, second_id);
    assert_eq!(repository.snapshots().len(), 1);
}

#[tokio::test]
async fn admin_fetch_is_bounded() {
    let settings = CreditServiceSettings {
        admin_fetch_limit: 2,
        ..CreditServiceSettings::default()
    };
    let (service, _) = build_service_with(vec![wallet("agent-1", 10)], settings);
    for hour in 9..12 {
        service
            .invoke_at(request("agent-1", AiTool::SeoSchema), at(hour))
            .await
            .unwrap();
    }

    let rows = service
        .transactions(&UsageFilter::default(), Some(50))
        .expect("rows listed");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].created_at, at(11));

    let summary = service
        .usage_summary(&UsageFilter::default())
        .expect("summary built");
    assert_eq!(summary.call_count, 2);
}

#[tokio::test]
async fn snapshot_counts_rows_past_the_admin_fetch_limit() {
    let settings = CreditServiceSettings {
        admin_fetch_limit: 2,
        ..CreditServiceSettings::default()
    };
    let (service, _) = build_service_with(vec![wallet("agent-1", 10)], settings);
    for hour in 9..12 {
        service
            .invoke_at(request("agent-1", AiTool::SeoSchema), at(hour))
            .await
            .unwrap();
    }

    let (_, snapshot) = service.record_snapshot(day()).expect("snapshot stored");
    assert_eq!(snapshot.successful_calls, 3);
    assert_eq!(snapshot.credits_used, 3);
}

#[tokio::test]
async fn concurrent_runs_cannot_both_spend_the_last_credits() {
    let (service, repository) = build_yielding_service(vec![wallet("agent-1", 5)]);

    let (first, second) = tokio::join!(
        service.invoke_at(request("agent-1", AiTool::ResumeBuilder), at(9)),
        service.invoke_at(request("agent-1", AiTool::ResumeBuilder), at(9)),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|outcome| matches!(
        outcome,
        Err(CreditServiceError::Denied(DenialReason::InsufficientBalance {
            balance: 0,
            required: 5
        }))
    )));

    assert_eq!(service.balance(&user("agent-1")).unwrap().balance, 0);
    let rows = repository
        .transactions(&UsageFilter::default(), 10)
        .expect("ledger readable");
    let failed: Vec<_> = rows
        .iter()
        .filter(|row| row.status == TransactionStatus::Failed)
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].credits_used, 0);
}

#[tokio::test]
async fn concurrent_runs_cannot_overshoot_the_daily_limit() {
    let (service, repository) = build_yielding_service(vec![wallet("agent-1", 100)]);
    service
        .upsert_credit_limit(CreditLimit {
            tool_name: AiTool::ResumeBuilder,
            max_daily_credits: 5,
            enforced: true,
        })
        .expect("limit stored");

    let (first, second) = tokio::join!(
        service.invoke_at(request("agent-1", AiTool::ResumeBuilder), at(9)),
        service.invoke_at(request("agent-1", AiTool::ResumeBuilder), at(9)),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|outcome| matches!(
        outcome,
        Err(CreditServiceError::Denied(DenialReason::DailyLimitExceeded {
            limit: 5,
            spent_today: 5
        }))
    )));

    assert_eq!(service.balance(&user("agent-1")).unwrap().balance, 95);
    let rows = repository
        .transactions(&UsageFilter::default(), 10)
        .expect("ledger readable");
    assert_eq!(
        analytics::spent_today(&rows, &user("agent-1"), AiTool::ResumeBuilder, day()),
        5
    );
    assert_eq!(
        rows.iter()
            .filter(|row| row.status == TransactionStatus::Failed)
            .count(),
        1
    );
}

#[tokio::test]
async fn usage_summary_and_export_follow_the_filter() {
    let (service, _) = build_service(vec![wallet("agent-1", 20), wallet("agent-2", 20)]);
    service
        .invoke_at(request("agent-1", AiTool::ResumeBuilder), at(9))
        .await
        .unwrap();
    service
        .invoke_at(request("agent-2", AiTool::ResumeBuilder), at(10))
        .await
        .unwrap();
    service
        .invoke_at(request("agent-2", AiTool::ListingEnhancer), at(11))
        .await
        .unwrap();

    let filter = UsageFilter {
        tool: Some(AiTool::ResumeBuilder),
        ..UsageFilter::default()
    };
    let summary = service.usage_summary(&filter).unwrap();
    assert_eq!(summary.total_credits, 10);
    assert_eq!(summary.call_count, 2);

    let top = service.top_users(&UsageFilter::default(), 1).unwrap();
    assert_eq!(top[0].user_id, user("agent-2"));
    assert_eq!(top[0].credits, 8);

    let csv = service
        .export_csv(&UsageFilter::for_user(user("agent-1")))
        .unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains("resume_builder"));
}

#[test]
fn repository_outage_surfaces_as_repository_error() {
    let service = CreditService::new(
        Arc::new(UnavailableRepository),
        Arc::new(FailingProvider),
        CreditServiceSettings::default(),
    );

    assert!(matches!(
        service.balance(&user("agent-1")),
        Err(CreditServiceError::Repository(RepositoryError::Unavailable(_)))
    ));
}
