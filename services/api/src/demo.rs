use crate::infra::parse_date;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use clap::Args;
use realty_credits::credits::analytics::{top_users, UserUsage};
use realty_credits::credits::export::read_transactions_from_path;
use realty_credits::credits::{
    summarize, AdminAlert, AiTool, AlertSeverity, CreditLimit, CreditService,
    CreditServiceError, CreditServiceSettings, InMemoryCreditRepository, OfflineProvider,
    ToolRequest, TransactionStatus, UsageFilter, UsageSummary, UserId, Wallet,
};
use realty_credits::error::AppError;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct UsageSummaryArgs {
    /// Ledger CSV produced by the export endpoint or `demo --export`
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Only count rows for this user
    #[arg(long)]
    pub(crate) user: Option<String>,
    /// Only count rows for this tool (e.g. resume_builder)
    #[arg(long)]
    pub(crate) tool: Option<AiTool>,
    /// First day to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) from: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) to: Option<NaiveDate>,
    /// Only count rows with this status (succeeded or failed)
    #[arg(long)]
    pub(crate) status: Option<TransactionStatus>,
    /// Number of top spenders to list
    #[arg(long, default_value_t = 5)]
    pub(crate) top: usize,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Day the scripted runs happen on (YYYY-MM-DD). Defaults to today (UTC).
    #[arg(long, value_parser = parse_date)]
    pub(crate) day: Option<NaiveDate>,
    /// Credits each demo wallet starts with
    #[arg(long, default_value_t = 12)]
    pub(crate) starting_balance: u64,
    /// Write the resulting ledger to this CSV path
    #[arg(long)]
    pub(crate) export: Option<PathBuf>,
}

pub(crate) fn run_usage_summary(args: UsageSummaryArgs) -> Result<(), AppError> {
    let UsageSummaryArgs {
        csv,
        user,
        tool,
        from,
        to,
        status,
        top,
    } = args;

    let rows = read_transactions_from_path(&csv)?;
    let filter = UsageFilter {
        user_id: user.map(UserId),
        tool,
        from,
        to,
        status,
    };
    let summary = summarize(&rows, &filter);
    let matching: Vec<_> = rows.into_iter().filter(|row| filter.matches(row)).collect();
    let leaders = top_users(&matching, top);

    println!("Ledger: {}", csv.display());
    render_usage(&summary, &leaders);
    Ok(())
}

struct ScriptedRun {
    user: &'static str,
    tool: AiTool,
    input: Value,
}

fn demo_script() -> Vec<ScriptedRun> {
    vec![
        ScriptedRun {
            user: "agent-ames",
            tool: AiTool::ResumeBuilder,
            input: json!({
                "name": "Jordan Pike",
                "years_experience": 11,
                "specialties": ["acreages", "first-time buyers"],
            }),
        },
        ScriptedRun {
            user: "agent-ames",
            tool: AiTool::ListingEnhancer,
            input: json!({
                "address": "1418 Clark Ave",
                "description": "Craftsman with original woodwork",
                "bedrooms": 3,
                "bathrooms": 2,
            }),
        },
        ScriptedRun {
            user: "agent-ames",
            tool: AiTool::ResumeBuilder,
            input: json!({ "name": "Jordan Pike" }),
        },
        ScriptedRun {
            user: "broker-dsm",
            tool: AiTool::AgentMatcher,
            input: json!({
                "city": "Des Moines",
                "agents": [
                    { "name": "Casey Oduya", "city": "Des Moines", "closed_deals": 31 },
                    { "name": "Riley Haas", "city": "Ankeny", "closed_deals": 48 },
                ],
            }),
        },
        ScriptedRun {
            user: "broker-dsm",
            tool: AiTool::BrochureWriter,
            input: json!({ "description": "Downtown loft with skyline views" }),
        },
        ScriptedRun {
            user: "agent-omaha",
            tool: AiTool::SeoSchema,
            input: json!({ "address": "507 S 38th St", "price": 264000, "bedrooms": 4 }),
        },
        ScriptedRun {
            user: "agent-omaha",
            tool: AiTool::ListingEnhancer,
            input: json!({ "address": "507 S 38th St" }),
        },
    ]
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        day,
        starting_balance,
        export,
    } = args;

    let day = day.unwrap_or_else(|| Utc::now().date_naive());
    let opening: DateTime<Utc> = day.and_time(NaiveTime::MIN).and_utc() + Duration::hours(9);
    let users = ["agent-ames", "agent-omaha", "broker-dsm"];

    let repository = Arc::new(InMemoryCreditRepository::with_wallets(users.iter().map(
        |user| Wallet {
            user_id: UserId(user.to_string()),
            balance: starting_balance,
        },
    )));
    let service = CreditService::new(
        repository,
        Arc::new(OfflineProvider),
        CreditServiceSettings::default(),
    );

    service.set_tool_enabled(AiTool::BrochureWriter, false)?;
    service.upsert_credit_limit(CreditLimit {
        tool_name: AiTool::ResumeBuilder,
        max_daily_credits: 5,
        enforced: true,
    })?;

    println!("AI tool credit demo for {day}");
    println!("Wallets start with {starting_balance} credits; brochure writer disabled;");
    println!("resume builder capped at 5 credits per user per day.\n");

    let mut denials = 0usize;
    for (offset, run) in demo_script().into_iter().enumerate() {
        let now = opening + Duration::minutes(20 * offset as i64);
        let request = ToolRequest {
            user_id: UserId(run.user.to_string()),
            tool: run.tool,
            input: run.input,
        };

        match service.invoke_at(request, now).await {
            Ok(response) => println!(
                "- {} {}: charged {} credits, balance {}",
                run.user,
                run.tool.label(),
                response.credits_used,
                response.balance
            ),
            Err(CreditServiceError::Denied(reason)) => {
                denials += 1;
                println!("- {} {}: denied ({reason})", run.user, run.tool.label());
            }
            Err(CreditServiceError::Provider(err)) => {
                println!("- {} {}: failed ({err})", run.user, run.tool.label());
            }
            Err(other) => return Err(other.into()),
        }
    }

    if denials > 0 {
        service.record_alert(AdminAlert {
            severity: AlertSeverity::Info,
            title: "Tool runs denied".to_string(),
            message: format!("{denials} tool runs were refused by the credit gate on {day}"),
            tool_name: None,
        })?;
    }

    println!("\nBalances");
    for user in users {
        let wallet = service.balance(&UserId(user.to_string()))?;
        println!("- {}: {} credits", user, wallet.balance);
    }

    let filter = UsageFilter::default();
    let summary = service.usage_summary(&filter)?;
    let leaders = service.top_users(&filter, users.len())?;
    println!();
    render_usage(&summary, &leaders);

    let (snapshot_id, snapshot) = service.record_snapshot(day)?;
    println!(
        "\nSnapshot {}: {} credits, {} succeeded, {} failed, {} active users",
        snapshot_id.0,
        snapshot.credits_used,
        snapshot.successful_calls,
        snapshot.failed_calls,
        snapshot.active_users
    );

    if let Some(path) = export {
        let csv = service.export_csv(&filter)?;
        std::fs::write(&path, csv)?;
        println!("Ledger written to {}", path.display());
    }

    Ok(())
}

pub(crate) fn render_usage(summary: &UsageSummary, leaders: &[UserUsage]) {
    println!(
        "Usage: {} credits across {} calls",
        summary.total_credits, summary.call_count
    );

    if summary.by_tool.is_empty() {
        println!("\nBy tool: none");
    } else {
        println!("\nBy tool");
        for usage in &summary.by_tool {
            println!(
                "- {}: {} credits, {} calls",
                usage.tool_label, usage.credits, usage.calls
            );
        }
    }

    if !summary.by_day.is_empty() {
        println!("\nBy day");
        for usage in &summary.by_day {
            println!("- {}: {} credits, {} calls", usage.day, usage.credits, usage.calls);
        }
    }

    if !summary.by_status.is_empty() {
        println!("\nBy status");
        for count in &summary.by_status {
            println!("- {}: {} calls", count.status.label(), count.calls);
        }
    }

    if !leaders.is_empty() {
        println!("\nTop users");
        for (rank, user) in leaders.iter().enumerate() {
            println!(
                "{}. {}: {} credits over {} calls",
                rank + 1,
                user.user_id,
                user.credits,
                user.calls
            );
        }
    }
}
