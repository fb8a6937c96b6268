use crate::demo::{run_demo, run_usage_summary, DemoArgs, UsageSummaryArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use realty_credits::credits::Wallet;
use realty_credits::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Realty Credits",
    about = "Run and inspect the AI tool credit ledger from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Summarize an exported ledger CSV
    Usage {
        #[command(subcommand)]
        command: UsageCommand,
    },
    /// Run a scripted marketplace day against an in-memory ledger
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum UsageCommand {
    /// Print totals, per-tool and per-day breakdowns, and top spenders
    Summarize(UsageSummaryArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Seed a wallet at startup as USER=CREDITS (repeatable)
    #[arg(long = "seed-wallet", value_parser = crate::infra::parse_wallet_seed)]
    pub(crate) seed_wallets: Vec<Wallet>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Usage {
            command: UsageCommand::Summarize(args),
        } => run_usage_summary(args),
        Command::Demo(args) => run_demo(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_collects_repeated_wallet_seeds() {
        let cli = Cli::try_parse_from([
            "realty-credits-api",
            "serve",
            "--seed-wallet",
            "agent-1=40",
            "--seed-wallet",
            "agent-2=5",
        ])
        .expect("arguments parse");

        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.seed_wallets.len(), 2);
                assert_eq!(args.seed_wallets[1].balance, 5);
            }
            other => panic!("expected serve command, got {other:?}"),
        }
    }
}
