use crate::analyze::{run_analyze, run_summary, AnalyzeArgs, SummaryArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use shopper_dna::config::AppConfig;
use shopper_dna::error::AppError;
use shopper_dna::telemetry;

#[derive(Parser, Debug)]
#[command(
    name = "ShopperDNA",
    about = "Segment customers by recency, frequency and monetary value",
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
    /// Score and segment an order export, writing results and a summary
    Analyze(AnalyzeArgs),
    /// Print the segment summary of a previously written results CSV
    Summary(SummaryArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match command {
        Command::Serve(args) => server::run(config, args).await,
        Command::Analyze(args) => run_analyze(config, args),
        Command::Summary(args) => run_summary(config, args),
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
    fn analyze_flags_parse() {
        let cli = Cli::try_parse_from([
            "shopper-dna-api",
            "analyze",
            "--orders",
            "superstore.csv",
            "--as-of",
            "2017-12-30",
            "--buckets",
            "4",
            "--top",
            "3",
        ])
        .expect("flags parse");

        match cli.command {
            Some(Command::Analyze(args)) => {
                assert_eq!(args.buckets, Some(4));
                assert_eq!(args.top, 3);
                assert!(args.as_of.is_some());
            }
            other => panic!("expected analyze command, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_buckets_are_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["shopper-dna-api", "analyze", "--buckets", "1"]).is_err());
    }
}
