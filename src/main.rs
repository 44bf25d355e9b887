use anyhow::Result;
use campaign_rollup::analyzer::{CampaignAnalyzer, ReportOptions};
use campaign_rollup::config::{self, Config};
use campaign_rollup::logging;
use campaign_rollup::models::{Dimension, Metric, Scope, TimeWindow};
use campaign_rollup::timestamp_parser::TimestampParser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "campaign-rollup")]
#[command(about = "Rollup and top-N leaderboards over campaign, coupon and price-monitoring records")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to campaign-rollup.toml discovery)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank groups of a dimension by a metric
    Top {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Ranking metric: observations, exceptions, entities, exception-entities,
        /// exception-rate, distinct:<dimension>, sum:<fact>
        #[arg(long, default_value = "exceptions")]
        metric: String,
        /// Show the top N groups (defaults to ranking.default_limit)
        #[arg(long, conflicts_with = "all")]
        limit: Option<usize>,
        /// Show every group
        #[arg(long)]
        all: bool,
    },
    /// Show every group of a dimension
    Rollup {
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// List dimensions present in the records
    Dimensions {
        /// Record files or glob patterns
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct SelectionArgs {
    /// Record files or glob patterns
    #[arg(long, required = true, num_args = 1..)]
    input: Vec<String>,
    /// Dimension to group by
    #[arg(long)]
    dimension: String,
    /// Population filter: 'all' or <dimension>=<value>
    #[arg(long, default_value = "all")]
    scope: String,
    /// Start date filter (YYYY-MM-DD)
    #[arg(long)]
    since: Option<String>,
    /// End date filter (YYYY-MM-DD)
    #[arg(long)]
    until: Option<String>,
    /// Sub-entity dimension counted per group (defaults to ranking.entity_dimension)
    #[arg(long)]
    entity: Option<String>,
    /// Comma-separated secondary dimensions (defaults to ranking.secondary_dimensions)
    #[arg(long, value_delimiter = ',')]
    secondary: Option<Vec<String>>,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let json = match &cli.command {
        Commands::Top { selection, .. } | Commands::Rollup { selection } => selection.json,
        Commands::Dimensions { json, .. } => *json,
    };

    let loaded = match &cli.config {
        Some(path) => Config::load_from(Some(path.as_path())),
        None => Config::load(),
    };
    match loaded.and_then(config::set_config) {
        Ok(()) => {}
        Err(e) => return handle_error(e, json),
    }
    let _log_guard = logging::init_logging();

    let (command, options) = match build_options(cli.command) {
        Ok(parsed) => parsed,
        Err(e) => return handle_error(e, json),
    };

    let analyzer = CampaignAnalyzer::new();
    match analyzer.run_command(command, options).await {
        Ok(_) => Ok(()),
        Err(e) => handle_error(e, json),
    }
}

fn build_options(command: Commands) -> Result<(&'static str, ReportOptions)> {
    match command {
        Commands::Top {
            selection,
            metric,
            limit,
            all,
        } => {
            let mut options = parse_selection(selection)?;
            options.metric = metric.parse::<Metric>()?;
            options.limit = limit;
            options.show_all = all;
            Ok(("top", options))
        }
        Commands::Rollup { selection } => Ok(("rollup", parse_selection(selection)?)),
        Commands::Dimensions { input, json } => Ok((
            "dimensions",
            ReportOptions {
                inputs: input,
                json_output: json,
                ..ReportOptions::default()
            },
        )),
    }
}

fn parse_selection(args: SelectionArgs) -> Result<ReportOptions> {
    let since = args
        .since
        .as_deref()
        .map(TimestampParser::parse_day_start)
        .transpose()?;
    let until = args
        .until
        .as_deref()
        .map(TimestampParser::parse_day_end)
        .transpose()?;

    if let (Some(since), Some(until)) = (since, until) {
        if since > until {
            anyhow::bail!("--since must not be after --until");
        }
    }

    Ok(ReportOptions {
        inputs: args.input,
        dimension: Dimension::new(args.dimension),
        scope: args.scope.parse::<Scope>()?,
        window: TimeWindow::new(since, until),
        entity_dimension: args.entity.map(Dimension::new),
        secondary_dimensions: args
            .secondary
            .map(|dims| dims.into_iter().map(Dimension::new).collect()),
        json_output: args.json,
        ..ReportOptions::default()
    })
}

fn handle_error(e: anyhow::Error, json: bool) -> Result<(), anyhow::Error> {
    if json {
        println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
    } else {
        eprintln!("Error: {:#}", e);
    }
    process::exit(1);
}
