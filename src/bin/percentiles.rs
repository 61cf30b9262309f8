use {
    anyhow::Result,
    clap::{Parser, Subcommand},
    couch_percentiles::{Collector, Config, QueryKind, SamplePolicy, render_reports, unix_now},
    std::{fs, path::PathBuf},
    tracing::{error, info},
};

#[derive(Parser)]
#[clap(
    name = "percentiles",
    about = "Latency percentiles per metric and bucket from Couchbase"
)]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// Config file path
    #[clap(long, default_value = "config.toml")]
    config: String,

    /// Query service URL, overrides the config file
    #[clap(long)]
    server: Option<String>,

    /// Drop the value of each record that opens a new group (not the first record)
    #[clap(long)]
    drop_group_opener: bool,

    /// Output JSON file
    #[clap(long)]
    output: Option<PathBuf>,

    /// Log level
    #[clap(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Percentiles over the trailing window (now - 90s .. now - 30s by default)
    Window,

    /// Run every statement of a query file with $1 = now - diff
    Batch {
        /// File with one statement per line
        #[clap(long, default_value = "query_file.txt")]
        query_file: PathBuf,

        /// debug (metric/subtype/timeMsec rows) or player (duration rows)
        #[clap(long = "type", default_value = "debug")]
        kind: QueryKind,

        /// Seconds back from now, overrides the config file
        #[clap(long)]
        diff: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup tracing
    let filter = args
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Load config, or defaults when the file does not exist
    let mut config = Config::load_or_default(&args.config)?;

    if let Some(server) = args.server {
        config.query.server_url = server;
    }
    if args.drop_group_opener {
        config.aggregation.sample_policy = SamplePolicy::DropGroupOpener;
    }
    if let Command::Batch {
        diff: Some(diff), ..
    } = &args.command
    {
        config.window.batch_diff = std::time::Duration::from_secs(*diff);
    }
    config.validate()?;

    info!("Query service: {}", config.query.server_url);
    info!("Sample policy: {:?}", config.aggregation.sample_policy);

    let collector = Collector::new(config)?;
    let ping = collector.check_connection().await?;
    info!("Query service reachable (ping: {:.2}ms)", ping.as_secs_f64() * 1000.0);

    let now = unix_now();
    let outcome = match &args.command {
        Command::Window => collector
            .run_window(collector.trailing_window(now))
            .await
            .map(|report| vec![report]),
        Command::Batch {
            query_file, kind, ..
        } => {
            collector
                .run_batch(query_file, *kind, collector.batch_window(now))
                .await
        }
    };

    let reports = match outcome {
        Ok(reports) => reports,
        Err(e) => {
            error!("Aggregation failed: {}", e);
            std::process::exit(1);
        }
    };

    for report in &reports {
        report.log_summary();
    }

    let json = render_reports(&reports)?;
    match args.output {
        Some(path) => {
            fs::write(&path, json)?;
            info!("Results saved to {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
