use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ripple_cli::{KeyArgs, OutputFormat, RunArgs, SortArgs, WorkerArgs, commands};

#[derive(Parser)]
#[command(
    name = "ripple",
    about = "Run ripple pipelines against a local object store",
    version,
    author,
    long_about = "A command-line tool for running ripple pipelines locally: sort delimited record files across key-range bins, run custom pipelines, execute single worker payloads and inspect object keys."
)]
struct Cli {
    /// Default log level when RUST_LOG is not set
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Output format
    #[arg(short = 'o', long, value_enum, global = true, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sort a file with the six-step sort pipeline
    Sort(SortArgs),

    /// Run a pipeline described by a JSON configuration
    Run(RunArgs),

    /// Execute one trigger payload read from stdin
    Worker(WorkerArgs),

    /// Parse an object key
    Key(KeyArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Sort(args) => commands::sort::handle(args, cli.output).await?,
        Commands::Run(args) => commands::run::handle(args, cli.output).await?,
        Commands::Worker(args) => commands::worker::handle(args, cli.output).await?,
        Commands::Key(args) => commands::key::handle(args, cli.output)?,
    }

    Ok(())
}
