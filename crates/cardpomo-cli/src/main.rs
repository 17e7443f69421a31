use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "cardpomo", version, about = "Pomodoro timer for task cards")]
struct Cli {
    /// Owner whose session to act on (defaults to identity.owner in the config)
    #[arg(long, global = true)]
    owner: Option<String>,

    /// SQLite database to use instead of the one in the data directory
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Timer(commands::timer::TimerAction),
    /// Follow the session live, finishing phases when they run out
    Watch {
        /// Card being viewed; decides whether the widget is enabled
        #[arg(long)]
        card: Option<String>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CARDPOMO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let globals = commands::Globals {
        owner: cli.owner,
        db: cli.db,
    };
    let result = match cli.command {
        Commands::Timer(action) => commands::timer::run(&globals, action),
        Commands::Watch { card } => commands::watch::run(&globals, card),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => commands::completions::run(shell, Cli::command()),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
