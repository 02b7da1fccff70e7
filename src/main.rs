use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tilebatch::cli::CommandContext;
use tilebatch::cli::commands;
use tilebatch::scheduler::RunOptions;

#[derive(Parser)]
#[command(name = "tilebatch")]
#[command(version, about = "Resumable batch processing of tiled geodata")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project config file (replaces .tilebatch/config.toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .tilebatch/config.toml in the current directory
    Init {
        #[arg(long, short, help = "Overwrite existing initialization")]
        force: bool,
    },

    /// Process every incomplete tile of a pipeline
    Run {
        #[arg(long, short, help = "Pipeline name from the config")]
        pipeline: String,
        #[arg(long, short, help = "Number of parallel workers")]
        workers: Option<usize>,
        #[arg(long, help = "Seconds between worker start-ups")]
        stagger: Option<u64>,
    },

    /// Watch a pipeline's progress from a separate terminal
    Monitor {
        #[arg(long, short, help = "Pipeline name from the config")]
        pipeline: String,
        #[arg(long, short, help = "Refresh interval in seconds")]
        interval: Option<u64>,
        #[arg(long, help = "Print one frame and exit")]
        once: bool,
    },

    /// Show a pipeline's progress summary
    Status {
        #[arg(long, short, help = "Pipeline name from the config")]
        pipeline: String,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            value_parser = ["text", "json"],
            help = "Output format: text, json"
        )]
        format: String,
        #[arg(short = 'd', long, help = "Show per-step counts and failed tiles")]
        detailed: bool,
    },

    /// Discard progress so tiles are processed again
    Reset {
        #[arg(long, short, help = "Pipeline name from the config")]
        pipeline: String,
        #[arg(long = "tile", short, help = "Tile id to reset (repeatable); all tiles if omitted")]
        tiles: Vec<String>,
        #[arg(long, short, help = "Do not ask for confirmation")]
        yes: bool,
    },

    /// Collect artifacts left in slot scratch directories into a session log
    CollectLogs {
        #[arg(long, short, help = "Pipeline name used for the session log file")]
        pipeline: String,
        #[arg(long, help = "Number of slots to collect (default: scheduler.pool_size)")]
        slots: Option<usize>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            value_parser = ["toml", "json"],
            help = "Output format: toml, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mtilebatch encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!("\n\x1b[33mCompleted tiles are kept; rerun the same command to resume.\x1b[0m");
        eprintln!();

        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_override = cli.config.as_deref();

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(force)?;
        }
        Commands::Run {
            pipeline,
            workers,
            stagger,
        } => {
            let ctx = CommandContext::load(config_override)?;
            let options = RunOptions {
                workers,
                stagger_secs: stagger,
            };
            let rt = Runtime::new()?;
            rt.block_on(commands::run::run(&ctx, &pipeline, options))?;
        }
        Commands::Monitor {
            pipeline,
            interval,
            once,
        } => {
            let ctx = CommandContext::load(config_override)?;
            let rt = Runtime::new()?;
            rt.block_on(commands::monitor::run(&ctx, &pipeline, interval, once))?;
        }
        Commands::Status {
            pipeline,
            format,
            detailed,
        } => {
            let ctx = CommandContext::load(config_override)?;
            commands::status::run(&ctx, &pipeline, &format, detailed)?;
        }
        Commands::Reset {
            pipeline,
            tiles,
            yes,
        } => {
            let ctx = CommandContext::load(config_override)?;
            commands::reset::run(&ctx, &pipeline, &tiles, yes)?;
        }
        Commands::CollectLogs { pipeline, slots } => {
            let ctx = CommandContext::load(config_override)?;
            commands::collect_logs::run(&ctx, &pipeline, slots)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                commands::config::show(config_override, &format)?;
            }
            ConfigAction::Path => {
                commands::config::path(config_override)?;
            }
            ConfigAction::Init { global, force } => {
                if global {
                    commands::config::init_global(force)?;
                } else {
                    commands::config::init_project(force)?;
                }
            }
        },
    }

    Ok(())
}
