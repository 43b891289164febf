pub mod daemon_path;
pub mod output;
pub mod process;
pub mod report;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use process::{kill_previous_daemons, restart_daemon};
use report::{process_report_command, ReportCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    config::Config,
    daemon::{collection::event_source::Framing, start_daemon, EventInput},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Sitetime", version, long_about = None)]
#[command(about = "Tracks time spent per website", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default $XDG_STATE_HOME/sitetime or $HOME/.local/state/sitetime"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a background daemon reading browser events from a fifo")]
    Init {
        #[arg(long, help = "Fifo the browser side writes events into")]
        input: PathBuf,
        #[arg(long, value_enum, default_value_t = Framing::Lines)]
        framing: Framing,
    },
    #[command(
        about = "Run the daemon directly in current console. Reads events from stdin unless --input is given"
    )]
    Serve {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Framing::Lines)]
        framing: Framing,
        #[arg(long, help = "Config file used on top of config.toml in the application directory")]
        config: Option<PathBuf>,
    },
    #[command(about = "Stop currently running daemons")]
    Stop {},
    #[command(about = "Show time spent on websites, split into productive and unproductive")]
    Report {
        #[command(flatten)]
        command: ReportCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let dir = args.dir.map_or_else(create_application_default_path, Ok)?;
    enable_logging(CLI_PREFIX, &dir.join("logs"), logging_level, args.log)?;

    match args.commands {
        Commands::Init { input, framing } => restart_daemon(&dir, &input, framing),
        Commands::Stop {} => kill_previous_daemons(),
        Commands::Serve {
            input,
            framing,
            config,
        } => {
            let config = Config::load(&dir, config.as_deref())?;
            start_daemon(dir, config, EventInput { path: input, framing }).await
        }
        Commands::Report { command } => process_report_command(&dir, command).await,
    }
}
