use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

use super::collection::event_source::Framing;

#[derive(Parser, Debug)]
#[command(name = "sitetime-daemon", version)]
#[command(about = "Records time spent per website from browser events")]
pub struct DaemonArgs {
    /// Fork into the background. Only makes sense together with --input.
    #[arg(long)]
    pub detach: bool,
    #[arg(long)]
    pub dir: Option<PathBuf>,
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// File or fifo to read browser events from. Stdin is used by default, which is what browsers
    /// expect from native messaging hosts.
    #[arg(long)]
    pub input: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Framing::Lines)]
    pub framing: Framing,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
    /// Browsers pass the caller's origin to native messaging hosts.
    #[arg(hide = true, allow_hyphen_values = true, trailing_var_arg = true)]
    pub caller: Vec<String>,
}
