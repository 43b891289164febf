use std::{env::args, time::Duration};

use anyhow::{bail, Result};
use clap::Parser;
use sitetime::{
    config::Config,
    daemon::{args::DaemonArgs, start_daemon, EventInput},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, DAEMON_PREFIX},
        runtime::single_thread_runtime,
    },
};
use tracing::error;

fn main() -> Result<()> {
    run_service(args().collect::<Vec<_>>())
}

fn run_service(command_args: Vec<String>) -> Result<()> {
    let args = DaemonArgs::parse_from(&command_args);

    if args.detach {
        if args.input.is_none() {
            bail!("--detach requires --input, stdin is closed in the background");
        }
        #[cfg(unix)]
        {
            use daemonize::Daemonize;

            let daemonize = Daemonize::new()
                .stdout(daemonize::Stdio::devnull())
                .stderr(daemonize::Stdio::devnull())
                .execute();
            match daemonize {
                daemonize::Outcome::Parent(parent) => {
                    parent
                        .inspect_err(|e| error!("Failed to create daemon on parent side {e:?}"))?;
                    println!("Created daemon");
                    return Ok(());
                }
                daemonize::Outcome::Child(child) => {
                    child?;
                }
            }
        }
        #[cfg(not(unix))]
        bail!("--detach is only supported on unix, use `sitetime init` instead");
    }

    run(args)
}

fn run(args: DaemonArgs) -> Result<()> {
    let app_dir = args.dir.map_or_else(create_application_default_path, Ok)?;
    enable_logging(DAEMON_PREFIX, &app_dir.join("logs"), args.log, args.log_console)?;

    let config = Config::load(&app_dir, args.config.as_deref())
        .inspect_err(|e| error!("Failed to load config {e:?}"))?;
    let input = EventInput {
        path: args.input,
        framing: args.framing,
    };

    let runtime = single_thread_runtime()?;
    let result = runtime.block_on(start_daemon(app_dir, config, input));
    // Reading stdin happens on a blocking thread that can't be interrupted.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}
