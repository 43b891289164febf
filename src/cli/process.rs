use std::{
    env,
    path::{self, Path},
    process::{Command, Stdio},
};

use anyhow::{anyhow, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

use crate::daemon::collection::event_source::Framing;

use super::daemon_path::to_daemon_path;

/// Terminates every running daemon. Daemons flush the active session on SIGTERM.
pub fn kill_previous_daemons() -> Result<()> {
    let daemon = to_daemon_path(env::current_exe()?);
    kill_processes(&daemon)
}

fn kill_processes(name: &Path) -> Result<()> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("Can't get current pid {e}"))?;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v)
            .is_some()
        {
            info!("Stopping daemon {pid}");
            // This will forcefully terminate the process on Windows. Anything better will require a
            // lot more work.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
        }
    }
    Ok(())
}

/// Intended for shutting down previous daemons and starting a new one reading `input`. The daemon
/// is spawned as a detached process.
pub fn restart_daemon(dir: &Path, input: &Path, framing: Framing) -> Result<()> {
    let daemon = to_daemon_path(env::current_exe()?);
    kill_processes(&daemon)?;

    // The daemon leaves the current working directory once detached.
    let dir = path::absolute(dir)?;
    let input = path::absolute(input)?;

    let mut command = Command::new(&daemon);
    command
        .arg("--dir")
        .arg(&dir)
        .arg("--input")
        .arg(&input)
        .arg("--framing")
        .arg(framing.to_string());
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        command.creation_flags(DETACHED_PROCESS);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
        command.arg("--detach");
    }

    #[allow(clippy::zombie_processes)]
    let child = command.spawn()?;
    println!("Started daemon {} reading {input:?}", child.id());
    Ok(())
}
