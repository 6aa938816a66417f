// Child reaper and fatal-signal wiring.
//
// The notification sidecar is fire-and-forget: we spawn it and never wait.
// Without a reaper those children would accumulate as zombies. A single
// background thread watches SIGCHLD and drains every exited child with a
// non-blocking waitpid loop. The same thread treats SIGPIPE as fatal, per
// the daemon's "broken output stream aborts" contract.

use crate::error::AppError;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use signal_hook::consts::{SIGCHLD, SIGPIPE};
use signal_hook::iterator::Signals;

/// Install the reaper thread. Must run once at startup, before the
/// notifier can spawn its first child.
pub fn install() -> anyhow::Result<()> {
    let mut signals = Signals::new([SIGCHLD, SIGPIPE])?;

    std::thread::spawn(move || {
        for signal in signals.forever() {
            if signal == SIGCHLD {
                reap_children();
            } else if signal == SIGPIPE {
                log::error!("{}", AppError::Sigpipe);
                std::process::exit(AppError::Sigpipe.exit_code());
            }
        }
    });

    Ok(())
}

/// Drain every exited child without blocking. Stops at `ECHILD` (no
/// children left) or `WouldBlock` (none have exited yet).
fn reap_children() {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => break,
            Ok(_) => continue,
            Err(nix::errno::Errno::ECHILD) => break,
            Err(_) => break,
        }
    }
}
